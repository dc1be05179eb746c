//! Signed HTTP tools built from descriptors.
//!
//! A [`RemoteTool`] turns a model tool call into a signed `POST` against the
//! descriptor's URL, retried through the bounded backoff executor, and hands the
//! endpoint's `result` back to the generation loop.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use log::debug;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use toolgate_auth::Signer;
use toolgate_client::{ClientError, RetryError, ToolTransport, with_retry_cancellable};
use toolgate_common::{ApplicationSecret, DescriptorError, RetryConfig, Tool, ToolDescriptor};

use crate::{ToolContext, ToolExecutor, ToolImplementation};

/// Body of an outbound tool call.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CallBody<'a> {
    parameters: &'a Value,
    event_id: &'a str,
}

/// Why a remote tool call produced no result.
#[derive(Debug, Error)]
pub enum InvocationError {
    /// The parameters could not be serialized.
    #[error("Failed to encode call to {tool}: {source}")]
    Encode {
        tool: String,
        source: serde_json::Error,
    },

    /// Delivery failed fatally, ran out of attempts or was cancelled.
    #[error(transparent)]
    Delivery(#[from] RetryError<ClientError>),

    /// The endpoint answered without a `result` field.
    #[error("{tool} returned a response without a result")]
    MissingResult { tool: String },
}

impl InvocationError {
    /// Structured error detail reported by the endpoint, if any.
    #[must_use]
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Delivery(e) => e.last_error().and_then(ClientError::detail),
            _ => None,
        }
    }

    /// Whether the call was abandoned rather than failed.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Delivery(e) if e.is_cancelled())
    }
}

/// A tool that lives behind a signed HTTP endpoint.
pub struct RemoteTool {
    descriptor: ToolDescriptor,
    transport: Arc<dyn ToolTransport>,
    signer: Signer,
    retry: RetryConfig,
}

impl RemoteTool {
    /// Creates the bridge for one descriptor.
    ///
    /// # Errors
    ///
    /// Returns an error if the descriptor fails validation.
    pub fn new(
        descriptor: ToolDescriptor,
        transport: Arc<dyn ToolTransport>,
        application_secret: ApplicationSecret,
        retry: RetryConfig,
    ) -> Result<Self, DescriptorError> {
        descriptor.validate()?;
        Ok(Self {
            descriptor,
            transport,
            signer: Signer::new(application_secret),
            retry,
        })
    }

    /// Descriptor this tool was built from.
    #[must_use]
    pub const fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    /// Calls the endpoint and returns its `result` value.
    ///
    /// Every attempt is signed afresh with the current time, so a retry after a
    /// long backoff still falls inside the receiver's freshness window. Retry
    /// notices go to the context's progress sink.
    ///
    /// # Errors
    ///
    /// Returns an error if the parameters cannot be encoded, delivery fails
    /// (fatally, after exhausting attempts, or through cancellation), or the
    /// response carries no `result`.
    pub async fn invoke(
        &self,
        parameters: &Value,
        ctx: &ToolContext,
    ) -> Result<Value, InvocationError> {
        let name = self.descriptor.name.as_str();
        let body = serde_json::to_vec(&CallBody {
            parameters,
            event_id: &ctx.event_id,
        })
        .map_err(|source| InvocationError::Encode {
            tool: name.to_string(),
            source,
        })?;

        let transport = self.transport.as_ref();
        let url = self.descriptor.url.as_str();
        let event_id = ctx.event_id.as_str();
        let identifier = self.descriptor.identifier.as_str();
        let max_attempts = self.retry.max_retries.max(1);

        let attempt = || {
            let signed = self.signer.sign_now(identifier, body.clone());
            async move { transport.post_signed(url, event_id, &signed).await }
        };
        let on_attempt = |n: u32| {
            ctx.report(&format!("Retrying {name} (attempt {n}/{max_attempts})..."));
        };

        debug!("Calling remote tool {name} ({identifier}) for event {event_id}");
        let response =
            with_retry_cancellable(name, &self.retry, attempt, Some(&on_attempt), &ctx.cancel)
                .await?;

        match response {
            Value::Object(mut map) => map
                .remove("result")
                .ok_or_else(|| InvocationError::MissingResult {
                    tool: name.to_string(),
                }),
            _ => Err(InvocationError::MissingResult {
                tool: name.to_string(),
            }),
        }
    }
}

#[async_trait]
impl ToolImplementation for RemoteTool {
    fn get_definition(&self) -> Tool {
        self.descriptor.to_definition()
    }

    async fn execute(&self, args: &Value, ctx: &ToolContext) -> Result<String> {
        let result = self.invoke(args, ctx).await?;
        Ok(serde_json::to_string(&result)?)
    }
}

impl std::fmt::Debug for RemoteTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteTool")
            .field("identifier", &self.descriptor.identifier)
            .field("name", &self.descriptor.name)
            .field("url", &self.descriptor.url)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

/// Every configured remote tool, ready to register with an executor.
#[derive(Debug, Default)]
pub struct RemoteToolSet {
    tools: Vec<Arc<RemoteTool>>,
}

impl RemoteToolSet {
    /// Builds a [`RemoteTool`] for each descriptor, sharing one transport.
    ///
    /// # Errors
    ///
    /// Returns the first descriptor validation failure, or
    /// [`DescriptorError::DuplicateName`] when two descriptors share a name.
    pub fn from_descriptors(
        descriptors: impl IntoIterator<Item = ToolDescriptor>,
        transport: &Arc<dyn ToolTransport>,
        application_secret: &ApplicationSecret,
        retry: &RetryConfig,
    ) -> Result<Self, DescriptorError> {
        let mut names = HashSet::new();
        let mut tools = Vec::new();

        for descriptor in descriptors {
            if !names.insert(descriptor.name.clone()) {
                return Err(DescriptorError::DuplicateName(descriptor.name));
            }
            let tool = RemoteTool::new(
                descriptor,
                Arc::clone(transport),
                application_secret.clone(),
                retry.clone(),
            )?;
            tools.push(Arc::new(tool));
        }

        debug!("Discovered {} remote tools", tools.len());
        Ok(Self { tools })
    }

    /// Number of tools in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether no descriptor was configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Looks a tool up by its model-facing name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<RemoteTool>> {
        self.tools.iter().find(|t| t.descriptor.name == name).cloned()
    }

    /// Model-facing definitions of every tool.
    #[must_use]
    pub fn definitions(&self) -> Vec<Tool> {
        self.tools.iter().map(|t| t.get_definition()).collect()
    }

    /// Adds every tool to `executor`.
    pub fn register_into(&self, executor: &mut ToolExecutor) {
        for tool in &self.tools {
            executor.add_tool_arc(Arc::clone(tool) as Arc<dyn ToolImplementation>);
        }
    }

    /// Builds an executor holding exactly these tools.
    #[must_use]
    pub fn into_executor(self) -> ToolExecutor {
        let mut executor = ToolExecutor::new();
        self.register_into(&mut executor);
        executor
    }
}
