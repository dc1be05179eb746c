//! Tool descriptors, model-facing definitions and tool call records.

use std::fmt;

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;
use uuid::Uuid;

/// Describes a function that can be called by an LLM.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct Function {
    /// The name of the function.
    pub name: String,
    /// Human-readable description of what the function does.
    pub description: String,
    /// JSON Schema definition of the function's parameters.
    pub parameters: serde_json::Value,
}

/// Represents a tool available to the LLM, typically wrapping a function.
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder, Eq, PartialEq)]
pub struct Tool {
    /// The type of tool (defaults to "function").
    #[serde(rename = "type")]
    #[builder(default = "function".to_string())]
    pub r#type: String,
    /// The function definition.
    pub function: Function,
}

/// A dynamically registered HTTP tool endpoint.
///
/// The `identifier` is the stable endpoint identifier used for key derivation;
/// both the caller and the endpoint owner must agree on it. The `schema` is
/// passed through to the model untouched.
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    /// Stable endpoint identifier.
    #[builder(setter(into))]
    pub identifier: String,
    /// Human-readable tool name exposed to the model.
    #[builder(setter(into))]
    pub name: String,
    /// Description exposed to the model.
    #[builder(setter(into))]
    pub description: String,
    /// JSON Schema for the tool parameters.
    #[builder(default = serde_json::json!({"type": "object", "properties": {}}))]
    pub schema: serde_json::Value,
    /// Absolute URL the signed call is POSTed to.
    #[builder(setter(into))]
    pub url: String,
}

/// Reasons a [`ToolDescriptor`] cannot be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptorError {
    /// The endpoint identifier is empty.
    EmptyIdentifier,
    /// The tool name is empty.
    EmptyName,
    /// The URL does not parse or is not http(s).
    InvalidUrl(String),
    /// Two descriptors expose the same tool name to the model.
    DuplicateName(String),
}

impl fmt::Display for DescriptorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyIdentifier => write!(f, "tool identifier must not be empty"),
            Self::EmptyName => write!(f, "tool name must not be empty"),
            Self::InvalidUrl(reason) => write!(f, "invalid tool url: {reason}"),
            Self::DuplicateName(name) => write!(f, "tool name '{name}' is configured twice"),
        }
    }
}

impl std::error::Error for DescriptorError {}

impl ToolDescriptor {
    /// Checks the descriptor can be signed for and called.
    ///
    /// # Errors
    ///
    /// Returns an error if the identifier or name is empty, or the URL is not an
    /// absolute `http`/`https` URL.
    pub fn validate(&self) -> Result<(), DescriptorError> {
        if self.identifier.trim().is_empty() {
            return Err(DescriptorError::EmptyIdentifier);
        }
        if self.name.trim().is_empty() {
            return Err(DescriptorError::EmptyName);
        }

        let parsed = url::Url::parse(&self.url)
            .map_err(|e| DescriptorError::InvalidUrl(format!("{}: {e}", self.url)))?;
        match parsed.scheme() {
            "http" | "https" => Ok(()),
            other => Err(DescriptorError::InvalidUrl(format!(
                "unsupported scheme '{other}'"
            ))),
        }
    }

    /// Builds the function definition handed to the model.
    #[must_use]
    pub fn to_definition(&self) -> Tool {
        Tool::builder()
            .function(Function {
                name: self.name.clone(),
                description: self.description.clone(),
                parameters: self.schema.clone(),
            })
            .build()
    }
}

/// A single tool invocation requested by the model.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ToolCall {
    /// Unique identifier for this tool call.
    pub id: String,
    /// Name of the tool being invoked.
    pub name: String,
    /// Arguments produced by the model.
    #[serde(default)]
    pub arguments: serde_json::Value,
}

impl ToolCall {
    /// Creates a new tool call with a generated ID.
    pub fn new(name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            arguments,
        }
    }

    /// Returns the arguments, treating `null` as an empty object.
    #[must_use]
    pub fn arguments_or_empty(&self) -> serde_json::Value {
        if self.arguments.is_null() {
            serde_json::Value::Object(serde_json::Map::new())
        } else {
            self.arguments.clone()
        }
    }
}
