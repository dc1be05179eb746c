use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::{ToolContext, ToolImplementation};
use toolgate_common::{Function, Tool};

pub struct CurrentTimeTool;
#[async_trait]
impl ToolImplementation for CurrentTimeTool {
    fn get_definition(&self) -> Tool {
        Tool::builder()
            .function(Function {
                name: "get_current_time".to_string(),
                description: "Get the current date and time in UTC format. Takes no parameters."
                    .to_string(),
                parameters: serde_json::json!({
                    "type": "object",
                    "properties": {},
                    "required": [],
                }),
            })
            .build()
    }

    async fn execute(&self, _args: &Value, _ctx: &ToolContext) -> Result<String> {
        let now: DateTime<Utc> = Utc::now();
        Ok(format!(
            "Current time: {}",
            now.format("%Y-%m-%d %H:%M:%S UTC")
        ))
    }
}

/// Returns its arguments as JSON text. Handy for checking a signed endpoint end to end.
pub struct EchoTool;
#[async_trait]
impl ToolImplementation for EchoTool {
    fn get_definition(&self) -> Tool {
        Tool::builder()
            .function(Function {
                name: "echo".to_string(),
                description: "Return the given arguments unchanged".to_string(),
                parameters: serde_json::json!({
                    "type": "object",
                    "properties": {},
                    "additionalProperties": true,
                }),
            })
            .build()
    }

    async fn execute(&self, args: &Value, _ctx: &ToolContext) -> Result<String> {
        Ok(serde_json::to_string(args)?)
    }
}
