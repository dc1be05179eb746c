use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Tool execution error: {message}")]
    ToolError { name: String, message: String },

    #[error("Tool call cancelled: {0}")]
    Cancelled(String),

    #[error("Event sink error: {0}")]
    Sink(#[source] anyhow::Error),
}
