use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use crate::llm::ToolSchema;

/// Dispatch capability the agent loop executes tool calls through.
///
/// Implementations wrap whatever transport reaches the tool catalog, whether that is the
/// in-process catalog in this workspace, or a remote MCP session. A failed
/// call is reported as an error value; the loop renders it into a
/// tool-result message rather than aborting the turn.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    fn schemas(&self) -> Vec<ToolSchema>;

    async fn call(&self, name: &str, arguments: Value) -> Result<String>;
}
