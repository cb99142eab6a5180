//! Tool execution hosts.

mod mcp_host;

pub use mcp_host::McpToolHost;

use std::future::Future;

use crate::catalog::ToolCatalog;
use crate::error::Result;
use crate::model::ToolCall;

/// Trait for tool execution hosts.
///
/// This is the boundary between the conversation loop and side effects.
/// `execute` takes `&mut self`: calls are serialized by the session's
/// turn-taking, and the exclusive borrow enforces that structurally.
pub trait ToolHost: Send {
    /// The catalog of tools this host can execute.
    fn catalog(&self) -> &ToolCatalog;

    /// Whether the host can still execute calls.
    fn is_open(&self) -> bool;

    /// Execute one tool call and return its textual result.
    fn execute(&mut self, call: &ToolCall) -> impl Future<Output = Result<String>> + Send;

    /// Release the host's resources. Idempotent.
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}
