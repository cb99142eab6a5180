//! Stdio client for tool-provider (MCP) servers.
//!
//! This crate spawns a tool server as a child process and speaks the minimal
//! provider contract over its stdio pipes: `initialize`, `tools/list`, and
//! `tools/call`. It also decides *how* the server is launched — an explicit
//! command override, or an interpreter inferred from the target's extension
//! with a project-virtualenv probe for Python servers.
//!
//! # Example
//!
//! ```no_run
//! use mcp::{Connection, LaunchPlan};
//! use std::collections::HashMap;
//! use std::path::Path;
//!
//! # async fn example() -> mcp::Result<()> {
//! let plan = LaunchPlan::resolve(Path::new("./weather.py"), None, None, HashMap::new())?;
//!
//! let mut conn = Connection::open(&plan).await?;
//! conn.initialize().await?;
//!
//! for tool in conn.list_tools().await? {
//!     println!("Tool: {}", tool.name);
//! }
//!
//! let result = conn.call_tool("forecast", Some(serde_json::json!({
//!     "city": "Oslo"
//! }))).await?;
//! println!("{}", result.text());
//!
//! conn.close().await;
//! # Ok(())
//! # }
//! ```

mod connection;
mod error;
mod launch;
mod protocol;

pub use connection::{Connection, MAX_FRAME_SIZE, REQUEST_TIMEOUT};
pub use error::{Error, Result};
pub use launch::LaunchPlan;
pub use protocol::{
    CallToolParams, CallToolResult, InitializeParams, InitializeResult, JsonRpcError,
    JsonRpcRequest, JsonRpcResponse, ListToolsResult, RequestId, ServerInfo, Tool, ToolContent,
};
