//! Courier runtime — conversation orchestration over external tools.
//!
//! This crate drives one user query to one final answer: the model decides
//! whether to answer directly or invoke tools discovered from a connected
//! MCP server, tool results are folded back into the conversation, and the
//! model's follow-up produces the answer.
//!
//! # Overview
//!
//! - **Session**: the per-query state machine. Owns a model backend and a
//!   tool host; retains no memory across queries.
//! - **ToolHost**: the seam between the conversation loop and side effects;
//!   [`McpToolHost`] is the production implementation over `mcp::Connection`.
//! - **ToolCatalog**: the provider's tools projected into model-callable
//!   function specs.
//! - **Backend**: the model endpoint abstraction; [`OllamaBackend`] speaks
//!   Ollama's chat API.
//!
//! # Example
//!
//! ```ignore
//! use mcp::LaunchPlan;
//! use runtime::{McpToolHost, OllamaBackend, Session};
//! use std::collections::HashMap;
//! use std::path::Path;
//!
//! # async fn example() -> runtime::Result<()> {
//! let plan = LaunchPlan::resolve(Path::new("./weather.py"), None, None, HashMap::new())?;
//! let host = McpToolHost::connect(&plan).await?;
//! let backend = OllamaBackend::builder("llama3.1").build();
//!
//! let mut session = Session::new(backend, host);
//! let answer = session.process_query("What's the weather in Oslo?").await?;
//! println!("{answer}");
//! session.close().await;
//! # Ok(())
//! # }
//! ```

mod catalog;
mod error;
pub mod model;
mod providers;
mod session;
mod tools;

pub use catalog::{FunctionSpec, ToolCatalog, ToolDescriptor};
pub use error::{Error, Result};
pub use model::{Backend, Message, ModelError, ModelRequest, ModelResponse, Role, ToolCall};
pub use providers::{OllamaBackend, OllamaBackendBuilder};
pub use session::Session;
pub use tools::{McpToolHost, ToolHost};
