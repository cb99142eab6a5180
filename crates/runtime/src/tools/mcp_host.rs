//! MCP-backed tool host.

use mcp::{Connection, LaunchPlan};
use serde_json::Value;
use tracing::debug;

use super::ToolHost;
use crate::catalog::ToolCatalog;
use crate::error::{Error, Result};
use crate::model::ToolCall;

/// Tool host backed by a spawned MCP server.
///
/// Connection and catalog are 1:1 — the catalog is fetched once at connect
/// and lives until close.
pub struct McpToolHost {
    conn: Connection,
    catalog: ToolCatalog,
}

impl McpToolHost {
    /// Spawn the server, perform the handshake, and fetch the tool catalog.
    ///
    /// On any failure after the spawn, the child is released before the
    /// error propagates; no process outlives a failed connect.
    pub async fn connect(plan: &LaunchPlan) -> Result<Self> {
        let mut conn = Connection::open(plan)
            .await
            .map_err(|e| Error::Launch(e.to_string()))?;

        match Self::bootstrap(&mut conn).await {
            Ok(catalog) => Ok(Self { conn, catalog }),
            Err(e) => {
                conn.close().await;
                Err(e)
            }
        }
    }

    async fn bootstrap(conn: &mut Connection) -> Result<ToolCatalog> {
        conn.initialize().await.map_err(|e| match e {
            mcp::Error::Handshake(msg) => Error::Handshake(msg),
            other => Error::Handshake(other.to_string()),
        })?;

        let tools = conn
            .list_tools()
            .await
            .map_err(|e| Error::CatalogUnavailable(e.to_string()))?;

        ToolCatalog::from_tools(tools)
    }
}

impl ToolHost for McpToolHost {
    fn catalog(&self) -> &ToolCatalog {
        &self.catalog
    }

    fn is_open(&self) -> bool {
        self.conn.is_open()
    }

    async fn execute(&mut self, call: &ToolCall) -> Result<String> {
        if self.catalog.get(&call.name).is_none() {
            return Err(Error::UnknownTool(call.name.clone()));
        }

        let arguments = if call.arguments.is_empty() {
            None
        } else {
            Some(Value::Object(call.arguments.clone()))
        };

        debug!(tool = %call.name, "dispatching tool call");
        match self.conn.call_tool(&call.name, arguments).await {
            Ok(result) => Ok(result.text()),
            // Peer-reported failure: the model gets to see the payload.
            Err(mcp::Error::ToolCallFailed(payload)) => Err(Error::ToolExecution(payload)),
            Err(mcp::Error::Rpc(err)) => Err(Error::ToolExecution(err.to_string())),
            // Anything else means the channel is no longer usable. A timeout
            // counts too: an abandoned request leaves the stream desynced.
            Err(other) => Err(Error::TransportBroken(other.to_string())),
        }
    }

    async fn close(&mut self) {
        self.conn.close().await;
    }
}
