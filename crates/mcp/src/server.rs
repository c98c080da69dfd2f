//! MCP dispatch server.
//!
//! Speaks the Model Context Protocol over stdio and routes every tool call
//! through the [`Catalog`], which owns filtering, tenant resolution, and the
//! destructive-operation confirmation gate.

use std::borrow::Cow;
use std::sync::Arc;

use rmcp::{
    handler::server::ServerHandler,
    model::*,
    service::{RequestContext, RoleServer},
    ErrorData as McpError, ServiceExt,
};
use serde_json::Value;
use tracing::{info, warn};

use sentra_core::ToolError;

use crate::catalog::Catalog;

pub struct DispatchServer {
    catalog: Arc<Catalog>,
}

impl DispatchServer {
    pub fn new(catalog: Catalog) -> Self {
        Self { catalog: Arc::new(catalog) }
    }

    /// Run over stdio until the client disconnects. Logs must go to stderr;
    /// stdout carries the protocol stream.
    pub async fn run_stdio(self) -> anyhow::Result<()> {
        use tokio::io::{stdin, stdout};

        info!(tools = self.catalog.len(), "starting MCP server with stdio transport");

        let service = self.serve((stdin(), stdout())).await?;
        let _quit = service.waiting().await?;

        info!("MCP server shutdown complete");
        Ok(())
    }

    fn wire_tool(name: &'static str, description: &'static str, schema: &Value) -> Tool {
        let input_schema = match schema.as_object() {
            Some(map) => map.clone(),
            None => serde_json::Map::new(),
        };
        Tool::new(Cow::Borrowed(name), Cow::Borrowed(description), Arc::new(input_schema))
    }
}

impl ServerHandler for DispatchServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability::default()),
                resources: Some(ResourcesCapability::default()),
                ..Default::default()
            },
            server_info: Implementation {
                name: "sentra-mcp".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Default::default()
            },
            instructions: Some(
                "Sentra MCP Server - operate Zscaler tenants through tools. \
                 Tool calls accept a tenant_name; leave it empty to use the \
                 environment-default credentials. Destructive operations return \
                 a pending action that must be resubmitted via confirm_action."
                    .to_string(),
            ),
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        let tools = self
            .catalog
            .tools()
            .map(|tool| {
                Self::wire_tool(tool.descriptor.name, tool.descriptor.description, &tool.descriptor.schema)
            })
            .collect();
        Ok(ListToolsResult { tools, next_cursor: None })
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let arguments = Value::Object(request.arguments.unwrap_or_default());
        info!(tool = %request.name, "dispatching tool call");

        match self.catalog.call(&request.name, arguments).await {
            Ok(value) => {
                let rendered = serde_json::to_string_pretty(&value)
                    .map_err(|error| McpError::internal_error(error.to_string(), None))?;
                Ok(CallToolResult::success(vec![Content::text(rendered)]))
            }
            Err(error @ ToolError::Unregistered(_)) => {
                warn!(tool = %request.name, "call to unregistered tool");
                Err(McpError::invalid_params(error.to_string(), None))
            }
            // Tool failures flow back as result payloads so the model can
            // relay them; only protocol misuse becomes a protocol error.
            Err(error) => {
                warn!(tool = %request.name, %error, "tool call failed");
                Ok(CallToolResult::error(vec![Content::text(error.to_string())]))
            }
        }
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, McpError> {
        let resources = self
            .catalog
            .resources()
            .map(|resource| {
                let mut raw = RawResource::new(resource.uri, resource.name);
                raw.description = Some(resource.description.to_string());
                raw.no_annotation()
            })
            .collect();
        Ok(ListResourcesResult { resources, next_cursor: None })
    }

    async fn read_resource(
        &self,
        request: ReadResourceRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        let value = self
            .catalog
            .read_resource(&request.uri)
            .await
            .map_err(|error| McpError::resource_not_found(error.to_string(), None))?;
        let rendered = serde_json::to_string_pretty(&value)
            .map_err(|error| McpError::internal_error(error.to_string(), None))?;
        Ok(ReadResourceResult {
            contents: vec![ResourceContents::text(rendered, request.uri)],
        })
    }
}
