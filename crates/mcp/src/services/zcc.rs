use std::sync::Arc;

use rmcp::schemars::{self, JsonSchema};
use serde::Deserialize;
use serde_json::Value;

use sentra_core::ToolError;

use crate::catalog::{ToolContext, ToolDescriptor};
use crate::resolve::authenticated_client;
use crate::services::{ServiceModule, TenantScope};

/// Client Connector: enrolled-device inventory.
#[derive(Debug)]
pub struct ZccService;

impl ServiceModule for ZccService {
    fn name(&self) -> &'static str {
        "zcc"
    }

    fn descriptors(&self) -> anyhow::Result<Vec<ToolDescriptor>> {
        Ok(vec![ToolDescriptor::read::<ListDevicesInput, _, _>(
            "zcc_list_devices",
            "List devices enrolled in Client Connector, optionally filtered by \
             username or OS type.",
            list_devices,
        )])
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListDevicesInput {
    /// Filter to one enrolled user, e.g. `jdoe@acme.com`.
    #[serde(default)]
    pub username: Option<String>,
    /// Numeric OS type filter (1 iOS, 2 Android, 3 Windows, 4 macOS, 5 Linux).
    #[serde(default)]
    pub os_type: Option<String>,
    /// Page number, starting at 1.
    #[serde(default)]
    pub page: Option<u32>,
    /// Results per page.
    #[serde(default)]
    pub page_size: Option<u32>,
    #[serde(flatten)]
    pub scope: TenantScope,
}

async fn list_devices(context: Arc<ToolContext>, input: ListDevicesInput) -> Result<Value, ToolError> {
    let client = authenticated_client(&context, &input.scope).await?;
    client
        .zcc()
        .list_devices(input.username, input.os_type, input.page, input.page_size)
        .await
        .map_err(|error| error.into_tool_error("zcc_list_devices"))
}
