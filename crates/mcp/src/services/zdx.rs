use std::sync::Arc;

use rmcp::schemars::{self, JsonSchema};
use serde::Deserialize;
use serde_json::Value;

use sentra_core::ToolError;

use crate::catalog::{ToolContext, ToolDescriptor};
use crate::resolve::authenticated_client;
use crate::services::{ServiceModule, TenantScope};

/// Digital Experience: monitored application scores and admin inventory.
#[derive(Debug)]
pub struct ZdxService;

impl ServiceModule for ZdxService {
    fn name(&self) -> &'static str {
        "zdx"
    }

    fn descriptors(&self) -> anyhow::Result<Vec<ToolDescriptor>> {
        Ok(vec![
            ToolDescriptor::read::<ListApplicationsInput, _, _>(
                "zdx_list_applications",
                "List monitored applications with their current ZDX scores.",
                list_applications,
            ),
            ToolDescriptor::read::<GetApplicationInput, _, _>(
                "zdx_get_application",
                "Get score details for one monitored application.",
                get_application,
            ),
            ToolDescriptor::read::<AdminSearchInput, _, _>(
                "zdx_list_departments",
                "List departments configured in ZDX.",
                list_departments,
            ),
            ToolDescriptor::read::<AdminSearchInput, _, _>(
                "zdx_list_locations",
                "List locations configured in ZDX.",
                list_locations,
            ),
        ])
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListApplicationsInput {
    /// Look-back window in hours (defaults to the service's 2-hour window).
    #[serde(default)]
    pub since_hours: Option<u32>,
    #[serde(flatten)]
    pub scope: TenantScope,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetApplicationInput {
    /// Application id as returned by zdx_list_applications.
    pub app_id: String,
    #[serde(flatten)]
    pub scope: TenantScope,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct AdminSearchInput {
    /// Substring to search names by.
    #[serde(default)]
    pub search: Option<String>,
    #[serde(flatten)]
    pub scope: TenantScope,
}

async fn list_applications(
    context: Arc<ToolContext>,
    input: ListApplicationsInput,
) -> Result<Value, ToolError> {
    let client = authenticated_client(&context, &input.scope).await?;
    client
        .zdx()
        .list_applications(input.since_hours)
        .await
        .map_err(|error| error.into_tool_error("zdx_list_applications"))
}

async fn get_application(
    context: Arc<ToolContext>,
    input: GetApplicationInput,
) -> Result<Value, ToolError> {
    let client = authenticated_client(&context, &input.scope).await?;
    client
        .zdx()
        .get_application(&input.app_id)
        .await
        .map_err(|error| error.into_tool_error("zdx_get_application"))
}

async fn list_departments(
    context: Arc<ToolContext>,
    input: AdminSearchInput,
) -> Result<Value, ToolError> {
    let client = authenticated_client(&context, &input.scope).await?;
    client
        .zdx()
        .list_departments(input.search)
        .await
        .map_err(|error| error.into_tool_error("zdx_list_departments"))
}

async fn list_locations(
    context: Arc<ToolContext>,
    input: AdminSearchInput,
) -> Result<Value, ToolError> {
    let client = authenticated_client(&context, &input.scope).await?;
    client
        .zdx()
        .list_locations(input.search)
        .await
        .map_err(|error| error.into_tool_error("zdx_list_locations"))
}
