use std::sync::Arc;

use rmcp::schemars::{self, JsonSchema};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use sentra_core::tenant::{TenantCredential, TenantSummary};
use sentra_core::ToolError;
use sentra_db::repositories::{RepositoryError, TenantRepository};
use sentra_platform::ResolvedCredential;

use crate::catalog::{ResourceDescriptor, ToolContext, ToolDescriptor};
use crate::services::ServiceModule;

/// Tenant directory management: the records every other service resolves
/// credentials through.
#[derive(Debug)]
pub struct TenantService;

impl ServiceModule for TenantService {
    fn name(&self) -> &'static str {
        "tenants"
    }

    fn descriptors(&self) -> anyhow::Result<Vec<ToolDescriptor>> {
        Ok(vec![
            ToolDescriptor::read::<ListTenantsInput, _, _>(
                "list_tenants",
                "List every tenant in the directory. Secrets are redacted.",
                list_tenants,
            ),
            ToolDescriptor::write::<UpsertTenantInput, _, _>(
                "upsert_tenant",
                "Create or replace a tenant record. The whole record is replaced; \
                 include every field you want kept.",
                upsert_tenant,
            ),
            ToolDescriptor::destructive::<DeleteTenantInput, _, _>(
                "delete_tenant",
                "Remove a tenant record from the directory.",
                delete_tenant,
            ),
        ])
    }

    fn resources(&self) -> Vec<ResourceDescriptor> {
        vec![ResourceDescriptor::new(
            "sentra://tenants",
            "Tenant directory",
            "All configured tenants with secrets redacted",
            |context| async move {
                let records = context.directory.list().await.map_err(storage_error)?;
                let summaries: Vec<TenantSummary> = records.iter().map(Into::into).collect();
                let rendered = serde_json::to_value(summaries)
                    .map_err(|error| ToolError::Internal(error.to_string()))?;
                Ok(json!({ "tenants": rendered }))
            },
        )]
    }
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct ListTenantsInput {}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpsertTenantInput {
    /// Tenant name, the directory key.
    pub name: String,
    /// OAuth client id for the tenant's API credentials.
    #[serde(default)]
    pub client_id: Option<String>,
    /// OAuth client secret. Stored, never echoed back.
    #[serde(default)]
    pub client_secret: Option<String>,
    /// Identity vanity domain, e.g. `acme` for acme.zslogin.net.
    #[serde(default)]
    pub vanity_domain: Option<String>,
    /// ZPA customer id; required only for ZPA operations.
    #[serde(default)]
    pub customer_id: Option<String>,
    /// Mark the record as a test tenant.
    #[serde(default)]
    pub test_tenant: bool,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DeleteTenantInput {
    /// Name of the tenant record to remove.
    pub name: String,
}

async fn list_tenants(context: Arc<ToolContext>, _input: ListTenantsInput) -> Result<Value, ToolError> {
    let records = context.directory.list().await.map_err(storage_error)?;
    let summaries: Vec<TenantSummary> = records.iter().map(Into::into).collect();
    serde_json::to_value(summaries).map_err(|error| ToolError::Internal(error.to_string()))
}

async fn upsert_tenant(
    context: Arc<ToolContext>,
    input: UpsertTenantInput,
) -> Result<Value, ToolError> {
    if input.name.is_empty() {
        return Err(ToolError::malformed("name", "tenant name must not be empty"));
    }

    invalidate_cached_client(&context, &input.name).await?;

    let record = TenantCredential {
        name: input.name,
        client_id: input.client_id,
        client_secret: input.client_secret.map(Into::into),
        vanity_domain: input.vanity_domain,
        customer_id: input.customer_id,
        test_tenant: input.test_tenant,
    };
    let stored = context.directory.upsert(record).await.map_err(storage_error)?;
    info!(tenant = %stored.name, "tenant record upserted");
    serde_json::to_value(TenantSummary::from(&stored))
        .map_err(|error| ToolError::Internal(error.to_string()))
}

async fn delete_tenant(
    context: Arc<ToolContext>,
    input: DeleteTenantInput,
) -> Result<Value, ToolError> {
    invalidate_cached_client(&context, &input.name).await?;

    let deleted = context.directory.delete(&input.name).await.map_err(storage_error)?;
    if !deleted {
        return Err(ToolError::TenantNotFound { name: input.name });
    }
    info!(tenant = %input.name, "tenant record deleted");
    Ok(json!({ "deleted": true, "name": input.name }))
}

/// Drop any cached client built from the tenant's current credentials so a
/// changed or removed record takes effect immediately.
async fn invalidate_cached_client(context: &ToolContext, name: &str) -> Result<(), ToolError> {
    let existing = context.directory.find_by_name(name).await.map_err(storage_error)?;
    if let Some(record) = existing {
        if let Ok(credential) = ResolvedCredential::from_tenant(&record) {
            context.factory.invalidate(&credential.fingerprint()).await;
        }
    }
    Ok(())
}

fn storage_error(error: RepositoryError) -> ToolError {
    ToolError::Internal(format!("tenant directory unavailable: {error}"))
}
