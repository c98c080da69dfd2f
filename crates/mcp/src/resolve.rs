use std::sync::Arc;

use tracing::debug;

use sentra_core::ToolError;
use sentra_db::repositories::TenantRepository;
use sentra_platform::{Client, ResolvedCredential};

use crate::catalog::ToolContext;
use crate::services::TenantScope;

/// Resolve the tool-call scope to an authenticated platform client.
///
/// An empty tenant name means the caller wants the environment-default
/// credentials. A non-empty name is looked up in the tenant directory and
/// never falls back to the environment: an unknown name is an error the
/// model can relay, asking the user for a valid tenant.
pub async fn authenticated_client(
    context: &ToolContext,
    scope: &TenantScope,
) -> Result<Arc<Client>, ToolError> {
    if scope.use_legacy {
        debug!("use_legacy requested; this build always speaks OneAPI");
    }

    if scope.tenant_name.is_empty() {
        return context.factory.default_client().await;
    }

    let record = context
        .directory
        .find_by_name(&scope.tenant_name)
        .await
        .map_err(|error| ToolError::Internal(format!("tenant directory lookup failed: {error}")))?
        .ok_or_else(|| ToolError::TenantNotFound { name: scope.tenant_name.clone() })?;

    let credential = ResolvedCredential::from_tenant(&record)?;
    debug!(credential_source = "tenant", tenant = %scope.tenant_name, "resolved tenant credential");
    Ok(context.factory.client_for(&credential).await)
}
