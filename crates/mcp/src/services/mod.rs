use std::collections::BTreeSet;

use rmcp::schemars::{self, JsonSchema};
use serde::Deserialize;

use sentra_core::ToolError;

use crate::catalog::{ResourceDescriptor, ToolDescriptor};

pub mod tenants;
pub mod zcc;
pub mod zdx;
pub mod zia;
pub mod zpa;

pub use tenants::TenantService;
pub use zcc::ZccService;
pub use zdx::ZdxService;
pub use zia::ZiaService;
pub use zpa::ZpaService;

/// One pluggable service: a name the `--services` flag selects by, the tool
/// descriptors it contributes, and any readable resources.
pub trait ServiceModule: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &'static str;

    fn descriptors(&self) -> anyhow::Result<Vec<ToolDescriptor>>;

    fn resources(&self) -> Vec<ResourceDescriptor> {
        Vec::new()
    }
}

/// Every service module this build ships, in registration order.
pub fn all() -> Vec<Box<dyn ServiceModule>> {
    vec![
        Box::new(TenantService),
        Box::new(ZccService),
        Box::new(ZdxService),
        Box::new(ZiaService),
        Box::new(ZpaService),
    ]
}

/// Resolve a `--services` selection, rejecting unknown names with a message
/// listing what is available.
pub fn select(requested: &[String]) -> anyhow::Result<Vec<Box<dyn ServiceModule>>> {
    let modules = all();
    if requested.is_empty() {
        return Ok(modules);
    }

    let known: BTreeSet<&str> = modules.iter().map(|module| module.name()).collect();
    let invalid: Vec<&String> =
        requested.iter().filter(|name| !known.contains(name.as_str())).collect();
    if !invalid.is_empty() {
        anyhow::bail!(
            "invalid services: {}. Available services: {}",
            invalid.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", "),
            known.into_iter().collect::<Vec<_>>().join(", "),
        );
    }

    Ok(modules
        .into_iter()
        .filter(|module| requested.iter().any(|name| name == module.name()))
        .collect())
}

/// Tenant-routing fields shared by every remote tool's input, flattened into
/// the argument object so the model passes them alongside the tool's own
/// parameters.
#[derive(Clone, Debug, Default, Deserialize, JsonSchema)]
pub struct TenantScope {
    /// Tenant name from the directory. Leave empty to use the
    /// environment-default credentials.
    #[serde(default)]
    pub tenant_name: String,
    /// Request the legacy per-product API instead of OneAPI. Accepted for
    /// compatibility; this build always speaks OneAPI.
    #[serde(default)]
    pub use_legacy: bool,
    /// Service hint (zia, zpa, zdx, zcc). Informational only; the tool name
    /// already determines the service.
    #[serde(default)]
    pub service: Option<String>,
}

/// URL-list argument that tolerates the model sending either a JSON array
/// or a JSON-encoded string of one. Anything else fails before a client is
/// ever built.
#[derive(Clone, Debug, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum StringList {
    Items(Vec<String>),
    Encoded(String),
}

impl StringList {
    pub fn into_vec(self, field: &'static str) -> Result<Vec<String>, ToolError> {
        match self {
            Self::Items(items) => Ok(items),
            Self::Encoded(raw) => serde_json::from_str(&raw).map_err(|_| {
                ToolError::malformed(
                    field,
                    format!("expected a JSON list of strings, got `{raw}`"),
                )
            }),
        }
    }
}
