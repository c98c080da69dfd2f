//! Sentra MCP server crate.
//!
//! The catalog assembles tool descriptors from pluggable service modules,
//! filters them through the registration policy, and dispatches calls with
//! tenant-scoped credential resolution and a two-phase confirmation gate in
//! front of destructive operations.

pub mod catalog;
pub mod resolve;
pub mod server;
pub mod services;

pub use catalog::{
    Catalog, CatalogBuilder, RegistrationPolicy, ResourceDescriptor, ToolContext,
    ToolDescriptor, ToolKind, CONFIRM_ACTION,
};
pub use resolve::authenticated_client;
pub use server::DispatchServer;
pub use services::{ServiceModule, TenantScope};
