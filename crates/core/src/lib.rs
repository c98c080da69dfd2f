pub mod confirmation;
pub mod config;
pub mod errors;
pub mod tenant;

pub use confirmation::{ConfirmationGate, PendingAction, PendingStatus};
pub use errors::{ToolError, ToolResult};
pub use tenant::TenantCredential;
