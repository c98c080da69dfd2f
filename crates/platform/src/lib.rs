//! Thin client layer for the Zscaler OneAPI surface.
//!
//! The rest of the system treats this crate as a capability: given resolved
//! tenant credentials it yields a [`Client`] whose sub-API handles
//! (`zia`/`zpa`/`zdx`/`zcc`) return JSON records or a typed error. Rate
//! limiting, retries, and the full API surface are the vendor's concern, not
//! this layer's.

mod client;
mod factory;

pub use client::{Client, PageQuery, Zcc, Zdx, Zia, Zpa};
pub use factory::{ClientFactory, ResolvedCredential};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("authentication with the Zscaler identity service failed: {0}")]
    Auth(String),

    #[error("{operation} returned HTTP {status}: {message}")]
    Api { operation: &'static str, status: u16, message: String },

    #[error("transport failure during {operation}: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("client configuration error: {0}")]
    Configuration(String),
}

impl PlatformError {
    /// Map a platform failure onto the tool-facing taxonomy, attributing it
    /// to the named operation. Secrets never appear in these messages.
    pub fn into_tool_error(self, operation: &str) -> sentra_core::ToolError {
        match self {
            PlatformError::Auth(message) => sentra_core::ToolError::Auth {
                context: operation.to_string(),
                message,
            },
            other => sentra_core::ToolError::remote(operation, other.to_string()),
        }
    }
}
