use thiserror::Error;

/// Failure taxonomy for tool invocations.
///
/// Tool-level failures never crash the dispatch server or the agent loop;
/// they are rendered into tool-result payloads so the model can explain the
/// problem to the user. Messages therefore carry enough context to
/// self-diagnose (tenant name, operation, underlying cause) and must never
/// contain secret material.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ToolError {
    #[error("tenant `{name}` is not configured; supply a valid tenant name or add it with `sentra tenant upsert`")]
    TenantNotFound { name: String },

    #[error("tenant `{tenant}` is missing required credential field `{field}`")]
    MissingCredential { tenant: String, field: &'static str },

    #[error("authentication failed for {context}: {message}")]
    Auth { context: String, message: String },

    #[error("{operation} failed: {message}")]
    Remote { operation: String, message: String },

    #[error("malformed value for `{field}`: {message}")]
    MalformedInput { field: String, message: String },

    #[error("unknown tool `{0}`")]
    Unregistered(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type ToolResult<T> = Result<T, ToolError>;

impl ToolError {
    pub fn remote(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Remote { operation: operation.into(), message: message.into() }
    }

    pub fn malformed(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedInput { field: field.into(), message: message.into() }
    }

    /// Whether the failure is a caller mistake rather than a backend fault.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::TenantNotFound { .. }
                | Self::MissingCredential { .. }
                | Self::MalformedInput { .. }
                | Self::Unregistered(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::ToolError;

    #[test]
    fn tenant_not_found_message_asks_for_valid_name() {
        let error = ToolError::TenantNotFound { name: "ghost".into() };
        assert!(error.to_string().contains("`ghost`"));
        assert!(error.to_string().contains("valid tenant name"));
        assert!(error.is_user_error());
    }

    #[test]
    fn remote_error_carries_operation_name() {
        let error = ToolError::remote("zpa_list_segment_groups", "HTTP 503");
        assert_eq!(error.to_string(), "zpa_list_segment_groups failed: HTTP 503");
        assert!(!error.is_user_error());
    }
}
