use secrecy::{ExposeSecret, SecretString};

use crate::errors::ToolError;

/// Credential record for one named Zscaler tenant.
///
/// The name is the sole identity. Every other field may be absent until an
/// operator configures it; an operation that needs a missing field fails with
/// [`ToolError::MissingCredential`] naming the tenant and the field rather
/// than falling back to ambient credentials.
#[derive(Clone, Debug)]
pub struct TenantCredential {
    pub name: String,
    pub client_id: Option<String>,
    pub client_secret: Option<SecretString>,
    pub vanity_domain: Option<String>,
    pub customer_id: Option<String>,
    pub test_tenant: bool,
}

impl TenantCredential {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            client_id: None,
            client_secret: None,
            vanity_domain: None,
            customer_id: None,
            test_tenant: false,
        }
    }

    pub fn require_client_id(&self) -> Result<&str, ToolError> {
        self.require_str("client_id", self.client_id.as_deref())
    }

    pub fn require_vanity_domain(&self) -> Result<&str, ToolError> {
        self.require_str("vanity_domain", self.vanity_domain.as_deref())
    }

    pub fn require_client_secret(&self) -> Result<&SecretString, ToolError> {
        self.client_secret.as_ref().ok_or_else(|| ToolError::MissingCredential {
            tenant: self.name.clone(),
            field: "client_secret",
        })
    }

    fn require_str<'a>(
        &self,
        field: &'static str,
        value: Option<&'a str>,
    ) -> Result<&'a str, ToolError> {
        match value {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(ToolError::MissingCredential { tenant: self.name.clone(), field }),
        }
    }
}

/// Redacted view of a tenant record, safe to serialize for listings.
#[derive(Clone, Debug, serde::Serialize)]
pub struct TenantSummary {
    pub name: String,
    pub client_id: Option<String>,
    pub client_secret: Option<&'static str>,
    pub vanity_domain: Option<String>,
    pub customer_id: Option<String>,
    pub test_tenant: bool,
}

impl From<&TenantCredential> for TenantSummary {
    fn from(record: &TenantCredential) -> Self {
        Self {
            name: record.name.clone(),
            client_id: record.client_id.clone(),
            client_secret: record.client_secret.as_ref().map(|_| "[redacted]"),
            vanity_domain: record.vanity_domain.clone(),
            customer_id: record.customer_id.clone(),
            test_tenant: record.test_tenant,
        }
    }
}

impl TenantCredential {
    /// True when the record carries everything needed to mint an API client.
    pub fn is_complete(&self) -> bool {
        self.require_client_id().is_ok()
            && self.require_client_secret().is_ok()
            && self.require_vanity_domain().is_ok()
    }

    /// Secret material exposed for client construction only.
    pub fn exposed_secret(&self) -> Result<&str, ToolError> {
        Ok(self.require_client_secret()?.expose_secret())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_field_names_tenant_and_field() {
        let record = TenantCredential::named("acme");
        let error = record.require_client_id().unwrap_err();
        assert_eq!(
            error.to_string(),
            "tenant `acme` is missing required credential field `client_id`"
        );
    }

    #[test]
    fn empty_string_counts_as_missing() {
        let mut record = TenantCredential::named("acme");
        record.vanity_domain = Some(String::new());
        assert!(record.require_vanity_domain().is_err());
    }

    #[test]
    fn summary_redacts_secret() {
        let mut record = TenantCredential::named("acme");
        record.client_secret = Some("super-secret".to_string().into());
        let summary = TenantSummary::from(&record);
        assert_eq!(summary.client_secret, Some("[redacted]"));
        let rendered = serde_json::to_string(&summary).unwrap();
        assert!(!rendered.contains("super-secret"));
    }

    #[test]
    fn completeness_requires_three_fields() {
        let mut record = TenantCredential::named("acme");
        record.client_id = Some("id".into());
        record.client_secret = Some("secret".to_string().into());
        assert!(!record.is_complete());
        record.vanity_domain = Some("acme".into());
        assert!(record.is_complete());
    }
}
