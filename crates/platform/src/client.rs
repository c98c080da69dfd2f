use std::time::{Duration, Instant};

use reqwest::Method;
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::debug;

use crate::{PlatformError, ResolvedCredential};

const API_BASE: &str = "https://api.zsapi.net";
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Authenticated OneAPI client for a single credential set.
///
/// The OAuth bearer token is fetched lazily and refreshed before expiry;
/// everything else is immutable after construction, so a `Client` can be
/// shared freely behind an `Arc`.
#[derive(Debug)]
pub struct Client {
    http: reqwest::Client,
    credential: ResolvedCredential,
    token_url: String,
    api_base: String,
    token: RwLock<Option<CachedToken>>,
}

#[derive(Clone, Debug)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expiry")]
    expires_in: u64,
}

fn default_expiry() -> u64 {
    3600
}

impl Client {
    pub fn new(credential: ResolvedCredential) -> Self {
        let token_url =
            format!("https://{}.zslogin.net/oauth2/v1/token", credential.vanity_domain);
        Self {
            http: reqwest::Client::new(),
            credential,
            token_url,
            api_base: API_BASE.to_string(),
            token: RwLock::new(None),
        }
    }

    /// Override the identity and API endpoints (test harnesses, gov clouds).
    pub fn with_endpoints(mut self, token_url: String, api_base: String) -> Self {
        self.token_url = token_url;
        self.api_base = api_base;
        self
    }

    pub fn zia(&self) -> Zia<'_> {
        Zia { client: self }
    }

    pub fn zpa(&self) -> Zpa<'_> {
        Zpa { client: self }
    }

    pub fn zdx(&self) -> Zdx<'_> {
        Zdx { client: self }
    }

    pub fn zcc(&self) -> Zcc<'_> {
        Zcc { client: self }
    }

    async fn bearer_token(&self) -> Result<String, PlatformError> {
        {
            let cached = self.token.read().await;
            if let Some(token) = cached.as_ref() {
                if token.expires_at > Instant::now() {
                    return Ok(token.value.clone());
                }
            }
        }

        let mut slot = self.token.write().await;
        if let Some(token) = slot.as_ref() {
            if token.expires_at > Instant::now() {
                return Ok(token.value.clone());
            }
        }

        debug!(vanity_domain = %self.credential.vanity_domain, "requesting OAuth token");
        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.credential.client_id.as_str()),
                ("client_secret", self.credential.client_secret.expose_secret()),
                ("audience", "https://api.zscaler.com"),
            ])
            .send()
            .await
            .map_err(|source| PlatformError::Transport { operation: "oauth_token", source })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PlatformError::Auth(format!(
                "token endpoint returned HTTP {}: {}",
                status.as_u16(),
                truncate(&body)
            )));
        }

        let parsed: TokenResponse = response
            .json()
            .await
            .map_err(|error| PlatformError::Auth(format!("invalid token response: {error}")))?;

        let token = CachedToken {
            value: parsed.access_token,
            expires_at: Instant::now()
                + Duration::from_secs(parsed.expires_in).saturating_sub(TOKEN_REFRESH_MARGIN),
        };
        let value = token.value.clone();
        *slot = Some(token);
        Ok(value)
    }

    async fn request(
        &self,
        operation: &'static str,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Value, PlatformError> {
        let token = self.bearer_token().await?;
        let url = format!("{}{}", self.api_base, path);

        let mut request = self.http.request(method, &url).bearer_auth(token);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|source| PlatformError::Transport { operation, source })?;
        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            let body = response.text().await.unwrap_or_default();
            return Err(PlatformError::Auth(format!(
                "{operation} rejected the bearer token: {}",
                truncate(&body)
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PlatformError::Api {
                operation,
                status: status.as_u16(),
                message: truncate(&body),
            });
        }

        if status == reqwest::StatusCode::NO_CONTENT {
            return Ok(Value::Null);
        }
        let text = response
            .text()
            .await
            .map_err(|source| PlatformError::Transport { operation, source })?;
        if text.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|error| PlatformError::Api {
            operation,
            status: status.as_u16(),
            message: format!("response was not valid JSON: {error}"),
        })
    }

    async fn get(
        &self,
        operation: &'static str,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Value, PlatformError> {
        self.request(operation, Method::GET, path, query, None).await
    }
}

fn truncate(body: &str) -> String {
    const LIMIT: usize = 512;
    if body.len() <= LIMIT {
        return body.to_string();
    }
    let mut cut = LIMIT;
    while !body.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…", &body[..cut])
}

/// Optional list/search parameters shared by paginated endpoints.
#[derive(Clone, Debug, Default)]
pub struct PageQuery {
    pub search: Option<String>,
    pub page: Option<String>,
    pub page_size: Option<String>,
    pub microtenant_id: Option<String>,
}

impl PageQuery {
    fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(search) = &self.search {
            pairs.push(("search", search.clone()));
        }
        if let Some(page) = &self.page {
            pairs.push(("page", page.clone()));
        }
        if let Some(size) = &self.page_size {
            pairs.push(("pagesize", size.clone()));
        }
        if let Some(microtenant) = &self.microtenant_id {
            pairs.push(("microtenantId", microtenant.clone()));
        }
        pairs
    }
}

// ---------------------------------------------------------------------------
// ZIA: Internet Access
// ---------------------------------------------------------------------------

pub struct Zia<'a> {
    client: &'a Client,
}

impl Zia<'_> {
    pub async fn advanced_threat_settings(&self) -> Result<Value, PlatformError> {
        self.client.get("zia_advanced_threat_settings", "/zia/api/v1/cyberThreatProtection/advancedThreatSettings", &[]).await
    }

    pub async fn list_malicious_urls(&self) -> Result<Value, PlatformError> {
        self.client
            .get("zia_list_malicious_urls", "/zia/api/v1/security/advanced", &[])
            .await
    }

    pub async fn add_malicious_urls(&self, urls: &[String]) -> Result<Value, PlatformError> {
        self.client
            .request(
                "zia_add_malicious_urls",
                Method::POST,
                "/zia/api/v1/security/advanced/blacklistUrls",
                &[("action", "ADD_TO_LIST".to_string())],
                Some(&json!({ "blacklistUrls": urls })),
            )
            .await
    }

    pub async fn remove_malicious_urls(&self, urls: &[String]) -> Result<Value, PlatformError> {
        self.client
            .request(
                "zia_remove_malicious_urls",
                Method::POST,
                "/zia/api/v1/security/advanced/blacklistUrls",
                &[("action", "REMOVE_FROM_LIST".to_string())],
                Some(&json!({ "blacklistUrls": urls })),
            )
            .await
    }

    pub async fn list_auth_exempt_urls(&self) -> Result<Value, PlatformError> {
        self.client
            .get("zia_list_auth_exempt_urls", "/zia/api/v1/authSettings/exemptedUrls", &[])
            .await
    }

    pub async fn add_auth_exempt_urls(&self, urls: &[String]) -> Result<Value, PlatformError> {
        self.client
            .request(
                "zia_add_auth_exempt_urls",
                Method::POST,
                "/zia/api/v1/authSettings/exemptedUrls",
                &[("action", "ADD_TO_LIST".to_string())],
                Some(&json!(urls)),
            )
            .await
    }

    pub async fn delete_auth_exempt_urls(&self, urls: &[String]) -> Result<Value, PlatformError> {
        self.client
            .request(
                "zia_delete_auth_exempt_urls",
                Method::POST,
                "/zia/api/v1/authSettings/exemptedUrls",
                &[("action", "REMOVE_FROM_LIST".to_string())],
                Some(&json!(urls)),
            )
            .await
    }

    pub async fn sandbox_quota(&self) -> Result<Value, PlatformError> {
        self.client.get("zia_sandbox_quota", "/zia/api/v1/sandbox/report/quota", &[]).await
    }

    pub async fn sandbox_behavioral_analysis(&self) -> Result<Value, PlatformError> {
        self.client
            .get(
                "zia_sandbox_behavioral_analysis",
                "/zia/api/v1/behavioralAnalysisAdvancedSettings",
                &[],
            )
            .await
    }

    pub async fn sandbox_file_hash_count(&self) -> Result<Value, PlatformError> {
        self.client
            .get(
                "zia_sandbox_file_hash_count",
                "/zia/api/v1/behavioralAnalysisAdvancedSettings/fileHashCount",
                &[],
            )
            .await
    }

    pub async fn sandbox_report(
        &self,
        md5_hash: &str,
        full_details: bool,
    ) -> Result<Value, PlatformError> {
        let details = if full_details { "full" } else { "summary" };
        let path = format!("/zia/api/v1/sandbox/report/{md5_hash}");
        self.client
            .get("zia_sandbox_report", &path, &[("details", details.to_string())])
            .await
    }

    pub async fn list_gre_internal_ip_ranges(
        &self,
        internal_ip_range: Option<String>,
        static_ip: Option<String>,
        limit: Option<String>,
    ) -> Result<Value, PlatformError> {
        let mut query = Vec::new();
        if let Some(range) = internal_ip_range {
            query.push(("internalIpRange", range));
        }
        if let Some(ip) = static_ip {
            query.push(("staticIp", ip));
        }
        if let Some(limit) = limit {
            query.push(("limit", limit));
        }
        self.client
            .get(
                "zia_list_gre_internal_ip_ranges",
                "/zia/api/v1/greTunnels/availableInternalIpRanges",
                &query,
            )
            .await
    }

    pub async fn list_ip_destination_groups(
        &self,
        exclude_type: Option<String>,
    ) -> Result<Value, PlatformError> {
        let mut query = Vec::new();
        if let Some(exclude) = exclude_type {
            query.push(("excludeType", exclude));
        }
        self.client
            .get("zia_list_ip_destination_groups", "/zia/api/v1/ipDestinationGroups", &query)
            .await
    }

    pub async fn get_ip_destination_group(&self, group_id: &str) -> Result<Value, PlatformError> {
        let path = format!("/zia/api/v1/ipDestinationGroups/{group_id}");
        self.client.get("zia_get_ip_destination_group", &path, &[]).await
    }

    pub async fn create_ip_destination_group(&self, body: &Value) -> Result<Value, PlatformError> {
        self.client
            .request(
                "zia_create_ip_destination_group",
                Method::POST,
                "/zia/api/v1/ipDestinationGroups",
                &[],
                Some(body),
            )
            .await
    }

    pub async fn update_ip_destination_group(
        &self,
        group_id: &str,
        body: &Value,
    ) -> Result<Value, PlatformError> {
        let path = format!("/zia/api/v1/ipDestinationGroups/{group_id}");
        self.client
            .request("zia_update_ip_destination_group", Method::PUT, &path, &[], Some(body))
            .await
    }

    pub async fn delete_ip_destination_group(&self, group_id: &str) -> Result<Value, PlatformError> {
        let path = format!("/zia/api/v1/ipDestinationGroups/{group_id}");
        self.client
            .request("zia_delete_ip_destination_group", Method::DELETE, &path, &[], None)
            .await
    }
}

// ---------------------------------------------------------------------------
// ZPA: Private Access (customer-scoped management config)
// ---------------------------------------------------------------------------

pub struct Zpa<'a> {
    client: &'a Client,
}

impl Zpa<'_> {
    fn customer_path(&self, suffix: &str) -> Result<String, PlatformError> {
        let customer_id = self.client.credential.customer_id.as_deref().ok_or_else(|| {
            PlatformError::Configuration(
                "customer_id is required for ZPA operations but is not set on this credential"
                    .to_string(),
            )
        })?;
        Ok(format!("/zpa/mgmtconfig/v1/admin/customers/{customer_id}{suffix}"))
    }

    pub async fn list_segment_groups(&self, query: &PageQuery) -> Result<Value, PlatformError> {
        let path = self.customer_path("/segmentGroup")?;
        self.client.get("zpa_list_segment_groups", &path, &query.to_pairs()).await
    }

    pub async fn get_segment_group(
        &self,
        group_id: &str,
        microtenant_id: Option<String>,
    ) -> Result<Value, PlatformError> {
        let path = self.customer_path(&format!("/segmentGroup/{group_id}"))?;
        self.client
            .get("zpa_get_segment_group", &path, &microtenant_pairs(microtenant_id))
            .await
    }

    pub async fn create_segment_group(&self, body: &Value) -> Result<Value, PlatformError> {
        let path = self.customer_path("/segmentGroup")?;
        self.client
            .request("zpa_create_segment_group", Method::POST, &path, &[], Some(body))
            .await
    }

    pub async fn update_segment_group(
        &self,
        group_id: &str,
        body: &Value,
    ) -> Result<Value, PlatformError> {
        let path = self.customer_path(&format!("/segmentGroup/{group_id}"))?;
        self.client
            .request("zpa_update_segment_group", Method::PUT, &path, &[], Some(body))
            .await
    }

    pub async fn delete_segment_group(
        &self,
        group_id: &str,
        microtenant_id: Option<String>,
    ) -> Result<Value, PlatformError> {
        let path = self.customer_path(&format!("/segmentGroup/{group_id}"))?;
        self.client
            .request(
                "zpa_delete_segment_group",
                Method::DELETE,
                &path,
                &microtenant_pairs(microtenant_id),
                None,
            )
            .await
    }

    pub async fn list_application_servers(&self, query: &PageQuery) -> Result<Value, PlatformError> {
        let path = self.customer_path("/server")?;
        self.client.get("zpa_list_application_servers", &path, &query.to_pairs()).await
    }

    pub async fn get_application_server(&self, server_id: &str) -> Result<Value, PlatformError> {
        let path = self.customer_path(&format!("/server/{server_id}"))?;
        self.client.get("zpa_get_application_server", &path, &[]).await
    }

    pub async fn create_application_server(&self, body: &Value) -> Result<Value, PlatformError> {
        let path = self.customer_path("/server")?;
        self.client
            .request("zpa_create_application_server", Method::POST, &path, &[], Some(body))
            .await
    }

    pub async fn delete_application_server(&self, server_id: &str) -> Result<Value, PlatformError> {
        let path = self.customer_path(&format!("/server/{server_id}"))?;
        self.client
            .request("zpa_delete_application_server", Method::DELETE, &path, &[], None)
            .await
    }

    pub async fn list_policy_rules(&self, policy_type: &str) -> Result<Value, PlatformError> {
        let path = self.customer_path(&format!("/policySet/rules/policyType/{policy_type}"))?;
        self.client.get("zpa_list_policy_rules", &path, &[]).await
    }

    /// Per-rule operations are scoped to the policy set that owns the type,
    /// so the set id is resolved first.
    async fn policy_set_id(&self, policy_type: &str) -> Result<String, PlatformError> {
        let path = self.customer_path(&format!("/policySet/policyType/{policy_type}"))?;
        let set = self.client.get("zpa_get_policy_set", &path, &[]).await?;
        set.get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| PlatformError::Api {
                operation: "zpa_get_policy_set",
                status: 200,
                message: format!("policy set for {policy_type} carries no id"),
            })
    }

    pub async fn get_policy_rule(
        &self,
        policy_type: &str,
        rule_id: &str,
        microtenant_id: Option<String>,
    ) -> Result<Value, PlatformError> {
        let set_id = self.policy_set_id(policy_type).await?;
        let path = self.customer_path(&format!("/policySet/{set_id}/rule/{rule_id}"))?;
        self.client
            .get("zpa_get_policy_rule", &path, &microtenant_pairs(microtenant_id))
            .await
    }

    pub async fn create_policy_rule(
        &self,
        policy_type: &str,
        body: &Value,
    ) -> Result<Value, PlatformError> {
        let set_id = self.policy_set_id(policy_type).await?;
        let path = self.customer_path(&format!("/policySet/{set_id}/rule"))?;
        self.client
            .request("zpa_create_policy_rule", Method::POST, &path, &[], Some(body))
            .await
    }

    pub async fn update_policy_rule(
        &self,
        policy_type: &str,
        rule_id: &str,
        body: &Value,
    ) -> Result<Value, PlatformError> {
        let set_id = self.policy_set_id(policy_type).await?;
        let path = self.customer_path(&format!("/policySet/{set_id}/rule/{rule_id}"))?;
        self.client
            .request("zpa_update_policy_rule", Method::PUT, &path, &[], Some(body))
            .await
    }

    pub async fn delete_policy_rule(
        &self,
        policy_type: &str,
        rule_id: &str,
        microtenant_id: Option<String>,
    ) -> Result<Value, PlatformError> {
        let set_id = self.policy_set_id(policy_type).await?;
        let path = self.customer_path(&format!("/policySet/{set_id}/rule/{rule_id}"))?;
        self.client
            .request(
                "zpa_delete_policy_rule",
                Method::DELETE,
                &path,
                &microtenant_pairs(microtenant_id),
                None,
            )
            .await
    }

    pub async fn list_ba_certificates(&self, query: &PageQuery) -> Result<Value, PlatformError> {
        let path = self.customer_path("/clientlessCertificate/issued")?;
        self.client.get("zpa_list_ba_certificates", &path, &query.to_pairs()).await
    }

    pub async fn get_ba_certificate(
        &self,
        certificate_id: &str,
        microtenant_id: Option<String>,
    ) -> Result<Value, PlatformError> {
        let path = self.customer_path(&format!("/clientlessCertificate/{certificate_id}"))?;
        self.client
            .get("zpa_get_ba_certificate", &path, &microtenant_pairs(microtenant_id))
            .await
    }

    pub async fn create_ba_certificate(&self, body: &Value) -> Result<Value, PlatformError> {
        let path = self.customer_path("/certificate")?;
        self.client
            .request("zpa_create_ba_certificate", Method::POST, &path, &[], Some(body))
            .await
    }

    pub async fn delete_ba_certificate(
        &self,
        certificate_id: &str,
        microtenant_id: Option<String>,
    ) -> Result<Value, PlatformError> {
        let path = self.customer_path(&format!("/certificate/{certificate_id}"))?;
        self.client
            .request(
                "zpa_delete_ba_certificate",
                Method::DELETE,
                &path,
                &microtenant_pairs(microtenant_id),
                None,
            )
            .await
    }

    pub async fn list_app_protection_profiles(
        &self,
        query: &PageQuery,
    ) -> Result<Value, PlatformError> {
        let path = self.customer_path("/inspectionProfile")?;
        self.client.get("zpa_list_app_protection_profiles", &path, &query.to_pairs()).await
    }

    pub async fn list_enrollment_certificates(
        &self,
        query: &PageQuery,
    ) -> Result<Value, PlatformError> {
        let path = self.customer_path("/enrollmentCert")?;
        self.client.get("zpa_list_enrollment_certificates", &path, &query.to_pairs()).await
    }

    pub async fn get_enrollment_certificate(
        &self,
        certificate_id: &str,
    ) -> Result<Value, PlatformError> {
        let path = self.customer_path(&format!("/enrollmentCert/{certificate_id}"))?;
        self.client.get("zpa_get_enrollment_certificate", &path, &[]).await
    }

    pub async fn list_segments_by_type(
        &self,
        application_type: &str,
        expand_all: bool,
        query: &PageQuery,
    ) -> Result<Value, PlatformError> {
        let path = self.customer_path("/application/getAppsByType")?;
        let mut pairs = query.to_pairs();
        pairs.push(("applicationType", application_type.to_string()));
        pairs.push(("expandAll", expand_all.to_string()));
        self.client.get("zpa_list_segments_by_type", &path, &pairs).await
    }

    pub async fn list_trusted_networks(&self, query: &PageQuery) -> Result<Value, PlatformError> {
        let path = self.customer_path("/network")?;
        self.client.get("zpa_list_trusted_networks", &path, &query.to_pairs()).await
    }

    pub async fn list_saml_attributes(&self, query: &PageQuery) -> Result<Value, PlatformError> {
        let path = self.customer_path("/samlAttribute")?;
        self.client.get("zpa_list_saml_attributes", &path, &query.to_pairs()).await
    }

    pub async fn list_scim_attributes(
        &self,
        idp_id: &str,
        query: &PageQuery,
    ) -> Result<Value, PlatformError> {
        let path = self.customer_path(&format!("/idp/{idp_id}/scimattribute"))?;
        self.client.get("zpa_list_scim_attributes", &path, &query.to_pairs()).await
    }

    pub async fn list_isolation_profiles(&self, query: &PageQuery) -> Result<Value, PlatformError> {
        let path = self.customer_path("/isolation/profiles")?;
        self.client.get("zpa_list_isolation_profiles", &path, &query.to_pairs()).await
    }
}

fn microtenant_pairs(microtenant_id: Option<String>) -> Vec<(&'static str, String)> {
    microtenant_id.map(|id| vec![("microtenantId", id)]).unwrap_or_default()
}

// ---------------------------------------------------------------------------
// ZDX: Digital Experience
// ---------------------------------------------------------------------------

pub struct Zdx<'a> {
    client: &'a Client,
}

impl Zdx<'_> {
    pub async fn list_applications(&self, since_hours: Option<u32>) -> Result<Value, PlatformError> {
        let query = since_hours.map(|h| vec![("since", h.to_string())]).unwrap_or_default();
        self.client.get("zdx_list_applications", "/zdx/v1/apps", &query).await
    }

    pub async fn get_application(&self, app_id: &str) -> Result<Value, PlatformError> {
        let path = format!("/zdx/v1/apps/{app_id}");
        self.client.get("zdx_get_application", &path, &[]).await
    }

    pub async fn list_departments(&self, search: Option<String>) -> Result<Value, PlatformError> {
        let query = search.map(|s| vec![("q", s)]).unwrap_or_default();
        self.client
            .get("zdx_list_departments", "/zdx/v1/administration/departments", &query)
            .await
    }

    pub async fn list_locations(&self, search: Option<String>) -> Result<Value, PlatformError> {
        let query = search.map(|s| vec![("q", s)]).unwrap_or_default();
        self.client.get("zdx_list_locations", "/zdx/v1/administration/locations", &query).await
    }
}

// ---------------------------------------------------------------------------
// ZCC: Client Connector
// ---------------------------------------------------------------------------

pub struct Zcc<'a> {
    client: &'a Client,
}

impl Zcc<'_> {
    pub async fn list_devices(
        &self,
        username: Option<String>,
        os_type: Option<String>,
        page: Option<u32>,
        page_size: Option<u32>,
    ) -> Result<Value, PlatformError> {
        let mut query = Vec::new();
        if let Some(username) = username {
            query.push(("username", username));
        }
        if let Some(os_type) = os_type {
            query.push(("osType", os_type));
        }
        if let Some(page) = page {
            query.push(("page", page.to_string()));
        }
        if let Some(size) = page_size {
            query.push(("pageSize", size.to_string()));
        }
        self.client.get("zcc_list_devices", "/zcc/papi/public/v1/getDevices", &query).await
    }
}
