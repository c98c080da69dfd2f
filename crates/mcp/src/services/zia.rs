use std::sync::Arc;

use rmcp::schemars::{self, JsonSchema};
use serde::Deserialize;
use serde_json::{json, Value};

use sentra_core::ToolError;

use crate::catalog::{ToolContext, ToolDescriptor};
use crate::resolve::authenticated_client;
use crate::services::{ServiceModule, StringList, TenantScope};

/// Internet Access: threat protection lists, sandbox reporting, tunnel and
/// firewall configuration.
#[derive(Debug)]
pub struct ZiaService;

impl ServiceModule for ZiaService {
    fn name(&self) -> &'static str {
        "zia"
    }

    fn descriptors(&self) -> anyhow::Result<Vec<ToolDescriptor>> {
        Ok(vec![
            ToolDescriptor::read::<ScopeOnlyInput, _, _>(
                "zia_get_advanced_threat_settings",
                "Get the advanced threat protection settings.",
                get_advanced_threat_settings,
            ),
            ToolDescriptor::read::<ScopeOnlyInput, _, _>(
                "zia_list_malicious_urls",
                "List URLs on the ATP malicious-URL denylist.",
                list_malicious_urls,
            ),
            ToolDescriptor::write::<UrlListInput, _, _>(
                "zia_add_malicious_urls",
                "Add URLs to the ATP malicious-URL denylist.",
                add_malicious_urls,
            ),
            ToolDescriptor::destructive::<UrlListInput, _, _>(
                "zia_remove_malicious_urls",
                "Remove URLs from the ATP malicious-URL denylist.",
                remove_malicious_urls,
            ),
            ToolDescriptor::read::<ScopeOnlyInput, _, _>(
                "zia_list_auth_exempt_urls",
                "List URLs exempted from cookie authentication.",
                list_auth_exempt_urls,
            ),
            ToolDescriptor::write::<UrlListInput, _, _>(
                "zia_add_auth_exempt_urls",
                "Add URLs to the cookie-authentication exemption list.",
                add_auth_exempt_urls,
            ),
            ToolDescriptor::destructive::<UrlListInput, _, _>(
                "zia_delete_auth_exempt_urls",
                "Remove URLs from the cookie-authentication exemption list.",
                delete_auth_exempt_urls,
            ),
            ToolDescriptor::read::<ScopeOnlyInput, _, _>(
                "zia_get_sandbox_quota",
                "Get the sandbox report API quota.",
                sandbox_quota,
            ),
            ToolDescriptor::read::<ScopeOnlyInput, _, _>(
                "zia_get_sandbox_behavioral_analysis",
                "List the MD5 hashes blocked by sandbox behavioral analysis.",
                sandbox_behavioral_analysis,
            ),
            ToolDescriptor::read::<ScopeOnlyInput, _, _>(
                "zia_get_sandbox_file_hash_count",
                "Get usage of the sandbox blocked-hash allowance.",
                sandbox_file_hash_count,
            ),
            ToolDescriptor::read::<SandboxReportInput, _, _>(
                "zia_get_sandbox_report",
                "Get the sandbox detonation report for a file MD5 hash.",
                sandbox_report,
            ),
            ToolDescriptor::read::<GreRangesInput, _, _>(
                "zia_list_gre_internal_ip_ranges",
                "List internal IP ranges available for GRE tunnel configuration.",
                list_gre_internal_ip_ranges,
            ),
            ToolDescriptor::read::<ListIpDestinationGroupsInput, _, _>(
                "zia_list_ip_destination_groups",
                "List cloud-firewall IP destination groups.",
                list_ip_destination_groups,
            ),
            ToolDescriptor::read::<IpDestinationGroupIdInput, _, _>(
                "zia_get_ip_destination_group",
                "Get one cloud-firewall IP destination group by id.",
                get_ip_destination_group,
            ),
            ToolDescriptor::write::<CreateIpDestinationGroupInput, _, _>(
                "zia_create_ip_destination_group",
                "Create a cloud-firewall IP destination group.",
                create_ip_destination_group,
            ),
            ToolDescriptor::write::<UpdateIpDestinationGroupInput, _, _>(
                "zia_update_ip_destination_group",
                "Update a cloud-firewall IP destination group.",
                update_ip_destination_group,
            ),
            ToolDescriptor::destructive::<IpDestinationGroupIdInput, _, _>(
                "zia_delete_ip_destination_group",
                "Delete a cloud-firewall IP destination group.",
                delete_ip_destination_group,
            ),
        ])
    }
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct ScopeOnlyInput {
    #[serde(flatten)]
    pub scope: TenantScope,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UrlListInput {
    /// URLs to operate on, as a JSON array of strings.
    pub urls: StringList,
    #[serde(flatten)]
    pub scope: TenantScope,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SandboxReportInput {
    /// MD5 hash of the detonated file.
    pub md5_hash: String,
    /// Return the full report instead of the summary.
    #[serde(default)]
    pub full_details: bool,
    #[serde(flatten)]
    pub scope: TenantScope,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GreRangesInput {
    /// Filter to a specific internal IP range, e.g. `172.17.47.247-172.17.47.240`.
    #[serde(default)]
    pub internal_ip_range: Option<String>,
    /// Filter to ranges associated with this static IP.
    #[serde(default)]
    pub static_ip: Option<String>,
    /// Maximum number of ranges to return.
    #[serde(default)]
    pub limit: Option<String>,
    #[serde(flatten)]
    pub scope: TenantScope,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListIpDestinationGroupsInput {
    /// Group type to exclude (DSTN_IP, DSTN_FQDN, DSTN_DOMAIN, DSTN_OTHER).
    #[serde(default)]
    pub exclude_type: Option<String>,
    #[serde(flatten)]
    pub scope: TenantScope,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct IpDestinationGroupIdInput {
    /// Destination group id.
    pub group_id: String,
    #[serde(flatten)]
    pub scope: TenantScope,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateIpDestinationGroupInput {
    /// Group name.
    pub name: String,
    /// Group type: DSTN_IP, DSTN_FQDN, DSTN_DOMAIN, or DSTN_OTHER.
    #[serde(rename = "type")]
    pub group_type: String,
    /// Destination addresses, FQDNs, or wildcard FQDNs.
    #[serde(default)]
    pub addresses: Option<StringList>,
    #[serde(default)]
    pub description: Option<String>,
    /// URL categories for DSTN_OTHER groups.
    #[serde(default)]
    pub ip_categories: Option<StringList>,
    /// Destination countries for DSTN_OTHER groups.
    #[serde(default)]
    pub countries: Option<StringList>,
    #[serde(flatten)]
    pub scope: TenantScope,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateIpDestinationGroupInput {
    /// Destination group id.
    pub group_id: String,
    /// Group name.
    pub name: String,
    /// Group type: DSTN_IP, DSTN_FQDN, DSTN_DOMAIN, or DSTN_OTHER.
    #[serde(rename = "type")]
    pub group_type: String,
    /// Destination addresses, FQDNs, or wildcard FQDNs.
    #[serde(default)]
    pub addresses: Option<StringList>,
    #[serde(default)]
    pub description: Option<String>,
    /// URL categories for DSTN_OTHER groups.
    #[serde(default)]
    pub ip_categories: Option<StringList>,
    /// Destination countries for DSTN_OTHER groups.
    #[serde(default)]
    pub countries: Option<StringList>,
    #[serde(flatten)]
    pub scope: TenantScope,
}

async fn get_advanced_threat_settings(
    context: Arc<ToolContext>,
    input: ScopeOnlyInput,
) -> Result<Value, ToolError> {
    let client = authenticated_client(&context, &input.scope).await?;
    client
        .zia()
        .advanced_threat_settings()
        .await
        .map_err(|error| error.into_tool_error("zia_get_advanced_threat_settings"))
}

async fn list_malicious_urls(
    context: Arc<ToolContext>,
    input: ScopeOnlyInput,
) -> Result<Value, ToolError> {
    let client = authenticated_client(&context, &input.scope).await?;
    client
        .zia()
        .list_malicious_urls()
        .await
        .map_err(|error| error.into_tool_error("zia_list_malicious_urls"))
}

async fn add_malicious_urls(
    context: Arc<ToolContext>,
    input: UrlListInput,
) -> Result<Value, ToolError> {
    // Parse the list before touching credentials so malformed input fails fast.
    let urls = input.urls.into_vec("urls")?;
    let client = authenticated_client(&context, &input.scope).await?;
    client
        .zia()
        .add_malicious_urls(&urls)
        .await
        .map_err(|error| error.into_tool_error("zia_add_malicious_urls"))
}

async fn remove_malicious_urls(
    context: Arc<ToolContext>,
    input: UrlListInput,
) -> Result<Value, ToolError> {
    let urls = input.urls.into_vec("urls")?;
    let client = authenticated_client(&context, &input.scope).await?;
    client
        .zia()
        .remove_malicious_urls(&urls)
        .await
        .map_err(|error| error.into_tool_error("zia_remove_malicious_urls"))
}

async fn list_auth_exempt_urls(
    context: Arc<ToolContext>,
    input: ScopeOnlyInput,
) -> Result<Value, ToolError> {
    let client = authenticated_client(&context, &input.scope).await?;
    client
        .zia()
        .list_auth_exempt_urls()
        .await
        .map_err(|error| error.into_tool_error("zia_list_auth_exempt_urls"))
}

async fn add_auth_exempt_urls(
    context: Arc<ToolContext>,
    input: UrlListInput,
) -> Result<Value, ToolError> {
    let urls = input.urls.into_vec("urls")?;
    let client = authenticated_client(&context, &input.scope).await?;
    client
        .zia()
        .add_auth_exempt_urls(&urls)
        .await
        .map_err(|error| error.into_tool_error("zia_add_auth_exempt_urls"))
}

async fn delete_auth_exempt_urls(
    context: Arc<ToolContext>,
    input: UrlListInput,
) -> Result<Value, ToolError> {
    let urls = input.urls.into_vec("urls")?;
    let client = authenticated_client(&context, &input.scope).await?;
    client
        .zia()
        .delete_auth_exempt_urls(&urls)
        .await
        .map_err(|error| error.into_tool_error("zia_delete_auth_exempt_urls"))
}

async fn sandbox_quota(context: Arc<ToolContext>, input: ScopeOnlyInput) -> Result<Value, ToolError> {
    let client = authenticated_client(&context, &input.scope).await?;
    client
        .zia()
        .sandbox_quota()
        .await
        .map_err(|error| error.into_tool_error("zia_get_sandbox_quota"))
}

async fn sandbox_behavioral_analysis(
    context: Arc<ToolContext>,
    input: ScopeOnlyInput,
) -> Result<Value, ToolError> {
    let client = authenticated_client(&context, &input.scope).await?;
    client
        .zia()
        .sandbox_behavioral_analysis()
        .await
        .map_err(|error| error.into_tool_error("zia_get_sandbox_behavioral_analysis"))
}

async fn sandbox_file_hash_count(
    context: Arc<ToolContext>,
    input: ScopeOnlyInput,
) -> Result<Value, ToolError> {
    let client = authenticated_client(&context, &input.scope).await?;
    client
        .zia()
        .sandbox_file_hash_count()
        .await
        .map_err(|error| error.into_tool_error("zia_get_sandbox_file_hash_count"))
}

async fn sandbox_report(
    context: Arc<ToolContext>,
    input: SandboxReportInput,
) -> Result<Value, ToolError> {
    let client = authenticated_client(&context, &input.scope).await?;
    client
        .zia()
        .sandbox_report(&input.md5_hash, input.full_details)
        .await
        .map_err(|error| error.into_tool_error("zia_get_sandbox_report"))
}

async fn list_gre_internal_ip_ranges(
    context: Arc<ToolContext>,
    input: GreRangesInput,
) -> Result<Value, ToolError> {
    let client = authenticated_client(&context, &input.scope).await?;
    client
        .zia()
        .list_gre_internal_ip_ranges(input.internal_ip_range, input.static_ip, input.limit)
        .await
        .map_err(|error| error.into_tool_error("zia_list_gre_internal_ip_ranges"))
}

async fn list_ip_destination_groups(
    context: Arc<ToolContext>,
    input: ListIpDestinationGroupsInput,
) -> Result<Value, ToolError> {
    let client = authenticated_client(&context, &input.scope).await?;
    client
        .zia()
        .list_ip_destination_groups(input.exclude_type)
        .await
        .map_err(|error| error.into_tool_error("zia_list_ip_destination_groups"))
}

async fn get_ip_destination_group(
    context: Arc<ToolContext>,
    input: IpDestinationGroupIdInput,
) -> Result<Value, ToolError> {
    let client = authenticated_client(&context, &input.scope).await?;
    client
        .zia()
        .get_ip_destination_group(&input.group_id)
        .await
        .map_err(|error| error.into_tool_error("zia_get_ip_destination_group"))
}

async fn create_ip_destination_group(
    context: Arc<ToolContext>,
    input: CreateIpDestinationGroupInput,
) -> Result<Value, ToolError> {
    let mut body = json!({
        "name": input.name,
        "type": input.group_type,
    });
    if let Some(addresses) = input.addresses {
        body["addresses"] = json!(addresses.into_vec("addresses")?);
    }
    if let Some(description) = input.description {
        body["description"] = json!(description);
    }
    if let Some(categories) = input.ip_categories {
        body["ipCategories"] = json!(categories.into_vec("ip_categories")?);
    }
    if let Some(countries) = input.countries {
        body["countries"] = json!(countries.into_vec("countries")?);
    }

    let client = authenticated_client(&context, &input.scope).await?;
    client
        .zia()
        .create_ip_destination_group(&body)
        .await
        .map_err(|error| error.into_tool_error("zia_create_ip_destination_group"))
}

async fn update_ip_destination_group(
    context: Arc<ToolContext>,
    input: UpdateIpDestinationGroupInput,
) -> Result<Value, ToolError> {
    // Parse the lists before touching credentials so malformed input fails fast.
    let mut body = json!({
        "name": input.name,
        "type": input.group_type,
    });
    if let Some(addresses) = input.addresses {
        body["addresses"] = json!(addresses.into_vec("addresses")?);
    }
    if let Some(description) = input.description {
        body["description"] = json!(description);
    }
    if let Some(categories) = input.ip_categories {
        body["ipCategories"] = json!(categories.into_vec("ip_categories")?);
    }
    if let Some(countries) = input.countries {
        body["countries"] = json!(countries.into_vec("countries")?);
    }

    let client = authenticated_client(&context, &input.scope).await?;
    client
        .zia()
        .update_ip_destination_group(&input.group_id, &body)
        .await
        .map_err(|error| error.into_tool_error("zia_update_ip_destination_group"))
}

async fn delete_ip_destination_group(
    context: Arc<ToolContext>,
    input: IpDestinationGroupIdInput,
) -> Result<Value, ToolError> {
    let client = authenticated_client(&context, &input.scope).await?;
    client
        .zia()
        .delete_ip_destination_group(&input.group_id)
        .await
        .map_err(|error| error.into_tool_error("zia_delete_ip_destination_group"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ToolKind;

    #[test]
    fn sandbox_and_group_update_tools_are_registered_with_their_kinds() {
        let descriptors = ZiaService.descriptors().unwrap();
        let find = |name: &str| {
            descriptors
                .iter()
                .find(|descriptor| descriptor.name == name)
                .unwrap_or_else(|| panic!("missing tool {name}"))
        };

        assert_eq!(find("zia_get_sandbox_behavioral_analysis").kind, ToolKind::Read);
        assert_eq!(find("zia_get_sandbox_file_hash_count").kind, ToolKind::Read);
        let update = find("zia_update_ip_destination_group");
        assert_eq!(update.kind, ToolKind::Write);
        assert!(!update.destructive);
        assert!(find("zia_delete_ip_destination_group").destructive);
    }
}
