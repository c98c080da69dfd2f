use std::sync::Arc;

use rmcp::schemars::{self, JsonSchema};
use serde::Deserialize;
use serde_json::{json, Value};

use sentra_core::ToolError;
use sentra_platform::PageQuery;

use crate::catalog::{ToolContext, ToolDescriptor};
use crate::resolve::authenticated_client;
use crate::services::{ServiceModule, StringList, TenantScope};

const ACCESS_POLICY: &str = "ACCESS_POLICY";
const ISOLATION_POLICY: &str = "ISOLATION_POLICY";

/// Private Access: segment groups, application servers, access and isolation
/// policy rules, certificates, and identity attribute inventory. All
/// operations require the tenant's `customer_id`.
#[derive(Debug)]
pub struct ZpaService;

impl ServiceModule for ZpaService {
    fn name(&self) -> &'static str {
        "zpa"
    }

    fn descriptors(&self) -> anyhow::Result<Vec<ToolDescriptor>> {
        Ok(vec![
            ToolDescriptor::read::<PageInput, _, _>(
                "zpa_list_segment_groups",
                "List segment groups, optionally filtered by a search string.",
                list_segment_groups,
            ),
            ToolDescriptor::read::<SegmentGroupIdInput, _, _>(
                "zpa_get_segment_group",
                "Get one segment group by id.",
                get_segment_group,
            ),
            ToolDescriptor::write::<CreateSegmentGroupInput, _, _>(
                "zpa_create_segment_group",
                "Create a segment group.",
                create_segment_group,
            ),
            ToolDescriptor::write::<UpdateSegmentGroupInput, _, _>(
                "zpa_update_segment_group",
                "Update a segment group's name, description, or enabled state.",
                update_segment_group,
            ),
            ToolDescriptor::destructive::<SegmentGroupIdInput, _, _>(
                "zpa_delete_segment_group",
                "Delete a segment group.",
                delete_segment_group,
            ),
            ToolDescriptor::read::<PageInput, _, _>(
                "zpa_list_application_servers",
                "List application servers.",
                list_application_servers,
            ),
            ToolDescriptor::read::<ServerIdInput, _, _>(
                "zpa_get_application_server",
                "Get one application server by id.",
                get_application_server,
            ),
            ToolDescriptor::write::<CreateApplicationServerInput, _, _>(
                "zpa_create_application_server",
                "Create an application server.",
                create_application_server,
            ),
            ToolDescriptor::destructive::<ServerIdInput, _, _>(
                "zpa_delete_application_server",
                "Delete an application server.",
                delete_application_server,
            ),
            ToolDescriptor::read::<PolicyRulesInput, _, _>(
                "zpa_list_policy_rules",
                "List access policy rules of a given policy type.",
                list_policy_rules,
            ),
            ToolDescriptor::read::<RuleIdInput, _, _>(
                "zpa_get_access_policy_rule",
                "Get one access policy rule by id.",
                get_access_policy_rule,
            ),
            ToolDescriptor::write::<CreateAccessRuleInput, _, _>(
                "zpa_create_access_policy_rule",
                "Create an access policy rule.",
                create_access_policy_rule,
            ),
            ToolDescriptor::write::<UpdateAccessRuleInput, _, _>(
                "zpa_update_access_policy_rule",
                "Update an access policy rule.",
                update_access_policy_rule,
            ),
            ToolDescriptor::destructive::<RuleIdInput, _, _>(
                "zpa_delete_access_policy_rule",
                "Delete an access policy rule.",
                delete_access_policy_rule,
            ),
            ToolDescriptor::read::<ScopeInput, _, _>(
                "zpa_list_isolation_policy_rules",
                "List isolation policy rules.",
                list_isolation_policy_rules,
            ),
            ToolDescriptor::read::<RuleIdInput, _, _>(
                "zpa_get_isolation_policy_rule",
                "Get one isolation policy rule by id.",
                get_isolation_policy_rule,
            ),
            ToolDescriptor::write::<CreateIsolationRuleInput, _, _>(
                "zpa_create_isolation_policy_rule",
                "Create an isolation policy rule.",
                create_isolation_policy_rule,
            ),
            ToolDescriptor::write::<UpdateIsolationRuleInput, _, _>(
                "zpa_update_isolation_policy_rule",
                "Update an isolation policy rule.",
                update_isolation_policy_rule,
            ),
            ToolDescriptor::destructive::<RuleIdInput, _, _>(
                "zpa_delete_isolation_policy_rule",
                "Delete an isolation policy rule.",
                delete_isolation_policy_rule,
            ),
            ToolDescriptor::read::<PageInput, _, _>(
                "zpa_list_trusted_networks",
                "List trusted networks.",
                list_trusted_networks,
            ),
            ToolDescriptor::read::<PageInput, _, _>(
                "zpa_list_saml_attributes",
                "List SAML attributes.",
                list_saml_attributes,
            ),
            ToolDescriptor::read::<ScimAttributesInput, _, _>(
                "zpa_list_scim_attributes",
                "List SCIM attributes for an identity provider.",
                list_scim_attributes,
            ),
            ToolDescriptor::read::<PageInput, _, _>(
                "zpa_list_isolation_profiles",
                "List cloud browser isolation profiles.",
                list_isolation_profiles,
            ),
            ToolDescriptor::read::<PageInput, _, _>(
                "zpa_list_ba_certificates",
                "List issued Browser Access certificates.",
                list_ba_certificates,
            ),
            ToolDescriptor::read::<CertificateIdInput, _, _>(
                "zpa_get_ba_certificate",
                "Get one Browser Access certificate by id.",
                get_ba_certificate,
            ),
            ToolDescriptor::write::<CreateBaCertificateInput, _, _>(
                "zpa_create_ba_certificate",
                "Upload a Browser Access certificate from a PEM blob.",
                create_ba_certificate,
            ),
            ToolDescriptor::destructive::<CertificateIdInput, _, _>(
                "zpa_delete_ba_certificate",
                "Delete a Browser Access certificate.",
                delete_ba_certificate,
            ),
            ToolDescriptor::read::<AppProtectionProfilesInput, _, _>(
                "zpa_list_app_protection_profiles",
                "List app protection (inspection) profiles, or look one up by exact name.",
                list_app_protection_profiles,
            ),
            ToolDescriptor::read::<EnrollmentCertificateInput, _, _>(
                "zpa_get_enrollment_certificate",
                "Look up enrollment certificates by name, by id, or list them all.",
                get_enrollment_certificate,
            ),
            ToolDescriptor::read::<SegmentsByTypeInput, _, _>(
                "zpa_list_segments_by_type",
                "List application segments of type BROWSER_ACCESS, INSPECT, or SECURE_REMOTE_ACCESS.",
                list_segments_by_type,
            ),
        ])
    }
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct PageInput {
    /// Search string matched against names.
    #[serde(default)]
    pub search: Option<String>,
    /// Page number, starting at 1.
    #[serde(default)]
    pub page: Option<String>,
    /// Results per page.
    #[serde(default)]
    pub page_size: Option<String>,
    /// Microtenant to scope the request to.
    #[serde(default)]
    pub microtenant_id: Option<String>,
    #[serde(flatten)]
    pub scope: TenantScope,
}

impl PageInput {
    fn query(&self) -> PageQuery {
        PageQuery {
            search: self.search.clone(),
            page: self.page.clone(),
            page_size: self.page_size.clone(),
            microtenant_id: self.microtenant_id.clone(),
        }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SegmentGroupIdInput {
    /// Segment group id.
    pub group_id: String,
    /// Microtenant to scope the request to.
    #[serde(default)]
    pub microtenant_id: Option<String>,
    #[serde(flatten)]
    pub scope: TenantScope,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateSegmentGroupInput {
    /// Segment group name.
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Whether the group starts enabled. Defaults to true.
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(flatten)]
    pub scope: TenantScope,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateSegmentGroupInput {
    /// Segment group id.
    pub group_id: String,
    /// New name for the group.
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(flatten)]
    pub scope: TenantScope,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ServerIdInput {
    /// Application server id.
    pub server_id: String,
    #[serde(flatten)]
    pub scope: TenantScope,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateApplicationServerInput {
    /// Server name.
    pub name: String,
    /// Server address: IP, FQDN, or hostname.
    pub address: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Whether the server starts enabled. Defaults to true.
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(flatten)]
    pub scope: TenantScope,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct PolicyRulesInput {
    /// Policy type: ACCESS_POLICY, TIMEOUT_POLICY, CLIENT_FORWARDING_POLICY,
    /// ISOLATION_POLICY, or INSPECTION_POLICY.
    pub policy_type: String,
    #[serde(flatten)]
    pub scope: TenantScope,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ScimAttributesInput {
    /// Identity provider id.
    pub idp_id: String,
    /// Search string matched against attribute names.
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub page: Option<String>,
    #[serde(default)]
    pub page_size: Option<String>,
    #[serde(flatten)]
    pub scope: TenantScope,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct ScopeInput {
    #[serde(flatten)]
    pub scope: TenantScope,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RuleIdInput {
    /// Policy rule id.
    pub rule_id: String,
    /// Microtenant to scope the request to.
    #[serde(default)]
    pub microtenant_id: Option<String>,
    #[serde(flatten)]
    pub scope: TenantScope,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateAccessRuleInput {
    /// Rule name.
    pub name: String,
    /// Rule action, e.g. ALLOW or DENY.
    pub action_type: String,
    #[serde(default)]
    pub description: Option<String>,
    /// App connector group ids the rule applies to.
    #[serde(default)]
    pub app_connector_group_ids: Option<StringList>,
    /// App server group ids the rule applies to.
    #[serde(default)]
    pub app_server_group_ids: Option<StringList>,
    /// Rule conditions, passed through as given.
    #[serde(default)]
    pub conditions: Option<Value>,
    #[serde(default)]
    pub microtenant_id: Option<String>,
    #[serde(flatten)]
    pub scope: TenantScope,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateAccessRuleInput {
    /// Policy rule id.
    pub rule_id: String,
    /// New rule name.
    pub name: String,
    /// Rule action, e.g. ALLOW or DENY.
    pub action_type: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub app_connector_group_ids: Option<StringList>,
    #[serde(default)]
    pub app_server_group_ids: Option<StringList>,
    #[serde(default)]
    pub conditions: Option<Value>,
    #[serde(default)]
    pub microtenant_id: Option<String>,
    #[serde(flatten)]
    pub scope: TenantScope,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateIsolationRuleInput {
    /// Rule name.
    pub name: String,
    /// Rule action: `isolate` or `bypass_isolate`.
    pub action_type: String,
    /// Isolation profile id. Required when the action is `isolate`.
    #[serde(default)]
    pub zpn_isolation_profile_id: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Evaluation order of the rule within the policy.
    #[serde(default)]
    pub rule_order: Option<String>,
    #[serde(default)]
    pub conditions: Option<Value>,
    #[serde(default)]
    pub microtenant_id: Option<String>,
    #[serde(flatten)]
    pub scope: TenantScope,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateIsolationRuleInput {
    /// Policy rule id.
    pub rule_id: String,
    /// New rule name.
    pub name: String,
    /// Rule action: `isolate` or `bypass_isolate`.
    pub action_type: String,
    #[serde(default)]
    pub zpn_isolation_profile_id: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub rule_order: Option<String>,
    #[serde(default)]
    pub conditions: Option<Value>,
    #[serde(default)]
    pub microtenant_id: Option<String>,
    #[serde(flatten)]
    pub scope: TenantScope,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CertificateIdInput {
    /// Certificate id.
    pub certificate_id: String,
    /// Microtenant to scope the request to.
    #[serde(default)]
    pub microtenant_id: Option<String>,
    #[serde(flatten)]
    pub scope: TenantScope,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateBaCertificateInput {
    /// Certificate name.
    pub name: String,
    /// Certificate and private key as a PEM string.
    pub cert_blob: String,
    #[serde(default)]
    pub microtenant_id: Option<String>,
    #[serde(flatten)]
    pub scope: TenantScope,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct AppProtectionProfilesInput {
    /// Exact profile name to return. Omit to list every profile.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(flatten)]
    pub scope: TenantScope,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct EnrollmentCertificateInput {
    /// Certificate name to search for. Takes precedence over the id.
    #[serde(default)]
    pub name: Option<String>,
    /// Certificate id, used when no name is given.
    #[serde(default)]
    pub certificate_id: Option<String>,
    #[serde(flatten)]
    pub scope: TenantScope,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SegmentsByTypeInput {
    /// Segment type: BROWSER_ACCESS, INSPECT, or SECURE_REMOTE_ACCESS.
    pub application_type: String,
    /// Expand related configuration in each returned segment.
    #[serde(default)]
    pub expand_all: bool,
    /// Search string matched against names.
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub page: Option<String>,
    #[serde(default)]
    pub page_size: Option<String>,
    #[serde(default)]
    pub microtenant_id: Option<String>,
    #[serde(flatten)]
    pub scope: TenantScope,
}

async fn list_segment_groups(context: Arc<ToolContext>, input: PageInput) -> Result<Value, ToolError> {
    let client = authenticated_client(&context, &input.scope).await?;
    client
        .zpa()
        .list_segment_groups(&input.query())
        .await
        .map_err(|error| error.into_tool_error("zpa_list_segment_groups"))
}

async fn get_segment_group(
    context: Arc<ToolContext>,
    input: SegmentGroupIdInput,
) -> Result<Value, ToolError> {
    let client = authenticated_client(&context, &input.scope).await?;
    client
        .zpa()
        .get_segment_group(&input.group_id, input.microtenant_id)
        .await
        .map_err(|error| error.into_tool_error("zpa_get_segment_group"))
}

async fn create_segment_group(
    context: Arc<ToolContext>,
    input: CreateSegmentGroupInput,
) -> Result<Value, ToolError> {
    let body = json!({
        "name": input.name,
        "description": input.description.unwrap_or_default(),
        "enabled": input.enabled.unwrap_or(true),
    });
    let client = authenticated_client(&context, &input.scope).await?;
    client
        .zpa()
        .create_segment_group(&body)
        .await
        .map_err(|error| error.into_tool_error("zpa_create_segment_group"))
}

async fn update_segment_group(
    context: Arc<ToolContext>,
    input: UpdateSegmentGroupInput,
) -> Result<Value, ToolError> {
    let body = json!({
        "name": input.name,
        "description": input.description.unwrap_or_default(),
        "enabled": input.enabled.unwrap_or(true),
    });
    let client = authenticated_client(&context, &input.scope).await?;
    client
        .zpa()
        .update_segment_group(&input.group_id, &body)
        .await
        .map_err(|error| error.into_tool_error("zpa_update_segment_group"))
}

async fn delete_segment_group(
    context: Arc<ToolContext>,
    input: SegmentGroupIdInput,
) -> Result<Value, ToolError> {
    let client = authenticated_client(&context, &input.scope).await?;
    client
        .zpa()
        .delete_segment_group(&input.group_id, input.microtenant_id)
        .await
        .map_err(|error| error.into_tool_error("zpa_delete_segment_group"))
}

async fn list_application_servers(
    context: Arc<ToolContext>,
    input: PageInput,
) -> Result<Value, ToolError> {
    let client = authenticated_client(&context, &input.scope).await?;
    client
        .zpa()
        .list_application_servers(&input.query())
        .await
        .map_err(|error| error.into_tool_error("zpa_list_application_servers"))
}

async fn get_application_server(
    context: Arc<ToolContext>,
    input: ServerIdInput,
) -> Result<Value, ToolError> {
    let client = authenticated_client(&context, &input.scope).await?;
    client
        .zpa()
        .get_application_server(&input.server_id)
        .await
        .map_err(|error| error.into_tool_error("zpa_get_application_server"))
}

async fn create_application_server(
    context: Arc<ToolContext>,
    input: CreateApplicationServerInput,
) -> Result<Value, ToolError> {
    let body = json!({
        "name": input.name,
        "address": input.address,
        "description": input.description.unwrap_or_default(),
        "enabled": input.enabled.unwrap_or(true),
    });
    let client = authenticated_client(&context, &input.scope).await?;
    client
        .zpa()
        .create_application_server(&body)
        .await
        .map_err(|error| error.into_tool_error("zpa_create_application_server"))
}

async fn delete_application_server(
    context: Arc<ToolContext>,
    input: ServerIdInput,
) -> Result<Value, ToolError> {
    let client = authenticated_client(&context, &input.scope).await?;
    client
        .zpa()
        .delete_application_server(&input.server_id)
        .await
        .map_err(|error| error.into_tool_error("zpa_delete_application_server"))
}

async fn list_policy_rules(
    context: Arc<ToolContext>,
    input: PolicyRulesInput,
) -> Result<Value, ToolError> {
    let client = authenticated_client(&context, &input.scope).await?;
    client
        .zpa()
        .list_policy_rules(&input.policy_type)
        .await
        .map_err(|error| error.into_tool_error("zpa_list_policy_rules"))
}

async fn list_trusted_networks(
    context: Arc<ToolContext>,
    input: PageInput,
) -> Result<Value, ToolError> {
    let client = authenticated_client(&context, &input.scope).await?;
    client
        .zpa()
        .list_trusted_networks(&input.query())
        .await
        .map_err(|error| error.into_tool_error("zpa_list_trusted_networks"))
}

async fn list_saml_attributes(
    context: Arc<ToolContext>,
    input: PageInput,
) -> Result<Value, ToolError> {
    let client = authenticated_client(&context, &input.scope).await?;
    client
        .zpa()
        .list_saml_attributes(&input.query())
        .await
        .map_err(|error| error.into_tool_error("zpa_list_saml_attributes"))
}

async fn list_scim_attributes(
    context: Arc<ToolContext>,
    input: ScimAttributesInput,
) -> Result<Value, ToolError> {
    let query = PageQuery {
        search: input.search,
        page: input.page,
        page_size: input.page_size,
        microtenant_id: None,
    };
    let client = authenticated_client(&context, &input.scope).await?;
    client
        .zpa()
        .list_scim_attributes(&input.idp_id, &query)
        .await
        .map_err(|error| error.into_tool_error("zpa_list_scim_attributes"))
}

async fn list_isolation_profiles(
    context: Arc<ToolContext>,
    input: PageInput,
) -> Result<Value, ToolError> {
    let client = authenticated_client(&context, &input.scope).await?;
    client
        .zpa()
        .list_isolation_profiles(&input.query())
        .await
        .map_err(|error| error.into_tool_error("zpa_list_isolation_profiles"))
}

/// ZPA list endpoints wrap rows in `{"list": [...]}`; bare arrays show up on
/// the unpaginated ones.
fn rows(value: &Value) -> &[Value] {
    value
        .get("list")
        .and_then(Value::as_array)
        .or_else(|| value.as_array())
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Expand a list of group ids into the `[{"id": ...}]` shape rule payloads use.
fn group_refs(ids: Option<StringList>, field: &'static str) -> Result<Value, ToolError> {
    let ids = match ids {
        Some(list) => list.into_vec(field)?,
        None => Vec::new(),
    };
    Ok(Value::Array(ids.into_iter().map(|id| json!({ "id": id })).collect()))
}

fn access_rule_body(
    name: String,
    action_type: String,
    description: Option<String>,
    app_connector_group_ids: Option<StringList>,
    app_server_group_ids: Option<StringList>,
    conditions: Option<Value>,
    microtenant_id: Option<String>,
) -> Result<Value, ToolError> {
    let mut body = json!({
        "name": name,
        "action": action_type,
        "description": description.unwrap_or_default(),
        "appConnectorGroups": group_refs(app_connector_group_ids, "app_connector_group_ids")?,
        "appServerGroups": group_refs(app_server_group_ids, "app_server_group_ids")?,
    });
    if let Some(conditions) = conditions {
        body["conditions"] = conditions;
    }
    if let Some(microtenant) = microtenant_id {
        body["microtenantId"] = json!(microtenant);
    }
    Ok(body)
}

fn isolation_rule_body(
    name: String,
    action_type: String,
    zpn_isolation_profile_id: Option<String>,
    description: Option<String>,
    rule_order: Option<String>,
    conditions: Option<Value>,
    microtenant_id: Option<String>,
) -> Result<Value, ToolError> {
    if action_type.eq_ignore_ascii_case("isolate") && zpn_isolation_profile_id.is_none() {
        return Err(ToolError::malformed(
            "zpn_isolation_profile_id",
            "required when action_type is `isolate`",
        ));
    }
    let mut body = json!({
        "name": name,
        "action": action_type,
        "description": description.unwrap_or_default(),
    });
    if let Some(profile) = zpn_isolation_profile_id {
        body["zpnIsolationProfileId"] = json!(profile);
    }
    if let Some(order) = rule_order {
        body["ruleOrder"] = json!(order);
    }
    if let Some(conditions) = conditions {
        body["conditions"] = conditions;
    }
    if let Some(microtenant) = microtenant_id {
        body["microtenantId"] = json!(microtenant);
    }
    Ok(body)
}

async fn get_access_policy_rule(
    context: Arc<ToolContext>,
    input: RuleIdInput,
) -> Result<Value, ToolError> {
    let client = authenticated_client(&context, &input.scope).await?;
    client
        .zpa()
        .get_policy_rule(ACCESS_POLICY, &input.rule_id, input.microtenant_id)
        .await
        .map_err(|error| error.into_tool_error("zpa_get_access_policy_rule"))
}

async fn create_access_policy_rule(
    context: Arc<ToolContext>,
    input: CreateAccessRuleInput,
) -> Result<Value, ToolError> {
    // Build the body before touching credentials so malformed input fails fast.
    let body = access_rule_body(
        input.name,
        input.action_type,
        input.description,
        input.app_connector_group_ids,
        input.app_server_group_ids,
        input.conditions,
        input.microtenant_id,
    )?;
    let client = authenticated_client(&context, &input.scope).await?;
    client
        .zpa()
        .create_policy_rule(ACCESS_POLICY, &body)
        .await
        .map_err(|error| error.into_tool_error("zpa_create_access_policy_rule"))
}

async fn update_access_policy_rule(
    context: Arc<ToolContext>,
    input: UpdateAccessRuleInput,
) -> Result<Value, ToolError> {
    let body = access_rule_body(
        input.name,
        input.action_type,
        input.description,
        input.app_connector_group_ids,
        input.app_server_group_ids,
        input.conditions,
        input.microtenant_id,
    )?;
    let client = authenticated_client(&context, &input.scope).await?;
    client
        .zpa()
        .update_policy_rule(ACCESS_POLICY, &input.rule_id, &body)
        .await
        .map_err(|error| error.into_tool_error("zpa_update_access_policy_rule"))
}

async fn delete_access_policy_rule(
    context: Arc<ToolContext>,
    input: RuleIdInput,
) -> Result<Value, ToolError> {
    let client = authenticated_client(&context, &input.scope).await?;
    client
        .zpa()
        .delete_policy_rule(ACCESS_POLICY, &input.rule_id, input.microtenant_id)
        .await
        .map_err(|error| error.into_tool_error("zpa_delete_access_policy_rule"))
}

async fn list_isolation_policy_rules(
    context: Arc<ToolContext>,
    input: ScopeInput,
) -> Result<Value, ToolError> {
    let client = authenticated_client(&context, &input.scope).await?;
    client
        .zpa()
        .list_policy_rules(ISOLATION_POLICY)
        .await
        .map_err(|error| error.into_tool_error("zpa_list_isolation_policy_rules"))
}

async fn get_isolation_policy_rule(
    context: Arc<ToolContext>,
    input: RuleIdInput,
) -> Result<Value, ToolError> {
    let client = authenticated_client(&context, &input.scope).await?;
    client
        .zpa()
        .get_policy_rule(ISOLATION_POLICY, &input.rule_id, input.microtenant_id)
        .await
        .map_err(|error| error.into_tool_error("zpa_get_isolation_policy_rule"))
}

async fn create_isolation_policy_rule(
    context: Arc<ToolContext>,
    input: CreateIsolationRuleInput,
) -> Result<Value, ToolError> {
    let body = isolation_rule_body(
        input.name,
        input.action_type,
        input.zpn_isolation_profile_id,
        input.description,
        input.rule_order,
        input.conditions,
        input.microtenant_id,
    )?;
    let client = authenticated_client(&context, &input.scope).await?;
    client
        .zpa()
        .create_policy_rule(ISOLATION_POLICY, &body)
        .await
        .map_err(|error| error.into_tool_error("zpa_create_isolation_policy_rule"))
}

async fn update_isolation_policy_rule(
    context: Arc<ToolContext>,
    input: UpdateIsolationRuleInput,
) -> Result<Value, ToolError> {
    let body = isolation_rule_body(
        input.name,
        input.action_type,
        input.zpn_isolation_profile_id,
        input.description,
        input.rule_order,
        input.conditions,
        input.microtenant_id,
    )?;
    let client = authenticated_client(&context, &input.scope).await?;
    client
        .zpa()
        .update_policy_rule(ISOLATION_POLICY, &input.rule_id, &body)
        .await
        .map_err(|error| error.into_tool_error("zpa_update_isolation_policy_rule"))
}

async fn delete_isolation_policy_rule(
    context: Arc<ToolContext>,
    input: RuleIdInput,
) -> Result<Value, ToolError> {
    let client = authenticated_client(&context, &input.scope).await?;
    client
        .zpa()
        .delete_policy_rule(ISOLATION_POLICY, &input.rule_id, input.microtenant_id)
        .await
        .map_err(|error| error.into_tool_error("zpa_delete_isolation_policy_rule"))
}

async fn list_ba_certificates(
    context: Arc<ToolContext>,
    input: PageInput,
) -> Result<Value, ToolError> {
    let client = authenticated_client(&context, &input.scope).await?;
    client
        .zpa()
        .list_ba_certificates(&input.query())
        .await
        .map_err(|error| error.into_tool_error("zpa_list_ba_certificates"))
}

async fn get_ba_certificate(
    context: Arc<ToolContext>,
    input: CertificateIdInput,
) -> Result<Value, ToolError> {
    let client = authenticated_client(&context, &input.scope).await?;
    client
        .zpa()
        .get_ba_certificate(&input.certificate_id, input.microtenant_id)
        .await
        .map_err(|error| error.into_tool_error("zpa_get_ba_certificate"))
}

async fn create_ba_certificate(
    context: Arc<ToolContext>,
    input: CreateBaCertificateInput,
) -> Result<Value, ToolError> {
    let mut body = json!({
        "name": input.name,
        "certBlob": input.cert_blob,
    });
    if let Some(microtenant) = input.microtenant_id {
        body["microtenantId"] = json!(microtenant);
    }
    let client = authenticated_client(&context, &input.scope).await?;
    client
        .zpa()
        .create_ba_certificate(&body)
        .await
        .map_err(|error| error.into_tool_error("zpa_create_ba_certificate"))
}

async fn delete_ba_certificate(
    context: Arc<ToolContext>,
    input: CertificateIdInput,
) -> Result<Value, ToolError> {
    let client = authenticated_client(&context, &input.scope).await?;
    client
        .zpa()
        .delete_ba_certificate(&input.certificate_id, input.microtenant_id)
        .await
        .map_err(|error| error.into_tool_error("zpa_delete_ba_certificate"))
}

async fn list_app_protection_profiles(
    context: Arc<ToolContext>,
    input: AppProtectionProfilesInput,
) -> Result<Value, ToolError> {
    let query = PageQuery { search: input.name.clone(), ..Default::default() };
    let client = authenticated_client(&context, &input.scope).await?;
    let listed = client
        .zpa()
        .list_app_protection_profiles(&query)
        .await
        .map_err(|error| error.into_tool_error("zpa_list_app_protection_profiles"))?;

    match input.name {
        None => Ok(listed),
        Some(name) => rows(&listed)
            .iter()
            .find(|profile| profile.get("name").and_then(Value::as_str) == Some(name.as_str()))
            .cloned()
            .ok_or_else(|| {
                ToolError::malformed("name", format!("no app protection profile named `{name}`"))
            }),
    }
}

async fn get_enrollment_certificate(
    context: Arc<ToolContext>,
    input: EnrollmentCertificateInput,
) -> Result<Value, ToolError> {
    let client = authenticated_client(&context, &input.scope).await?;
    if let Some(name) = input.name {
        let query = PageQuery { search: Some(name.clone()), ..Default::default() };
        let listed = client
            .zpa()
            .list_enrollment_certificates(&query)
            .await
            .map_err(|error| error.into_tool_error("zpa_get_enrollment_certificate"))?;
        return rows(&listed)
            .iter()
            .find(|cert| {
                cert.get("name")
                    .and_then(Value::as_str)
                    .is_some_and(|n| n.eq_ignore_ascii_case(&name))
            })
            .cloned()
            .ok_or_else(|| {
                ToolError::malformed("name", format!("no enrollment certificate named `{name}`"))
            });
    }
    if let Some(certificate_id) = input.certificate_id {
        return client
            .zpa()
            .get_enrollment_certificate(&certificate_id)
            .await
            .map_err(|error| error.into_tool_error("zpa_get_enrollment_certificate"));
    }
    client
        .zpa()
        .list_enrollment_certificates(&PageQuery::default())
        .await
        .map_err(|error| error.into_tool_error("zpa_get_enrollment_certificate"))
}

const SEGMENT_TYPES: [&str; 3] = ["BROWSER_ACCESS", "INSPECT", "SECURE_REMOTE_ACCESS"];

async fn list_segments_by_type(
    context: Arc<ToolContext>,
    input: SegmentsByTypeInput,
) -> Result<Value, ToolError> {
    if !SEGMENT_TYPES.contains(&input.application_type.as_str()) {
        return Err(ToolError::malformed(
            "application_type",
            format!("must be one of {}", SEGMENT_TYPES.join(", ")),
        ));
    }
    let query = PageQuery {
        search: input.search,
        page: input.page,
        page_size: input.page_size,
        microtenant_id: input.microtenant_id,
    };
    let client = authenticated_client(&context, &input.scope).await?;
    client
        .zpa()
        .list_segments_by_type(&input.application_type, input.expand_all, &query)
        .await
        .map_err(|error| error.into_tool_error("zpa_list_segments_by_type"))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::catalog::ToolKind;

    #[test]
    fn policy_and_certificate_tools_are_registered_with_their_kinds() {
        let descriptors = ZpaService.descriptors().unwrap();
        let find = |name: &str| {
            descriptors
                .iter()
                .find(|descriptor| descriptor.name == name)
                .unwrap_or_else(|| panic!("missing tool {name}"))
        };

        assert_eq!(find("zpa_get_access_policy_rule").kind, ToolKind::Read);
        assert_eq!(find("zpa_create_access_policy_rule").kind, ToolKind::Write);
        assert!(!find("zpa_update_access_policy_rule").destructive);
        assert!(find("zpa_delete_access_policy_rule").destructive);
        assert!(find("zpa_delete_isolation_policy_rule").destructive);
        assert!(find("zpa_delete_ba_certificate").destructive);
        assert_eq!(find("zpa_list_isolation_policy_rules").kind, ToolKind::Read);
        assert_eq!(find("zpa_list_app_protection_profiles").kind, ToolKind::Read);
        assert_eq!(find("zpa_get_enrollment_certificate").kind, ToolKind::Read);
        assert_eq!(find("zpa_list_segments_by_type").kind, ToolKind::Read);
    }

    #[test]
    fn access_rule_body_expands_group_ids_into_references() {
        let body = access_rule_body(
            "allow-crm".to_string(),
            "ALLOW".to_string(),
            None,
            Some(StringList::Items(vec!["11".to_string(), "12".to_string()])),
            None,
            Some(json!([{ "operator": "AND" }])),
            Some("mt-1".to_string()),
        )
        .unwrap();

        assert_eq!(body["action"], "ALLOW");
        assert_eq!(body["appConnectorGroups"], json!([{ "id": "11" }, { "id": "12" }]));
        assert_eq!(body["appServerGroups"], json!([]));
        assert_eq!(body["microtenantId"], "mt-1");
    }

    #[test]
    fn isolate_action_requires_a_profile_id() {
        let error = isolation_rule_body(
            "isolate-contractors".to_string(),
            "isolate".to_string(),
            None,
            None,
            None,
            None,
            None,
        )
        .unwrap_err();
        assert!(matches!(
            error,
            ToolError::MalformedInput { ref field, .. } if field == "zpn_isolation_profile_id"
        ));

        let body = isolation_rule_body(
            "isolate-contractors".to_string(),
            "isolate".to_string(),
            Some("profile-9".to_string()),
            None,
            None,
            None,
            None,
        )
        .unwrap();
        assert_eq!(body["zpnIsolationProfileId"], "profile-9");
    }

    #[test]
    fn rows_reads_wrapped_and_bare_lists() {
        let wrapped = json!({ "list": [{ "id": "1" }] });
        assert_eq!(rows(&wrapped).len(), 1);
        let bare = json!([{ "id": "1" }, { "id": "2" }]);
        assert_eq!(rows(&bare).len(), 2);
        assert!(rows(&json!({})).is_empty());
    }
}
