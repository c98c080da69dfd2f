//! End-to-end catalog behavior: registration filtering, dispatch, and the
//! destructive-operation confirmation protocol, exercised against a real
//! in-memory tenant directory.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::{json, Value};

use sentra_core::tenant::TenantCredential;
use sentra_core::{ConfirmationGate, ToolError};
use sentra_db::repositories::{SqlTenantRepository, TenantRepository};
use sentra_mcp::catalog::{
    Catalog, CatalogBuilder, RegistrationPolicy, ToolContext, ToolDescriptor, CONFIRM_ACTION,
};
use sentra_mcp::services::{self, ServiceModule, TenantService};
use sentra_platform::ClientFactory;

async fn context() -> Arc<ToolContext> {
    let pool = sentra_db::connect_with_settings("sqlite::memory:", 1, 5).await.unwrap();
    sentra_db::migrations::run_pending(&pool).await.unwrap();
    Arc::new(ToolContext {
        directory: Arc::new(SqlTenantRepository::new(pool)),
        factory: Arc::new(ClientFactory::new(&Default::default())),
    })
}

/// Service with one destructive tool that counts its executions, so tests
/// can prove a gated mutation ran exactly once (or not at all).
#[derive(Debug)]
struct CountingService {
    executions: Arc<AtomicUsize>,
}

impl ServiceModule for CountingService {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn descriptors(&self) -> anyhow::Result<Vec<ToolDescriptor>> {
        let executions = Arc::clone(&self.executions);
        Ok(vec![
            ToolDescriptor::read::<Value, _, _>("counting_list", "List things.", |_context, _input| async {
                Ok(json!([]))
            }),
            ToolDescriptor::destructive::<Value, _, _>(
                "counting_delete",
                "Delete a thing.",
                move |_context, _input| {
                    let executions = Arc::clone(&executions);
                    async move {
                        executions.fetch_add(1, Ordering::SeqCst);
                        Ok(json!({ "deleted": true }))
                    }
                },
            ),
        ])
    }
}

#[derive(Debug)]
struct BrokenService;

impl ServiceModule for BrokenService {
    fn name(&self) -> &'static str {
        "broken"
    }

    fn descriptors(&self) -> anyhow::Result<Vec<ToolDescriptor>> {
        anyhow::bail!("backing store is unreachable")
    }
}

async fn counting_catalog(policy: RegistrationPolicy) -> (Catalog, Arc<AtomicUsize>) {
    let executions = Arc::new(AtomicUsize::new(0));
    let mut builder = CatalogBuilder::new(context().await, policy)
        .with_gate(ConfirmationGate::with_key([9u8; 32]));
    builder.register_module(&CountingService { executions: Arc::clone(&executions) });
    (builder.build(), executions)
}

fn writes_enabled() -> RegistrationPolicy {
    RegistrationPolicy { enable_write_tools: true, ..Default::default() }
}

#[tokio::test]
async fn default_policy_registers_a_read_only_catalog() {
    let mut builder = CatalogBuilder::new(context().await, RegistrationPolicy::default());
    builder.register_module(&TenantService);
    let catalog = builder.build();

    assert!(catalog.contains("list_tenants"));
    assert!(!catalog.contains("upsert_tenant"));
    assert!(!catalog.contains("delete_tenant"));
    // No destructive tool was admitted, so no confirmation pathway either.
    assert!(!catalog.contains(CONFIRM_ACTION));
}

#[tokio::test]
async fn write_switch_admits_mutations_and_the_confirm_pathway() {
    let mut builder = CatalogBuilder::new(context().await, writes_enabled());
    builder.register_module(&TenantService);
    let catalog = builder.build();

    assert!(catalog.contains("upsert_tenant"));
    assert!(catalog.contains("delete_tenant"));
    assert!(catalog.contains(CONFIRM_ACTION));
}

#[tokio::test]
async fn explicit_tool_list_filters_across_services() {
    let policy = RegistrationPolicy {
        enabled_tools: ["zcc_list_devices".to_string()].into_iter().collect(),
        ..Default::default()
    };
    let mut builder = CatalogBuilder::new(context().await, policy);
    for module in services::all() {
        builder.register_module(module.as_ref());
    }
    let catalog = builder.build();

    assert_eq!(catalog.len(), 1);
    assert!(catalog.contains("zcc_list_devices"));
}

#[tokio::test]
async fn failing_module_is_skipped_without_poisoning_the_catalog() {
    let mut builder = CatalogBuilder::new(context().await, RegistrationPolicy::default());
    builder.register_module(&BrokenService);
    builder.register_module(&TenantService);
    let catalog = builder.build();

    assert!(catalog.contains("list_tenants"));
    assert!(!catalog.services().contains(&"broken"));
}

#[tokio::test]
async fn unknown_tool_call_is_an_unregistered_error() {
    let (catalog, _) = counting_catalog(writes_enabled()).await;
    let error = catalog.call("counting_explode", json!({})).await.unwrap_err();
    assert!(matches!(error, ToolError::Unregistered(_)));
}

#[tokio::test]
async fn destructive_call_is_held_and_confirm_executes_exactly_once() {
    let (catalog, executions) = counting_catalog(writes_enabled()).await;
    let arguments = json!({ "thing_id": "42" });

    let pending = catalog.call("counting_delete", arguments.clone()).await.unwrap();
    assert_eq!(pending["status"], "confirmation_required");
    assert_eq!(pending["tool"], "counting_delete");
    assert_eq!(pending["arguments"], arguments);
    assert_eq!(executions.load(Ordering::SeqCst), 0, "held call must not execute");

    let result = catalog
        .call(
            CONFIRM_ACTION,
            json!({
                "tool": "counting_delete",
                "arguments": arguments,
                "resume_token": pending["resume_token"],
            }),
        )
        .await
        .unwrap();
    assert_eq!(result["deleted"], true);
    assert_eq!(executions.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn altered_arguments_fail_closed_at_confirmation() {
    let (catalog, executions) = counting_catalog(writes_enabled()).await;

    let pending = catalog.call("counting_delete", json!({ "thing_id": "42" })).await.unwrap();
    let error = catalog
        .call(
            CONFIRM_ACTION,
            json!({
                "tool": "counting_delete",
                "arguments": { "thing_id": "43" },
                "resume_token": pending["resume_token"],
            }),
        )
        .await
        .unwrap_err();

    assert!(matches!(error, ToolError::MalformedInput { .. }));
    assert_eq!(executions.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn confirming_a_non_destructive_tool_is_rejected() {
    let (catalog, _) = counting_catalog(writes_enabled()).await;
    let error = catalog
        .call(
            CONFIRM_ACTION,
            json!({ "tool": "counting_list", "arguments": {}, "resume_token": "x" }),
        )
        .await
        .unwrap_err();
    assert!(matches!(error, ToolError::MalformedInput { .. }));
}

#[tokio::test]
async fn tenant_tools_round_trip_through_the_directory() {
    let context = context().await;
    context
        .directory
        .upsert(TenantCredential {
            name: "Acme".to_string(),
            client_id: Some("id".to_string()),
            client_secret: Some("shh".to_string().into()),
            vanity_domain: Some("acme".to_string()),
            customer_id: None,
            test_tenant: true,
        })
        .await
        .unwrap();

    let mut builder = CatalogBuilder::new(context, RegistrationPolicy::default());
    builder.register_module(&TenantService);
    let catalog = builder.build();

    let listed = catalog.call("list_tenants", json!({})).await.unwrap();
    assert_eq!(listed[0]["name"], "Acme");
    assert_eq!(listed[0]["client_secret"], "[redacted]");

    let resource = catalog.read_resource("sentra://tenants").await.unwrap();
    assert_eq!(resource["tenants"][0]["name"], "Acme");
}

#[tokio::test]
async fn services_resource_lists_registered_modules() {
    let mut builder = CatalogBuilder::new(context().await, RegistrationPolicy::default());
    builder.register_module(&TenantService);
    let catalog = builder.build();

    let resource = catalog.read_resource("sentra://services").await.unwrap();
    assert_eq!(resource["services"], json!(["tenants"]));
}

/// Service whose only tool is a write, so the default read-only policy
/// filters the whole module away.
#[derive(Debug)]
struct WriteOnlyService;

impl ServiceModule for WriteOnlyService {
    fn name(&self) -> &'static str {
        "write-only"
    }

    fn descriptors(&self) -> anyhow::Result<Vec<ToolDescriptor>> {
        Ok(vec![ToolDescriptor::write::<Value, _, _>(
            "write_only_create",
            "Create a thing.",
            |_context, _input| async { Ok(json!({})) },
        )])
    }
}

#[tokio::test]
async fn fully_filtered_module_is_absent_from_the_services_resource() {
    let mut builder = CatalogBuilder::new(context().await, RegistrationPolicy::default());
    builder.register_module(&WriteOnlyService);
    builder.register_module(&TenantService);
    let catalog = builder.build();

    assert!(!catalog.services().contains(&"write-only"));
    let resource = catalog.read_resource("sentra://services").await.unwrap();
    assert_eq!(resource["services"], json!(["tenants"]));
}

/// Service that answers a tool name another module already claimed.
#[derive(Debug)]
struct ShadowingService;

impl ServiceModule for ShadowingService {
    fn name(&self) -> &'static str {
        "shadowing"
    }

    fn descriptors(&self) -> anyhow::Result<Vec<ToolDescriptor>> {
        Ok(vec![ToolDescriptor::read::<Value, _, _>(
            "counting_list",
            "List other things.",
            |_context, _input| async { Ok(json!("shadow")) },
        )])
    }
}

#[tokio::test]
async fn duplicate_tool_name_keeps_the_first_registration() {
    let executions = Arc::new(AtomicUsize::new(0));
    let mut builder = CatalogBuilder::new(context().await, writes_enabled())
        .with_gate(ConfirmationGate::with_key([9u8; 32]));
    builder.register_module(&CountingService { executions });
    builder.register_module(&ShadowingService);
    let catalog = builder.build();

    // One entry advertised, and it dispatches to the original handler.
    let advertised =
        catalog.tools().filter(|tool| tool.descriptor.name == "counting_list").count();
    assert_eq!(advertised, 1);
    let listed = catalog.call("counting_list", json!({})).await.unwrap();
    assert_eq!(listed, json!([]));
}

#[tokio::test]
async fn malformed_url_list_fails_before_credential_resolution() {
    let policy = writes_enabled();
    let mut builder = CatalogBuilder::new(context().await, policy);
    builder.register_module(&sentra_mcp::services::ZiaService);
    let catalog = builder.build();

    // No credentials exist anywhere, so reaching resolution would produce an
    // Auth error; a MalformedInput here proves the list is parsed first.
    let error = catalog
        .call("zia_add_malicious_urls", json!({ "urls": "definitely not a list" }))
        .await
        .unwrap_err();
    assert!(matches!(error, ToolError::MalformedInput { ref field, .. } if field == "urls"));
}

#[tokio::test]
async fn named_tenant_never_falls_back_to_environment_credentials() {
    let mut builder = CatalogBuilder::new(context().await, RegistrationPolicy::default());
    builder.register_module(&sentra_mcp::services::ZccService);
    let catalog = builder.build();

    let error = catalog
        .call("zcc_list_devices", json!({ "tenant_name": "ghost" }))
        .await
        .unwrap_err();
    assert!(matches!(error, ToolError::TenantNotFound { ref name } if name == "ghost"));
}
