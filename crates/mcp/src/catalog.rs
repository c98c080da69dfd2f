use std::collections::HashMap;
use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use rmcp::schemars::{self, JsonSchema};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, info};

use sentra_core::{ConfirmationGate, ToolError};
use sentra_db::repositories::TenantRepository;
use sentra_platform::ClientFactory;

use crate::services::ServiceModule;

/// Name of the built-in phase-2 tool the confirmation gate routes through.
pub const CONFIRM_ACTION: &str = "confirm_action";

/// Shared state every tool handler runs against.
pub struct ToolContext {
    pub directory: Arc<dyn TenantRepository>,
    pub factory: Arc<ClientFactory>,
}

/// Read tools only observe remote state; write tools mutate it. The
/// registration policy keys off this split, and destructive writes
/// additionally pass through the confirmation gate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToolKind {
    Read,
    Write,
}

pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Value, ToolError>> + Send>>;
type Handler = Arc<dyn Fn(Arc<ToolContext>, Value) -> HandlerFuture + Send + Sync>;
type ResourceHandler = Arc<dyn Fn(Arc<ToolContext>) -> HandlerFuture + Send + Sync>;

/// One registrable tool: metadata the protocol advertises plus the typed
/// handler behind it. The input type's JSON schema is captured at
/// construction so the wire catalog always matches what the handler accepts.
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub kind: ToolKind,
    pub destructive: bool,
    pub schema: Value,
    handler: Handler,
}

impl ToolDescriptor {
    pub fn read<I, F, Fut>(name: &'static str, description: &'static str, run: F) -> Self
    where
        I: DeserializeOwned + JsonSchema + Send + 'static,
        F: Fn(Arc<ToolContext>, I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ToolError>> + Send + 'static,
    {
        Self::with_kind(name, description, ToolKind::Read, false, run)
    }

    pub fn write<I, F, Fut>(name: &'static str, description: &'static str, run: F) -> Self
    where
        I: DeserializeOwned + JsonSchema + Send + 'static,
        F: Fn(Arc<ToolContext>, I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ToolError>> + Send + 'static,
    {
        Self::with_kind(name, description, ToolKind::Write, false, run)
    }

    /// A write that cannot be undone. Calling it yields a pending action
    /// instead of executing; only `confirm_action` runs the handler.
    pub fn destructive<I, F, Fut>(name: &'static str, description: &'static str, run: F) -> Self
    where
        I: DeserializeOwned + JsonSchema + Send + 'static,
        F: Fn(Arc<ToolContext>, I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ToolError>> + Send + 'static,
    {
        Self::with_kind(name, description, ToolKind::Write, true, run)
    }

    fn with_kind<I, F, Fut>(
        name: &'static str,
        description: &'static str,
        kind: ToolKind,
        destructive: bool,
        run: F,
    ) -> Self
    where
        I: DeserializeOwned + JsonSchema + Send + 'static,
        F: Fn(Arc<ToolContext>, I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ToolError>> + Send + 'static,
    {
        let run = Arc::new(run);
        let handler: Handler = Arc::new(move |context, raw| {
            let run = Arc::clone(&run);
            Box::pin(async move {
                let input: I = serde_json::from_value(raw)
                    .map_err(|error| ToolError::malformed("arguments", error.to_string()))?;
                run(context, input).await
            })
        });
        let schema = serde_json::to_value(schemars::schema_for!(I))
            .unwrap_or_else(|_| json!({ "type": "object" }));
        Self { name, description, kind, destructive, schema, handler }
    }
}

/// Readable resource a service exposes alongside its tools.
pub struct ResourceDescriptor {
    pub uri: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    handler: ResourceHandler,
}

impl ResourceDescriptor {
    pub fn new<F, Fut>(
        uri: &'static str,
        name: &'static str,
        description: &'static str,
        read: F,
    ) -> Self
    where
        F: Fn(Arc<ToolContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ToolError>> + Send + 'static,
    {
        let handler: ResourceHandler =
            Arc::new(move |context| Box::pin(read(context)) as HandlerFuture);
        Self { uri, name, description, handler }
    }
}

/// Which tools from a service module actually get registered.
///
/// A tool is admitted unless the explicit tool list excludes it, or it is a
/// write tool while writes are disabled (or outside the write allow-list
/// when one was given). Filtering happens at registration; a filtered tool
/// is simply absent from the catalog, never present-but-refusing.
#[derive(Clone, Debug, Default)]
pub struct RegistrationPolicy {
    pub enabled_tools: HashSet<String>,
    pub enable_write_tools: bool,
    pub write_tools: Option<HashSet<String>>,
}

impl RegistrationPolicy {
    pub fn admits(&self, descriptor: &ToolDescriptor) -> bool {
        if !self.enabled_tools.is_empty() && !self.enabled_tools.contains(descriptor.name) {
            return false;
        }
        if descriptor.kind == ToolKind::Write {
            if !self.enable_write_tools {
                return false;
            }
            if let Some(allowed) = &self.write_tools {
                if !allowed.contains(descriptor.name) {
                    return false;
                }
            }
        }
        true
    }
}

pub struct RegisteredTool {
    pub service: &'static str,
    pub descriptor: ToolDescriptor,
}

/// The assembled tool catalog: every admitted tool plus the built-in
/// `confirm_action` pathway for destructive operations.
pub struct Catalog {
    context: Arc<ToolContext>,
    gate: ConfirmationGate,
    tools: Vec<RegisteredTool>,
    index: HashMap<&'static str, usize>,
    resources: Vec<ResourceDescriptor>,
    services: Vec<&'static str>,
}

pub struct CatalogBuilder {
    context: Arc<ToolContext>,
    gate: ConfirmationGate,
    policy: RegistrationPolicy,
    tools: Vec<RegisteredTool>,
    index: HashMap<&'static str, usize>,
    resources: Vec<ResourceDescriptor>,
    services: Vec<&'static str>,
}

impl CatalogBuilder {
    pub fn new(context: Arc<ToolContext>, policy: RegistrationPolicy) -> Self {
        Self {
            context,
            gate: ConfirmationGate::new(),
            policy,
            tools: Vec::new(),
            index: HashMap::new(),
            resources: Vec::new(),
            services: Vec::new(),
        }
    }

    /// Deterministic confirmation tokens for tests.
    pub fn with_gate(mut self, gate: ConfirmationGate) -> Self {
        self.gate = gate;
        self
    }

    /// Register one service's tools and resources. A failing module is
    /// logged and skipped; the rest of the catalog still comes up.
    pub fn register_module(&mut self, module: &dyn ServiceModule) {
        let service = module.name();
        let descriptors = match module.descriptors() {
            Ok(descriptors) => descriptors,
            Err(cause) => {
                error!(service, %cause, "service failed to produce its tools; skipping it");
                return;
            }
        };

        let mut admitted = 0usize;
        let mut filtered = 0usize;
        for descriptor in descriptors {
            if !self.policy.admits(&descriptor) {
                debug!(service, tool = descriptor.name, "tool filtered out by registration policy");
                filtered += 1;
                continue;
            }
            // A name can only dispatch to one handler; keep the first
            // registration and drop the shadowed one.
            if self.index.contains_key(descriptor.name) {
                error!(
                    service,
                    tool = descriptor.name,
                    "tool name already registered; dropping the duplicate"
                );
                continue;
            }
            admitted += 1;
            self.index.insert(descriptor.name, self.tools.len());
            self.tools.push(RegisteredTool { service, descriptor });
        }
        self.resources.extend(module.resources());
        if admitted > 0 {
            self.services.push(service);
        }
        info!(service, admitted, filtered, "registered service");
    }

    pub fn build(mut self) -> Catalog {
        if self.tools.iter().any(|tool| tool.descriptor.destructive) {
            let descriptor = ToolDescriptor::read::<ConfirmActionInput, _, _>(
                CONFIRM_ACTION,
                "Execute a previously requested destructive operation. Pass the same tool \
                 name and arguments from the pending action, plus its resume_token.",
                |_context, _input| async {
                    Err(ToolError::Internal("confirm_action is dispatched by the catalog".into()))
                },
            );
            self.index.insert(CONFIRM_ACTION, self.tools.len());
            self.tools.push(RegisteredTool { service: "builtin", descriptor });
        }

        let services = self.services.clone();
        self.resources.push(ResourceDescriptor::new(
            "sentra://services",
            "Enabled services",
            "Names of the service modules whose tools are registered",
            move |_context| {
                let services = services.clone();
                async move { Ok(json!({ "services": services })) }
            },
        ));

        Catalog {
            context: self.context,
            gate: self.gate,
            tools: self.tools,
            index: self.index,
            resources: self.resources,
            services: self.services,
        }
    }
}

/// Phase-2 payload: the pending action echoed back with its token.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ConfirmActionInput {
    /// Tool name from the pending action.
    pub tool: String,
    /// The exact arguments from the pending action.
    pub arguments: Value,
    /// Resume token issued with the pending action.
    pub resume_token: String,
}

impl Catalog {
    pub fn tools(&self) -> impl Iterator<Item = &RegisteredTool> {
        self.tools.iter()
    }

    pub fn resources(&self) -> impl Iterator<Item = &ResourceDescriptor> {
        self.resources.iter()
    }

    pub fn services(&self) -> &[&'static str] {
        &self.services
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Dispatch one tool call.
    ///
    /// Destructive tools short-circuit into a pending action; their handler
    /// only runs when the call arrives back through `confirm_action` with a
    /// token that matches the tool name and arguments exactly.
    pub async fn call(&self, name: &str, arguments: Value) -> Result<Value, ToolError> {
        if name == CONFIRM_ACTION {
            return self.confirm(arguments).await;
        }

        let tool = self.lookup(name)?;
        if tool.descriptor.destructive {
            debug!(tool = name, "destructive call held for confirmation");
            let pending = self.gate.pending(name, &arguments);
            return serde_json::to_value(pending)
                .map_err(|error| ToolError::Internal(error.to_string()));
        }
        (tool.descriptor.handler)(Arc::clone(&self.context), arguments).await
    }

    async fn confirm(&self, arguments: Value) -> Result<Value, ToolError> {
        let input: ConfirmActionInput = serde_json::from_value(arguments)
            .map_err(|error| ToolError::malformed("arguments", error.to_string()))?;

        let tool = self.lookup(&input.tool)?;
        if !tool.descriptor.destructive {
            return Err(ToolError::malformed(
                "tool",
                format!("`{}` does not require confirmation; call it directly", input.tool),
            ));
        }
        if !self.gate.verify(&input.tool, &input.arguments, &input.resume_token) {
            return Err(ToolError::malformed(
                "resume_token",
                "token does not match this tool and argument set; resubmit the original \
                 call to obtain a fresh pending action",
            ));
        }

        info!(tool = %input.tool, "confirmed destructive call executing");
        (tool.descriptor.handler)(Arc::clone(&self.context), input.arguments).await
    }

    pub async fn read_resource(&self, uri: &str) -> Result<Value, ToolError> {
        let resource = self
            .resources
            .iter()
            .find(|resource| resource.uri == uri)
            .ok_or_else(|| ToolError::Unregistered(uri.to_string()))?;
        (resource.handler)(Arc::clone(&self.context)).await
    }

    fn lookup(&self, name: &str) -> Result<&RegisteredTool, ToolError> {
        self.index
            .get(name)
            .map(|position| &self.tools[*position])
            .ok_or_else(|| ToolError::Unregistered(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{RegistrationPolicy, ToolDescriptor};

    fn read_tool(name: &'static str) -> ToolDescriptor {
        ToolDescriptor::read::<serde_json::Value, _, _>(name, "a read", |_context, _input| async {
            Ok(json!("ok"))
        })
    }

    fn write_tool(name: &'static str) -> ToolDescriptor {
        ToolDescriptor::write::<serde_json::Value, _, _>(name, "a write", |_context, _input| {
            async { Ok(json!("ok")) }
        })
    }

    fn policy(
        enabled: &[&str],
        enable_writes: bool,
        write_allow: Option<&[&str]>,
    ) -> RegistrationPolicy {
        RegistrationPolicy {
            enabled_tools: enabled.iter().map(|s| s.to_string()).collect(),
            enable_write_tools: enable_writes,
            write_tools: write_allow.map(|list| list.iter().map(|s| s.to_string()).collect()),
        }
    }

    #[test]
    fn default_policy_admits_reads_and_blocks_writes() {
        let policy = RegistrationPolicy::default();
        assert!(policy.admits(&read_tool("list_devices")));
        assert!(!policy.admits(&write_tool("delete_group")));
    }

    #[test]
    fn explicit_tool_list_excludes_everything_else() {
        let policy = policy(&["list_devices"], false, None);
        assert!(policy.admits(&read_tool("list_devices")));
        assert!(!policy.admits(&read_tool("list_apps")));
    }

    #[test]
    fn write_switch_without_allow_list_admits_all_writes() {
        let policy = policy(&[], true, None);
        assert!(policy.admits(&write_tool("delete_group")));
    }

    #[test]
    fn write_allow_list_narrows_the_switch() {
        let policy = policy(&[], true, Some(&["create_group"]));
        assert!(policy.admits(&write_tool("create_group")));
        assert!(!policy.admits(&write_tool("delete_group")));
    }

    #[test]
    fn write_allow_list_without_the_switch_admits_nothing_writable() {
        let policy = policy(&[], false, Some(&["delete_group"]));
        assert!(!policy.admits(&write_tool("delete_group")));
        assert!(policy.admits(&read_tool("list_devices")));
    }

    #[test]
    fn descriptor_captures_a_schema_object() {
        let tool = read_tool("list_devices");
        assert!(tool.schema.is_object());
    }
}
