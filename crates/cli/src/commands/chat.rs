use std::io::{self, BufRead, Write};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::commands::CommandResult;
use sentra_agent::{
    AgentRuntime, InMemorySessionStore, OpenAiChatModel, ToolExecutor, ToolSchema,
};
use sentra_core::config::{AppConfig, LoadOptions};
use sentra_db::{connect_with_settings, migrations, SqlTenantRepository};
use sentra_mcp::catalog::{Catalog, CatalogBuilder, RegistrationPolicy, ToolContext};
use sentra_mcp::services;
use sentra_platform::ClientFactory;

/// In-process bridge from the agent loop to the tool catalog. The same
/// catalog the MCP server exposes backs the local chat session, so both
/// paths share filtering and the confirmation gate.
struct CatalogExecutor {
    catalog: Catalog,
}

#[async_trait]
impl ToolExecutor for CatalogExecutor {
    fn schemas(&self) -> Vec<ToolSchema> {
        self.catalog
            .tools()
            .map(|tool| ToolSchema {
                name: tool.descriptor.name.to_string(),
                description: tool.descriptor.description.to_string(),
                parameters: tool.descriptor.schema.clone(),
            })
            .collect()
    }

    async fn call(&self, name: &str, arguments: Value) -> anyhow::Result<String> {
        let value = self.catalog.call(name, arguments).await?;
        Ok(serde_json::to_string_pretty(&value)?)
    }
}

pub fn run(thread: &str, enable_write_tools: bool) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "chat",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match crate::commands::block_on_runtime() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "chat",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let agent = match runtime.block_on(build_agent(&config, enable_write_tools)) {
        Ok(agent) => agent,
        Err((error_class, message, exit_code)) => {
            return CommandResult::failure("chat", error_class, message, exit_code);
        }
    };

    println!("sentra chat (thread `{thread}`). Type `exit` to leave.");
    let stdin = io::stdin();
    loop {
        print!("you> ");
        let _ = io::stdout().flush();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(error) => {
                return CommandResult::failure("chat", "stdin", error.to_string(), 4);
            }
        }

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "exit" || line == "quit" {
            break;
        }

        match runtime.block_on(agent.submit(thread, line)) {
            Ok(answer) => println!("{answer}"),
            Err(error) => eprintln!("error: {error:#}"),
        }
    }

    CommandResult::success("chat", "session ended")
}

type BuildFailure = (&'static str, String, u8);

async fn build_agent(
    config: &AppConfig,
    enable_write_tools: bool,
) -> Result<AgentRuntime, BuildFailure> {
    let pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
    migrations::run_pending(&pool).await.map_err(|error| ("migration", error.to_string(), 5u8))?;

    let context = Arc::new(ToolContext {
        directory: Arc::new(SqlTenantRepository::new(pool)),
        factory: Arc::new(ClientFactory::new(&config.zscaler)),
    });

    let policy = RegistrationPolicy { enable_write_tools, ..Default::default() };
    let mut builder = CatalogBuilder::new(context, policy);
    for module in services::all() {
        builder.register_module(module.as_ref());
    }

    let model = OpenAiChatModel::from_config(&config.llm)
        .map_err(|error| ("llm_init", error.to_string(), 6u8))?;

    Ok(AgentRuntime::new(
        Arc::new(model),
        Arc::new(CatalogExecutor { catalog: builder.build() }),
        Arc::new(InMemorySessionStore::new()),
    ))
}
