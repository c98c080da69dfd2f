use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use sentra_core::config::{AppConfig, LoadOptions, LogFormat};
use sentra_db::repositories::SqlTenantRepository;
use sentra_mcp::catalog::{CatalogBuilder, RegistrationPolicy, ToolContext};
use sentra_mcp::server::DispatchServer;
use sentra_mcp::services;
use sentra_platform::ClientFactory;

#[derive(Debug, Parser)]
#[command(name = "sentra-mcp", about = "MCP server for operating Zscaler tenants", version)]
struct Args {
    /// Transport to serve on. Only stdio is supported by this build.
    #[arg(long, short = 't', value_enum, default_value_t = Transport::Stdio)]
    transport: Transport,

    /// Comma-separated service modules to enable (default: all).
    #[arg(long, short = 's', value_delimiter = ',')]
    services: Vec<String>,

    /// Comma-separated tool names to enable (default: all admitted tools).
    #[arg(long, value_delimiter = ',')]
    tools: Vec<String>,

    /// Register write tools. Off by default; the catalog is read-only.
    #[arg(long)]
    enable_write_tools: bool,

    /// Restrict registered write tools to this comma-separated allow-list.
    #[arg(long, value_delimiter = ',')]
    write_tools: Option<Vec<String>>,

    /// Verbose logging.
    #[arg(long, short = 'd')]
    debug: bool,

    /// Bind host for network transports. Parsed for compatibility.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Bind port for network transports. Parsed for compatibility.
    #[arg(long, short = 'p', default_value_t = 8000)]
    port: u16,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Transport {
    Stdio,
    Sse,
    StreamableHttp,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = AppConfig::load(LoadOptions::default())?;
    init_tracing(&config, args.debug);

    if !matches!(args.transport, Transport::Stdio) {
        anyhow::bail!(
            "transport {:?} is not supported by this build; use --transport stdio",
            args.transport
        );
    }

    let modules = services::select(&args.services)?;
    validate_tool_selection(&args.tools, &modules)?;

    let pool = sentra_db::connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .with_context(|| format!("could not open database at `{}`", config.database.url))?;
    sentra_db::migrations::run_pending(&pool).await.context("database migration failed")?;

    let context = Arc::new(ToolContext {
        directory: Arc::new(SqlTenantRepository::new(pool)),
        factory: Arc::new(ClientFactory::new(&config.zscaler)),
    });

    let policy = RegistrationPolicy {
        enabled_tools: args.tools.into_iter().collect(),
        enable_write_tools: args.enable_write_tools,
        write_tools: args.write_tools.map(|list| list.into_iter().collect()),
    };

    let mut builder = CatalogBuilder::new(context, policy);
    for module in &modules {
        builder.register_module(module.as_ref());
    }
    let catalog = builder.build();

    DispatchServer::new(catalog).run_stdio().await
}

/// Unknown `--tools` names are a launch error, not a silently empty catalog.
fn validate_tool_selection(
    requested: &[String],
    modules: &[Box<dyn services::ServiceModule>],
) -> anyhow::Result<()> {
    if requested.is_empty() {
        return Ok(());
    }

    let mut known: HashSet<&'static str> = HashSet::new();
    for module in modules {
        if let Ok(descriptors) = module.descriptors() {
            known.extend(descriptors.iter().map(|descriptor| descriptor.name));
        }
    }

    let invalid: Vec<&str> = requested
        .iter()
        .map(String::as_str)
        .filter(|name| !known.contains(name))
        .collect();
    if !invalid.is_empty() {
        anyhow::bail!(
            "invalid tools: {}. Run with no --tools flag to register everything",
            invalid.join(", ")
        );
    }
    Ok(())
}

/// Logs go to stderr; stdout belongs to the protocol stream.
fn init_tracing(config: &AppConfig, debug: bool) {
    let default_level = if debug { "debug" } else { config.logging.level.as_str() };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);
    match config.logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.pretty().init(),
        LogFormat::Compact => builder.compact().init(),
    }
}
