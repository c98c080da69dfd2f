use clap::Args;

use crate::commands::CommandResult;
use sentra_core::config::{AppConfig, LoadOptions};
use sentra_core::tenant::{TenantCredential, TenantSummary};
use sentra_db::{connect_with_settings, migrations, DbPool, SqlTenantRepository, TenantRepository};

#[derive(Debug, Args)]
pub struct UpsertArgs {
    #[arg(help = "Tenant name, the directory key")]
    pub name: String,
    #[arg(long, help = "OAuth client id")]
    pub client_id: Option<String>,
    #[arg(long, help = "OAuth client secret")]
    pub client_secret: Option<String>,
    #[arg(long, help = "Identity vanity domain, e.g. acme for acme.zslogin.net")]
    pub vanity_domain: Option<String>,
    #[arg(long, help = "ZPA customer id (only needed for ZPA operations)")]
    pub customer_id: Option<String>,
    #[arg(long, help = "Mark the record as a test tenant")]
    pub test_tenant: bool,
}

pub fn upsert(args: UpsertArgs) -> CommandResult {
    with_repository("tenant upsert", move |repository| async move {
        let record = TenantCredential {
            name: args.name,
            client_id: args.client_id,
            client_secret: args.client_secret.map(Into::into),
            vanity_domain: args.vanity_domain,
            customer_id: args.customer_id,
            test_tenant: args.test_tenant,
        };
        let stored = repository
            .upsert(record)
            .await
            .map_err(|error| ("storage", error.to_string(), 4u8))?;
        let complete = if stored.is_complete() { "complete" } else { "incomplete" };
        Ok(format!("stored tenant `{}` ({} credential set)", stored.name, complete))
    })
}

pub fn list() -> CommandResult {
    with_repository("tenant list", |repository| async move {
        let records = repository.list().await.map_err(|error| ("storage", error.to_string(), 4u8))?;
        let summaries: Vec<TenantSummary> = records.iter().map(Into::into).collect();
        serde_json::to_string_pretty(&summaries)
            .map_err(|error| ("serialization", error.to_string(), 5u8))
    })
}

pub fn remove(name: &str) -> CommandResult {
    let name = name.to_string();
    with_repository("tenant remove", move |repository| async move {
        let deleted =
            repository.delete(&name).await.map_err(|error| ("storage", error.to_string(), 4u8))?;
        if !deleted {
            return Err(("not_found", format!("no tenant named `{name}`"), 6u8));
        }
        Ok(format!("removed tenant `{name}`"))
    })
}

type CommandFailure = (&'static str, String, u8);

/// Shared scaffolding: config, runtime, pool, migrations, then the
/// repository operation.
fn with_repository<F, Fut>(command: &str, operation: F) -> CommandResult
where
    F: FnOnce(SqlTenantRepository) -> Fut,
    Fut: std::future::Future<Output = Result<String, CommandFailure>>,
{
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                command,
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
                command,
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let result = runtime.block_on(async {
        let pool = open_pool(&config).await?;
        let outcome = operation(SqlTenantRepository::new(pool.clone())).await;
        pool.close().await;
        outcome
    });

    match result {
        Ok(message) => CommandResult::success(command, message),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure(command, error_class, message, exit_code)
        }
    }
}

async fn open_pool(config: &AppConfig) -> Result<DbPool, CommandFailure> {
    let pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
    migrations::run_pending(&pool)
        .await
        .map_err(|error| ("migration", error.to_string(), 5u8))?;
    Ok(pool)
}
