pub mod commands;

use clap::{Args, Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "sentra",
    about = "Sentra operator CLI",
    long_about = "Operate the Sentra tenant directory, migrations, config inspection, \
                  readiness checks, and the interactive chat agent.",
    after_help = "Examples:\n  sentra tenant upsert Acme --client-id ... --client-secret ... --vanity-domain acme\n  sentra tenant list\n  sentra doctor --json\n  sentra chat --enable-write-tools"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(subcommand, about = "Manage tenant credential records")]
    Tenant(TenantCommand),
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, credential readiness, and DB connectivity checks")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Chat with the agent over the local tool catalog")]
    Chat(ChatArgs),
}

#[derive(Debug, Subcommand)]
enum TenantCommand {
    #[command(about = "Create or replace a tenant record (the whole record is replaced)")]
    Upsert(commands::tenant::UpsertArgs),
    #[command(about = "List tenant records with secrets redacted")]
    List,
    #[command(about = "Remove a tenant record")]
    Remove {
        #[arg(help = "Name of the tenant record to remove")]
        name: String,
    },
}

#[derive(Debug, Args)]
pub struct ChatArgs {
    #[arg(long, default_value = "default", help = "Conversation thread id")]
    thread: String,
    #[arg(long, help = "Register write tools in the agent's catalog")]
    enable_write_tools: bool,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Tenant(TenantCommand::Upsert(args)) => commands::tenant::upsert(args),
        Command::Tenant(TenantCommand::List) => commands::tenant::list(),
        Command::Tenant(TenantCommand::Remove { name }) => commands::tenant::remove(&name),
        Command::Migrate => commands::migrate::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Chat(args) => commands::chat::run(&args.thread, args.enable_write_tools),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
