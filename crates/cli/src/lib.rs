pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "devisio",
    about = "Devisio operator CLI",
    long_about = "Operate Devisio migrations, catalog seeding, reminder sweeps, config inspection, and readiness checks.",
    after_help = "Examples:\n  devisio migrate\n  devisio seed\n  devisio remind --window-days 7\n  devisio doctor --json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate {
        #[arg(
            long,
            value_name = "VERSION",
            help = "Revert migrations down to this version instead of applying"
        )]
        revert: Option<i64>,
    },
    #[command(about = "Load the starter catalog fixtures and verify they are queryable")]
    Seed,
    #[command(about = "Expire overdue quotes and email reminders for quotes expiring soon")]
    Remind {
        #[arg(
            long,
            value_name = "DAYS",
            help = "Look-ahead window in days, defaults to quotes.reminder_window_days"
        )]
        window_days: Option<u32>,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config {
        #[arg(long, value_name = "PATH", help = "Read this TOML file instead of the discovered one")]
        file: Option<PathBuf>,
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(
        about = "Validate config, database connectivity, schema currency, and delivery readiness"
    )]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate { revert } => commands::migrate::run(revert),
        Command::Seed => commands::seed::run(),
        Command::Remind { window_days } => commands::remind::run(window_days),
        Command::Config { file, json } => commands::CommandResult {
            exit_code: 0,
            output: commands::config::run(file.as_deref(), json),
        },
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
