pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

use commands::config::OutputFormat;

#[derive(Debug, Parser)]
#[command(
    name = "readycheck",
    about = "Readycheck operator CLI",
    long_about = "Inspect effective configuration, try availability expressions against the \
                  parser, and check runtime readiness.",
    after_help = "Examples:\n  readycheck config show --check\n  readycheck parse \"until 10pm\"\n  readycheck doctor --json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Inspect effective configuration")]
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    #[command(about = "Resolve an availability expression the way the bot would")]
    Parse {
        #[arg(required = true, help = "Expression, e.g. \"6-12\" or \"until 10pm\"")]
        expression: Vec<String>,
        #[arg(long, value_name = "RFC3339", help = "Resolve against this instant instead of now")]
        now: Option<String>,
    },
    #[command(about = "Validate config file presence, token readiness, and timezone offset")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    #[command(about = "Show effective values with source attribution and redaction")]
    Show {
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
        #[arg(long, help = "Validate only, exiting non-zero when the configuration is broken")]
        check: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config { action: ConfigAction::Show { format, check } } => {
            commands::config::run(format, check)
        }
        Command::Parse { expression, now } => {
            commands::parse::run(&expression.join(" "), now.as_deref())
        }
        Command::Doctor { json } => commands::doctor::run(json),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
