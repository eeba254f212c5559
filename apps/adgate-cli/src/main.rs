//! adgate CLI - Active Directory account and group management
//!
//! Reads `LDAP_*` settings from the environment (or a `.env` file), runs one
//! directory operation and prints the result as JSON.

use clap::{Parser, Subcommand};

mod commands;
mod error;
mod logging;

use error::CliResult;
use logging::LogFormat;

/// adgate CLI - Directory account and group management
#[derive(Parser)]
#[command(name = "adgate")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Log output format (written to stderr)
    #[arg(long, global = true, value_enum, default_value = "json")]
    log_format: LogFormat,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the directory is reachable and the bind succeeds
    Health(commands::health::HealthArgs),

    /// Check whether an account name is free
    Availability(commands::availability::AvailabilityArgs),

    /// Manage user accounts
    User(commands::user::UserArgs),

    /// Manage groups and their members
    Group(commands::group::GroupArgs),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init_logging(&cli.log_level, cli.log_format);

    match run(cli.command).await {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            tracing::debug!(error = ?e, "Command failed");
            e.print();
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(command: Commands) -> CliResult<()> {
    match command {
        Commands::Health(args) => commands::health::execute(args).await,
        Commands::Availability(args) => commands::availability::execute(args).await,
        Commands::User(args) => commands::user::execute(args).await,
        Commands::Group(args) => commands::group::execute(args).await,
    }
}
