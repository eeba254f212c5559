//! CLI error types and exit codes

use adgate_directory::{ConfigError, DirectoryError};
use thiserror::Error;

/// Exit codes for the CLI
/// - 0: Success
/// - 1: Configuration or local error
/// - 2: Authentication or authorization failure
/// - 3: Directory unreachable or timed out
/// - 4: Invalid request, missing or conflicting object
/// - 5: Directory operation failed
pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("{}", .0.public_message())]
    Directory(#[from] DirectoryError),

    #[error("Output error: {0}")]
    Output(#[from] serde_json::Error),
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_) | CliError::Output(_) => 1,
            CliError::Directory(e) => match e.status_code() {
                401 | 403 => 2,
                502 | 504 => 3,
                400..=499 => 4,
                _ => 5,
            },
        }
    }

    /// Print the error to stderr with appropriate formatting
    pub fn print(&self) {
        let use_color = std::env::var("NO_COLOR").is_err();

        if use_color {
            eprintln!("\x1b[31mError:\x1b[0m {}", self);
        } else {
            eprintln!("Error: {}", self);
        }

        if let Some(suggestion) = self.suggestion() {
            if use_color {
                eprintln!("\n\x1b[33mSuggestion:\x1b[0m {}", suggestion);
            } else {
                eprintln!("\nSuggestion: {}", suggestion);
            }
        }
    }

    fn suggestion(&self) -> Option<&'static str> {
        match self {
            CliError::Config(ConfigError::MissingVar(_)) => {
                Some("Set the LDAP_* variables in the environment or in a .env file.")
            }
            CliError::Directory(DirectoryError::AuthenticationFailed) => {
                Some("Check LDAP_USERNAME and LDAP_PASSWORD.")
            }
            CliError::Directory(DirectoryError::ConnectionFailed { .. }) => {
                Some("Check LDAP_HOST, LDAP_PORT and the TLS settings.")
            }
            _ => None,
        }
    }
}
