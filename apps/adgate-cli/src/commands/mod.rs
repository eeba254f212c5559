//! Subcommand implementations

pub mod availability;
pub mod group;
pub mod health;
pub mod user;

use adgate_directory::{DirectoryConfig, LdapDirectoryService};
use serde::Serialize;

use crate::error::CliResult;

/// Load configuration from the environment and build the service.
pub(crate) fn connect() -> CliResult<LdapDirectoryService> {
    let config = DirectoryConfig::from_env()?;
    tracing::debug!(url = %config.url(), base_dn = %config.base_dn, "Directory configuration loaded");
    Ok(LdapDirectoryService::from_config(&config)?)
}

pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Empty strings mean "use the configured root".
pub(crate) fn search_base(base: &Option<String>) -> Option<&str> {
    base.as_deref().filter(|b| !b.trim().is_empty())
}
