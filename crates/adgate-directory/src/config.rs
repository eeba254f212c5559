//! Directory connection configuration
//!
//! Loaded once at process start, either deserialized or from `LDAP_*`
//! environment variables, and validated before the pool is built.

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),

    #[error("Invalid value for {var}: {message}")]
    InvalidValue { var: String, message: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Names that can never be claimed as an account or proxy address.
pub const RESERVED_NAMES: [&str; 6] = [
    "service",
    "network service",
    "local service",
    "local system",
    "network",
    "local",
];

/// Configuration for one Active Directory endpoint.
#[derive(Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// Domain controller hostname or IP address.
    pub host: String,

    /// Port (636 for LDAPS, 389 for plain LDAP/STARTTLS).
    #[serde(default = "default_port")]
    pub port: u16,

    /// Connect with `ldaps://`.
    #[serde(default = "default_true")]
    pub use_ssl: bool,

    /// Upgrade a plain connection with STARTTLS.
    #[serde(default)]
    pub use_starttls: bool,

    /// Verify the server certificate chain.
    #[serde(default = "default_true")]
    pub verify_certificate: bool,

    /// Service account used for every pooled bind.
    pub bind_dn: String,

    #[serde(default, skip_serializing)]
    pub bind_password: String,

    /// Root of all searches (e.g. "DC=corp,DC=local").
    pub base_dn: String,

    /// Primary account domain, used for `userPrincipalName`.
    pub domain: String,

    /// Accepted account domains / mail zones. Empty means `[domain]`.
    #[serde(default)]
    pub zones: Vec<String>,

    /// Maximum number of pooled connections.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    /// How long `acquire` waits for an idle connection.
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,

    #[serde(default = "default_connection_timeout")]
    pub connection_timeout_secs: u64,

    /// Deadline applied to each protocol call.
    #[serde(default = "default_operation_timeout")]
    pub operation_timeout_secs: u64,

    /// Values per ranged `member` request.
    #[serde(default = "default_member_page_size")]
    pub member_page_size: u32,

    #[serde(default = "default_reserved_names")]
    pub reserved_names: Vec<String>,

    /// Description given to groups created without one.
    #[serde(default = "default_group_description")]
    pub default_group_description: String,
}

impl std::fmt::Debug for DirectoryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("use_ssl", &self.use_ssl)
            .field("use_starttls", &self.use_starttls)
            .field("verify_certificate", &self.verify_certificate)
            .field("bind_dn", &self.bind_dn)
            .field("bind_password", &"***REDACTED***")
            .field("base_dn", &self.base_dn)
            .field("domain", &self.domain)
            .field("zones", &self.zones)
            .field("pool_size", &self.pool_size)
            .field("acquire_timeout_secs", &self.acquire_timeout_secs)
            .field("connection_timeout_secs", &self.connection_timeout_secs)
            .field("operation_timeout_secs", &self.operation_timeout_secs)
            .field("member_page_size", &self.member_page_size)
            .field("reserved_names", &self.reserved_names)
            .field("default_group_description", &self.default_group_description)
            .finish()
    }
}

fn default_port() -> u16 {
    636
}

fn default_true() -> bool {
    true
}

fn default_pool_size() -> usize {
    10
}

fn default_acquire_timeout() -> u64 {
    5
}

fn default_connection_timeout() -> u64 {
    30
}

fn default_operation_timeout() -> u64 {
    60
}

fn default_member_page_size() -> u32 {
    1500
}

fn default_reserved_names() -> Vec<String> {
    RESERVED_NAMES.iter().map(|name| name.to_string()).collect()
}

fn default_group_description() -> String {
    "同步自ldap微服务".to_string()
}

impl DirectoryConfig {
    /// Create a config with required fields and defaults for everything else.
    pub fn new(
        host: impl Into<String>,
        base_dn: impl Into<String>,
        bind_dn: impl Into<String>,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port: default_port(),
            use_ssl: true,
            use_starttls: false,
            verify_certificate: true,
            bind_dn: bind_dn.into(),
            bind_password: String::new(),
            base_dn: base_dn.into(),
            domain: domain.into(),
            zones: Vec::new(),
            pool_size: default_pool_size(),
            acquire_timeout_secs: default_acquire_timeout(),
            connection_timeout_secs: default_connection_timeout(),
            operation_timeout_secs: default_operation_timeout(),
            member_page_size: default_member_page_size(),
            reserved_names: default_reserved_names(),
            default_group_description: default_group_description(),
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.bind_password = password.into();
        self
    }

    pub fn with_zones<I, S>(mut self, zones: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.zones = zones.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    #[must_use]
    pub fn with_member_page_size(mut self, page_size: u32) -> Self {
        self.member_page_size = page_size;
        self
    }

    /// Plain LDAP on port 389, upgraded with STARTTLS.
    #[must_use]
    pub fn with_starttls(mut self) -> Self {
        self.use_ssl = false;
        self.use_starttls = true;
        self.port = 389;
        self
    }

    /// Get the LDAP URL.
    #[must_use]
    pub fn url(&self) -> String {
        let scheme = if self.use_ssl { "ldaps" } else { "ldap" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }

    /// Accepted zones; falls back to the primary domain.
    pub fn effective_zones(&self) -> Vec<String> {
        if self.zones.is_empty() {
            vec![self.domain.clone()]
        } else {
            self.zones.clone()
        }
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("host", &self.host),
            ("base_dn", &self.base_dn),
            ("bind_dn", &self.bind_dn),
            ("domain", &self.domain),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{name} is required")));
            }
        }

        if self.pool_size == 0 {
            return Err(ConfigError::Invalid(
                "pool_size must be at least 1".to_string(),
            ));
        }
        if self.member_page_size == 0 {
            return Err(ConfigError::Invalid(
                "member_page_size must be at least 1".to_string(),
            ));
        }
        if self.use_ssl && self.use_starttls {
            return Err(ConfigError::Invalid(
                "use_ssl and use_starttls are mutually exclusive".to_string(),
            ));
        }

        if !self.verify_certificate {
            warn!(
                host = %self.host,
                "TLS certificate verification is disabled for the directory connection"
            );
        }
        if !self.use_ssl && !self.use_starttls {
            warn!(
                host = %self.host,
                "Directory connection is unencrypted; password operations will be refused by the server"
            );
        }

        Ok(())
    }

    /// Load configuration from `LDAP_*` environment variables (and `.env`).
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &str| get(key).ok_or_else(|| ConfigError::MissingVar(key.to_string()));

        let mut config = Self::new(
            required("LDAP_HOST")?,
            required("LDAP_BASEDN")?,
            required("LDAP_USERNAME")?,
            required("LDAP_DOMAIN")?,
        );
        config.bind_password = required("LDAP_PASSWORD")?;

        if let Some(zones) = get("LDAP_ZONES") {
            config.zones = zones
                .split(',')
                .map(str::trim)
                .filter(|z| !z.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(description) = get("LDAP_DEFAULT_GROUP_DESCRIPTION") {
            config.default_group_description = description;
        }

        config.use_ssl = parse_var(&get, "LDAP_USE_SSL", config.use_ssl, parse_bool)?;
        config.use_starttls =
            parse_var(&get, "LDAP_USE_STARTTLS", config.use_starttls, parse_bool)?;
        if !config.use_ssl {
            config.port = 389;
        }
        config.verify_certificate = parse_var(
            &get,
            "LDAP_VERIFY_CERTIFICATE",
            config.verify_certificate,
            parse_bool,
        )?;
        config.port = parse_var(&get, "LDAP_PORT", config.port, |v| v.parse().ok())?;
        config.pool_size = parse_var(&get, "LDAP_POOLSIZE", config.pool_size, |v| v.parse().ok())?;
        config.acquire_timeout_secs = parse_var(
            &get,
            "LDAP_ACQUIRE_TIMEOUT_SECS",
            config.acquire_timeout_secs,
            |v| v.parse().ok(),
        )?;
        config.connection_timeout_secs = parse_var(
            &get,
            "LDAP_CONNECTION_TIMEOUT_SECS",
            config.connection_timeout_secs,
            |v| v.parse().ok(),
        )?;
        config.operation_timeout_secs = parse_var(
            &get,
            "LDAP_OPERATION_TIMEOUT_SECS",
            config.operation_timeout_secs,
            |v| v.parse().ok(),
        )?;
        config.member_page_size = parse_var(
            &get,
            "LDAP_MEMBER_PAGE_SIZE",
            config.member_page_size,
            |v| v.parse().ok(),
        )?;

        config.validate()?;
        Ok(config)
    }
}

fn parse_var<T, G, P>(get: &G, key: &str, default: T, parse: P) -> Result<T, ConfigError>
where
    G: Fn(&str) -> Option<String>,
    P: Fn(&str) -> Option<T>,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => parse(raw.trim()).ok_or_else(|| ConfigError::InvalidValue {
            var: key.to_string(),
            message: format!("cannot parse '{raw}'"),
        }),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
