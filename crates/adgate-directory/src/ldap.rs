//! `ldap3` implementation of the session seam.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use ldap3::{
    Ldap, LdapConnAsync, LdapConnSettings, LdapError, LdapResult, Mod, Scope, SearchEntry,
    SearchResult,
};
use tracing::{debug, info, warn};

use crate::config::DirectoryConfig;
use crate::error::{DirectoryError, DirectoryResult};
use crate::session::{
    DirectoryEntry, DirectorySession, Modification, SearchScope, SessionFactory,
};

const RC_SUCCESS: u32 = 0;
const RC_NO_SUCH_OBJECT: u32 = 32;
const RC_INVALID_CREDENTIALS: u32 = 49;
const RC_ENTRY_ALREADY_EXISTS: u32 = 68;

/// Fixed query used to check a pooled connection is still usable.
const PROBE_FILTER: &str = "(&(objectClass=user)(objectCategory=person)(name=Administrator))";

/// Dials and binds LDAP sessions from a [`DirectoryConfig`].
#[derive(Debug, Clone)]
pub struct LdapConnector {
    config: DirectoryConfig,
}

impl LdapConnector {
    pub fn new(config: DirectoryConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SessionFactory for LdapConnector {
    type Session = LdapSession;

    async fn open(&self) -> DirectoryResult<LdapSession> {
        let url = self.config.url();
        debug!(url = %url, "Connecting to directory server");

        let mut settings = LdapConnSettings::new()
            .set_conn_timeout(self.config.connection_timeout())
            .set_starttls(self.config.use_starttls);
        if !self.config.verify_certificate {
            settings = settings.set_no_tls_verify(true);
        }

        let (conn, mut ldap) = LdapConnAsync::with_settings(settings, &url)
            .await
            .map_err(|e| {
                DirectoryError::connection_failed_with_source(
                    format!("failed to connect to directory server at {url}"),
                    e,
                )
            })?;

        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                warn!(error = %e, "LDAP connection driver error");
            }
        });

        debug!(bind_dn = %self.config.bind_dn, "Performing LDAP bind");
        let result = ldap
            .simple_bind(&self.config.bind_dn, &self.config.bind_password)
            .await
            .map_err(|e| {
                DirectoryError::connection_failed_with_source(
                    format!("LDAP bind failed for {}", self.config.bind_dn),
                    e,
                )
            })?;

        match result.rc {
            RC_SUCCESS => {}
            RC_INVALID_CREDENTIALS => return Err(DirectoryError::AuthenticationFailed),
            rc => {
                return Err(DirectoryError::connection_failed(format!(
                    "LDAP bind failed with code {rc}: {}",
                    result.text
                )))
            }
        }

        info!(host = %self.config.host, "Directory connection established");

        Ok(LdapSession {
            ldap,
            base_dn: self.config.base_dn.clone(),
            operation_timeout: self.config.operation_timeout(),
        })
    }
}

/// One bound LDAP connection.
pub struct LdapSession {
    ldap: Ldap,
    base_dn: String,
    operation_timeout: Duration,
}

fn transport_error(operation: &str, timeout: Duration, error: LdapError) -> DirectoryError {
    match error {
        LdapError::Timeout { .. } => DirectoryError::timeout(operation, timeout),
        other => DirectoryError::opt_failed_with_source(operation, other),
    }
}

fn check_result(operation: &str, target: &str, result: LdapResult) -> DirectoryResult<()> {
    match result.rc {
        RC_SUCCESS => Ok(()),
        RC_NO_SUCH_OBJECT => Err(DirectoryError::not_found(target)),
        RC_ENTRY_ALREADY_EXISTS => Err(DirectoryError::already_exists(target)),
        rc => Err(DirectoryError::opt_failed(
            operation,
            format!("{} (code {rc})", result.text),
        )),
    }
}

fn to_scope(scope: SearchScope) -> Scope {
    match scope {
        SearchScope::Base => Scope::Base,
        SearchScope::OneLevel => Scope::OneLevel,
        SearchScope::Subtree => Scope::Subtree,
    }
}

fn to_value_set(values: Vec<Vec<u8>>) -> HashSet<Vec<u8>> {
    values.into_iter().collect()
}

fn to_mod(change: Modification) -> Mod<Vec<u8>> {
    match change {
        Modification::Add(attr, values) => Mod::Add(attr.into_bytes(), to_value_set(values)),
        Modification::Delete(attr, values) => {
            Mod::Delete(attr.into_bytes(), to_value_set(values))
        }
        Modification::Replace(attr, values) => {
            Mod::Replace(attr.into_bytes(), to_value_set(values))
        }
    }
}

fn into_entry(entry: SearchEntry) -> DirectoryEntry {
    let mut attributes: Vec<(String, Vec<Vec<u8>>)> = entry
        .attrs
        .into_iter()
        .map(|(name, values)| (name, values.into_iter().map(String::into_bytes).collect()))
        .collect();
    attributes.extend(entry.bin_attrs);
    DirectoryEntry {
        dn: entry.dn,
        attributes,
    }
}

#[async_trait]
impl DirectorySession for LdapSession {
    async fn search(
        &mut self,
        base: &str,
        scope: SearchScope,
        filter: &str,
        attributes: &[&str],
    ) -> DirectoryResult<Vec<DirectoryEntry>> {
        debug!(base = %base, filter = %filter, "LDAP search");
        let timeout = self.operation_timeout;
        let SearchResult(entries, result) = self
            .ldap
            .with_timeout(timeout)
            .search(base, to_scope(scope), filter, attributes.to_vec())
            .await
            .map_err(|e| transport_error("search entries", timeout, e))?;

        match result.rc {
            RC_SUCCESS => {}
            // search base does not exist: nothing matched
            RC_NO_SUCH_OBJECT => return Ok(Vec::new()),
            _ => check_result("search entries", base, result)?,
        }

        Ok(entries
            .into_iter()
            .map(|raw| into_entry(SearchEntry::construct(raw)))
            .collect())
    }

    async fn add(
        &mut self,
        dn: &str,
        attributes: Vec<(String, Vec<Vec<u8>>)>,
    ) -> DirectoryResult<()> {
        let attrs: Vec<(Vec<u8>, HashSet<Vec<u8>>)> = attributes
            .into_iter()
            .map(|(name, values)| (name.into_bytes(), to_value_set(values)))
            .collect();
        let timeout = self.operation_timeout;
        let result = self
            .ldap
            .with_timeout(timeout)
            .add(dn, attrs)
            .await
            .map_err(|e| transport_error("add entry", timeout, e))?;
        check_result("add entry", dn, result)
    }

    async fn modify(&mut self, dn: &str, changes: Vec<Modification>) -> DirectoryResult<()> {
        let mods: Vec<Mod<Vec<u8>>> = changes.into_iter().map(to_mod).collect();
        let timeout = self.operation_timeout;
        let result = self
            .ldap
            .with_timeout(timeout)
            .modify(dn, mods)
            .await
            .map_err(|e| transport_error("modify entry", timeout, e))?;
        check_result("modify entry", dn, result)
    }

    async fn modify_dn(
        &mut self,
        dn: &str,
        new_rdn: &str,
        new_parent: &str,
    ) -> DirectoryResult<()> {
        let timeout = self.operation_timeout;
        let result = self
            .ldap
            .with_timeout(timeout)
            .modifydn(dn, new_rdn, true, Some(new_parent))
            .await
            .map_err(|e| transport_error("move entry", timeout, e))?;
        check_result("move entry", dn, result)
    }

    async fn is_alive(&mut self) -> bool {
        let base = self.base_dn.clone();
        match self
            .search(&base, SearchScope::Base, PROBE_FILTER, &["name"])
            .await
        {
            Ok(_) => true,
            Err(e) => {
                debug!(error = %e, "Liveness probe failed");
                false
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.ldap.unbind().await {
            debug!(error = %e, "LDAP unbind failed");
        }
    }
}
