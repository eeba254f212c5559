//! Account and group operations.
//!
//! Each operation is a short sequence of independent protocol calls. Nothing is
//! rolled back: a failure after `create_enabled_user` added the entry leaves a
//! disabled account without a password.

use std::collections::HashSet;

use tracing::{debug, info, instrument, warn};

use crate::ad::{
    encode_ad_password, validate_password, CommonAttributes, Group, GroupChanges, IdType,
    NewGroup, NewUser, ReplaceMap, User, UserChanges, UAC_NORMAL_ACCOUNT,
};
use crate::config::{ConfigError, DirectoryConfig};
use crate::dn::{escape_filter_value, split_rdn};
use crate::error::{DirectoryError, DirectoryResult};
use crate::ldap::LdapConnector;
use crate::mapper::ObjectMapper;
use crate::pager::MembershipPager;
use crate::pool::ConnectionPool;
use crate::session::{DirectorySession, Modification, SessionFactory};

/// Result of an availability check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Availability {
    Available,
    /// The name is taken by this object.
    Taken(Box<CommonAttributes>),
}

impl Availability {
    pub fn is_available(&self) -> bool {
        matches!(self, Availability::Available)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipAction {
    Add,
    Remove,
}

impl MembershipAction {
    fn as_str(self) -> &'static str {
        match self {
            MembershipAction::Add => "add",
            MembershipAction::Remove => "remove",
        }
    }
}

/// Outcome of a member add/remove: the refreshed group and per-member failures.
#[derive(Debug, Clone)]
pub struct MembershipUpdate {
    pub group: Group,
    pub action: MembershipAction,
    pub failures: Vec<String>,
}

impl MembershipUpdate {
    /// `ok`, followed by one `;<action> failed: <reason>` per failure.
    pub fn message(&self) -> String {
        let mut message = String::from("ok");
        for failure in &self.failures {
            message.push_str(&format!(";{} failed: {}", self.action.as_str(), failure));
        }
        message
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Service settings derived from [`DirectoryConfig`].
#[derive(Debug, Clone)]
struct Settings {
    domain: String,
    zones: Vec<String>,
    reserved_names: Vec<String>,
    default_group_description: String,
}

/// Directory operations over a shared connection pool.
pub struct DirectoryService<F: SessionFactory> {
    pool: ConnectionPool<F>,
    mapper: ObjectMapper<F>,
    pager: MembershipPager,
    settings: Settings,
}

/// Service backed by real LDAP connections.
pub type LdapDirectoryService = DirectoryService<LdapConnector>;

impl DirectoryService<LdapConnector> {
    /// Validate the configuration and build the pool. No connection is opened yet.
    pub fn from_config(config: &DirectoryConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::new(LdapConnector::new(config.clone()), config))
    }
}

impl<F: SessionFactory> Clone for DirectoryService<F> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            mapper: self.mapper.clone(),
            pager: self.pager,
            settings: self.settings.clone(),
        }
    }
}

impl<F: SessionFactory> DirectoryService<F> {
    pub fn new(factory: F, config: &DirectoryConfig) -> Self {
        let pool = ConnectionPool::from_config(factory, config);
        Self {
            mapper: ObjectMapper::new(pool.clone(), config.base_dn.clone()),
            pool,
            pager: MembershipPager::new(config.member_page_size),
            settings: Settings {
                domain: config.domain.clone(),
                zones: config.effective_zones(),
                reserved_names: config
                    .reserved_names
                    .iter()
                    .map(|name| name.to_lowercase())
                    .collect(),
                default_group_description: config.default_group_description.clone(),
            },
        }
    }

    pub fn pool(&self) -> &ConnectionPool<F> {
        &self.pool
    }

    /// Acquire a connection and run the liveness probe on it.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> DirectoryResult<()> {
        let mut conn = self.pool.acquire().await?;
        if conn.is_alive().await {
            Ok(())
        } else {
            Err(DirectoryError::connection_failed(
                "directory liveness probe failed",
            ))
        }
    }

    /// Close idle connections.
    pub async fn shutdown(&self) {
        self.pool.close().await;
    }

    #[instrument(skip(self))]
    pub async fn get_user(
        &self,
        id: &str,
        id_type: &IdType,
        search_base: Option<&str>,
    ) -> DirectoryResult<User> {
        let filter = format!(
            "(&(objectClass=user)(objectCategory=person){})",
            id_type.filter_clause(id)?
        );
        self.mapper.search(&filter, search_base).await
    }

    /// Look up a group and page in its full member list.
    #[instrument(skip(self))]
    pub async fn get_group(
        &self,
        id: &str,
        id_type: &IdType,
        search_base: Option<&str>,
    ) -> DirectoryResult<Group> {
        let filter = format!("(&(objectClass=group){})", id_type.filter_clause(id)?);
        let mut group: Group = self.mapper.search(&filter, search_base).await?;

        let base = self.mapper.search_base(search_base);
        let mut conn = self.pool.acquire().await?;
        group.member = self.pager.fetch_members(&mut *conn, base, &filter).await?;
        Ok(group)
    }

    /// Check whether `name` is free as an account name and as a mail address in
    /// every configured zone. Reserved names fail without touching the network.
    #[instrument(skip(self))]
    pub async fn check_availability(&self, name: &str) -> DirectoryResult<Availability> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(DirectoryError::forbidden("name cannot be an empty string"));
        }
        let lowered = trimmed.to_lowercase();
        if self.settings.reserved_names.iter().any(|r| *r == lowered) {
            return Err(DirectoryError::forbidden(format!(
                "name '{trimmed}' is reserved for the system"
            )));
        }

        let escaped = escape_filter_value(trimmed);
        let mut filter = format!("(|(sAMAccountName={escaped})");
        for zone in &self.settings.zones {
            filter.push_str(&format!(
                "(proxyAddresses=smtp:{escaped}@{})",
                escape_filter_value(zone)
            ));
        }
        filter.push(')');

        match self.mapper.search::<CommonAttributes>(&filter, None).await {
            Ok(existing) => {
                debug!(dn = %existing.distinguished_name, "Name already in use");
                Ok(Availability::Taken(Box::new(existing)))
            }
            Err(DirectoryError::NotFound { .. }) => Ok(Availability::Available),
            Err(e) => Err(e),
        }
    }

    /// Create an account, set its password and enable it.
    #[instrument(skip(self, new_user), fields(account = %new_user.account))]
    pub async fn create_enabled_user(&self, new_user: &NewUser) -> DirectoryResult<()> {
        let domain = if new_user.domain.trim().is_empty() {
            self.settings.domain.as_str()
        } else {
            new_user.domain.trim()
        };
        if !self
            .settings
            .zones
            .iter()
            .any(|zone| zone.eq_ignore_ascii_case(domain))
        {
            return Err(DirectoryError::unsupported("domain", domain));
        }
        validate_password(&new_user.account, &new_user.password)?;

        if let Availability::Taken(existing) = self.check_availability(&new_user.account).await? {
            return Err(DirectoryError::already_exists(format!(
                "{} ({})",
                new_user.account, existing.distinguished_name
            )));
        }

        let dn = new_user.distinguished_name();
        let mut conn = self.pool.acquire().await?;

        debug!(dn = %dn, "Adding user entry");
        conn.add(&dn, new_user.creation_attributes(domain)).await?;

        debug!(dn = %dn, "Setting initial password");
        conn.modify(&dn, password_changes(&new_user.password)).await?;

        debug!(dn = %dn, "Enabling account");
        conn.modify(
            &dn,
            vec![Modification::replace(
                "userAccountControl",
                [UAC_NORMAL_ACCOUNT.to_string()],
            )],
        )
        .await?;

        info!(dn = %dn, "Created enabled user");
        Ok(())
    }

    /// Replace a user's password and clear any lockout.
    #[instrument(skip(self, password))]
    pub async fn set_user_password(
        &self,
        id: &str,
        id_type: &IdType,
        password: &str,
        search_base: Option<&str>,
    ) -> DirectoryResult<()> {
        if *id_type == IdType::SamAccountName {
            validate_password(id, password)?;
        }
        let user = self.get_user(id, id_type, search_base).await?;
        validate_password(&user.common.sam_account_name, password)?;

        let dn = &user.common.distinguished_name;
        let mut conn = self.pool.acquire().await?;
        conn.modify(dn, password_changes(password)).await?;
        conn.modify(dn, vec![Modification::replace("lockoutTime", ["0"])])
            .await?;

        info!(dn = %dn, "Password set and lockout cleared");
        Ok(())
    }

    /// Replace attributes on `dn`. An empty map is rejected.
    #[instrument(skip(self))]
    pub async fn update_object_attributes(
        &self,
        dn: &str,
        replace: &ReplaceMap,
    ) -> DirectoryResult<()> {
        if replace.is_empty() {
            return Err(DirectoryError::opt_failed(
                format!("update '{dn}'"),
                "no valid field in replace map",
            ));
        }
        let changes = replace
            .iter()
            .map(|(attribute, values)| {
                Modification::replace(attribute.as_str(), values.iter().map(String::as_str))
            })
            .collect();

        let mut conn = self.pool.acquire().await?;
        conn.modify(dn, changes).await?;
        info!(dn = %dn, attributes = replace.len(), "Updated object attributes");
        Ok(())
    }

    /// Move `dn` under `new_org_unit`, keeping its RDN.
    #[instrument(skip(self))]
    pub async fn move_object(&self, dn: &str, new_org_unit: &str) -> DirectoryResult<()> {
        let (rdn, parent) = split_rdn(dn)?;
        if new_org_unit.trim().is_empty() {
            return Err(DirectoryError::invalid_format("organizational unit", new_org_unit));
        }
        if parent.eq_ignore_ascii_case(new_org_unit.trim()) {
            debug!(dn = %dn, "Object already in target organizational unit");
            return Ok(());
        }

        let mut conn = self.pool.acquire().await?;
        conn.modify_dn(dn, rdn, new_org_unit.trim()).await?;
        info!(dn = %dn, new_org_unit = %new_org_unit, "Moved object");
        Ok(())
    }

    /// Apply non-empty changes, then the move, and return the refreshed user.
    #[instrument(skip(self, changes))]
    pub async fn update_user(
        &self,
        id: &str,
        id_type: &IdType,
        search_base: Option<&str>,
        changes: &UserChanges,
    ) -> DirectoryResult<User> {
        let user = self.get_user(id, id_type, search_base).await?;
        let dn = user.common.distinguished_name.clone();

        let replace = changes.replace_map();
        if !replace.is_empty() {
            self.update_object_attributes(&dn, &replace).await?;
        }
        if !changes.org_unit.trim().is_empty() {
            self.move_object(&dn, &changes.org_unit).await?;
        }

        let (refetch_id, refetch_type) = refetch_key(&user.common, &changes.sam_account_name);
        self.get_user(&refetch_id, &refetch_type, None).await
    }

    /// Create a group with the default description when none is given.
    #[instrument(skip(self, new_group), fields(account = %new_group.account))]
    pub async fn create_group(&self, new_group: &NewGroup) -> DirectoryResult<()> {
        if let Availability::Taken(existing) = self.check_availability(&new_group.account).await? {
            return Err(DirectoryError::already_exists(format!(
                "{} ({})",
                new_group.account, existing.distinguished_name
            )));
        }

        let dn = new_group.distinguished_name();
        let mut conn = self.pool.acquire().await?;
        conn.add(
            &dn,
            new_group.creation_attributes(&self.settings.default_group_description),
        )
        .await?;
        info!(dn = %dn, "Created group");
        Ok(())
    }

    /// Same shape as [`Self::update_user`].
    #[instrument(skip(self, changes))]
    pub async fn update_group(
        &self,
        id: &str,
        id_type: &IdType,
        search_base: Option<&str>,
        changes: &GroupChanges,
    ) -> DirectoryResult<Group> {
        let group = self.get_group(id, id_type, search_base).await?;
        let dn = group.common.distinguished_name.clone();

        let replace = changes.replace_map();
        if !replace.is_empty() {
            self.update_object_attributes(&dn, &replace).await?;
        }
        if !changes.org_unit.trim().is_empty() {
            self.move_object(&dn, &changes.org_unit).await?;
        }

        let (refetch_id, refetch_type) = refetch_key(&group.common, "");
        self.get_group(&refetch_id, &refetch_type, None).await
    }

    /// Add members to a group. Members already present are skipped.
    #[instrument(skip(self, member_ids))]
    pub async fn add_group_members(
        &self,
        group_id: &str,
        group_id_type: &IdType,
        member_ids: &[String],
        member_id_type: &IdType,
        search_base: Option<&str>,
    ) -> DirectoryResult<MembershipUpdate> {
        self.change_membership(
            MembershipAction::Add,
            group_id,
            group_id_type,
            member_ids,
            member_id_type,
            search_base,
        )
        .await
    }

    /// Remove members from a group. Non-members are skipped.
    #[instrument(skip(self, member_ids))]
    pub async fn remove_group_members(
        &self,
        group_id: &str,
        group_id_type: &IdType,
        member_ids: &[String],
        member_id_type: &IdType,
        search_base: Option<&str>,
    ) -> DirectoryResult<MembershipUpdate> {
        self.change_membership(
            MembershipAction::Remove,
            group_id,
            group_id_type,
            member_ids,
            member_id_type,
            search_base,
        )
        .await
    }

    async fn change_membership(
        &self,
        action: MembershipAction,
        group_id: &str,
        group_id_type: &IdType,
        member_ids: &[String],
        member_id_type: &IdType,
        search_base: Option<&str>,
    ) -> DirectoryResult<MembershipUpdate> {
        let group = self.get_group(group_id, group_id_type, search_base).await?;
        let mut failures = Vec::new();

        let mut resolved = Vec::new();
        for member_id in member_ids {
            match self.get_user(member_id, member_id_type, search_base).await {
                Ok(user) => resolved.push(user.common.distinguished_name),
                Err(e) => {
                    warn!(member = %member_id, error = %e, "Could not resolve group member");
                    failures.push(e.to_string());
                }
            }
        }

        let current: HashSet<String> = group.member.iter().map(|m| m.to_lowercase()).collect();
        let mut seen = HashSet::new();
        let pending: Vec<String> = resolved
            .into_iter()
            .filter(|dn| {
                let key = dn.to_lowercase();
                let present = current.contains(&key);
                let wanted = match action {
                    MembershipAction::Add => !present,
                    MembershipAction::Remove => present,
                };
                if !wanted {
                    debug!(member = %dn, action = action.as_str(), "Member skipped, nothing to change");
                }
                wanted && seen.insert(key)
            })
            .collect();

        // An empty value list in a delete would remove every member.
        if pending.is_empty() {
            debug!(group = %group.common.distinguished_name, "No membership change required");
            return Ok(MembershipUpdate {
                group,
                action,
                failures,
            });
        }

        let dn = group.common.distinguished_name.clone();
        let values: Vec<Vec<u8>> = pending.iter().map(|m| m.as_bytes().to_vec()).collect();
        let change = match action {
            MembershipAction::Add => Modification::Add("member".to_string(), values),
            MembershipAction::Remove => Modification::Delete("member".to_string(), values),
        };

        let modified = {
            let mut conn = self.pool.acquire().await?;
            conn.modify(&dn, vec![change]).await
        };
        match modified {
            Ok(()) => info!(
                group = %dn,
                count = pending.len(),
                action = action.as_str(),
                "Group membership updated"
            ),
            Err(e) => {
                warn!(group = %dn, error = %e, "Group membership update failed");
                failures.push(e.to_string());
            }
        }

        let (refetch_id, refetch_type) = refetch_key(&group.common, "");
        let group = self.get_group(&refetch_id, &refetch_type, None).await?;
        Ok(MembershipUpdate {
            group,
            action,
            failures,
        })
    }
}

fn password_changes(password: &str) -> Vec<Modification> {
    vec![Modification::Replace(
        "unicodePwd".to_string(),
        vec![encode_ad_password(password)],
    )]
}

/// Stable key to re-read an object after it may have been renamed or moved.
fn refetch_key(common: &CommonAttributes, new_account_name: &str) -> (String, IdType) {
    if !common.object_guid.is_empty() {
        (common.object_guid.clone(), IdType::ObjectGuid)
    } else if !new_account_name.is_empty() {
        (new_account_name.to_string(), IdType::SamAccountName)
    } else {
        (common.sam_account_name.clone(), IdType::SamAccountName)
    }
}
