//! Schema-driven translation of search results into records.

use tracing::{debug, instrument, warn};

use crate::ad::COMMON_FIELDS;
use crate::error::{DirectoryError, DirectoryResult};
use crate::pool::ConnectionPool;
use crate::schema::DirectoryRecord;
use crate::session::{DirectoryEntry, DirectorySession, SearchScope, SessionFactory};

/// Attributes requested for `R`: the common table plus the record's own,
/// without duplicates.
pub fn attribute_list<R: DirectoryRecord>() -> Vec<&'static str> {
    let mut attributes: Vec<&'static str> = Vec::new();
    let declared = COMMON_FIELDS
        .iter()
        .map(|f| f.attribute)
        .chain(R::fields().iter().map(|f| f.attribute));
    for attribute in declared {
        if !attributes.iter().any(|a| a.eq_ignore_ascii_case(attribute)) {
            attributes.push(attribute);
        }
    }
    attributes
}

/// Build a record from one entry. Unknown attributes are ignored.
pub fn populate<R: DirectoryRecord>(entry: &DirectoryEntry) -> DirectoryResult<R> {
    let mut record = R::default();
    for (name, values) in &entry.attributes {
        if let Some(field) = COMMON_FIELDS.iter().find(|f| f.matches(name)) {
            field.apply(record.common_mut(), values)?;
        } else if let Some(field) = R::fields().iter().find(|f| f.matches(name)) {
            field.apply(&mut record, values)?;
        }
    }
    if record.common().distinguished_name.is_empty() {
        record.common_mut().distinguished_name = entry.dn.clone();
    }
    Ok(record)
}

/// Searches through the pool and maps the first hit onto a record type.
pub struct ObjectMapper<F: SessionFactory> {
    pool: ConnectionPool<F>,
    base_dn: String,
}

impl<F: SessionFactory> Clone for ObjectMapper<F> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            base_dn: self.base_dn.clone(),
        }
    }
}

impl<F: SessionFactory> ObjectMapper<F> {
    pub fn new(pool: ConnectionPool<F>, base_dn: impl Into<String>) -> Self {
        Self {
            pool,
            base_dn: base_dn.into(),
        }
    }

    pub fn base_dn(&self) -> &str {
        &self.base_dn
    }

    /// Resolve the search base, falling back to the configured root.
    pub fn search_base<'a>(&'a self, search_base: Option<&'a str>) -> &'a str {
        search_base
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .unwrap_or(&self.base_dn)
    }

    /// Search the subtree under `search_base` and map the first entry.
    ///
    /// When several entries match, the first one wins and a warning is logged.
    #[instrument(level = "debug", skip(self), fields(kind = R::KIND))]
    pub async fn search<R: DirectoryRecord>(
        &self,
        filter: &str,
        search_base: Option<&str>,
    ) -> DirectoryResult<R> {
        let base = self.search_base(search_base);
        let attributes = attribute_list::<R>();

        let entries = {
            let mut conn = self.pool.acquire().await?;
            conn.search(base, SearchScope::Subtree, filter, &attributes)
                .await?
        };

        let matched = entries.len();
        let Some(entry) = entries.into_iter().next() else {
            debug!(filter, base, "No entry matched");
            return Err(DirectoryError::not_found(filter));
        };
        if matched > 1 {
            warn!(
                filter,
                base,
                matched,
                dn = %entry.dn,
                "Search matched more than one entry, using the first"
            );
        }

        populate(&entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ad::{CommonAttributes, Group, User};

    fn guid_bytes() -> Vec<u8> {
        vec![
            0x78, 0x56, 0x34, 0x12, 0xbc, 0x9a, 0xf0, 0xde, 0x12, 0x34, 0x56, 0x78, 0x9a, 0xbc,
            0xde, 0xf0,
        ]
    }

    #[test]
    fn test_attribute_list_is_union() {
        let user = attribute_list::<User>();
        assert!(user.contains(&"objectGUID"));
        assert!(user.contains(&"pwdLastSet"));
        assert!(!user.contains(&"*"));

        let group = attribute_list::<Group>();
        assert!(group.contains(&"groupType"));
        assert!(!group.iter().any(|a| a.eq_ignore_ascii_case("member")));

        let common = attribute_list::<CommonAttributes>();
        assert_eq!(common.len(), COMMON_FIELDS.len());
        // "mail"/"proxyAddresses" appear once each
        let unique: std::collections::HashSet<_> =
            group.iter().map(|a| a.to_ascii_lowercase()).collect();
        assert_eq!(unique.len(), group.len());
    }

    #[test]
    fn test_populate_user() {
        let entry = DirectoryEntry::new("CN=jdoe,OU=Staff,DC=corp,DC=local")
            .with_attribute("SAMACCOUNTNAME", ["jdoe"])
            .with_attribute("objectGUID", [guid_bytes()])
            .with_attribute(
                "objectSid",
                [vec![1u8, 1, 0, 0, 0, 0, 0, 5, 18, 0, 0, 0]],
            )
            .with_attribute("whenCreated", ["20240115093000.0Z"])
            .with_attribute("pwdLastSet", ["132539328000000000"])
            .with_attribute("lockoutTime", ["0"])
            .with_attribute("memberOf", ["CN=b,DC=corp", "CN=a,DC=corp"])
            .with_attribute("userAccountControl", ["512"])
            .with_attribute("mDBUseDefaults", ["TRUE"])
            .with_attribute("unknownAttr", ["ignored"]);

        let user: User = populate(&entry).unwrap();
        assert_eq!(user.common.sam_account_name, "jdoe");
        assert_eq!(user.common.object_guid, "12345678-9abc-def0-1234-56789abcdef0");
        assert_eq!(user.common.object_sid, "S-1-5-18");
        assert_eq!(
            user.common.distinguished_name,
            "CN=jdoe,OU=Staff,DC=corp,DC=local"
        );
        assert!(user.common.when_created.is_some());
        assert!(user.pwd_last_set.is_some());
        assert_eq!(user.lockout_time, None);
        assert_eq!(user.member_of, vec!["CN=b,DC=corp", "CN=a,DC=corp"]);
        assert_eq!(user.user_account_control, 512);
        assert!(user.mdb_use_defaults);
    }

    #[test]
    fn test_populate_rejects_bad_guid() {
        let entry = DirectoryEntry::new("CN=x,DC=corp").with_attribute("objectGUID", [vec![1u8, 2, 3]]);
        assert!(matches!(
            populate::<User>(&entry),
            Err(DirectoryError::InvalidFormat { .. })
        ));
    }

    #[test]
    fn test_populate_group_ignores_member() {
        let entry = DirectoryEntry::new("CN=ops,DC=corp")
            .with_attribute("cn", ["ops"])
            .with_attribute("groupType", ["-2147483646"])
            .with_attribute("member", ["CN=jdoe,DC=corp"]);
        let group: Group = populate(&entry).unwrap();
        assert_eq!(group.cn, "ops");
        assert_eq!(group.group_type, -2_147_483_646);
        assert!(group.member.is_empty());
    }
}
