//! Transport seam between the pool and the wire protocol.
//!
//! The pool, mapper and pager only ever talk to a [`DirectorySession`]; the
//! production implementation lives in [`crate::ldap`].

use async_trait::async_trait;

use crate::error::DirectoryResult;

/// Search scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    Base,
    OneLevel,
    Subtree,
}

/// A single entry returned by a search, with every value as raw bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub dn: String,
    pub attributes: Vec<(String, Vec<Vec<u8>>)>,
}

impl DirectoryEntry {
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            attributes: Vec::new(),
        }
    }

    /// Builder-style attribute insertion.
    pub fn with_attribute<I, V>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Vec<u8>>,
    {
        self.attributes
            .push((name.into(), values.into_iter().map(Into::into).collect()));
        self
    }

    /// Values of an attribute, matched case-insensitively.
    pub fn values(&self, name: &str) -> Option<&[Vec<u8>]> {
        self.attributes
            .iter()
            .find(|(attr, _)| attr.eq_ignore_ascii_case(name))
            .map(|(_, values)| values.as_slice())
    }

    /// Values of an attribute decoded as UTF-8 (lossy).
    pub fn text_values(&self, name: &str) -> Vec<String> {
        self.values(name)
            .unwrap_or_default()
            .iter()
            .map(|v| String::from_utf8_lossy(v).into_owned())
            .collect()
    }
}

/// One change inside a modify request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Modification {
    Add(String, Vec<Vec<u8>>),
    Delete(String, Vec<Vec<u8>>),
    Replace(String, Vec<Vec<u8>>),
}

impl Modification {
    /// Replace an attribute with text values.
    pub fn replace<I, V>(attribute: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Vec<u8>>,
    {
        Modification::Replace(
            attribute.into(),
            values.into_iter().map(Into::into).collect(),
        )
    }

    pub fn attribute(&self) -> &str {
        match self {
            Modification::Add(attr, _)
            | Modification::Delete(attr, _)
            | Modification::Replace(attr, _) => attr,
        }
    }
}

/// An authenticated protocol session.
#[async_trait]
pub trait DirectorySession: Send + 'static {
    /// Search and return every matching entry with the requested attributes.
    async fn search(
        &mut self,
        base: &str,
        scope: SearchScope,
        filter: &str,
        attributes: &[&str],
    ) -> DirectoryResult<Vec<DirectoryEntry>>;

    async fn add(&mut self, dn: &str, attributes: Vec<(String, Vec<Vec<u8>>)>)
        -> DirectoryResult<()>;

    async fn modify(&mut self, dn: &str, changes: Vec<Modification>) -> DirectoryResult<()>;

    /// Rename/move an entry, deleting the old RDN value.
    async fn modify_dn(&mut self, dn: &str, new_rdn: &str, new_parent: &str)
        -> DirectoryResult<()>;

    /// Liveness probe issued before an idle session is handed out again.
    async fn is_alive(&mut self) -> bool;

    /// Unbind and drop the transport. Errors are logged, never returned.
    async fn close(&mut self);
}

/// Dials and authenticates new sessions for the pool.
#[async_trait]
pub trait SessionFactory: Send + Sync + 'static {
    type Session: DirectorySession;

    async fn open(&self) -> DirectoryResult<Self::Session>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_values_case_insensitive() {
        let entry = DirectoryEntry::new("CN=jdoe,DC=corp")
            .with_attribute("sAMAccountName", ["jdoe"])
            .with_attribute("proxyAddresses", ["smtp:jdoe@corp.local", "SMTP:john@corp.local"]);

        assert_eq!(entry.text_values("samaccountname"), vec!["jdoe"]);
        assert_eq!(entry.values("PROXYADDRESSES").map(<[_]>::len), Some(2));
        assert!(entry.values("mail").is_none());
        assert!(entry.text_values("mail").is_empty());
    }

    #[test]
    fn test_modification_attribute() {
        let change = Modification::replace("lockoutTime", ["0"]);
        assert_eq!(change.attribute(), "lockoutTime");
        assert_eq!(
            change,
            Modification::Replace("lockoutTime".to_string(), vec![b"0".to_vec()])
        );
    }
}
