use std::fmt;
use std::str::FromStr;

use crate::codec::{encode_sid, unformat_guid};
use crate::dn::{escape_filter_bytes, escape_filter_value, is_valid_attribute_name};
use crate::error::{DirectoryError, DirectoryResult};

/// Which attribute a lookup identifier refers to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum IdType {
    #[default]
    SamAccountName,
    DistinguishedName,
    UserPrincipalName,
    Mail,
    /// Canonical GUID string, matched against the binary `objectGUID`.
    ObjectGuid,
    /// `S-1-...` string, matched against the binary `objectSid`.
    ObjectSid,
    /// Any other attribute with a single matching value.
    Attribute(String),
}

impl IdType {
    pub fn attribute(&self) -> &str {
        match self {
            IdType::SamAccountName => "sAMAccountName",
            IdType::DistinguishedName => "distinguishedName",
            IdType::UserPrincipalName => "userPrincipalName",
            IdType::Mail => "mail",
            IdType::ObjectGuid => "objectGUID",
            IdType::ObjectSid => "objectSid",
            IdType::Attribute(name) => name,
        }
    }

    /// Build the `(attr=value)` clause, encoding binary identifiers.
    pub fn filter_clause(&self, value: &str) -> DirectoryResult<String> {
        let encoded = match self {
            IdType::ObjectGuid => escape_filter_bytes(&unformat_guid(value)?),
            IdType::ObjectSid => escape_filter_bytes(&encode_sid(value)?),
            _ => escape_filter_value(value),
        };
        Ok(format!("({}={})", self.attribute(), encoded))
    }
}

impl FromStr for IdType {
    type Err = DirectoryError;

    /// Parse an id type name; empty selects `sAMAccountName`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        let known = [
            IdType::SamAccountName,
            IdType::DistinguishedName,
            IdType::UserPrincipalName,
            IdType::Mail,
            IdType::ObjectGuid,
            IdType::ObjectSid,
        ];
        if name.is_empty() {
            return Ok(IdType::SamAccountName);
        }
        if let Some(id_type) = known
            .into_iter()
            .find(|t| t.attribute().eq_ignore_ascii_case(name))
        {
            return Ok(id_type);
        }
        if is_valid_attribute_name(name) {
            Ok(IdType::Attribute(name.to_string()))
        } else {
            Err(DirectoryError::unsupported("id type", name))
        }
    }
}

impl fmt::Display for IdType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.attribute())
    }
}
