//! Active Directory object model
//!
//! Record types with their schema tables, the account password policy and
//! the identifier kinds accepted by lookups.

mod common;
mod group;
mod identifier;
mod password;
mod user;

pub use common::{CommonAttributes, COMMON_FIELDS};
pub use group::{Group, GroupChanges, NewGroup, GROUP_TYPE_GLOBAL_SECURITY};
pub use identifier::IdType;
pub use password::{encode_ad_password, is_strong_password, validate_password, PASSWORD_SYMBOLS};
pub use user::{
    NewUser, User, UserChanges, UAC_ACCOUNT_DISABLE, UAC_DISABLED_ACCOUNT, UAC_NORMAL_ACCOUNT,
};

use std::collections::BTreeMap;

/// Attribute name to replacement values for a modify-replace.
pub type ReplaceMap = BTreeMap<String, Vec<String>>;
