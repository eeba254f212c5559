use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{CommonAttributes, ReplaceMap};
use crate::dn::escape_dn_value;
use crate::schema::{DirectoryRecord, Field};

/// `userAccountControl` NORMAL_ACCOUNT flag.
pub const UAC_NORMAL_ACCOUNT: i64 = 0x0200;
/// `userAccountControl` ACCOUNTDISABLE flag.
pub const UAC_ACCOUNT_DISABLE: i64 = 0x0002;
/// Value new accounts are created with, before a password is set.
pub const UAC_DISABLED_ACCOUNT: i64 = UAC_NORMAL_ACCOUNT | UAC_ACCOUNT_DISABLE;

type Timestamp = Option<DateTime<Utc>>;

/// A user account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(flatten)]
    pub common: CommonAttributes,
    pub company: String,
    pub department: String,
    pub physical_delivery_office_name: String,
    pub member_of: Vec<String>,
    pub mail: String,
    pub mail_nickname: String,
    pub user_principal_name: String,
    pub pwd_last_set: Timestamp,
    pub lockout_time: Timestamp,
    pub last_logon: Timestamp,
    #[serde(rename = "msDS-UserPasswordExpiryTimeComputed")]
    pub password_expiry_time: Timestamp,
    pub proxy_addresses: Vec<String>,
    pub user_account_control: i64,
    #[serde(rename = "legacyExchangeDN")]
    pub legacy_exchange_dn: String,
    #[serde(rename = "homeMDB")]
    pub home_mdb: String,
    #[serde(rename = "mDBUseDefaults")]
    pub mdb_use_defaults: bool,
    #[serde(rename = "mDBStorageQuota")]
    pub mdb_storage_quota: i64,
    #[serde(rename = "mDBOverQuotaLimit")]
    pub mdb_over_quota_limit: i64,
    #[serde(rename = "mDBOverHardQuotaLimit")]
    pub mdb_over_hard_quota_limit: i64,
}

impl User {
    pub fn is_disabled(&self) -> bool {
        self.user_account_control & UAC_ACCOUNT_DISABLE != 0
    }

    pub fn is_locked_out(&self) -> bool {
        self.lockout_time.is_some()
    }
}

type U = User;

static USER_FIELDS: &[Field<User>] = &[
    Field::text("company", |u: &mut U, v: String| u.company = v),
    Field::text("department", |u: &mut U, v: String| u.department = v),
    Field::text("physicalDeliveryOfficeName", |u: &mut U, v: String| {
        u.physical_delivery_office_name = v
    }),
    Field::text_list("memberOf", |u: &mut U, v: Vec<String>| u.member_of = v),
    Field::text("mail", |u: &mut U, v: String| u.mail = v),
    Field::text("mailNickname", |u: &mut U, v: String| u.mail_nickname = v),
    Field::text("userPrincipalName", |u: &mut U, v: String| u.user_principal_name = v),
    Field::tick_time("pwdLastSet", |u: &mut U, v: Timestamp| u.pwd_last_set = v),
    Field::tick_time("lockoutTime", |u: &mut U, v: Timestamp| u.lockout_time = v),
    Field::tick_time("lastLogon", |u: &mut U, v: Timestamp| u.last_logon = v),
    Field::tick_time("msDS-UserPasswordExpiryTimeComputed", |u: &mut U, v: Timestamp| {
        u.password_expiry_time = v
    }),
    Field::text_list("proxyAddresses", |u: &mut U, v: Vec<String>| u.proxy_addresses = v),
    Field::integer("userAccountControl", |u: &mut U, v: i64| u.user_account_control = v),
    Field::text("legacyExchangeDN", |u: &mut U, v: String| u.legacy_exchange_dn = v),
    Field::text("homeMDB", |u: &mut U, v: String| u.home_mdb = v),
    Field::boolean("mDBUseDefaults", |u: &mut U, v: bool| u.mdb_use_defaults = v),
    Field::integer("mDBStorageQuota", |u: &mut U, v: i64| u.mdb_storage_quota = v),
    Field::integer("mDBOverQuotaLimit", |u: &mut U, v: i64| u.mdb_over_quota_limit = v),
    Field::integer("mDBOverHardQuotaLimit", |u: &mut U, v: i64| {
        u.mdb_over_hard_quota_limit = v
    }),
];

impl DirectoryRecord for User {
    const KIND: &'static str = "user";

    fn fields() -> &'static [Field<Self>] {
        USER_FIELDS
    }

    fn common(&self) -> &CommonAttributes {
        &self.common
    }

    fn common_mut(&mut self) -> &mut CommonAttributes {
        &mut self.common
    }
}

/// Request to create an enabled account.
#[derive(Clone, Default, Deserialize)]
pub struct NewUser {
    pub account: String,
    pub display_name: String,
    /// Container DN the account is created in.
    pub org_unit: String,
    pub password: String,
    /// Account domain; empty selects the configured primary domain.
    #[serde(default)]
    pub domain: String,
}

impl std::fmt::Debug for NewUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewUser")
            .field("account", &self.account)
            .field("display_name", &self.display_name)
            .field("org_unit", &self.org_unit)
            .field("password", &"***REDACTED***")
            .field("domain", &self.domain)
            .finish()
    }
}

impl NewUser {
    /// `CN=<account>,<org unit>`.
    pub fn distinguished_name(&self) -> String {
        format!("CN={},{}", escape_dn_value(&self.account), self.org_unit)
    }

    /// Attributes of the initial add; the account starts disabled with no password.
    pub fn creation_attributes(&self, domain: &str) -> Vec<(String, Vec<Vec<u8>>)> {
        let text = |value: &str| vec![value.as_bytes().to_vec()];
        vec![
            (
                "objectClass".to_string(),
                ["top", "user", "organizationalPerson", "person"]
                    .iter()
                    .map(|c| c.as_bytes().to_vec())
                    .collect(),
            ),
            ("name".to_string(), text(&self.account)),
            ("displayName".to_string(), text(&self.display_name)),
            (
                "sAMAccountName".to_string(),
                text(&self.account.to_lowercase()),
            ),
            ("instanceType".to_string(), text("4")),
            (
                "userAccountControl".to_string(),
                text(&UAC_DISABLED_ACCOUNT.to_string()),
            ),
            (
                "userPrincipalName".to_string(),
                text(&format!("{}@{}", self.account, domain)),
            ),
            ("accountExpires".to_string(), text("0")),
        ]
    }
}

/// Caller-supplied user changes. Empty or zero fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UserChanges {
    pub sam_account_name: String,
    pub display_name: String,
    pub description: String,
    pub user_account_control: i64,
    pub proxy_addresses: Vec<String>,
    pub mail: String,
    /// New container DN; applied as a move after the attribute replace.
    pub org_unit: String,
}

impl UserChanges {
    pub fn replace_map(&self) -> ReplaceMap {
        let mut map = ReplaceMap::new();
        let texts = [
            ("sAMAccountName", &self.sam_account_name),
            ("displayName", &self.display_name),
            ("description", &self.description),
            ("mail", &self.mail),
        ];
        for (attribute, value) in texts {
            if !value.is_empty() {
                map.insert(attribute.to_string(), vec![value.clone()]);
            }
        }
        if self.user_account_control != 0 {
            map.insert(
                "userAccountControl".to_string(),
                vec![self.user_account_control.to_string()],
            );
        }
        if !self.proxy_addresses.is_empty() {
            map.insert("proxyAddresses".to_string(), self.proxy_addresses.clone());
        }
        map
    }
}
