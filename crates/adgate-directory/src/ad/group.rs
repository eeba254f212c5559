use serde::{Deserialize, Serialize};

use super::{CommonAttributes, ReplaceMap};
use crate::dn::escape_dn_value;
use crate::schema::{DirectoryRecord, Field};

/// Global security group (`ADS_GROUP_TYPE_GLOBAL_GROUP | ADS_GROUP_TYPE_SECURITY_ENABLED`).
pub const GROUP_TYPE_GLOBAL_SECURITY: i64 = -2_147_483_646;

/// A group. `member` is filled by ranged retrieval, not by the primary search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    #[serde(flatten)]
    pub common: CommonAttributes,
    pub cn: String,
    pub member: Vec<String>,
    pub mail: String,
    pub mail_nickname: String,
    pub ms_exch_co_managed_by_link: Vec<String>,
    pub proxy_addresses: Vec<String>,
    pub managed_by: String,
    pub group_type: i64,
}

type G = Group;

static GROUP_FIELDS: &[Field<Group>] = &[
    Field::text("cn", |g: &mut G, v: String| g.cn = v),
    Field::text("mail", |g: &mut G, v: String| g.mail = v),
    Field::text("mailNickname", |g: &mut G, v: String| g.mail_nickname = v),
    Field::text_list("msExchCoManagedByLink", |g: &mut G, v: Vec<String>| {
        g.ms_exch_co_managed_by_link = v
    }),
    Field::text_list("proxyAddresses", |g: &mut G, v: Vec<String>| g.proxy_addresses = v),
    Field::text("managedBy", |g: &mut G, v: String| g.managed_by = v),
    Field::integer("groupType", |g: &mut G, v: i64| g.group_type = v),
];

impl DirectoryRecord for Group {
    const KIND: &'static str = "group";

    fn fields() -> &'static [Field<Self>] {
        GROUP_FIELDS
    }

    fn common(&self) -> &CommonAttributes {
        &self.common
    }

    fn common_mut(&mut self) -> &mut CommonAttributes {
        &mut self.common
    }
}

/// Request to create a group.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewGroup {
    pub account: String,
    pub org_unit: String,
    #[serde(default)]
    pub display_name: String,
    /// Empty selects the configured default description.
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_group_type")]
    pub group_type: i64,
}

fn default_group_type() -> i64 {
    GROUP_TYPE_GLOBAL_SECURITY
}

impl NewGroup {
    pub fn distinguished_name(&self) -> String {
        format!("CN={},{}", escape_dn_value(&self.account), self.org_unit)
    }

    pub fn creation_attributes(&self, default_description: &str) -> Vec<(String, Vec<Vec<u8>>)> {
        let text = |value: &str| vec![value.as_bytes().to_vec()];
        let display_name = if self.display_name.is_empty() {
            &self.account
        } else {
            &self.display_name
        };
        let description = if self.description.is_empty() {
            default_description
        } else {
            &self.description
        };
        vec![
            (
                "objectClass".to_string(),
                vec![b"top".to_vec(), b"group".to_vec()],
            ),
            ("name".to_string(), text(&self.account)),
            ("displayName".to_string(), text(display_name)),
            (
                "sAMAccountName".to_string(),
                text(&self.account.to_lowercase()),
            ),
            ("groupType".to_string(), text(&self.group_type.to_string())),
            ("description".to_string(), text(description)),
        ]
    }
}

/// Caller-supplied group changes. Empty fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GroupChanges {
    pub display_name: String,
    pub description: String,
    pub proxy_addresses: Vec<String>,
    pub mail: String,
    pub org_unit: String,
}

impl GroupChanges {
    pub fn replace_map(&self) -> ReplaceMap {
        let mut map = ReplaceMap::new();
        let texts = [
            ("displayName", &self.display_name),
            ("description", &self.description),
            ("mail", &self.mail),
        ];
        for (attribute, value) in texts {
            if !value.is_empty() {
                map.insert(attribute.to_string(), vec![value.clone()]);
            }
        }
        if !self.proxy_addresses.is_empty() {
            map.insert("proxyAddresses".to_string(), self.proxy_addresses.clone());
        }
        map
    }
}
