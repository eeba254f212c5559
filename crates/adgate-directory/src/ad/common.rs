use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::schema::{DirectoryRecord, Field};

/// Attributes shared by every directory object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommonAttributes {
    pub name: String,
    pub display_name: String,
    #[serde(rename = "sAMAccountName")]
    pub sam_account_name: String,
    pub distinguished_name: String,
    pub description: String,
    pub when_created: Option<DateTime<Utc>>,
    pub when_changed: Option<DateTime<Utc>>,
    pub object_class: Vec<String>,
    pub object_category: String,
    #[serde(rename = "objectGUID")]
    pub object_guid: String,
    #[serde(rename = "objectSid")]
    pub object_sid: String,
}

type C = CommonAttributes;

/// Schema shared by all record types.
pub static COMMON_FIELDS: &[Field<CommonAttributes>] = &[
    Field::text("name", |c: &mut C, v: String| c.name = v),
    Field::text("displayName", |c: &mut C, v: String| c.display_name = v),
    Field::text("sAMAccountName", |c: &mut C, v: String| c.sam_account_name = v),
    Field::text("distinguishedName", |c: &mut C, v: String| c.distinguished_name = v),
    Field::text("description", |c: &mut C, v: String| c.description = v),
    Field::generalized_time("whenCreated", |c: &mut C, v: Option<DateTime<Utc>>| {
        c.when_created = v
    }),
    Field::generalized_time("whenChanged", |c: &mut C, v: Option<DateTime<Utc>>| {
        c.when_changed = v
    }),
    Field::text_list("objectClass", |c: &mut C, v: Vec<String>| c.object_class = v),
    Field::text("objectCategory", |c: &mut C, v: String| c.object_category = v),
    Field::guid("objectGUID", |c: &mut C, v: String| c.object_guid = v),
    Field::sid("objectSid", |c: &mut C, v: String| c.object_sid = v),
];

impl DirectoryRecord for CommonAttributes {
    const KIND: &'static str = "object";

    fn fields() -> &'static [Field<Self>] {
        &[]
    }

    fn common(&self) -> &CommonAttributes {
        self
    }

    fn common_mut(&mut self) -> &mut CommonAttributes {
        self
    }
}
