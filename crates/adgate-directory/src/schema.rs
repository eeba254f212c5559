//! Compile-time record schemas.
//!
//! Each record type declares a static table mapping a wire attribute name to a
//! setter and a decode rule. The mapper walks these tables; nothing is
//! discovered at runtime.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::ad::CommonAttributes;
use crate::codec::{format_guid, format_sid, parse_file_time, parse_generalized_time};
use crate::error::DirectoryResult;

type Timestamp = Option<DateTime<Utc>>;

/// How a wire attribute is decoded and where the result goes.
pub enum FieldKind<R> {
    Text(fn(&mut R, String)),
    Integer(fn(&mut R, i64)),
    Float(fn(&mut R, f64)),
    Boolean(fn(&mut R, bool)),
    Sid(fn(&mut R, String)),
    Guid(fn(&mut R, String)),
    GeneralizedTime(fn(&mut R, Timestamp)),
    TickTime(fn(&mut R, Timestamp)),
    TextList(fn(&mut R, Vec<String>)),
}

/// One row of a record schema.
pub struct Field<R> {
    pub attribute: &'static str,
    pub kind: FieldKind<R>,
}

impl<R> Field<R> {
    pub const fn text(attribute: &'static str, set: fn(&mut R, String)) -> Self {
        Self {
            attribute,
            kind: FieldKind::Text(set),
        }
    }

    pub const fn integer(attribute: &'static str, set: fn(&mut R, i64)) -> Self {
        Self {
            attribute,
            kind: FieldKind::Integer(set),
        }
    }

    pub const fn float(attribute: &'static str, set: fn(&mut R, f64)) -> Self {
        Self {
            attribute,
            kind: FieldKind::Float(set),
        }
    }

    pub const fn boolean(attribute: &'static str, set: fn(&mut R, bool)) -> Self {
        Self {
            attribute,
            kind: FieldKind::Boolean(set),
        }
    }

    pub const fn sid(attribute: &'static str, set: fn(&mut R, String)) -> Self {
        Self {
            attribute,
            kind: FieldKind::Sid(set),
        }
    }

    pub const fn guid(attribute: &'static str, set: fn(&mut R, String)) -> Self {
        Self {
            attribute,
            kind: FieldKind::Guid(set),
        }
    }

    pub const fn generalized_time(attribute: &'static str, set: fn(&mut R, Timestamp)) -> Self {
        Self {
            attribute,
            kind: FieldKind::GeneralizedTime(set),
        }
    }

    pub const fn tick_time(attribute: &'static str, set: fn(&mut R, Timestamp)) -> Self {
        Self {
            attribute,
            kind: FieldKind::TickTime(set),
        }
    }

    pub const fn text_list(attribute: &'static str, set: fn(&mut R, Vec<String>)) -> Self {
        Self {
            attribute,
            kind: FieldKind::TextList(set),
        }
    }

    /// Whether this field consumes the given returned attribute name.
    pub fn matches(&self, attribute: &str) -> bool {
        self.attribute.eq_ignore_ascii_case(attribute)
    }

    /// Decode `values` and store the result on `record`.
    ///
    /// Binary and time decoding failures are errors. Unparsable numeric or
    /// boolean text leaves the field at its default.
    pub fn apply(&self, record: &mut R, values: &[Vec<u8>]) -> DirectoryResult<()> {
        let Some(first) = values.first() else {
            return Ok(());
        };
        let text = || String::from_utf8_lossy(first).into_owned();

        match self.kind {
            FieldKind::Text(set) => set(record, text()),
            FieldKind::Integer(set) => match text().trim().parse() {
                Ok(value) => set(record, value),
                Err(_) => self.skip(&text()),
            },
            FieldKind::Float(set) => match text().trim().parse() {
                Ok(value) => set(record, value),
                Err(_) => self.skip(&text()),
            },
            FieldKind::Boolean(set) => match text().trim().to_ascii_uppercase().as_str() {
                "TRUE" => set(record, true),
                "FALSE" => set(record, false),
                _ => self.skip(&text()),
            },
            FieldKind::Sid(set) => set(record, format_sid(first)?),
            FieldKind::Guid(set) => set(record, format_guid(first)?),
            FieldKind::GeneralizedTime(set) => set(record, parse_generalized_time(&text())?),
            FieldKind::TickTime(set) => set(record, parse_file_time(&text())?),
            FieldKind::TextList(set) => set(
                record,
                values
                    .iter()
                    .map(|v| String::from_utf8_lossy(v).into_owned())
                    .collect(),
            ),
        }
        Ok(())
    }

    fn skip(&self, raw: &str) {
        debug!(attribute = self.attribute, value = raw, "Ignoring unparsable attribute value");
    }
}

/// A structured view of one kind of directory object.
///
/// Every record carries the common attributes by composition and adds its own
/// schema table on top of [`crate::ad::COMMON_FIELDS`].
pub trait DirectoryRecord: Default + Send + 'static {
    /// Human-readable object kind, used in log and error messages.
    const KIND: &'static str;

    /// Fields specific to this record type.
    fn fields() -> &'static [Field<Self>];

    fn common(&self) -> &CommonAttributes;

    fn common_mut(&mut self) -> &mut CommonAttributes;
}
