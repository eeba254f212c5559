//! Codecs for Active Directory attribute encodings.
//!
//! Security identifiers and object GUIDs arrive as raw bytes, account timestamps
//! as FILETIME tick counts and audit timestamps as generalized time strings.
//! Everything here is pure and allocation-light.

mod guid;
mod sid;
mod time;

pub use guid::{format_guid, unformat_guid};
pub use sid::{encode_sid, format_sid};
pub use time::{parse_file_time, parse_generalized_time, FILETIME_NEVER};

/// Lowercase hex rendering used in error messages for binary values.
pub(crate) fn hex_string(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
