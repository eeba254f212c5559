//! Filter and distinguished-name escaping.

use crate::error::{DirectoryError, DirectoryResult};

/// Escape a value for use inside a search filter (RFC 4515).
pub fn escape_filter_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => escaped.push_str("\\5c"),
            '*' => escaped.push_str("\\2a"),
            '(' => escaped.push_str("\\28"),
            ')' => escaped.push_str("\\29"),
            '\0' => escaped.push_str("\\00"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Escape every byte of a binary value, e.g. for `(objectGUID=...)`.
pub fn escape_filter_bytes(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("\\{b:02x}")).collect()
}

/// Escape an attribute value for use in a DN (RFC 4514).
pub fn escape_dn_value(value: &str) -> String {
    let last = value.chars().count().saturating_sub(1);
    let mut escaped = String::with_capacity(value.len() * 2);

    for (i, ch) in value.chars().enumerate() {
        match ch {
            ',' | '+' | '"' | '\\' | '<' | '>' | ';' | '=' => {
                escaped.push('\\');
                escaped.push(ch);
            }
            '\0' => escaped.push_str("\\00"),
            ' ' if i == 0 || i == last => escaped.push_str("\\20"),
            '#' if i == 0 => escaped.push_str("\\23"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Split a DN into its leading RDN and the parent container.
///
/// The separator is the first comma not escaped by a backslash.
pub fn split_rdn(dn: &str) -> DirectoryResult<(&str, &str)> {
    let mut escaped = false;
    for (i, ch) in dn.char_indices() {
        match ch {
            '\\' if !escaped => escaped = true,
            ',' if !escaped => {
                let (rdn, parent) = (dn[..i].trim(), dn[i + 1..].trim());
                if rdn.is_empty() || parent.is_empty() {
                    break;
                }
                return Ok((rdn, parent));
            }
            _ => escaped = false,
        }
    }
    Err(DirectoryError::invalid_format("distinguished name", dn))
}

/// Attribute descriptions are a letter followed by letters, digits or hyphens.
pub fn is_valid_attribute_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '-')
}
