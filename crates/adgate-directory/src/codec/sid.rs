//! Security identifier (objectSid) codec.
//!
//! Binary layout: revision (1 byte), sub-authority count (1 byte), identifier
//! authority (6 bytes, big-endian), then `count` sub-authorities (4 bytes each,
//! little-endian).

use super::hex_string;
use crate::error::{DirectoryError, DirectoryResult};

const HEADER_LEN: usize = 8;
const MAX_SUB_AUTHORITIES: usize = 15;
const MAX_AUTHORITY: u64 = (1 << 48) - 1;

/// Render a binary SID as `S-{revision}-{authority}-{sub}...`.
pub fn format_sid(bytes: &[u8]) -> DirectoryResult<String> {
    if bytes.len() < HEADER_LEN {
        return Err(DirectoryError::invalid_format("objectSid", hex_string(bytes)));
    }

    let revision = bytes[0];
    let count = usize::from(bytes[1]);
    if bytes.len() < HEADER_LEN + count * 4 {
        return Err(DirectoryError::invalid_format("objectSid", hex_string(bytes)));
    }

    let authority = bytes[2..HEADER_LEN]
        .iter()
        .fold(0u64, |acc, b| (acc << 8) | u64::from(*b));

    let mut sid = format!("S-{revision}-{authority}");
    for chunk in bytes[HEADER_LEN..HEADER_LEN + count * 4].chunks_exact(4) {
        let sub = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        sid.push('-');
        sid.push_str(&sub.to_string());
    }
    Ok(sid)
}

/// Encode a textual SID back into its binary form, for filtering by `objectSid`.
pub fn encode_sid(sid: &str) -> DirectoryResult<Vec<u8>> {
    let invalid = || DirectoryError::invalid_format("objectSid", sid);

    let mut parts = sid.split('-');
    if !parts.next().is_some_and(|p| p.eq_ignore_ascii_case("S")) {
        return Err(invalid());
    }
    let revision: u8 = parts
        .next()
        .and_then(|p| p.parse().ok())
        .ok_or_else(invalid)?;
    let authority: u64 = parts
        .next()
        .and_then(|p| p.parse().ok())
        .filter(|a| *a <= MAX_AUTHORITY)
        .ok_or_else(invalid)?;
    let subs = parts
        .map(|p| p.parse::<u32>().map_err(|_| invalid()))
        .collect::<DirectoryResult<Vec<u32>>>()?;
    if subs.len() > MAX_SUB_AUTHORITIES {
        return Err(invalid());
    }

    let mut bytes = Vec::with_capacity(HEADER_LEN + subs.len() * 4);
    bytes.push(revision);
    bytes.push(subs.len() as u8);
    bytes.extend_from_slice(&authority.to_be_bytes()[2..]);
    for sub in subs {
        bytes.extend_from_slice(&sub.to_le_bytes());
    }
    Ok(bytes)
}
