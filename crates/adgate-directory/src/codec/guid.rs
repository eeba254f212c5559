//! Object GUID codec.
//!
//! Active Directory stores `objectGUID` in the Microsoft mixed-endian layout:
//! the first three groups little-endian, the last two big-endian. `uuid`'s
//! `*_le` constructors implement exactly that reordering.

use uuid::Uuid;

use super::hex_string;
use crate::error::{DirectoryError, DirectoryResult};

/// Render the 16 raw bytes of an `objectGUID` in canonical hyphenated form.
pub fn format_guid(bytes: &[u8]) -> DirectoryResult<String> {
    let guid = Uuid::from_slice_le(bytes)
        .map_err(|_| DirectoryError::invalid_format("objectGUID", hex_string(bytes)))?;
    Ok(guid.hyphenated().to_string())
}

/// Reverse [`format_guid`]: recover the raw wire bytes from the canonical string.
pub fn unformat_guid(guid: &str) -> DirectoryResult<[u8; 16]> {
    let parsed =
        Uuid::parse_str(guid).map_err(|_| DirectoryError::invalid_format("objectGUID", guid))?;
    Ok(parsed.to_bytes_le())
}

#[cfg(test)]
mod tests {
    use super::*;

    const WIRE: [u8; 16] = [
        0x78, 0x56, 0x34, 0x12, 0xbc, 0x9a, 0xf0, 0xde, 0x12, 0x34, 0x56, 0x78, 0x9a, 0xbc, 0xde,
        0xf0,
    ];

    #[test]
    fn test_format_mixed_endian() {
        assert_eq!(
            format_guid(&WIRE).unwrap(),
            "12345678-9abc-def0-1234-56789abcdef0"
        );
    }

    #[test]
    fn test_unformat_reverses_bytes() {
        assert_eq!(
            unformat_guid("12345678-9abc-def0-1234-56789abcdef0").unwrap(),
            WIRE
        );
        assert_eq!(
            unformat_guid("12345678-9ABC-DEF0-1234-56789ABCDEF0").unwrap(),
            WIRE
        );
    }

    #[test]
    fn test_unformat_format_is_identity() {
        // deterministic sweep over byte patterns
        let mut state: u64 = 0x9e37_79b9_7f4a_7c15;
        for _ in 0..512 {
            let mut bytes = [0u8; 16];
            for b in bytes.iter_mut() {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                *b = (state >> 24) as u8;
            }
            let text = format_guid(&bytes).unwrap();
            assert_eq!(unformat_guid(&text).unwrap(), bytes);
        }
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(matches!(
            format_guid(&WIRE[..15]),
            Err(DirectoryError::InvalidFormat { .. })
        ));
        assert!(unformat_guid("not-a-guid").is_err());
        assert!(unformat_guid("").is_err());
    }
}
