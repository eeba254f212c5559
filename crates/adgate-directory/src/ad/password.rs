//! Account password policy and `unicodePwd` encoding.
//!
//! Active Directory only accepts `unicodePwd` over an encrypted connection,
//! as the password wrapped in double quotes and encoded as UTF-16LE.

use tracing::instrument;

use crate::error::{DirectoryError, DirectoryResult};

/// Characters counted as symbols by the complexity policy.
pub const PASSWORD_SYMBOLS: &str = "~`!@#$%^&*()_-+={}[]|\\:;<,>.?/";

const MIN_LENGTH: usize = 7;
const MIN_CATEGORIES: usize = 3;

/// Check the complexity policy.
///
/// At least seven characters, at least three of upper case, lower case, digits
/// and symbols, and no two-character substring of the account name
/// (case-insensitive).
pub fn is_strong_password(account: &str, password: &str) -> bool {
    if password.chars().count() < MIN_LENGTH {
        return false;
    }

    let (mut upper, mut lower, mut digit, mut symbol) = (false, false, false, false);
    for ch in password.chars() {
        if ch.is_uppercase() {
            upper = true;
        } else if ch.is_lowercase() {
            lower = true;
        } else if ch.is_numeric() {
            digit = true;
        } else if PASSWORD_SYMBOLS.contains(ch) {
            symbol = true;
        }
    }
    let categories = [upper, lower, digit, symbol].iter().filter(|c| **c).count();
    if categories < MIN_CATEGORIES {
        return false;
    }

    !reuses_account_name(account, password)
}

fn reuses_account_name(account: &str, password: &str) -> bool {
    let account: Vec<char> = account.to_lowercase().chars().collect();
    let password = password.to_lowercase();
    account
        .windows(2)
        .any(|pair| password.contains(&pair.iter().collect::<String>()))
}

/// Reject a weak password before anything is sent to the directory.
#[instrument(skip(password))]
pub fn validate_password(account: &str, password: &str) -> DirectoryResult<()> {
    if is_strong_password(account, password) {
        Ok(())
    } else {
        Err(DirectoryError::opt_failed(
            format!("set password for '{account}'"),
            "password is not strong enough",
        ))
    }
}

/// Encode a plaintext password for the `unicodePwd` attribute.
pub fn encode_ad_password(password: &str) -> Vec<u8> {
    let quoted = format!("\"{password}\"");
    quoted.encode_utf16().flat_map(u16::to_le_bytes).collect()
}
