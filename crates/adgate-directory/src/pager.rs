//! Ranged retrieval of the `member` attribute.
//!
//! The directory returns at most one window of values per request and names
//! the returned attribute `member;range=<lo>-<hi>`, with `hi == *` on the last
//! window.

use tracing::{debug, instrument};

use crate::error::{DirectoryError, DirectoryResult};
use crate::session::{DirectorySession, SearchScope};

/// Values the directory returns per ranged request by default.
pub const DEFAULT_MEMBER_WINDOW: u32 = 1500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Range {
    Bounded,
    Terminal,
}

/// Classify a returned attribute name. `None` if it is not a `member` value.
fn parse_range(attribute: &str) -> Option<Range> {
    let lower = attribute.to_ascii_lowercase();
    let rest = lower.strip_prefix("member")?;
    if rest.is_empty() {
        return Some(Range::Terminal);
    }
    let (_, high) = rest.strip_prefix(";range=")?.split_once('-')?;
    match high {
        "*" => Some(Range::Terminal),
        digits if digits.parse::<u64>().is_ok() => Some(Range::Bounded),
        _ => None,
    }
}

/// Walks `member;range=` windows until the terminal range.
#[derive(Debug, Clone, Copy)]
pub struct MembershipPager {
    window: u32,
}

impl Default for MembershipPager {
    fn default() -> Self {
        Self::new(DEFAULT_MEMBER_WINDOW)
    }
}

impl MembershipPager {
    pub fn new(window: u32) -> Self {
        Self {
            window: window.max(1),
        }
    }

    pub fn window(&self) -> u32 {
        self.window
    }

    /// Fetch every member DN of the group matched by `filter`, in directory order.
    #[instrument(level = "debug", skip(self, session))]
    pub async fn fetch_members<S: DirectorySession>(
        &self,
        session: &mut S,
        base: &str,
        filter: &str,
    ) -> DirectoryResult<Vec<String>> {
        let window = u64::from(self.window);
        let mut members = Vec::new();
        let mut low: u64 = 0;
        let mut requests = 0u32;

        loop {
            let attribute = format!("member;range={}-{}", low, low + window - 1);
            let entries = session
                .search(base, SearchScope::Subtree, filter, &[attribute.as_str()])
                .await?;
            requests += 1;

            let entry = entries
                .into_iter()
                .next()
                .ok_or_else(|| DirectoryError::not_found(filter))?;
            let ranged = entry
                .attributes
                .into_iter()
                .find_map(|(name, values)| parse_range(&name).map(|range| (range, values)));

            let Some((range, values)) = ranged else {
                break;
            };
            let received = values.len();
            members.extend(
                values
                    .into_iter()
                    .map(|v| String::from_utf8_lossy(&v).into_owned()),
            );
            if range == Range::Terminal || received == 0 {
                break;
            }
            low += window;
        }

        debug!(members = members.len(), requests, "Fetched group members");
        Ok(members)
    }
}
