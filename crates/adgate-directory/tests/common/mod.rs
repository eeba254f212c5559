//! Common test utilities for adgate-directory integration tests.
//!
//! [`FakeDirectory`] is an in-memory directory server behind the session seam.
//! It understands the filters the service issues, answers ranged `member`
//! requests the way a domain controller does and records every call.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use adgate_directory::codec::format_guid;
use adgate_directory::{
    DirectoryConfig, DirectoryEntry, DirectoryError, DirectoryResult, DirectoryService,
    DirectorySession, Modification, SearchScope, SessionFactory,
};
use async_trait::async_trait;

pub const BASE_DN: &str = "DC=corp,DC=local";
pub const USERS_OU: &str = "OU=Staff,DC=corp,DC=local";
pub const GROUPS_OU: &str = "OU=Groups,DC=corp,DC=local";

/// One recorded search request.
#[derive(Debug, Clone)]
pub struct SearchRecord {
    pub base: String,
    pub filter: String,
    pub attributes: Vec<String>,
}

/// Shared server state.
#[derive(Debug, Default)]
pub struct DirectoryState {
    pub entries: Vec<DirectoryEntry>,
    pub opens: usize,
    pub closes: usize,
    pub searches: Vec<SearchRecord>,
    pub modifications: Vec<(String, Vec<Modification>)>,
    pub renames: Vec<(String, String)>,
    /// Session ids whose liveness probe fails.
    pub dead: HashSet<usize>,
    pub refuse_connections: bool,
    /// Number of upcoming dials to refuse.
    pub refuse_next: usize,
    next_guid: u64,
}

impl DirectoryState {
    fn position(&self, dn: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.dn.eq_ignore_ascii_case(dn))
    }

    fn next_guid(&mut self) -> Vec<u8> {
        self.next_guid += 1;
        let mut bytes = [0xadu8; 16];
        bytes[..8].copy_from_slice(&self.next_guid.to_le_bytes());
        bytes.to_vec()
    }
}

/// In-memory directory; cloning shares the same state.
#[derive(Debug, Clone, Default)]
pub struct FakeDirectory {
    state: Arc<Mutex<DirectoryState>>,
}

impl FakeDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MutexGuard<'_, DirectoryState> {
        self.state.lock().unwrap()
    }

    pub fn opens(&self) -> usize {
        self.state().opens
    }

    pub fn search_count(&self) -> usize {
        self.state().searches.len()
    }

    pub fn searches(&self) -> Vec<SearchRecord> {
        self.state().searches.clone()
    }

    pub fn modifications(&self) -> Vec<(String, Vec<Modification>)> {
        self.state().modifications.clone()
    }

    /// Make every session opened so far fail its liveness probe.
    pub fn kill_open_sessions(&self) {
        let mut state = self.state();
        let opened = state.opens;
        state.dead.extend(1..=opened);
    }

    pub fn refuse_connections(&self, refuse: bool) {
        self.state().refuse_connections = refuse;
    }

    /// Refuse only the next `count` dials.
    pub fn refuse_next_connections(&self, count: usize) {
        self.state().refuse_next = count;
    }

    pub fn entry(&self, dn: &str) -> Option<DirectoryEntry> {
        let state = self.state();
        state.position(dn).map(|i| state.entries[i].clone())
    }

    pub fn text(&self, dn: &str, attribute: &str) -> Vec<String> {
        self.entry(dn)
            .map(|e| e.text_values(attribute))
            .unwrap_or_default()
    }

    /// Insert an entry as-is, adding `distinguishedName` and `objectGUID`.
    pub fn insert(&self, entry: DirectoryEntry) -> String {
        let mut state = self.state();
        let guid = state.next_guid();
        let dn = entry.dn.clone();
        let entry = entry
            .with_attribute("distinguishedName", [dn.clone()])
            .with_attribute("objectGUID", [guid]);
        state.entries.push(entry);
        dn
    }

    /// Seed an enabled user `CN=<sam>,<ou>`.
    pub fn seed_user(&self, sam: &str, ou: &str) -> String {
        self.insert(
            DirectoryEntry::new(format!("CN={sam},{ou}"))
                .with_attribute("objectClass", ["top", "person", "organizationalPerson", "user"])
                .with_attribute("objectCategory", ["person"])
                .with_attribute("name", [sam])
                .with_attribute("displayName", [format!("User {sam}")])
                .with_attribute("sAMAccountName", [sam])
                .with_attribute("userPrincipalName", [format!("{sam}@corp.local")])
                .with_attribute("proxyAddresses", [format!("SMTP:{sam}@corp.local")])
                .with_attribute("userAccountControl", ["512"])
                .with_attribute("whenCreated", ["20240102030405.0Z"]),
        )
    }

    /// Seed a group `CN=<name>,<ou>` with the given member DNs.
    pub fn seed_group(&self, name: &str, ou: &str, members: &[String]) -> String {
        let mut entry = DirectoryEntry::new(format!("CN={name},{ou}"))
            .with_attribute("objectClass", ["top", "group"])
            .with_attribute("objectCategory", ["group"])
            .with_attribute("name", [name])
            .with_attribute("cn", [name])
            .with_attribute("sAMAccountName", [name.to_lowercase()])
            .with_attribute("groupType", ["-2147483646"]);
        if !members.is_empty() {
            entry = entry.with_attribute("member", members.iter().map(String::as_str));
        }
        self.insert(entry)
    }

    /// Add or replace one attribute of an existing entry.
    pub fn set_attribute(&self, dn: &str, attribute: &str, values: &[&str]) {
        let mut state = self.state();
        let index = state.position(dn).expect("entry exists");
        let entry = &mut state.entries[index];
        entry
            .attributes
            .retain(|(name, _)| !name.eq_ignore_ascii_case(attribute));
        entry.attributes.push((
            attribute.to_string(),
            values.iter().map(|v| v.as_bytes().to_vec()).collect(),
        ));
    }

    /// Formatted `objectGUID` of an entry.
    pub fn guid_of(&self, dn: &str) -> String {
        let entry = self.entry(dn).expect("entry exists");
        format_guid(&entry.values("objectGUID").expect("guid present")[0]).unwrap()
    }
}

#[async_trait]
impl SessionFactory for FakeDirectory {
    type Session = FakeSession;

    async fn open(&self) -> DirectoryResult<FakeSession> {
        let mut state = self.state();
        state.opens += 1;
        if state.refuse_next > 0 {
            state.refuse_next -= 1;
            return Err(DirectoryError::connection_failed("connection refused"));
        }
        if state.refuse_connections {
            return Err(DirectoryError::connection_failed("connection refused"));
        }
        Ok(FakeSession {
            id: state.opens,
            state: Arc::clone(&self.state),
        })
    }
}

/// A session bound to the shared state.
#[derive(Debug)]
pub struct FakeSession {
    pub id: usize,
    state: Arc<Mutex<DirectoryState>>,
}

#[async_trait]
impl DirectorySession for FakeSession {
    async fn search(
        &mut self,
        base: &str,
        scope: SearchScope,
        filter: &str,
        attributes: &[&str],
    ) -> DirectoryResult<Vec<DirectoryEntry>> {
        let mut state = self.state.lock().unwrap();
        state.searches.push(SearchRecord {
            base: base.to_string(),
            filter: filter.to_string(),
            attributes: attributes.iter().map(|a| a.to_string()).collect(),
        });

        let parsed = parse_filter(filter);
        Ok(state
            .entries
            .iter()
            .filter(|e| in_scope(&e.dn, base, scope) && parsed.matches(e))
            .map(|e| project(e, attributes))
            .collect())
    }

    async fn add(
        &mut self,
        dn: &str,
        attributes: Vec<(String, Vec<Vec<u8>>)>,
    ) -> DirectoryResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.position(dn).is_some() {
            return Err(DirectoryError::already_exists(dn));
        }
        let mut entry = DirectoryEntry {
            dn: dn.to_string(),
            attributes,
        };
        let is_group = entry
            .text_values("objectClass")
            .iter()
            .any(|c| c.eq_ignore_ascii_case("group"));
        let category = if is_group { "group" } else { "person" };
        let guid = state.next_guid();
        entry = entry
            .with_attribute("objectCategory", [category])
            .with_attribute("distinguishedName", [dn])
            .with_attribute("objectGUID", [guid]);
        state.entries.push(entry);
        Ok(())
    }

    async fn modify(&mut self, dn: &str, changes: Vec<Modification>) -> DirectoryResult<()> {
        let mut state = self.state.lock().unwrap();
        state.modifications.push((dn.to_string(), changes.clone()));
        let index = state
            .position(dn)
            .ok_or_else(|| DirectoryError::not_found(dn))?;

        let mut entry = state.entries[index].clone();
        for change in changes {
            apply_change(&mut entry, change)?;
        }
        state.entries[index] = entry;
        Ok(())
    }

    async fn modify_dn(
        &mut self,
        dn: &str,
        new_rdn: &str,
        new_parent: &str,
    ) -> DirectoryResult<()> {
        let mut state = self.state.lock().unwrap();
        let index = state
            .position(dn)
            .ok_or_else(|| DirectoryError::not_found(dn))?;
        let new_dn = format!("{new_rdn},{new_parent}");
        if state.position(&new_dn).is_some() {
            return Err(DirectoryError::already_exists(new_dn));
        }
        state.renames.push((dn.to_string(), new_dn.clone()));

        let entry = &mut state.entries[index];
        entry.dn = new_dn.clone();
        set_values(entry, "distinguishedName", vec![new_dn.as_bytes().to_vec()]);

        // Referential integrity for group membership.
        for other in &mut state.entries {
            for (name, values) in &mut other.attributes {
                if name.eq_ignore_ascii_case("member") {
                    for value in values.iter_mut() {
                        if value.eq_ignore_ascii_case(dn.as_bytes()) {
                            *value = new_dn.as_bytes().to_vec();
                        }
                    }
                }
            }
        }
        Ok(())
    }

    async fn is_alive(&mut self) -> bool {
        !self.state.lock().unwrap().dead.contains(&self.id)
    }

    async fn close(&mut self) {
        self.state.lock().unwrap().closes += 1;
    }
}

fn set_values(entry: &mut DirectoryEntry, attribute: &str, values: Vec<Vec<u8>>) {
    entry
        .attributes
        .retain(|(name, _)| !name.eq_ignore_ascii_case(attribute));
    if !values.is_empty() {
        entry.attributes.push((attribute.to_string(), values));
    }
}

fn apply_change(entry: &mut DirectoryEntry, change: Modification) -> DirectoryResult<()> {
    match change {
        Modification::Replace(attribute, values) => set_values(entry, &attribute, values),
        Modification::Add(attribute, values) => {
            let mut current = entry.values(&attribute).unwrap_or_default().to_vec();
            for value in values {
                if current.iter().any(|v| v.eq_ignore_ascii_case(&value)) {
                    return Err(DirectoryError::opt_failed(
                        format!("modify '{}'", entry.dn),
                        "attributeOrValueExists (code 20)",
                    ));
                }
                current.push(value);
            }
            set_values(entry, &attribute, current);
        }
        Modification::Delete(attribute, values) => {
            if values.is_empty() {
                set_values(entry, &attribute, Vec::new());
                return Ok(());
            }
            let mut current = entry.values(&attribute).unwrap_or_default().to_vec();
            for value in values {
                let before = current.len();
                current.retain(|v| !v.eq_ignore_ascii_case(&value));
                if current.len() == before {
                    return Err(DirectoryError::opt_failed(
                        format!("modify '{}'", entry.dn),
                        "noSuchAttribute (code 16)",
                    ));
                }
            }
            set_values(entry, &attribute, current);
        }
    }
    Ok(())
}

fn in_scope(dn: &str, base: &str, scope: SearchScope) -> bool {
    let dn = dn.to_lowercase();
    let base = base.to_lowercase();
    match scope {
        SearchScope::Base => dn == base,
        SearchScope::OneLevel => dn
            .split_once(',')
            .map(|(_, parent)| parent == base)
            .unwrap_or(false),
        SearchScope::Subtree => dn == base || dn.ends_with(&format!(",{base}")),
    }
}

/// Copy the requested attributes, answering `member;range=lo-hi` with a slice.
fn project(entry: &DirectoryEntry, attributes: &[&str]) -> DirectoryEntry {
    let mut result = DirectoryEntry::new(entry.dn.clone());
    for requested in attributes {
        if let Some(range) = requested.strip_prefix("member;range=") {
            let Some(members) = entry.values("member") else {
                continue;
            };
            let (low, high) = range.split_once('-').expect("ranged request");
            let low: usize = low.parse().expect("numeric low bound");
            let high: usize = high.parse().expect("numeric high bound");
            let end = (high + 1).min(members.len());
            let slice = members.get(low.min(end)..end).unwrap_or_default().to_vec();
            let name = if high + 1 >= members.len() {
                format!("member;range={low}-*")
            } else {
                format!("member;range={low}-{high}")
            };
            result.attributes.push((name, slice));
        } else if let Some(values) = entry.values(requested) {
            result
                .attributes
                .push((requested.to_string(), values.to_vec()));
        }
    }
    result
}

enum Filter {
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Equals(String, Vec<u8>),
}

impl Filter {
    fn matches(&self, entry: &DirectoryEntry) -> bool {
        match self {
            Filter::And(children) => children.iter().all(|c| c.matches(entry)),
            Filter::Or(children) => children.iter().any(|c| c.matches(entry)),
            Filter::Equals(attribute, value) => entry
                .values(attribute)
                .map(|values| values.iter().any(|v| v.eq_ignore_ascii_case(value)))
                .unwrap_or(false),
        }
    }
}

fn parse_filter(filter: &str) -> Filter {
    let (parsed, rest) = parse_node(filter.as_bytes());
    assert!(rest.is_empty(), "trailing input in filter {filter}");
    parsed
}

fn parse_node(input: &[u8]) -> (Filter, &[u8]) {
    assert_eq!(input[0], b'(', "filter must start with '('");
    match input[1] {
        op @ (b'&' | b'|') => {
            let mut rest = &input[2..];
            let mut children = Vec::new();
            while rest[0] == b'(' {
                let (child, remaining) = parse_node(rest);
                children.push(child);
                rest = remaining;
            }
            assert_eq!(rest[0], b')');
            let node = if op == b'&' {
                Filter::And(children)
            } else {
                Filter::Or(children)
            };
            (node, &rest[1..])
        }
        _ => {
            let end = input.iter().position(|&b| b == b')').expect("closing paren");
            let body = &input[1..end];
            let eq = body.iter().position(|&b| b == b'=').expect("equality");
            let attribute = String::from_utf8(body[..eq].to_vec()).unwrap();
            (
                Filter::Equals(attribute, unescape(&body[eq + 1..])),
                &input[end + 1..],
            )
        }
    }
}

fn unescape(value: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(value.len());
    let mut i = 0;
    while i < value.len() {
        if value[i] == b'\\' {
            let hex = std::str::from_utf8(&value[i + 1..i + 3]).unwrap();
            out.push(u8::from_str_radix(hex, 16).unwrap());
            i += 3;
        } else {
            out.push(value[i]);
            i += 1;
        }
    }
    out
}

/// Config for a two-connection pool with two mail zones.
pub fn test_config() -> DirectoryConfig {
    DirectoryConfig::new("dc01.corp.local", BASE_DN, "CN=svc-adgate,DC=corp,DC=local", "corp.local")
        .with_password("not-a-real-secret")
        .with_zones(["corp.local", "mail.corp.local"])
        .with_pool_size(2)
}

/// Route library logs to the test harness. Safe to call repeatedly.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("adgate_directory=debug")
        .try_init();
}

pub fn test_service(directory: &FakeDirectory) -> DirectoryService<FakeDirectory> {
    init_test_logging();
    DirectoryService::new(directory.clone(), &test_config())
}

pub fn member_dns(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| format!("CN=member{i:05},{USERS_OU}"))
        .collect()
}
