//! # Directory gateway
//!
//! Account and group management against an Active Directory domain over LDAP.
//!
//! ## Features
//!
//! - Bounded connection pool with liveness probing and acquire timeouts
//! - Decoding of SIDs, GUIDs, FILETIME ticks and generalized time
//! - Schema-driven mapping of entries into typed records
//! - Ranged retrieval of large group memberships
//! - Account creation, password resets, moves and membership changes
//!
//! ## Example
//!
//! ```ignore
//! use adgate_directory::{DirectoryConfig, IdType, LdapDirectoryService};
//!
//! let config = DirectoryConfig::from_env()?;
//! let service = LdapDirectoryService::from_config(&config)?;
//!
//! let user = service.get_user("jdoe", &IdType::SamAccountName, None).await?;
//! println!("{}", user.common.distinguished_name);
//! ```

pub mod ad;
pub mod codec;
pub mod config;
pub mod dn;
pub mod error;
pub mod ldap;
pub mod mapper;
pub mod pager;
pub mod pool;
pub mod schema;
pub mod service;
pub mod session;

// Re-exports
pub use ad::{
    CommonAttributes, Group, GroupChanges, IdType, NewGroup, NewUser, ReplaceMap, User,
    UserChanges,
};
pub use config::{ConfigError, DirectoryConfig};
pub use error::{DirectoryError, DirectoryResult};
pub use ldap::{LdapConnector, LdapSession};
pub use mapper::ObjectMapper;
pub use pager::MembershipPager;
pub use pool::{ConnectionPool, PoolStatus, PooledConnection};
pub use service::{
    Availability, DirectoryService, LdapDirectoryService, MembershipAction, MembershipUpdate,
};
pub use session::{
    DirectoryEntry, DirectorySession, Modification, SearchScope, SessionFactory,
};
