//! `eventhub-core`: identifiers, entity records and the storage capabilities
//! the access core consumes.
//!
//! This crate contains no HTTP and no persistence: real stores implement the
//! traits defined here; the in-memory versions back tests and local runs.

pub mod audit;
pub mod directory;
pub mod error;
pub mod id;
pub mod session;

pub use audit::{AuditEntry, AuditSink, InMemoryAuditSink};
pub use directory::{Directory, EventRecord, InMemoryDirectory, OrganizationRecord, UserRecord};
pub use error::{DomainError, StoreError};
pub use id::{EventId, OrganizationId, UserId};
pub use session::{
    CredentialStore, InMemoryCredentialStore, InMemorySessionStore, RefreshSession, SessionStore,
};
