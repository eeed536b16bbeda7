//! Read-only entity lookup capability consulted by the authorization layer.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{EventId, OrganizationId, StoreError, UserId};

/// Storage view of a user, as far as access decisions care.
///
/// `role` is the raw stored role name; the auth layer parses it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    pub email: String,
    pub role: String,
    pub is_active: bool,
    pub is_verified: bool,
    pub organization_id: Option<OrganizationId>,
}

/// Storage view of an organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationRecord {
    pub id: OrganizationId,
    pub name: String,
    pub is_verified: bool,
    /// Whether members of this organization may create events.
    pub can_create_events: bool,
}

/// Storage view of an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: EventId,
    pub organization_id: OrganizationId,
    pub title: String,
}

/// Entity lookup capability (`load by id`).
///
/// Implementations own their concurrency control. A missing entity is
/// `Ok(None)`; `Err` is reserved for the store itself failing.
#[async_trait]
pub trait Directory: Send + Sync + 'static {
    async fn load_user(&self, id: &UserId) -> Result<Option<UserRecord>, StoreError>;

    async fn load_organization(
        &self,
        id: &OrganizationId,
    ) -> Result<Option<OrganizationRecord>, StoreError>;

    async fn load_event(&self, id: &EventId) -> Result<Option<EventRecord>, StoreError>;
}

/// In-memory directory for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    users: RwLock<HashMap<UserId, UserRecord>>,
    organizations: RwLock<HashMap<OrganizationId, OrganizationRecord>>,
    events: RwLock<HashMap<EventId, EventRecord>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_user(&self, user: UserRecord) {
        self.users
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(user.id.clone(), user);
    }

    pub fn put_organization(&self, org: OrganizationRecord) {
        self.organizations
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(org.id.clone(), org);
    }

    pub fn put_event(&self, event: EventRecord) {
        self.events
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(event.id.clone(), event);
    }
}

#[async_trait]
impl Directory for InMemoryDirectory {
    async fn load_user(&self, id: &UserId) -> Result<Option<UserRecord>, StoreError> {
        Ok(self
            .users
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned())
    }

    async fn load_organization(
        &self,
        id: &OrganizationId,
    ) -> Result<Option<OrganizationRecord>, StoreError> {
        Ok(self
            .organizations
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned())
    }

    async fn load_event(&self, id: &EventId) -> Result<Option<EventRecord>, StoreError> {
        Ok(self
            .events
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned())
    }
}
