//! Append-only audit trail capability.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{StoreError, UserId};

/// One audited request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Authenticated caller, if authentication got that far.
    pub actor_id: Option<UserId>,
    /// HTTP method of the request.
    pub action: String,
    /// Request path.
    pub resource: String,
    /// Identifier of the guarded resource, when a guard resolved one.
    pub resource_id: Option<String>,
    pub status: u16,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// Sink for audit entries. Writes must be append-only.
#[async_trait]
pub trait AuditSink: Send + Sync + 'static {
    async fn record(&self, entry: AuditEntry) -> Result<(), StoreError>;
}

/// In-memory sink for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryAuditSink {
    inner: Mutex<Vec<AuditEntry>>,
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<AuditEntry> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl AuditSink for InMemoryAuditSink {
    async fn record(&self, entry: AuditEntry) -> Result<(), StoreError> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(entry);
        Ok(())
    }
}
