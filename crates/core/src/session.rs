//! Session and credential collaborators.
//!
//! The token manager is stateless; refresh-token bookkeeping (single use,
//! logout) and password verification live behind these traits.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{StoreError, UserId};

/// Metadata of an issued refresh token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshSession {
    pub token_id: String,
    pub user_id: UserId,
    pub expires_at: DateTime<Utc>,
}

#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    /// Remember a freshly issued refresh token.
    async fn record_refresh_token(&self, session: RefreshSession) -> Result<(), StoreError>;

    /// Atomically mark a refresh token as used.
    ///
    /// Returns `true` only for the first consumption of a known, unrevoked token.
    async fn consume_refresh_token(&self, token_id: &str) -> Result<bool, StoreError>;

    /// Revoke every outstanding refresh token of a user. Returns how many were revoked.
    async fn revoke_user_sessions(&self, user_id: &UserId) -> Result<usize, StoreError>;
}

/// Password verification capability.
#[async_trait]
pub trait CredentialStore: Send + Sync + 'static {
    /// Returns the user owning `email` when `password` matches.
    async fn verify_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<UserId>, StoreError>;
}

/// In-memory session store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    inner: Mutex<HashMap<String, RefreshSession>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unexpired sessions of `user_id`.
    pub fn active_sessions(&self, user_id: &UserId) -> usize {
        let now = Utc::now();
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .filter(|s| &s.user_id == user_id && s.expires_at > now)
            .count()
    }

    /// Sessions held in memory, expired or not.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn record_refresh_token(&self, session: RefreshSession) -> Result<(), StoreError> {
        let now = Utc::now();
        let mut sessions = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        sessions.retain(|_, s| s.expires_at > now);
        sessions.insert(session.token_id.clone(), session);
        Ok(())
    }

    async fn consume_refresh_token(&self, token_id: &str) -> Result<bool, StoreError> {
        let removed = self
            .inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(token_id);
        Ok(removed.is_some_and(|s| s.expires_at > Utc::now()))
    }

    async fn revoke_user_sessions(&self, user_id: &UserId) -> Result<usize, StoreError> {
        let mut sessions = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let before = sessions.len();
        sessions.retain(|_, s| &s.user_id != user_id);
        Ok(before - sessions.len())
    }
}

/// In-memory credential store for tests/dev. Passwords are held as given.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    inner: Mutex<HashMap<String, (String, UserId)>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, email: impl Into<String>, password: impl Into<String>, user_id: UserId) {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(email.into().to_lowercase(), (password.into(), user_id));
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn verify_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<UserId>, StoreError> {
        let creds = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        Ok(creds
            .get(&email.to_lowercase())
            .filter(|(stored, _)| stored == password)
            .map(|(_, id)| id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn session(token_id: &str, user: &str) -> RefreshSession {
        RefreshSession {
            token_id: token_id.to_string(),
            user_id: UserId::new(user),
            expires_at: Utc::now() + Duration::days(7),
        }
    }

    fn expired_session(token_id: &str, user: &str) -> RefreshSession {
        RefreshSession {
            expires_at: Utc::now() - Duration::days(30),
            ..session(token_id, user)
        }
    }

    #[tokio::test]
    async fn refresh_tokens_are_single_use() {
        let store = InMemorySessionStore::new();
        store.record_refresh_token(session("t1", "u1")).await.unwrap();

        assert!(store.consume_refresh_token("t1").await.unwrap());
        assert!(!store.consume_refresh_token("t1").await.unwrap());
        assert!(!store.consume_refresh_token("unknown").await.unwrap());
    }

    #[tokio::test]
    async fn expired_sessions_cannot_be_consumed() {
        let store = InMemorySessionStore::new();
        store.record_refresh_token(expired_session("old", "u1")).await.unwrap();

        assert_eq!(store.active_sessions(&UserId::new("u1")), 0);
        assert!(!store.consume_refresh_token("old").await.unwrap());
    }

    #[tokio::test]
    async fn recording_prunes_expired_sessions() {
        let store = InMemorySessionStore::new();
        for i in 0..1000 {
            store
                .record_refresh_token(expired_session(&format!("t{i}"), "u1"))
                .await
                .unwrap();
        }
        store.record_refresh_token(session("fresh", "u1")).await.unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.active_sessions(&UserId::new("u1")), 1);
        assert!(store.consume_refresh_token("fresh").await.unwrap());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn revoking_a_user_leaves_other_users_alone() {
        let store = InMemorySessionStore::new();
        store.record_refresh_token(session("a", "u1")).await.unwrap();
        store.record_refresh_token(session("b", "u1")).await.unwrap();
        store.record_refresh_token(session("c", "u2")).await.unwrap();

        assert_eq!(store.revoke_user_sessions(&UserId::new("u1")).await.unwrap(), 2);
        assert_eq!(store.active_sessions(&UserId::new("u2")), 1);
    }

    #[tokio::test]
    async fn credentials_match_case_insensitive_email_only() {
        let creds = InMemoryCredentialStore::new();
        creds.put("Alice@Example.com", "s3cret", UserId::new("u1"));

        assert_eq!(
            creds.verify_password("alice@example.com", "s3cret").await.unwrap(),
            Some(UserId::new("u1"))
        );
        assert_eq!(creds.verify_password("alice@example.com", "S3CRET").await.unwrap(), None);
    }
}
