//! Typed values threaded through a request by the guard pipeline.
//!
//! Request extensions carry [`eventhub_auth::UserContext`] and
//! [`crate::query::QueryOptions`] forward to handlers. The markers below travel
//! back on the response so the outermost audit layer can attribute it.

use eventhub_core::UserId;

/// Caller that authentication resolved for this request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditActor(pub UserId);

/// Resource identifier a guard resolved for this request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditTarget(pub Option<String>);
