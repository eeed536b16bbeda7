//! Request audit trail.
//!
//! The outermost layer decides whether a finished request is audit-worthy and
//! hands the entry to a bounded background queue. Submission never blocks the
//! response; a full queue drops the entry and counts it.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, Method, StatusCode, header::USER_AGENT},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

use eventhub_core::{AuditEntry, AuditSink};

use crate::context::{AuditActor, AuditTarget};

/// Route family that is always audited, whatever the outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CriticalRoute {
    /// `None` matches every method.
    pub method: Option<Method>,
    pub path_prefix: String,
}

impl CriticalRoute {
    pub fn new(method: Option<Method>, path_prefix: impl Into<String>) -> Self {
        Self {
            method,
            path_prefix: path_prefix.into(),
        }
    }

    pub fn matches(&self, method: &Method, path: &str) -> bool {
        if self.method.as_ref().is_some_and(|m| m != method) {
            return false;
        }
        match path.strip_prefix(self.path_prefix.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }
}

pub fn default_critical_routes() -> Vec<CriticalRoute> {
    vec![
        CriticalRoute::new(Some(Method::POST), "/auth/login"),
        CriticalRoute::new(Some(Method::POST), "/auth/refresh"),
        CriticalRoute::new(Some(Method::POST), "/auth/logout"),
        CriticalRoute::new(Some(Method::DELETE), "/events"),
        CriticalRoute::new(Some(Method::DELETE), "/organizations"),
        CriticalRoute::new(Some(Method::PUT), "/users"),
        CriticalRoute::new(None, "/admin"),
    ]
}

/// Producer half of the audit queue.
#[derive(Debug, Clone)]
pub struct AuditQueue {
    tx: mpsc::Sender<AuditEntry>,
    dropped: Arc<AtomicU64>,
}

impl AuditQueue {
    /// Start the background writer. It runs until every queue handle is dropped.
    pub fn spawn(sink: Arc<dyn AuditSink>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<AuditEntry>(capacity.max(1));

        let handle = tokio::spawn(async move {
            while let Some(entry) = rx.recv().await {
                if let Err(e) = sink.record(entry).await {
                    tracing::warn!(error = %e, "audit write failed");
                }
            }
            tracing::debug!("audit writer stopped");
        });

        let queue = Self {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
        };
        (queue, handle)
    }

    pub fn submit(&self, entry: AuditEntry) {
        match self.tx.try_send(entry) {
            Ok(()) => {}
            Err(TrySendError::Full(entry)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::warn!(
                    resource = %entry.resource,
                    status = entry.status,
                    dropped,
                    "audit queue full; entry dropped"
                );
            }
            Err(TrySendError::Closed(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::error!("audit writer is gone; entry dropped");
            }
        }
    }

    /// Entries lost to back-pressure since startup.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[derive(Clone)]
pub struct AuditState {
    pub queue: AuditQueue,
    pub critical: Arc<[CriticalRoute]>,
}

impl AuditState {
    fn should_record(&self, method: &Method, path: &str, status: StatusCode) -> bool {
        status == StatusCode::UNAUTHORIZED
            || status == StatusCode::FORBIDDEN
            || self.critical.iter().any(|r| r.matches(method, path))
    }
}

fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(',').next().unwrap_or("").trim().to_string())
            .filter(|v| !v.is_empty())
    };

    header("x-forwarded-for")
        .or_else(|| header("x-real-ip"))
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
}

/// Outermost layer: audit unauthorized, forbidden and critical requests.
pub async fn record_audit(State(state): State<AuditState>, req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let ip = client_ip(req.headers(), peer);
    let user_agent = req
        .headers()
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let res = next.run(req).await;

    let status = res.status();
    if state.should_record(&method, &path, status) {
        let actor_id = res.extensions().get::<AuditActor>().map(|a| a.0.clone());
        let resource_id = res
            .extensions()
            .get::<AuditTarget>()
            .and_then(|t| t.0.clone());

        state.queue.submit(AuditEntry {
            actor_id,
            action: method.to_string(),
            resource: path,
            resource_id,
            status: status.as_u16(),
            ip,
            user_agent,
            recorded_at: Utc::now(),
        });
    }

    res
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use eventhub_core::InMemoryAuditSink;

    use super::*;

    fn entry(path: &str) -> AuditEntry {
        AuditEntry {
            actor_id: None,
            action: "GET".to_string(),
            resource: path.to_string(),
            resource_id: None,
            status: 401,
            ip: None,
            user_agent: None,
            recorded_at: Utc::now(),
        }
    }

    #[test]
    fn critical_routes_match_on_segment_boundaries() {
        let routes = default_critical_routes();
        let hit = |m: Method, p: &str| routes.iter().any(|r| r.matches(&m, p));

        assert!(hit(Method::POST, "/auth/login"));
        assert!(hit(Method::DELETE, "/events/abc"));
        assert!(hit(Method::GET, "/admin/stats"));
        assert!(hit(Method::PUT, "/users/u1/role"));
        assert!(!hit(Method::GET, "/events/abc"));
        assert!(!hit(Method::POST, "/auth/login-help"));
        assert!(!hit(Method::GET, "/administrators"));
    }

    #[test]
    fn forwarded_for_wins_over_peer_address() {
        let mut headers = HeaderMap::new();
        let peer = Some(SocketAddr::from(([10, 0, 0, 1], 4000)));
        assert_eq!(client_ip(&headers, peer).as_deref(), Some("10.0.0.1"));

        headers.insert("x-real-ip", "192.168.1.5".parse().unwrap());
        assert_eq!(client_ip(&headers, peer).as_deref(), Some("192.168.1.5"));

        headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.2".parse().unwrap());
        assert_eq!(client_ip(&headers, peer).as_deref(), Some("203.0.113.7"));
    }

    #[tokio::test]
    async fn full_queue_drops_and_counts_instead_of_blocking() {
        let sink = Arc::new(InMemoryAuditSink::new());
        let (queue, _handle) = AuditQueue::spawn(sink, 1);

        // The writer cannot run before this task yields, so only one slot exists.
        queue.submit(entry("/a"));
        queue.submit(entry("/b"));
        queue.submit(entry("/c"));

        assert_eq!(queue.dropped(), 2);
    }

    #[tokio::test]
    async fn queued_entries_reach_the_sink() {
        let sink = Arc::new(InMemoryAuditSink::new());
        let (queue, _handle) = AuditQueue::spawn(sink.clone(), 8);

        queue.submit(entry("/events"));
        queue.submit(entry("/admin/stats"));

        for _ in 0..50 {
            if sink.all().len() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let recorded: Vec<_> = sink.all().into_iter().map(|e| e.resource).collect();
        assert_eq!(recorded, vec!["/events", "/admin/stats"]);
        assert_eq!(queue.dropped(), 0);
    }
}
