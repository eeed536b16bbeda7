//! HTTP API: server wiring, the request guard pipeline and the audit trail.

pub mod app;
pub mod audit;
pub mod config;
pub mod context;
pub mod middleware;
pub mod query;

pub use app::{AppState, Services, build_app};
pub use config::ApiConfig;
