//! Process configuration read from the environment.

use std::net::SocketAddr;
use std::str::FromStr;

use anyhow::{Context, bail};
use chrono::Duration;

use eventhub_auth::TokenConfig;

use crate::audit::{CriticalRoute, default_critical_routes};

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    pub tokens: TokenConfig,
    pub audit_queue_capacity: usize,
    pub critical_routes: Vec<CriticalRoute>,
}

impl ApiConfig {
    /// Defaults for everything except the signing secret.
    pub fn new(jwt_secret: impl Into<Vec<u8>>) -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            tokens: TokenConfig::new(jwt_secret),
            audit_queue_capacity: 1024,
            critical_routes: default_critical_routes(),
        }
    }

    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from an arbitrary key lookup.
    ///
    /// `JWT_SECRET` is required; there is no insecure fallback.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let secret = lookup("JWT_SECRET")
            .filter(|s| !s.is_empty())
            .context("JWT_SECRET must be set")?;

        let mut config = Self::new(secret);

        if let Some(addr) = lookup("BIND_ADDR") {
            config.bind_addr = parse("BIND_ADDR", &addr)?;
        }
        if let Some(issuer) = lookup("JWT_ISSUER") {
            config.tokens.issuer = issuer;
        }
        if let Some(secs) = lookup("JWT_ACCESS_TTL_SECS") {
            config.tokens.access_ttl = parse_seconds("JWT_ACCESS_TTL_SECS", &secs)?;
        }
        if let Some(secs) = lookup("JWT_REFRESH_TTL_SECS") {
            config.tokens.refresh_ttl = parse_seconds("JWT_REFRESH_TTL_SECS", &secs)?;
        }
        if let Some(secs) = lookup("JWT_LEEWAY_SECS") {
            config.tokens.leeway_secs = parse("JWT_LEEWAY_SECS", &secs)?;
        }
        if let Some(capacity) = lookup("AUDIT_QUEUE_CAPACITY") {
            config.audit_queue_capacity = parse("AUDIT_QUEUE_CAPACITY", &capacity)?;
            if config.audit_queue_capacity == 0 {
                bail!("AUDIT_QUEUE_CAPACITY must be greater than zero");
            }
        }

        Ok(config)
    }
}

fn parse<T>(key: &str, value: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse::<T>()
        .with_context(|| format!("invalid value for {key}: '{value}'"))
}

fn parse_seconds(key: &str, value: &str) -> anyhow::Result<Duration> {
    let secs: i64 = parse(key, value)?;
    match Duration::try_seconds(secs) {
        Some(ttl) => Ok(ttl),
        None => bail!("invalid value for {key}: '{value}' is out of range"),
    }
}
