use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;

use crate::audit::{AuditSink, SqlAuditLog};
use crate::config::Config;
use crate::events::{EventPublisher, LogPublisher};
use crate::middleware::{BasicCredentials, RateLimiter};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub audit: Arc<dyn AuditSink>,
    pub events: Arc<dyn EventPublisher>,
    pub credentials: Arc<BasicCredentials>,
    pub rate_limiter: Arc<RateLimiter>,
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(pool: SqlitePool, config: &Config) -> Self {
        Self {
            pool,
            audit: Arc::new(SqlAuditLog),
            events: Arc::new(LogPublisher),
            credentials: Arc::new(config.credentials.clone()),
            rate_limiter: Arc::new(RateLimiter::new(
                config.rate_limit_max,
                config.rate_limit_window,
            )),
            request_timeout: config.request_timeout,
        }
    }

    /// Replace the event publisher.
    pub fn with_publisher(mut self, events: Arc<dyn EventPublisher>) -> Self {
        self.events = events;
        self
    }

    /// Replace the audit sink.
    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }
}
