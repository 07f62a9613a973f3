//! Configuration for the sync engine.

use std::time::Duration;

/// Configuration for feed synchronization.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Delay between the end of one poll and the start of the next.
    pub poll_interval: Duration,
    /// Capacity of the event broadcast channel. Slow subscribers that fall
    /// further behind than this miss events.
    pub event_capacity: usize,
}

impl SyncConfig {
    /// Creates a configuration with a 5 second poll interval.
    pub fn new() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            event_capacity: 64,
        }
    }

    /// Sets the poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the event channel capacity (at least 1).
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Service endpoints used by the HTTP gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// Base URL of the auth routes (`/login`, `/register`).
    pub auth_url: String,
    /// Base URL of the posts collection.
    pub posts_url: String,
    /// Base URL of the user routes (`/profile`).
    pub users_url: String,
    /// Request timeout.
    pub timeout: Duration,
}

impl Endpoints {
    /// Derives all endpoints from one API root:
    /// `{base}/auth`, `{base}/posts`, `{base}/users`.
    pub fn from_base(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            auth_url: format!("{base}/auth"),
            posts_url: format!("{base}/posts"),
            users_url: format!("{base}/users"),
            timeout: Duration::from_secs(30),
        }
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
