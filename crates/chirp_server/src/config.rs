//! Server configuration.

use crate::auth::AuthConfig;
use std::time::Duration;

/// Configuration for the reference server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Token signing configuration.
    pub auth: AuthConfig,
    /// Maximum number of posts returned by the feed.
    pub feed_limit: usize,
    /// Minimum password length accepted at registration.
    pub min_password_len: usize,
    /// Whether feed responses carry an `ETag`. Off by default so clients
    /// fall back to the length-based change signal.
    pub emit_etag: bool,
}

impl ServerConfig {
    /// Creates a configuration signing tokens with `secret`.
    pub fn new(secret: Vec<u8>) -> Self {
        Self {
            auth: AuthConfig::new(secret),
            feed_limit: 500,
            min_password_len: 1,
            emit_etag: false,
        }
    }

    /// Sets the token lifetime.
    pub fn with_token_expiry(mut self, expiry: Duration) -> Self {
        self.auth = self.auth.with_expiry(expiry);
        self
    }

    /// Sets the maximum feed length.
    pub fn with_feed_limit(mut self, limit: usize) -> Self {
        self.feed_limit = limit;
        self
    }

    /// Sets the minimum password length.
    pub fn with_min_password_len(mut self, len: usize) -> Self {
        self.min_password_len = len;
        self
    }

    /// Enables `ETag` headers on feed responses.
    pub fn with_etag(mut self, enabled: bool) -> Self {
        self.emit_etag = enabled;
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(b"chirp-development-secret".to_vec())
    }
}
