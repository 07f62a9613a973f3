//! Login, registration and logout.

use crate::error::{SyncError, SyncResult};
use crate::gateway::AuthGateway;
use crate::session::SessionGuard;
use chirp_protocol::{LoginRequest, RegisterRequest, User};
use std::sync::Arc;

/// Establishes and ends sessions.
pub struct AuthService<G: AuthGateway + ?Sized> {
    session: Arc<SessionGuard>,
    gateway: Arc<G>,
}

impl<G: AuthGateway + ?Sized> AuthService<G> {
    /// Creates the service.
    pub fn new(session: Arc<SessionGuard>, gateway: Arc<G>) -> Self {
        Self { session, gateway }
    }

    /// Logs in and persists the session.
    pub async fn login(&self, email: &str, password: &str) -> SyncResult<User> {
        require("email", email)?;
        require("password", password)?;

        let session = self
            .gateway
            .login(&LoginRequest::new(email.trim(), password))
            .await?;
        self.session.establish(&session)?;
        Ok(session.user)
    }

    /// Creates an account and persists its session.
    pub async fn register(&self, username: &str, email: &str, password: &str) -> SyncResult<User> {
        require("username", username)?;
        require("email", email)?;
        require("password", password)?;

        let request = RegisterRequest::new(username.trim(), email.trim(), password);
        let session = self.gateway.register(&request).await?;
        self.session.establish(&session)?;
        Ok(session.user)
    }

    /// Ends the session locally.
    pub fn logout(&self) -> SyncResult<()> {
        self.session.clear()
    }

    /// Returns the session guard.
    pub fn session(&self) -> &Arc<SessionGuard> {
        &self.session
    }
}

fn require(field: &str, value: &str) -> SyncResult<()> {
    if value.trim().is_empty() {
        return Err(SyncError::Validation(format!("{field} is required")));
    }
    Ok(())
}
