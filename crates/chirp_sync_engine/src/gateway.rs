//! Gateway abstractions.
//!
//! Gateways are the remote side of the engine. They speak in domain terms
//! and map transport failures onto [`SyncError`]:
//!
//! | Response | Error |
//! |----------|-------|
//! | 401 | `Unauthenticated` (`InvalidCredentials` on login) |
//! | 400 | `Rejected` |
//! | 404 | `NotFound` |
//! | 5xx | `Server` |
//! | other non-2xx | `Unexpected` |
//! | no response | `Transport` |
//! | undecodable body | `Protocol` |
//!
//! [`SyncError`]: crate::SyncError

use crate::error::SyncResult;
use async_trait::async_trait;
use chirp_protocol::{
    ChangeSignal, LoginRequest, Post, PostId, PostList, RegisterRequest, Session,
    UpdateProfileRequest, User,
};

/// Remote feed operations.
#[async_trait]
pub trait FeedGateway: Send + Sync {
    /// Fetches the full feed and the signal describing it.
    async fn list(&self, token: &str) -> SyncResult<PostList>;

    /// Fetches only the change signal of the feed.
    ///
    /// Must be cheaper than [`list`](Self::list) and must equal the signal
    /// `list` would return for the same collection.
    async fn change_signal(&self, token: &str) -> SyncResult<ChangeSignal>;

    /// Creates a post and returns it as stored by the server.
    async fn create(&self, token: &str, content: &str) -> SyncResult<Post>;

    /// Deletes a post.
    async fn delete(&self, token: &str, id: &PostId) -> SyncResult<()>;
}

/// Remote authentication operations.
#[async_trait]
pub trait AuthGateway: Send + Sync {
    /// Exchanges credentials for a session.
    async fn login(&self, request: &LoginRequest) -> SyncResult<Session>;

    /// Creates an account and returns its first session.
    async fn register(&self, request: &RegisterRequest) -> SyncResult<Session>;
}

/// Remote profile operations.
#[async_trait]
pub trait ProfileGateway: Send + Sync {
    /// Fetches the signed-in user's profile.
    async fn profile(&self, token: &str) -> SyncResult<User>;

    /// Updates username/email and returns the stored profile.
    async fn update_profile(&self, token: &str, request: &UpdateProfileRequest)
        -> SyncResult<User>;

    /// Fetches the signed-in user's own posts.
    async fn my_posts(&self, token: &str) -> SyncResult<Vec<Post>>;
}
