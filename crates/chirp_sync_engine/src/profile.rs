//! Profile management.

use crate::error::{SyncError, SyncResult};
use crate::gateway::{FeedGateway, ProfileGateway};
use crate::session::SessionGuard;
use chirp_protocol::{Post, PostId, UpdateProfileRequest, User};
use std::sync::Arc;

/// Loads and edits the signed-in user's profile and posts.
///
/// Every call is gated by the session, and an unauthorized answer clears
/// it.
pub struct ProfileService<G: ProfileGateway + FeedGateway + ?Sized> {
    session: Arc<SessionGuard>,
    gateway: Arc<G>,
}

impl<G: ProfileGateway + FeedGateway + ?Sized> ProfileService<G> {
    /// Creates the service.
    pub fn new(session: Arc<SessionGuard>, gateway: Arc<G>) -> Self {
        Self { session, gateway }
    }

    /// Fetches the profile from the server.
    pub async fn load_profile(&self) -> SyncResult<User> {
        let session = self.session.require_session()?;
        let result = self.gateway.profile(&session.token).await;
        self.session.intercept(result)
    }

    /// Updates username and email, then stores the returned profile in
    /// the session.
    pub async fn update_profile(&self, username: &str, email: &str) -> SyncResult<User> {
        let request = UpdateProfileRequest::new(username, email);
        if request.username.is_empty() || request.email.is_empty() {
            return Err(SyncError::Validation(
                "username and email are required".into(),
            ));
        }

        let session = self.session.require_session()?;
        let result = self.gateway.update_profile(&session.token, &request).await;
        let user = self.session.intercept(result)?;
        self.session.update_user(&user)?;
        tracing::info!(user = %user.id, "profile updated");
        Ok(user)
    }

    /// Fetches the user's own posts, newest first.
    pub async fn load_my_posts(&self) -> SyncResult<Vec<Post>> {
        let session = self.session.require_session()?;
        let result = self.gateway.my_posts(&session.token).await;
        let mut posts = self.session.intercept(result)?;
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(posts)
    }

    /// Deletes one of the user's posts. A post the server no longer has
    /// counts as deleted.
    pub async fn delete_post(&self, id: &PostId) -> SyncResult<()> {
        let session = self.session.require_session()?;
        let result = self.gateway.delete(&session.token, id).await;
        match self.session.intercept(result) {
            Ok(()) | Err(SyncError::NotFound) => Ok(()),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockGateway;
    use chirp_protocol::{Author, Session, UserId};
    use chirp_store::InMemoryStore;
    use chrono::{TimeZone, Utc};

    fn user() -> User {
        User {
            id: UserId::new("u1"),
            username: "ana".into(),
            email: "ana@example.com".into(),
            created_at: Utc.timestamp_opt(0, 0).unwrap(),
        }
    }

    fn service() -> (Arc<MockGateway>, Arc<SessionGuard>, ProfileService<MockGateway>) {
        let guard = Arc::new(SessionGuard::new(Arc::new(InMemoryStore::new())));
        guard.establish(&Session::new("tok", user())).unwrap();
        let gateway = Arc::new(MockGateway::new());
        gateway.set_profile(user());
        (
            gateway.clone(),
            guard.clone(),
            ProfileService::new(guard, gateway),
        )
    }

    #[tokio::test]
    async fn update_refreshes_stored_user() {
        let (gateway, guard, profile) = service();

        let user = profile
            .update_profile("  ana2 ", " ana2@example.com")
            .await
            .unwrap();

        assert_eq!(user.username, "ana2");
        assert_eq!(user.email, "ana2@example.com");
        assert_eq!(guard.current_user().unwrap().username, "ana2");
        assert_eq!(guard.current_token().as_deref(), Some("tok"));
        assert_eq!(gateway.update_profile_calls(), 1);
    }

    #[tokio::test]
    async fn blank_update_is_rejected_locally() {
        let (gateway, _, profile) = service();

        let result = profile.update_profile("   ", "ana@example.com").await;

        assert!(matches!(result, Err(SyncError::Validation(_))));
        assert_eq!(gateway.total_calls(), 0);
    }

    #[tokio::test]
    async fn unauthorized_clears_session() {
        let (gateway, guard, profile) = service();
        gateway.push_profile(Err(SyncError::Unauthenticated));

        assert_eq!(profile.load_profile().await, Err(SyncError::Unauthenticated));
        assert!(!guard.is_authenticated());

        // Gate closed: no further remote calls.
        assert_eq!(profile.load_profile().await, Err(SyncError::Unauthenticated));
        assert_eq!(gateway.total_calls(), 1);
    }

    #[tokio::test]
    async fn my_posts_sorted_newest_first() {
        let (gateway, _, profile) = service();
        let post = |id: &str, secs: i64| Post {
            id: PostId::new(id),
            content: id.to_string(),
            author: Author::from(&user()),
            created_at: Utc.timestamp_opt(secs, 0).unwrap(),
        };
        gateway.set_my_posts(vec![post("old", 1), post("new", 9), post("mid", 5)]);

        let posts = profile.load_my_posts().await.unwrap();

        let ids: Vec<_> = posts.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "mid", "old"]);
    }

    #[tokio::test]
    async fn delete_missing_post_is_ok() {
        let (gateway, _, profile) = service();
        gateway.push_delete(Err(SyncError::NotFound));

        assert!(profile.delete_post(&PostId::new("gone")).await.is_ok());
        assert_eq!(gateway.deleted_ids(), vec![PostId::new("gone")]);
    }
}
