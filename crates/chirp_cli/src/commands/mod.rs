//! CLI command implementations.

pub mod auth;
pub mod demo;
pub mod feed;
pub mod profile;

use chirp_protocol::Post;
use chirp_sync_engine::{
    AuthGateway, AuthService, FeedGateway, FeedSynchronizer, ProfileGateway, ProfileService,
    SessionGuard, SyncConfig,
};
use std::sync::Arc;

/// Result of a command.
pub type CmdResult = Result<(), Box<dyn std::error::Error>>;

/// Everything a command needs: the session and a gateway.
pub struct Context<G> {
    /// Session gate backed by the session file.
    pub session: Arc<SessionGuard>,
    /// Remote service.
    pub gateway: Arc<G>,
    sync: SyncConfig,
}

impl<G> Context<G>
where
    G: FeedGateway + AuthGateway + ProfileGateway + 'static,
{
    /// Creates a context with the default synchronizer settings.
    pub fn new(session: Arc<SessionGuard>, gateway: Arc<G>) -> Self {
        Self {
            session,
            gateway,
            sync: SyncConfig::default(),
        }
    }

    /// Replaces the synchronizer settings.
    pub fn with_sync_config(self, sync: SyncConfig) -> Self {
        Self { sync, ..self }
    }

    /// Returns a login/registration service.
    pub fn auth(&self) -> AuthService<G> {
        AuthService::new(Arc::clone(&self.session), Arc::clone(&self.gateway))
    }

    /// Returns a profile service.
    pub fn profile(&self) -> ProfileService<G> {
        ProfileService::new(Arc::clone(&self.session), Arc::clone(&self.gateway))
    }

    /// Returns a fresh synchronizer.
    pub fn synchronizer(&self) -> Arc<FeedSynchronizer<G>> {
        Arc::new(FeedSynchronizer::new(
            self.sync.clone(),
            Arc::clone(&self.session),
            Arc::clone(&self.gateway),
        ))
    }
}

/// Prints one post as a single line.
pub fn print_post(post: &Post) {
    println!(
        "{}  @{:<16} {}  [{}]",
        post.created_at.format("%Y-%m-%d %H:%M"),
        post.author.username,
        post.content,
        post.id
    );
}

/// Prints posts in the requested format.
pub fn print_posts(posts: &[Post], format: &str) -> CmdResult {
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(posts)?),
        "text" => {
            if posts.is_empty() {
                println!("(no posts)");
            }
            for post in posts {
                print_post(post);
            }
        }
        other => return Err(format!("Unknown format: {other}").into()),
    }
    Ok(())
}
