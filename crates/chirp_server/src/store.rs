//! In-memory users and posts.

use crate::auth::hash_password;
use crate::error::{ServerError, ServerResult};
use chirp_protocol::{Author, Post, PostId, User, UserId};
use chrono::{Duration as ChronoDuration, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

struct Account {
    user: User,
    password_hash: String,
}

/// Server-side data.
///
/// Maintains:
/// - Accounts keyed by user ID
/// - Posts, newest first, with strictly decreasing timestamps
pub struct Directory {
    accounts: RwLock<HashMap<UserId, Account>>,
    posts: RwLock<Vec<Post>>,
}

impl Directory {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
            posts: RwLock::new(Vec::new()),
        }
    }

    /// Creates an account. Username and email must be unused.
    pub fn register(&self, username: &str, email: &str, password: &str) -> ServerResult<User> {
        let mut accounts = self.accounts.write();
        if accounts
            .values()
            .any(|a| a.user.username == username || a.user.email.eq_ignore_ascii_case(email))
        {
            return Err(ServerError::Conflict("User or email already exists".into()));
        }

        let id = UserId::new(Uuid::new_v4().to_string());
        let user = User {
            id: id.clone(),
            username: username.to_string(),
            email: email.to_string(),
            created_at: Utc::now(),
        };
        accounts.insert(
            id.clone(),
            Account {
                user: user.clone(),
                password_hash: hash_password(id.as_str(), password),
            },
        );
        Ok(user)
    }

    /// Checks credentials.
    pub fn authenticate(&self, email: &str, password: &str) -> ServerResult<User> {
        let accounts = self.accounts.read();
        accounts
            .values()
            .find(|a| a.user.email.eq_ignore_ascii_case(email))
            .filter(|a| a.password_hash == hash_password(a.user.id.as_str(), password))
            .map(|a| a.user.clone())
            .ok_or_else(|| ServerError::NotAuthorized("Invalid credentials".into()))
    }

    /// Looks up a user.
    pub fn user(&self, id: &UserId) -> Option<User> {
        self.accounts.read().get(id).map(|a| a.user.clone())
    }

    /// Changes username and email. Both must be unused by other accounts.
    pub fn update_profile(&self, id: &UserId, username: &str, email: &str) -> ServerResult<User> {
        let user = {
            let mut accounts = self.accounts.write();
            if accounts.values().any(|a| {
                &a.user.id != id
                    && (a.user.username == username || a.user.email.eq_ignore_ascii_case(email))
            }) {
                return Err(ServerError::Conflict("Username or email already taken".into()));
            }
            let account = accounts
                .get_mut(id)
                .ok_or_else(|| ServerError::NotFound("User not found".into()))?;
            account.user.username = username.to_string();
            account.user.email = email.to_string();
            account.user.clone()
        };

        for post in self.posts.write().iter_mut() {
            if post.is_authored_by(id) {
                post.author = Author::from(&user);
            }
        }
        Ok(user)
    }

    /// Returns up to `limit` posts, newest first.
    pub fn posts(&self, limit: usize) -> Vec<Post> {
        self.posts.read().iter().take(limit).cloned().collect()
    }

    /// Returns every post written by `author`, newest first.
    pub fn posts_by(&self, author: &UserId) -> Vec<Post> {
        self.posts
            .read()
            .iter()
            .filter(|p| p.is_authored_by(author))
            .cloned()
            .collect()
    }

    /// Stores a new post.
    pub fn create_post(&self, author: &User, content: &str) -> Post {
        let mut posts = self.posts.write();
        let mut created_at = Utc::now();
        if let Some(newest) = posts.first() {
            if created_at <= newest.created_at {
                created_at = newest.created_at + ChronoDuration::milliseconds(1);
            }
        }
        let post = Post {
            id: PostId::new(Uuid::new_v4().to_string()),
            content: content.to_string(),
            author: Author::from(author),
            created_at,
        };
        posts.insert(0, post.clone());
        post
    }

    /// Deletes a post. Only its author may delete it.
    pub fn delete_post(&self, requester: &UserId, id: &PostId) -> ServerResult<()> {
        let mut posts = self.posts.write();
        let index = posts
            .iter()
            .position(|p| &p.id == id)
            .ok_or_else(|| ServerError::NotFound("Post not found".into()))?;
        if !posts[index].is_authored_by(requester) {
            return Err(ServerError::Forbidden("Not the author of this post".into()));
        }
        posts.remove(index);
        Ok(())
    }

    /// Returns the number of accounts.
    pub fn user_count(&self) -> usize {
        self.accounts.read().len()
    }

    /// Returns the number of posts.
    pub fn post_count(&self) -> usize {
        self.posts.read().len()
    }
}

impl Default for Directory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_authenticate() {
        let dir = Directory::new();
        let user = dir.register("ana", "ana@example.com", "pw").unwrap();

        assert_eq!(dir.authenticate("ANA@example.com", "pw").unwrap(), user);
        assert!(dir.authenticate("ana@example.com", "nope").is_err());
        assert!(dir.authenticate("bob@example.com", "pw").is_err());
    }

    #[test]
    fn duplicate_registration_conflicts() {
        let dir = Directory::new();
        dir.register("ana", "ana@example.com", "pw").unwrap();

        let err = dir.register("ana", "other@example.com", "pw").unwrap_err();
        assert_eq!(err.status(), 400);
        assert!(dir.register("bob", "ana@example.com", "pw").is_err());
        assert_eq!(dir.user_count(), 1);
    }

    #[test]
    fn posts_are_newest_first() {
        let dir = Directory::new();
        let ana = dir.register("ana", "ana@example.com", "pw").unwrap();

        let first = dir.create_post(&ana, "one");
        let second = dir.create_post(&ana, "two");

        let posts = dir.posts(10);
        assert_eq!(posts[0].id, second.id);
        assert_eq!(posts[1].id, first.id);
        assert!(posts[0].created_at > posts[1].created_at);
        assert_eq!(dir.posts(1).len(), 1);
    }

    #[test]
    fn only_author_deletes() {
        let dir = Directory::new();
        let ana = dir.register("ana", "ana@example.com", "pw").unwrap();
        let bob = dir.register("bob", "bob@example.com", "pw").unwrap();
        let post = dir.create_post(&ana, "mine");

        assert_eq!(dir.delete_post(&bob.id, &post.id).unwrap_err().status(), 403);
        dir.delete_post(&ana.id, &post.id).unwrap();
        assert_eq!(dir.delete_post(&ana.id, &post.id).unwrap_err().status(), 404);
    }

    #[test]
    fn profile_update_renames_authored_posts() {
        let dir = Directory::new();
        let ana = dir.register("ana", "ana@example.com", "pw").unwrap();
        dir.create_post(&ana, "hello");

        let updated = dir
            .update_profile(&ana.id, "ana2", "ana2@example.com")
            .unwrap();

        assert_eq!(updated.username, "ana2");
        assert_eq!(dir.posts_by(&ana.id)[0].author.username, "ana2");
        assert!(dir.authenticate("ana2@example.com", "pw").is_ok());
    }

    #[test]
    fn profile_update_rejects_taken_name() {
        let dir = Directory::new();
        let ana = dir.register("ana", "ana@example.com", "pw").unwrap();
        dir.register("bob", "bob@example.com", "pw").unwrap();

        assert!(dir.update_profile(&ana.id, "bob", "ana@example.com").is_err());
        // Keeping one's own name is fine.
        assert!(dir.update_profile(&ana.id, "ana", "ana@example.com").is_ok());
    }
}
