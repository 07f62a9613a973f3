//! Core records: users, posts, sessions and change signals.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Server-assigned identifier of a user.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Creates a user ID from its string form.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Server-assigned identifier of a post.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostId(String);

impl PostId {
    /// Creates a post ID from its string form.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PostId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// A registered user's profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// User ID.
    pub id: UserId,
    /// Public handle.
    pub username: String,
    /// Contact email.
    pub email: String,
    /// Registration time.
    pub created_at: DateTime<Utc>,
}

/// The author of a post, as embedded in the post itself.
///
/// This is a back-reference for display and ownership checks only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    /// Author's user ID.
    pub id: UserId,
    /// Author's handle at the time the post was served.
    pub username: String,
}

impl From<&User> for Author {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
        }
    }
}

/// A short text post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    /// Post ID.
    pub id: PostId,
    /// Text content (at most [`crate::MAX_POST_CHARS`] characters).
    pub content: String,
    /// Who wrote it.
    pub author: Author,
    /// Publication time.
    pub created_at: DateTime<Utc>,
}

impl Post {
    /// Returns true if `user_id` wrote this post.
    pub fn is_authored_by(&self, user_id: &UserId) -> bool {
        &self.author.id == user_id
    }
}

/// An authenticated identity: bearer token plus the user it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Opaque bearer token.
    pub token: String,
    /// The signed-in user.
    pub user: User,
}

impl Session {
    /// Creates a session.
    pub fn new(token: impl Into<String>, user: User) -> Self {
        Self {
            token: token.into(),
            user,
        }
    }
}

/// Opaque value describing the state of the remote feed.
///
/// Only equality is meaningful: two signals compare equal when the feed
/// has not changed between the two observations.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChangeSignal(String);

impl ChangeSignal {
    /// Creates a signal from any opaque string (an ETag, a checksum...).
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Creates a signal from a payload length in bytes.
    pub fn from_len(len: u64) -> Self {
        Self(format!("len:{len}"))
    }

    /// Returns the raw value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChangeSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The full feed as returned by a list call, with the signal that
/// describes exactly this collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostList {
    /// Posts in server order.
    pub posts: Vec<Post>,
    /// Change signal of this collection.
    pub signal: ChangeSignal,
}

impl PostList {
    /// Creates a post list.
    pub fn new(posts: Vec<Post>, signal: ChangeSignal) -> Self {
        Self { posts, signal }
    }
}
