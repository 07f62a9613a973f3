//! # Chirp Server
//!
//! In-memory reference implementation of the Chirp service.
//!
//! This crate provides:
//! - Auth endpoints (register, login) issuing HMAC-SHA256 bearer tokens
//! - The posts collection (feed, create, delete, own posts)
//! - Profile read and update with uniqueness checks
//! - Fault injection for exercising client error handling
//!
//! # Architecture
//!
//! The server keeps everything in memory:
//! - Accounts with salted SHA-256 password hashes
//! - Posts, newest first
//!
//! Requests come in as [`chirp_protocol::HttpRequest`] records, so the
//! server can sit behind any transport. It implements
//! [`chirp_protocol::LoopbackServer`] for in-process use.
//!
//! # Authentication
//!
//! ```rust
//! use chirp_protocol::UserId;
//! use chirp_server::{AuthConfig, TokenValidator};
//!
//! let validator = TokenValidator::new(AuthConfig::new(b"my-secret".to_vec()));
//! let token = validator.create_token(&UserId::new("u1")).unwrap();
//! assert_eq!(validator.validate_token(&token).unwrap(), UserId::new("u1"));
//! ```
//!
//! # Change signal
//!
//! Feed responses carry `Content-Length`, and `HEAD /posts` answers with
//! the same header and no body, so a client can tell whether the feed
//! changed without downloading it. `ETag`s are opt-in.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod auth;
mod config;
mod error;
mod handler;
mod server;
mod store;

pub use auth::{hash_password, AuthConfig, TokenValidator};
pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use handler::{HandlerContext, RequestHandler};
pub use server::ChirpServer;
pub use store::Directory;
