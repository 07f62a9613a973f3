//! # Chirp Protocol
//!
//! Data model and wire messages shared by the Chirp client and the
//! reference service.
//!
//! This crate provides:
//! - `User`, `Author`, `Post` and `Session` records
//! - `ChangeSignal`, the opaque "has the feed changed" token
//! - Request/response bodies for the auth, posts and profile endpoints
//! - JSON encoding/decoding helpers
//! - Transport-neutral HTTP records and the in-process `LoopbackServer` seam
//! - Post content validation
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod codec;
mod error;
mod http;
mod messages;
mod types;
mod validation;

pub use codec::{decode, encode};
pub use error::{ProtocolError, ProtocolResult};
pub use http::{HttpRequest, HttpResponse, LoopbackServer, Method};
pub use messages::{
    AuthResponse, CreatePostRequest, ErrorBody, LoginRequest, RegisterRequest,
    UpdateProfileRequest,
};
pub use types::{Author, ChangeSignal, Post, PostId, PostList, Session, User, UserId};
pub use validation::{validate_content, ContentError, MAX_POST_CHARS};
