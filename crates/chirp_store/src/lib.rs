//! # Chirp Store
//!
//! Durable key-value storage backing an authenticated session.
//!
//! Stores are **opaque string maps**. They know nothing about tokens or
//! users; the session layer above decides which keys exist and what they
//! mean, and enforces any cross-key consistency it needs.
//!
//! ## Available Stores
//!
//! - [`InMemoryStore`] - For testing and ephemeral sessions
//! - [`FileStore`] - A JSON file that survives restarts
//!
//! ## Example
//!
//! ```rust
//! use chirp_store::{SessionStore, InMemoryStore};
//!
//! let store = InMemoryStore::new();
//! store.set("token", "abc").unwrap();
//! assert_eq!(store.get("token").unwrap().as_deref(), Some("abc"));
//! store.remove("token").unwrap();
//! assert_eq!(store.get("token").unwrap(), None);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod file;
mod memory;
mod store;

pub use error::{StoreError, StoreResult};
pub use file::FileStore;
pub use memory::InMemoryStore;
pub use store::SessionStore;
