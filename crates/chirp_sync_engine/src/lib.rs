//! # Chirp Sync Engine
//!
//! Session-gated feed synchronization for the Chirp micro-blogging client.
//!
//! This crate provides:
//! - Session gate (`SessionGuard`) in front of every data-dependent call
//! - Feed state machine (idle → refreshing → polling, stopped)
//! - Cheap change-signal polling with at most one refresh in flight
//! - Reconciliation of confirmed publishes/deletes with refresh results
//! - Gateway traits, an HTTP gateway and an in-process loopback client
//! - Login/registration and profile services
//!
//! ## Architecture
//!
//! The synchronizer keeps a local snapshot of the remote feed:
//! 1. `start()` fetches the full feed and records its change signal
//! 2. A repeating task polls the signal; only a changed signal re-fetches
//! 3. `publish`/`delete` touch the snapshot only after the server confirms
//!
//! ## Key Invariants
//!
//! - Server is authoritative
//! - Only the most recently issued refresh may replace the snapshot
//! - At most one refresh is in flight
//! - The next poll is scheduled only after the previous one completes
//! - Results that return after the session changed are discarded
//! - An unauthorized response clears the session and stops the engine

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod auth;
mod config;
mod error;
mod feed;
mod gateway;
mod http;
mod mock;
mod pending;
mod profile;
mod scheduler;
mod session;
mod state;

pub use auth::AuthService;
pub use config::{Endpoints, SyncConfig};
pub use error::{SyncError, SyncResult};
pub use feed::{FeedSynchronizer, PollOutcome, RefreshOutcome};
pub use gateway::{AuthGateway, FeedGateway, ProfileGateway};
pub use http::{HttpClient, HttpGateway, LoopbackClient, ReqwestClient};
pub use mock::MockGateway;
pub use pending::PendingMutation;
pub use profile::ProfileService;
pub use scheduler::{PollHandle, PollTask, Tick};
pub use session::{SessionEvent, SessionGuard, TOKEN_KEY, USER_KEY};
pub use state::{FeedEvent, FeedSnapshot, SyncState, SyncStats};
