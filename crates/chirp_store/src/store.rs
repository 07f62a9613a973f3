//! Session store trait definition.

use crate::error::StoreResult;

/// A durable key-value store for session data.
///
/// Each call is atomic for the single key it touches. No transactional
/// guarantee is made across keys: a caller that needs two keys to be set
/// or cleared together must order its writes so that every intermediate
/// state is harmless.
///
/// # Invariants
///
/// - `get` returns the value of the last successful `set` for that key,
///   or `None` after `remove`
/// - `remove` of a missing key succeeds
/// - Stores must be `Send + Sync` so one instance can be shared by the
///   whole process
///
/// # Implementors
///
/// - [`super::InMemoryStore`] - For testing
/// - [`super::FileStore`] - For persistent sessions
pub trait SessionStore: Send + Sync {
    /// Reads the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing medium cannot be read.
    fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the write cannot be made durable.
    fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Removes `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the write cannot be made durable.
    fn remove(&self, key: &str) -> StoreResult<()>;

    /// Lists the keys currently present, in ascending order.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing medium cannot be read.
    fn keys(&self) -> StoreResult<Vec<String>>;
}
