//! Session gate.
//!
//! The session is a token plus the user it belongs to, persisted in a
//! [`SessionStore`] under two keys. Every data-dependent operation checks
//! the gate first, and any unauthorized answer from the server clears it.
//!
//! The two keys are written in an order that never exposes a token
//! without its user: `establish` removes the token, writes the user and
//! commits by writing the token last; `clear` removes the token first.
//! A crash between writes therefore leaves at worst a stray user record,
//! which reads as "no session".

use crate::error::{SyncError, SyncResult};
use chirp_protocol::{Session, User};
use chirp_store::SessionStore;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Store key holding the bearer token.
pub const TOKEN_KEY: &str = "token";

/// Store key holding the JSON-encoded user.
pub const USER_KEY: &str = "user";

/// Session lifecycle notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A session was established for this user.
    Established(User),
    /// The session was cleared by the user (logout).
    Cleared,
    /// An operation needed a session and found none, or the server
    /// rejected the token. Observers should route to the login screen.
    Unauthenticated,
}

/// Guards access to the persisted session.
pub struct SessionGuard {
    store: Arc<dyn SessionStore>,
    // Serializes multi-key reads and writes within this process.
    lock: Mutex<()>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionGuard {
    /// Creates a guard over `store`.
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            store,
            lock: Mutex::new(()),
            events,
        }
    }

    /// Subscribes to session events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Returns the current session, if both token and user are present
    /// and readable.
    pub fn session(&self) -> Option<Session> {
        let _guard = self.lock.lock();
        self.read_session()
    }

    /// Returns the signed-in user.
    pub fn current_user(&self) -> Option<User> {
        self.session().map(|s| s.user)
    }

    /// Returns the current bearer token.
    pub fn current_token(&self) -> Option<String> {
        self.session().map(|s| s.token)
    }

    /// Returns true if a session exists.
    pub fn is_authenticated(&self) -> bool {
        self.session().is_some()
    }

    /// Returns the session, or reports `Unauthenticated` to observers and
    /// fails.
    pub fn require_session(&self) -> SyncResult<Session> {
        match self.session() {
            Some(session) => Ok(session),
            None => {
                let _ = self.events.send(SessionEvent::Unauthenticated);
                Err(SyncError::Unauthenticated)
            }
        }
    }

    /// Persists a new session, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns `Store` if the session could not be written. In that case
    /// no session is left behind.
    pub fn establish(&self, session: &Session) -> SyncResult<()> {
        let user_json = serde_json::to_string(&session.user)
            .map_err(|e| SyncError::Protocol(e.to_string()))?;

        {
            let _guard = self.lock.lock();
            self.store.remove(TOKEN_KEY)?;
            self.store.set(USER_KEY, &user_json)?;
            if let Err(err) = self.store.set(TOKEN_KEY, &session.token) {
                let _ = self.store.remove(USER_KEY);
                return Err(err.into());
            }
        }

        tracing::info!(user = %session.user.id, "session established");
        let _ = self
            .events
            .send(SessionEvent::Established(session.user.clone()));
        Ok(())
    }

    /// Replaces the stored user, keeping the token.
    ///
    /// Used after a successful profile update.
    pub fn update_user(&self, user: &User) -> SyncResult<()> {
        let user_json =
            serde_json::to_string(user).map_err(|e| SyncError::Protocol(e.to_string()))?;
        let _guard = self.lock.lock();
        if self.store.get(TOKEN_KEY)?.is_none() {
            return Err(SyncError::Unauthenticated);
        }
        self.store.set(USER_KEY, &user_json)?;
        Ok(())
    }

    /// Removes the session (logout).
    pub fn clear(&self) -> SyncResult<()> {
        self.remove_both()?;
        tracing::info!("session cleared");
        let _ = self.events.send(SessionEvent::Cleared);
        Ok(())
    }

    /// Clears the session after the server rejected the token.
    ///
    /// Store failures are logged, not returned: the caller is already
    /// handling an `Unauthenticated` error.
    pub fn invalidate(&self) {
        if let Err(err) = self.remove_both() {
            tracing::warn!(error = %err, "failed to clear rejected session");
        }
        tracing::info!("session invalidated by server");
        let _ = self.events.send(SessionEvent::Unauthenticated);
    }

    /// Passes `result` through, invalidating the session when it carries
    /// `Unauthenticated`.
    pub fn intercept<T>(&self, result: SyncResult<T>) -> SyncResult<T> {
        if matches!(result, Err(SyncError::Unauthenticated)) {
            self.invalidate();
        }
        result
    }

    fn remove_both(&self) -> SyncResult<()> {
        let _guard = self.lock.lock();
        self.store.remove(TOKEN_KEY)?;
        self.store.remove(USER_KEY)?;
        Ok(())
    }

    fn read_session(&self) -> Option<Session> {
        let token = match self.store.get(TOKEN_KEY) {
            Ok(Some(token)) => token,
            Ok(None) => return None,
            Err(err) => {
                tracing::warn!(error = %err, "failed to read session token");
                return None;
            }
        };
        let user_json = match self.store.get(USER_KEY) {
            Ok(Some(json)) => json,
            Ok(None) => return None,
            Err(err) => {
                tracing::warn!(error = %err, "failed to read session user");
                return None;
            }
        };
        match serde_json::from_str::<User>(&user_json) {
            Ok(user) => Some(Session::new(token, user)),
            Err(err) => {
                tracing::warn!(error = %err, "stored session user is unreadable");
                None
            }
        }
    }
}

impl std::fmt::Debug for SessionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionGuard")
            .field("authenticated", &self.is_authenticated())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chirp_protocol::UserId;
    use chirp_store::{InMemoryStore, StoreError, StoreResult};
    use chrono::Utc;

    fn user(id: &str) -> User {
        User {
            id: UserId::new(id),
            username: format!("user-{id}"),
            email: format!("{id}@example.com"),
            created_at: Utc::now(),
        }
    }

    fn guard() -> (Arc<InMemoryStore>, SessionGuard) {
        let store = Arc::new(InMemoryStore::new());
        let guard = SessionGuard::new(store.clone());
        (store, guard)
    }

    #[test]
    fn no_session_initially() {
        let (_, guard) = guard();
        assert!(!guard.is_authenticated());
        assert!(guard.current_user().is_none());
    }

    #[test]
    fn establish_and_read() {
        let (store, guard) = guard();
        guard.establish(&Session::new("t1", user("u1"))).unwrap();

        let session = guard.session().unwrap();
        assert_eq!(session.token, "t1");
        assert_eq!(session.user.id, UserId::new("u1"));
        assert_eq!(store.get(TOKEN_KEY).unwrap().as_deref(), Some("t1"));
    }

    #[test]
    fn user_without_token_is_no_session() {
        let (store, guard) = guard();
        store
            .set(USER_KEY, &serde_json::to_string(&user("u1")).unwrap())
            .unwrap();
        assert!(guard.session().is_none());
    }

    #[test]
    fn corrupt_user_is_no_session() {
        let (store, guard) = guard();
        store.set(TOKEN_KEY, "t1").unwrap();
        store.set(USER_KEY, "{not json").unwrap();
        assert!(guard.session().is_none());
    }

    #[test]
    fn require_session_reports_unauthenticated() {
        let (_, guard) = guard();
        let mut rx = guard.subscribe();

        assert_eq!(guard.require_session(), Err(SyncError::Unauthenticated));
        assert_eq!(rx.try_recv().unwrap(), SessionEvent::Unauthenticated);
    }

    #[test]
    fn clear_removes_both_keys() {
        let (store, guard) = guard();
        guard.establish(&Session::new("t1", user("u1"))).unwrap();
        let mut rx = guard.subscribe();

        guard.clear().unwrap();

        assert!(store.is_empty());
        assert_eq!(rx.try_recv().unwrap(), SessionEvent::Cleared);
    }

    #[test]
    fn intercept_invalidates_on_unauthenticated() {
        let (store, guard) = guard();
        guard.establish(&Session::new("t1", user("u1"))).unwrap();

        let result: SyncResult<()> = guard.intercept(Err(SyncError::NotFound));
        assert!(result.is_err());
        assert!(guard.is_authenticated());

        let result: SyncResult<()> = guard.intercept(Err(SyncError::Unauthenticated));
        assert_eq!(result, Err(SyncError::Unauthenticated));
        assert!(!guard.is_authenticated());
        assert!(store.is_empty());
    }

    #[test]
    fn update_user_keeps_token() {
        let (_, guard) = guard();
        guard.establish(&Session::new("t1", user("u1"))).unwrap();

        let mut renamed = user("u1");
        renamed.username = "renamed".into();
        guard.update_user(&renamed).unwrap();

        let session = guard.session().unwrap();
        assert_eq!(session.token, "t1");
        assert_eq!(session.user.username, "renamed");
    }

    #[test]
    fn update_user_without_session_fails() {
        let (_, guard) = guard();
        assert_eq!(
            guard.update_user(&user("u1")),
            Err(SyncError::Unauthenticated)
        );
    }

    /// Fails every write of the token key.
    struct TokenWriteFails(InMemoryStore);

    impl SessionStore for TokenWriteFails {
        fn get(&self, key: &str) -> StoreResult<Option<String>> {
            self.0.get(key)
        }
        fn set(&self, key: &str, value: &str) -> StoreResult<()> {
            if key == TOKEN_KEY {
                return Err(StoreError::Corrupted("disk full".into()));
            }
            self.0.set(key, value)
        }
        fn remove(&self, key: &str) -> StoreResult<()> {
            self.0.remove(key)
        }
        fn keys(&self) -> StoreResult<Vec<String>> {
            self.0.keys()
        }
    }

    #[test]
    fn failed_establish_leaves_nothing() {
        let store = Arc::new(TokenWriteFails(InMemoryStore::new()));
        let guard = SessionGuard::new(store.clone());

        let result = guard.establish(&Session::new("t1", user("u1")));

        assert!(matches!(result, Err(SyncError::Store(_))));
        assert!(store.keys().unwrap().is_empty());
        assert!(!guard.is_authenticated());
    }
}
