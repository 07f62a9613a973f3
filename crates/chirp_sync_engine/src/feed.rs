//! Feed synchronizer.
//!
//! Keeps a local snapshot of the remote feed fresh by polling a cheap
//! change signal and re-fetching the full list only when the signal moves.
//!
//! # Ordering
//!
//! Every refresh is issued with a ticket carrying the current generation.
//! Issuing a refresh, stopping and losing the session all advance the
//! generation, and a result is applied only if its ticket is still
//! current. Combined with the `Refreshing` state check before each `list`
//! call this gives at most one applicable refresh at any time, and a late
//! response can never overwrite a newer one.
//!
//! # Locking
//!
//! All state sits behind one `parking_lot` mutex that is never held across
//! an `.await`. Lock order is `inner` → `poller` → `watcher`; the session
//! guard's own lock may be taken while holding `inner`.
//!
//! # Session loss
//!
//! While running, a watcher task follows the guard's [`SessionEvent`]s. A
//! cleared or rejected session stops the synchronizer at once, whichever
//! component observed it.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::gateway::FeedGateway;
use crate::pending::{MutationLedger, PendingMutation};
use crate::scheduler::{PollHandle, PollTask, Tick};
use crate::session::{SessionEvent, SessionGuard};
use crate::state::{FeedEvent, FeedSnapshot, SyncState, SyncStats};
use chirp_protocol::{validate_content, Post, PostId, PostList};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Result of a refresh attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The snapshot was replaced.
    Applied {
        /// Number of posts in the new snapshot.
        posts: usize,
    },
    /// The response arrived after a newer refresh or a stop and was dropped.
    Discarded,
    /// No refresh was issued because one is already in flight or the
    /// synchronizer is already running.
    Skipped,
}

/// Result of one polling step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The change signal matched the snapshot; nothing was fetched.
    Unchanged,
    /// The signal changed and the snapshot was refreshed.
    Refreshed {
        /// Number of posts in the new snapshot.
        posts: usize,
    },
    /// Not polling, or the step was overtaken by a refresh or a stop.
    Skipped,
}

struct Inner {
    state: SyncState,
    snapshot: FeedSnapshot,
    generation: u64,
    ledger: MutationLedger,
    stats: SyncStats,
}

struct Ticket {
    generation: u64,
    mark: u64,
    token: String,
}

/// Session-gated feed synchronizer.
///
/// The synchronizer exclusively owns its [`FeedSnapshot`]; callers read
/// clones through [`current_snapshot`](Self::current_snapshot) and observe
/// changes through [`subscribe`](Self::subscribe).
///
/// # Example
///
/// ```rust,no_run
/// use chirp_store::InMemoryStore;
/// use chirp_sync_engine::{FeedSynchronizer, MockGateway, SessionGuard, SyncConfig};
/// use std::sync::Arc;
///
/// # async fn run() -> chirp_sync_engine::SyncResult<()> {
/// let guard = Arc::new(SessionGuard::new(Arc::new(InMemoryStore::new())));
/// let gateway = Arc::new(MockGateway::new());
/// let feed = Arc::new(FeedSynchronizer::new(SyncConfig::default(), guard, gateway));
///
/// feed.start().await?;
/// for post in feed.current_snapshot().posts() {
///     println!("{}: {}", post.author.username, post.content);
/// }
/// feed.stop();
/// # Ok(())
/// # }
/// ```
pub struct FeedSynchronizer<G: FeedGateway + ?Sized + 'static> {
    config: SyncConfig,
    session: Arc<SessionGuard>,
    gateway: Arc<G>,
    inner: Mutex<Inner>,
    events: broadcast::Sender<FeedEvent>,
    poller: Mutex<Option<PollHandle>>,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl<G: FeedGateway + ?Sized + 'static> FeedSynchronizer<G> {
    /// Creates a synchronizer with an empty snapshot in the `Idle` state.
    pub fn new(mut config: SyncConfig, session: Arc<SessionGuard>, gateway: Arc<G>) -> Self {
        config.event_capacity = config.event_capacity.max(1);
        let (events, _) = broadcast::channel(config.event_capacity);
        Self {
            config,
            session,
            gateway,
            inner: Mutex::new(Inner {
                state: SyncState::Idle,
                snapshot: FeedSnapshot::new(),
                generation: 0,
                ledger: MutationLedger::new(),
                stats: SyncStats::default(),
            }),
            events,
            poller: Mutex::new(None),
            watcher: Mutex::new(None),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Returns the current state.
    pub fn state(&self) -> SyncState {
        self.inner.lock().state
    }

    /// Returns a copy of the current snapshot.
    pub fn current_snapshot(&self) -> FeedSnapshot {
        self.inner.lock().snapshot.clone()
    }

    /// Returns sync statistics.
    pub fn stats(&self) -> SyncStats {
        self.inner.lock().stats.clone()
    }

    /// Returns the publishes and deletes awaiting a server answer.
    pub fn pending_mutations(&self) -> Vec<PendingMutation> {
        self.inner.lock().ledger.in_flight().to_vec()
    }

    /// Subscribes to feed events.
    pub fn subscribe(&self) -> broadcast::Receiver<FeedEvent> {
        self.events.subscribe()
    }

    /// Fetches the full feed and, on success, starts polling.
    ///
    /// Does nothing if the synchronizer is already refreshing or polling.
    /// After a failure the state is `Idle` and calling `start` again is the
    /// retry.
    pub async fn start(self: &Arc<Self>) -> SyncResult<RefreshOutcome> {
        let (ticket, session_events) = {
            let mut inner = self.inner.lock();
            if !inner.state.can_start() {
                debug!(state = ?inner.state, "start ignored");
                return Ok(RefreshOutcome::Skipped);
            }
            let session = self.require_session(&mut inner)?;
            (
                self.begin_refresh(&mut inner, session.token),
                self.session.subscribe(),
            )
        };

        let generation = ticket.generation;
        let result = self.gateway.list(&ticket.token).await;
        let outcome = self.finish_refresh(ticket, result)?;
        if let RefreshOutcome::Applied { .. } = outcome {
            self.arm_poller(generation);
            self.watch_session(generation, session_events);
        }
        Ok(outcome)
    }

    /// Stops polling. In-flight requests complete but their results are
    /// discarded.
    pub fn stop(&self) {
        let mut inner = self.inner.lock();
        inner.state = SyncState::Stopped;
        inner.generation += 1;
        inner.ledger.clear_confirmed();
        self.cancel_poller();
        self.cancel_watcher();
        debug!(generation = inner.generation, "synchronizer stopped");
    }

    /// Re-fetches the full feed now, regardless of the change signal.
    ///
    /// Does nothing while a refresh is in flight.
    ///
    /// # Errors
    ///
    /// Returns `NotStarted` unless the synchronizer is polling.
    pub async fn refresh(&self) -> SyncResult<RefreshOutcome> {
        let ticket = {
            let mut inner = self.inner.lock();
            match inner.state {
                SyncState::Refreshing => return Ok(RefreshOutcome::Skipped),
                SyncState::Idle | SyncState::Stopped => return Err(SyncError::NotStarted),
                SyncState::Polling => {}
            }
            let session = self.require_session(&mut inner)?;
            self.begin_refresh(&mut inner, session.token)
        };

        let result = self.gateway.list(&ticket.token).await;
        self.finish_refresh(ticket, result)
    }

    /// Runs one polling step: fetch the change signal and, if it differs
    /// from the snapshot's, refresh.
    ///
    /// A failed signal fetch is reported as an `Error` event and polling
    /// continues.
    pub async fn poll_once(&self) -> SyncResult<PollOutcome> {
        let (generation, token) = {
            let mut inner = self.inner.lock();
            if inner.state != SyncState::Polling {
                return Ok(PollOutcome::Skipped);
            }
            let session = self.require_session(&mut inner)?;
            (inner.generation, session.token)
        };

        let result = self.gateway.change_signal(&token).await;

        let ticket = {
            let mut inner = self.inner.lock();
            if inner.state != SyncState::Polling || inner.generation != generation {
                debug!("poll overtaken, result dropped");
                return Ok(PollOutcome::Skipped);
            }
            self.check_token(&mut inner, &token)?;
            inner.stats.polls += 1;

            match result {
                Ok(signal) if inner.snapshot.signal() == Some(&signal) => {
                    return Ok(PollOutcome::Unchanged);
                }
                Ok(signal) => {
                    debug!(signal = %signal, "change signal moved");
                    self.begin_refresh(&mut inner, token)
                }
                Err(err) => return Err(self.fail(&mut inner, err)),
            }
        };

        let result = self.gateway.list(&ticket.token).await;
        match self.finish_refresh(ticket, result)? {
            RefreshOutcome::Applied { posts } => Ok(PollOutcome::Refreshed { posts }),
            RefreshOutcome::Discarded | RefreshOutcome::Skipped => Ok(PollOutcome::Skipped),
        }
    }

    /// Publishes a post.
    ///
    /// The content is validated before anything else; invalid content
    /// fails with `Validation` and makes no remote call. The snapshot only
    /// changes once the server has returned the stored post, which is then
    /// put first in the feed.
    pub async fn publish(&self, content: &str) -> SyncResult<Post> {
        validate_content(content)?;

        let (seq, token) = {
            let mut inner = self.inner.lock();
            let session = self.require_session(&mut inner)?;
            (inner.ledger.begin_publish(), session.token)
        };

        let result = self.gateway.create(&token, content).await;

        let mut inner = self.inner.lock();
        inner.ledger.finish_publish(seq);
        self.check_token(&mut inner, &token)?;

        match result {
            Ok(post) => {
                if inner.state == SyncState::Refreshing {
                    inner.ledger.confirm_published(post.clone());
                }
                if inner.snapshot.prepend(post.clone()) {
                    self.emit(FeedEvent::Published(post.clone()));
                }
                debug!(post = %post.id, "publish confirmed");
                Ok(post)
            }
            Err(err) => Err(self.fail(&mut inner, err)),
        }
    }

    /// Deletes a post from the feed.
    ///
    /// Returns `Ok(false)` without a remote call if the post is not in the
    /// snapshot or a delete for it is already in flight. The post is
    /// removed only after the server confirms; a server that no longer
    /// has the post counts as a confirmation.
    pub async fn delete(&self, id: &PostId) -> SyncResult<bool> {
        let token = {
            let mut inner = self.inner.lock();
            let session = self.require_session(&mut inner)?;
            if !inner.snapshot.contains(id) || !inner.ledger.begin_delete(id) {
                debug!(post = %id, "delete ignored");
                return Ok(false);
            }
            session.token
        };

        let result = self.gateway.delete(&token, id).await;

        let mut inner = self.inner.lock();
        inner.ledger.finish_delete(id);
        self.check_token(&mut inner, &token)?;

        match result {
            Ok(()) | Err(SyncError::NotFound) => {
                if inner.state == SyncState::Refreshing {
                    inner.ledger.confirm_deleted(id.clone());
                }
                if inner.snapshot.remove(id) {
                    self.emit(FeedEvent::Deleted(id.clone()));
                }
                debug!(post = %id, "delete confirmed");
                Ok(true)
            }
            Err(err) => Err(self.fail(&mut inner, err)),
        }
    }

    fn begin_refresh(&self, inner: &mut Inner, token: String) -> Ticket {
        inner.generation += 1;
        inner.state = SyncState::Refreshing;
        debug!(generation = inner.generation, "refresh issued");
        Ticket {
            generation: inner.generation,
            mark: inner.ledger.mark(),
            token,
        }
    }

    fn finish_refresh(
        &self,
        ticket: Ticket,
        result: SyncResult<PostList>,
    ) -> SyncResult<RefreshOutcome> {
        let mut inner = self.inner.lock();
        if inner.generation != ticket.generation || inner.state != SyncState::Refreshing {
            inner.stats.discarded += 1;
            warn!(
                issued = ticket.generation,
                current = inner.generation,
                "discarding stale refresh"
            );
            return Ok(RefreshOutcome::Discarded);
        }
        self.check_token(&mut inner, &ticket.token)?;

        match result {
            Ok(list) => {
                let mut posts = list.posts;
                inner.ledger.reapply(ticket.mark, &mut posts);
                inner.ledger.clear_confirmed();
                inner.snapshot.replace(posts, list.signal);
                inner.state = SyncState::Polling;
                inner.stats.refreshes += 1;
                inner.stats.last_refresh = Some(SystemTime::now());

                let posts = inner.snapshot.len();
                debug!(posts, generation = ticket.generation, "refresh applied");
                self.emit(FeedEvent::Refreshed { posts });
                Ok(RefreshOutcome::Applied { posts })
            }
            Err(err) => {
                if err != SyncError::Unauthenticated {
                    inner.state = SyncState::Idle;
                    inner.ledger.clear_confirmed();
                    self.cancel_poller();
                }
                Err(self.fail(&mut inner, err))
            }
        }
    }

    /// Reads the session, stopping the synchronizer if there is none.
    fn require_session(&self, inner: &mut Inner) -> SyncResult<chirp_protocol::Session> {
        match self.session.require_session() {
            Ok(session) => Ok(session),
            Err(err) => {
                self.expel(inner);
                Err(err)
            }
        }
    }

    /// Fails with `Unauthenticated` if the session is no longer the one a
    /// request was issued with.
    fn check_token(&self, inner: &mut Inner, token: &str) -> SyncResult<()> {
        if self.session.current_token().as_deref() == Some(token) {
            return Ok(());
        }
        warn!("session changed while a request was in flight");
        self.expel(inner);
        Err(SyncError::Unauthenticated)
    }

    /// Reports a remote failure and returns it. An unauthorized answer
    /// clears the session and stops the synchronizer.
    fn fail(&self, inner: &mut Inner, err: SyncError) -> SyncError {
        if err == SyncError::Unauthenticated {
            self.session.invalidate();
            self.expel(inner);
            return err;
        }
        warn!(error = %err, transient = err.is_transient(), "feed operation failed");
        inner.stats.last_error = Some(err.clone());
        self.emit(FeedEvent::Error(err.clone()));
        err
    }

    fn expel(&self, inner: &mut Inner) {
        inner.state = SyncState::Stopped;
        inner.generation += 1;
        inner.ledger.clear_confirmed();
        self.cancel_poller();
        self.cancel_watcher();
        info!("session lost, synchronizer stopped");
        self.emit(FeedEvent::Unauthenticated);
    }

    fn arm_poller(self: &Arc<Self>, generation: u64) {
        let inner = self.inner.lock();
        if inner.state != SyncState::Polling || inner.generation != generation {
            return;
        }
        let mut poller = self.poller.lock();
        if let Some(handle) = poller.as_ref() {
            if !handle.is_cancelled() && !handle.is_finished() {
                return;
            }
        }

        let weak = Arc::downgrade(self);
        *poller = Some(PollTask::spawn(self.config.poll_interval, move || {
            let weak = weak.clone();
            async move {
                let Some(sync) = weak.upgrade() else {
                    return Tick::Halt;
                };
                if let Err(err) = sync.poll_once().await {
                    debug!(error = %err, "poll failed");
                }
                if sync.state().is_running() {
                    Tick::Continue
                } else {
                    Tick::Halt
                }
            }
        }));
        debug!(interval = ?self.config.poll_interval, "poller armed");
    }

    fn cancel_poller(&self) {
        if let Some(handle) = self.poller.lock().take() {
            handle.cancel();
        }
    }

    /// Follows session events until the session is lost or the
    /// synchronizer goes away. `events` must have been subscribed before
    /// the refresh that armed polling was issued.
    fn watch_session(
        self: &Arc<Self>,
        generation: u64,
        mut events: broadcast::Receiver<SessionEvent>,
    ) {
        let inner = self.inner.lock();
        if inner.state != SyncState::Polling || inner.generation != generation {
            return;
        }
        let mut watcher = self.watcher.lock();
        if watcher.as_ref().is_some_and(|task| !task.is_finished()) {
            return;
        }

        let weak = Arc::downgrade(self);
        *watcher = Some(tokio::spawn(async move {
            loop {
                let lost = match events.recv().await {
                    Ok(SessionEvent::Cleared | SessionEvent::Unauthenticated) => true,
                    Ok(SessionEvent::Established(_)) => false,
                    Err(RecvError::Lagged(missed)) => {
                        debug!(missed, "session events lagged");
                        match weak.upgrade() {
                            Some(sync) => !sync.session.is_authenticated(),
                            None => return,
                        }
                    }
                    Err(RecvError::Closed) => return,
                };
                if lost {
                    if let Some(sync) = weak.upgrade() {
                        sync.session_lost();
                    }
                    return;
                }
            }
        }));
    }

    fn session_lost(&self) {
        let mut inner = self.inner.lock();
        if inner.state != SyncState::Stopped {
            self.expel(&mut inner);
        }
    }

    fn cancel_watcher(&self) {
        if let Some(task) = self.watcher.lock().take() {
            task.abort();
        }
    }

    fn emit(&self, event: FeedEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

impl<G: FeedGateway + ?Sized + 'static> Drop for FeedSynchronizer<G> {
    fn drop(&mut self) {
        if let Some(task) = self.watcher.get_mut().take() {
            task.abort();
        }
    }
}

impl<G: FeedGateway + ?Sized + 'static> std::fmt::Debug for FeedSynchronizer<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("FeedSynchronizer")
            .field("state", &inner.state)
            .field("posts", &inner.snapshot.len())
            .field("generation", &inner.generation)
            .finish()
    }
}
