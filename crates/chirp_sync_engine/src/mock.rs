//! Scriptable in-memory gateway for testing.

use crate::error::{SyncError, SyncResult};
use crate::gateway::{AuthGateway, FeedGateway, ProfileGateway};
use async_trait::async_trait;
use chirp_protocol::{
    Author, ChangeSignal, LoginRequest, Post, PostId, PostList, RegisterRequest, Session,
    UpdateProfileRequest, User, UserId,
};
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::oneshot;

enum Scripted<T> {
    Ready(SyncResult<T>),
    Deferred(oneshot::Receiver<SyncResult<T>>),
}

/// Queue of scripted responses for one operation, consumed in order.
struct Script<T> {
    queue: Mutex<VecDeque<Scripted<T>>>,
    calls: AtomicUsize,
}

impl<T> Script<T> {
    fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
        }
    }

    fn push(&self, result: SyncResult<T>) {
        self.queue.lock().push_back(Scripted::Ready(result));
    }

    fn defer(&self) -> oneshot::Sender<SyncResult<T>> {
        let (tx, rx) = oneshot::channel();
        self.queue.lock().push_back(Scripted::Deferred(rx));
        tx
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Counts the call and returns the next scripted response, if any.
    /// `None` means the caller should use its default behaviour.
    async fn next(&self) -> Option<SyncResult<T>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.queue.lock().pop_front();
        match scripted? {
            Scripted::Ready(result) => Some(result),
            Scripted::Deferred(rx) => Some(rx.await.unwrap_or_else(|_| {
                Err(SyncError::Transport("deferred response dropped".into()))
            })),
        }
    }
}

/// A gateway with scripted responses.
///
/// Unscripted calls fall back to a small in-memory model: `list` and
/// `change_signal` serve the feed set with [`set_feed`](Self::set_feed),
/// `create` returns a post with ID `p{n}` for the n-th create call and
/// `delete` succeeds.
///
/// Deferred responses (`defer_*`) hold a call open until the test resolves
/// the returned sender, which is how overlapping requests are staged.
pub struct MockGateway {
    feed: Mutex<PostList>,
    author: Mutex<Author>,
    profile: Mutex<Option<User>>,
    my_posts: Mutex<Vec<Post>>,
    session: Mutex<Option<Session>>,

    list: Script<PostList>,
    signal: Script<ChangeSignal>,
    create: Script<Post>,
    delete: Script<()>,
    login: Script<Session>,
    register: Script<Session>,
    load_profile: Script<User>,
    update_profile: Script<User>,
    load_my_posts: Script<Vec<Post>>,

    created: Mutex<Vec<String>>,
    deleted: Mutex<Vec<PostId>>,
    last_token: Mutex<Option<String>>,
}

impl MockGateway {
    /// Creates a gateway serving an empty feed.
    pub fn new() -> Self {
        Self {
            feed: Mutex::new(PostList::new(Vec::new(), ChangeSignal::from_len(2))),
            author: Mutex::new(Author {
                id: UserId::new("u1"),
                username: "mock".into(),
            }),
            profile: Mutex::new(None),
            my_posts: Mutex::new(Vec::new()),
            session: Mutex::new(None),
            list: Script::new(),
            signal: Script::new(),
            create: Script::new(),
            delete: Script::new(),
            login: Script::new(),
            register: Script::new(),
            load_profile: Script::new(),
            update_profile: Script::new(),
            load_my_posts: Script::new(),
            created: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
            last_token: Mutex::new(None),
        }
    }

    /// Sets the feed served by unscripted `list`/`change_signal` calls.
    pub fn set_feed(&self, posts: Vec<Post>, signal: ChangeSignal) {
        *self.feed.lock() = PostList::new(posts, signal);
    }

    /// Sets the author attached to posts made by unscripted `create` calls.
    pub fn set_author(&self, author: Author) {
        *self.author.lock() = author;
    }

    /// Sets the profile served by unscripted profile calls.
    pub fn set_profile(&self, user: User) {
        *self.profile.lock() = Some(user);
    }

    /// Sets the posts served by unscripted `my_posts` calls.
    pub fn set_my_posts(&self, posts: Vec<Post>) {
        *self.my_posts.lock() = posts;
    }

    /// Sets the session returned by unscripted `login`/`register` calls.
    pub fn set_session(&self, session: Session) {
        *self.session.lock() = Some(session);
    }

    /// Queues a `list` response.
    pub fn push_list(&self, result: SyncResult<PostList>) {
        self.list.push(result);
    }

    /// Queues a `list` response resolved later through the returned sender.
    pub fn defer_list(&self) -> oneshot::Sender<SyncResult<PostList>> {
        self.list.defer()
    }

    /// Queues a `change_signal` response.
    pub fn push_signal(&self, result: SyncResult<ChangeSignal>) {
        self.signal.push(result);
    }

    /// Queues a `change_signal` response resolved later.
    pub fn defer_signal(&self) -> oneshot::Sender<SyncResult<ChangeSignal>> {
        self.signal.defer()
    }

    /// Queues a `create` response.
    pub fn push_create(&self, result: SyncResult<Post>) {
        self.create.push(result);
    }

    /// Queues a `create` response resolved later.
    pub fn defer_create(&self) -> oneshot::Sender<SyncResult<Post>> {
        self.create.defer()
    }

    /// Queues a `delete` response.
    pub fn push_delete(&self, result: SyncResult<()>) {
        self.delete.push(result);
    }

    /// Queues a `delete` response resolved later.
    pub fn defer_delete(&self) -> oneshot::Sender<SyncResult<()>> {
        self.delete.defer()
    }

    /// Queues a `login` response.
    pub fn push_login(&self, result: SyncResult<Session>) {
        self.login.push(result);
    }

    /// Queues a `register` response.
    pub fn push_register(&self, result: SyncResult<Session>) {
        self.register.push(result);
    }

    /// Queues a `profile` response.
    pub fn push_profile(&self, result: SyncResult<User>) {
        self.load_profile.push(result);
    }

    /// Queues an `update_profile` response.
    pub fn push_update_profile(&self, result: SyncResult<User>) {
        self.update_profile.push(result);
    }

    /// Queues a `my_posts` response.
    pub fn push_my_posts(&self, result: SyncResult<Vec<Post>>) {
        self.load_my_posts.push(result);
    }

    /// Number of `list` calls made.
    pub fn list_calls(&self) -> usize {
        self.list.calls()
    }

    /// Number of `change_signal` calls made.
    pub fn signal_calls(&self) -> usize {
        self.signal.calls()
    }

    /// Number of `create` calls made.
    pub fn create_calls(&self) -> usize {
        self.create.calls()
    }

    /// Number of `delete` calls made.
    pub fn delete_calls(&self) -> usize {
        self.delete.calls()
    }

    /// Number of `login` plus `register` calls made.
    pub fn auth_calls(&self) -> usize {
        self.login.calls() + self.register.calls()
    }

    /// Number of `update_profile` calls made.
    pub fn update_profile_calls(&self) -> usize {
        self.update_profile.calls()
    }

    /// Total number of remote calls of any kind.
    pub fn total_calls(&self) -> usize {
        self.list.calls()
            + self.signal.calls()
            + self.create.calls()
            + self.delete.calls()
            + self.auth_calls()
            + self.load_profile.calls()
            + self.update_profile.calls()
            + self.load_my_posts.calls()
    }

    /// Contents passed to `create`, in call order.
    pub fn created_contents(&self) -> Vec<String> {
        self.created.lock().clone()
    }

    /// IDs passed to `delete`, in call order.
    pub fn deleted_ids(&self) -> Vec<PostId> {
        self.deleted.lock().clone()
    }

    /// Token presented by the most recent authenticated call.
    pub fn last_token(&self) -> Option<String> {
        self.last_token.lock().clone()
    }

    fn saw_token(&self, token: &str) {
        *self.last_token.lock() = Some(token.to_string());
    }

    fn default_session(&self) -> SyncResult<Session> {
        self.session.lock().clone().ok_or(SyncError::InvalidCredentials)
    }

    fn default_profile(&self) -> SyncResult<User> {
        self.profile.lock().clone().ok_or(SyncError::NotFound)
    }
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MockGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockGateway")
            .field("calls", &self.total_calls())
            .finish()
    }
}

#[async_trait]
impl FeedGateway for MockGateway {
    async fn list(&self, token: &str) -> SyncResult<PostList> {
        self.saw_token(token);
        match self.list.next().await {
            Some(result) => result,
            None => Ok(self.feed.lock().clone()),
        }
    }

    async fn change_signal(&self, token: &str) -> SyncResult<ChangeSignal> {
        self.saw_token(token);
        match self.signal.next().await {
            Some(result) => result,
            None => Ok(self.feed.lock().signal.clone()),
        }
    }

    async fn create(&self, token: &str, content: &str) -> SyncResult<Post> {
        self.saw_token(token);
        self.created.lock().push(content.to_string());
        let n = self.create.calls() + 1;
        match self.create.next().await {
            Some(result) => result,
            None => Ok(Post {
                id: PostId::new(format!("p{n}")),
                content: content.to_string(),
                author: self.author.lock().clone(),
                created_at: Utc::now(),
            }),
        }
    }

    async fn delete(&self, token: &str, id: &PostId) -> SyncResult<()> {
        self.saw_token(token);
        self.deleted.lock().push(id.clone());
        self.delete.next().await.unwrap_or(Ok(()))
    }
}

#[async_trait]
impl AuthGateway for MockGateway {
    async fn login(&self, _request: &LoginRequest) -> SyncResult<Session> {
        match self.login.next().await {
            Some(result) => result,
            None => self.default_session(),
        }
    }

    async fn register(&self, _request: &RegisterRequest) -> SyncResult<Session> {
        match self.register.next().await {
            Some(result) => result,
            None => self.default_session(),
        }
    }
}

#[async_trait]
impl ProfileGateway for MockGateway {
    async fn profile(&self, token: &str) -> SyncResult<User> {
        self.saw_token(token);
        match self.load_profile.next().await {
            Some(result) => result,
            None => self.default_profile(),
        }
    }

    async fn update_profile(
        &self,
        token: &str,
        request: &UpdateProfileRequest,
    ) -> SyncResult<User> {
        self.saw_token(token);
        if let Some(result) = self.update_profile.next().await {
            return result;
        }
        let mut profile = self.profile.lock();
        let user = profile.as_mut().ok_or(SyncError::NotFound)?;
        user.username = request.username.clone();
        user.email = request.email.clone();
        Ok(user.clone())
    }

    async fn my_posts(&self, token: &str) -> SyncResult<Vec<Post>> {
        self.saw_token(token);
        match self.load_my_posts.next().await {
            Some(result) => result,
            None => Ok(self.my_posts.lock().clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unscripted_calls_use_the_model() {
        let gateway = MockGateway::new();
        gateway.set_feed(Vec::new(), ChangeSignal::new("v1"));

        let list = gateway.list("t").await.unwrap();
        assert!(list.posts.is_empty());
        assert_eq!(gateway.change_signal("t").await.unwrap(), ChangeSignal::new("v1"));

        let post = gateway.create("t", "hello").await.unwrap();
        assert_eq!(post.id, PostId::new("p1"));
        assert_eq!(post.content, "hello");

        assert_eq!(gateway.list_calls(), 1);
        assert_eq!(gateway.signal_calls(), 1);
        assert_eq!(gateway.create_calls(), 1);
        assert_eq!(gateway.last_token().as_deref(), Some("t"));
    }

    #[tokio::test]
    async fn scripted_responses_come_first() {
        let gateway = MockGateway::new();
        gateway.push_signal(Err(SyncError::Server { status: 503 }));

        assert_eq!(
            gateway.change_signal("t").await,
            Err(SyncError::Server { status: 503 })
        );
        assert!(gateway.change_signal("t").await.is_ok());
    }

    #[tokio::test]
    async fn deferred_response_resolves_later() {
        let gateway = std::sync::Arc::new(MockGateway::new());
        let tx = gateway.defer_list();

        let pending = tokio::spawn({
            let gateway = gateway.clone();
            async move { gateway.list("t").await }
        });

        tokio::task::yield_now().await;
        let _ = tx.send(Ok(PostList::new(Vec::new(), ChangeSignal::new("late"))));

        let list = pending.await.unwrap().unwrap();
        assert_eq!(list.signal, ChangeSignal::new("late"));
    }

    #[tokio::test]
    async fn dropped_deferral_is_a_transport_error() {
        let gateway = MockGateway::new();
        drop(gateway.defer_delete());

        let result = gateway.delete("t", &PostId::new("p1")).await;
        assert!(matches!(result, Err(SyncError::Transport(_))));
        assert_eq!(gateway.deleted_ids(), vec![PostId::new("p1")]);
    }
}
