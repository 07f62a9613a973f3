//! HTTP gateway implementation.
//!
//! [`HttpGateway`] speaks the JSON wire contract of the Chirp service.
//! The client itself is abstracted by [`HttpClient`] so the same gateway
//! runs over `reqwest` in production and in-process against a
//! [`LoopbackServer`] in tests.

use crate::config::Endpoints;
use crate::error::{SyncError, SyncResult};
use crate::gateway::{AuthGateway, FeedGateway, ProfileGateway};
use async_trait::async_trait;
use chirp_protocol::{
    decode, encode, AuthResponse, ChangeSignal, CreatePostRequest, ErrorBody, HttpRequest,
    HttpResponse, LoginRequest, LoopbackServer, Method, Post, PostId, PostList, RegisterRequest,
    Session, UpdateProfileRequest, User,
};
use std::time::Duration;

/// HTTP client abstraction.
///
/// Implementations send one request and return whatever the server
/// answered, including error statuses. `Err` is reserved for failures
/// where no response was received.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Sends a request.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, String>;
}

/// [`HttpClient`] over `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    /// Creates a client with the given request timeout.
    pub fn new(timeout: Duration) -> SyncResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::Transport(format!("failed to build client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, String> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Head => reqwest::Method::HEAD,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self.client.request(method, &request.url);
        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = request.body {
            builder = builder
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body);
        }

        let response = builder.send().await.map_err(|e| e.to_string())?;

        let mut out = HttpResponse::new(response.status().as_u16(), Vec::new());
        for (name, value) in response.headers() {
            if let Ok(value) = value.to_str() {
                out = out.with_header(name.as_str(), value);
            }
        }
        out.body = response.bytes().await.map_err(|e| e.to_string())?.to_vec();
        Ok(out)
    }
}

/// A client that routes requests directly to an in-process server.
///
/// Requests still go through JSON encoding, so tests exercise the real
/// wire contract without network overhead.
pub struct LoopbackClient<S: LoopbackServer> {
    server: S,
}

impl<S: LoopbackServer> LoopbackClient<S> {
    /// Creates a client connected to `server`.
    pub fn new(server: S) -> Self {
        Self { server }
    }

    /// Returns the server.
    pub fn server(&self) -> &S {
        &self.server
    }
}

#[async_trait]
impl<S: LoopbackServer> HttpClient for LoopbackClient<S> {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, String> {
        let request = HttpRequest {
            url: request.path().to_string(),
            ..request
        };
        Ok(self.server.handle(&request))
    }
}

/// Gateway over an [`HttpClient`].
pub struct HttpGateway<C: HttpClient> {
    endpoints: Endpoints,
    client: C,
}

impl<C: HttpClient> HttpGateway<C> {
    /// Creates a gateway.
    pub fn new(endpoints: Endpoints, client: C) -> Self {
        Self { endpoints, client }
    }

    /// Returns the endpoints.
    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    async fn send(&self, request: HttpRequest) -> SyncResult<HttpResponse> {
        tracing::trace!(method = request.method.as_str(), url = %request.url, "sending request");
        self.client.send(request).await.map_err(SyncError::Transport)
    }

    fn posts_url(&self, suffix: &str) -> String {
        format!("{}{}", self.endpoints.posts_url, suffix)
    }
}

impl<S: LoopbackServer> HttpGateway<LoopbackClient<S>> {
    /// Creates a gateway talking to an in-process server.
    pub fn loopback(server: S) -> Self {
        Self::new(
            Endpoints::from_base("http://loopback"),
            LoopbackClient::new(server),
        )
    }
}

/// Maps a non-success status to an error. `unauthorized` is what 401
/// means for this call.
fn expect_success(response: HttpResponse, unauthorized: SyncError) -> SyncResult<HttpResponse> {
    if response.is_success() {
        return Ok(response);
    }

    let status = response.status;
    let message = decode::<ErrorBody>(&response.body)
        .map(|body| body.error)
        .unwrap_or_else(|_| format!("status {status}"));
    tracing::debug!(status, error = %message, "request failed");

    Err(match status {
        401 => unauthorized,
        400 => SyncError::Rejected(message),
        404 => SyncError::NotFound,
        500..=599 => SyncError::Server { status },
        _ => SyncError::Unexpected { status },
    })
}

/// Reads the change signal from response headers: the `ETag` when
/// present, otherwise `Content-Length`.
fn header_signal(response: &HttpResponse) -> Option<ChangeSignal> {
    if let Some(etag) = response.header("etag") {
        return Some(ChangeSignal::new(etag));
    }
    response
        .header("content-length")
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(ChangeSignal::from_len)
}

/// Signal of a full list response. Falls back to the body length.
fn list_signal(response: &HttpResponse) -> ChangeSignal {
    header_signal(response).unwrap_or_else(|| ChangeSignal::from_len(response.body.len() as u64))
}

#[async_trait]
impl<C: HttpClient> FeedGateway for HttpGateway<C> {
    async fn list(&self, token: &str) -> SyncResult<PostList> {
        let request = HttpRequest::new(Method::Get, self.posts_url("")).with_bearer(token);
        let response = expect_success(self.send(request).await?, SyncError::Unauthenticated)?;
        let signal = list_signal(&response);
        let posts: Vec<Post> = decode(&response.body)?;
        Ok(PostList::new(posts, signal))
    }

    async fn change_signal(&self, token: &str) -> SyncResult<ChangeSignal> {
        let request = HttpRequest::new(Method::Head, self.posts_url("")).with_bearer(token);
        let response = expect_success(self.send(request).await?, SyncError::Unauthenticated)?;
        if let Some(signal) = header_signal(&response) {
            return Ok(signal);
        }

        // A HEAD without either header says nothing; ask for the list.
        tracing::debug!("HEAD carried no signal headers, falling back to GET");
        let request = HttpRequest::new(Method::Get, self.posts_url("")).with_bearer(token);
        let response = expect_success(self.send(request).await?, SyncError::Unauthenticated)?;
        Ok(list_signal(&response))
    }

    async fn create(&self, token: &str, content: &str) -> SyncResult<Post> {
        let body = encode(&CreatePostRequest::new(content))?;
        let request = HttpRequest::new(Method::Post, self.posts_url(""))
            .with_bearer(token)
            .with_body(body);
        let response = expect_success(self.send(request).await?, SyncError::Unauthenticated)?;
        Ok(decode(&response.body)?)
    }

    async fn delete(&self, token: &str, id: &PostId) -> SyncResult<()> {
        let request =
            HttpRequest::new(Method::Delete, self.posts_url(&format!("/{id}"))).with_bearer(token);
        expect_success(self.send(request).await?, SyncError::Unauthenticated)?;
        Ok(())
    }
}

#[async_trait]
impl<C: HttpClient> AuthGateway for HttpGateway<C> {
    async fn login(&self, request: &LoginRequest) -> SyncResult<Session> {
        let url = format!("{}/login", self.endpoints.auth_url);
        let request = HttpRequest::new(Method::Post, url).with_body(encode(request)?);
        let response = expect_success(self.send(request).await?, SyncError::InvalidCredentials)?;
        let auth: AuthResponse = decode(&response.body)?;
        Ok(Session::new(auth.token, auth.user))
    }

    async fn register(&self, request: &RegisterRequest) -> SyncResult<Session> {
        let url = format!("{}/register", self.endpoints.auth_url);
        let request = HttpRequest::new(Method::Post, url).with_body(encode(request)?);
        let response = expect_success(self.send(request).await?, SyncError::Unauthenticated)?;
        let auth: AuthResponse = decode(&response.body)?;
        Ok(Session::new(auth.token, auth.user))
    }
}

#[async_trait]
impl<C: HttpClient> ProfileGateway for HttpGateway<C> {
    async fn profile(&self, token: &str) -> SyncResult<User> {
        let url = format!("{}/profile", self.endpoints.users_url);
        let request = HttpRequest::new(Method::Get, url).with_bearer(token);
        let response = expect_success(self.send(request).await?, SyncError::Unauthenticated)?;
        Ok(decode(&response.body)?)
    }

    async fn update_profile(
        &self,
        token: &str,
        request: &UpdateProfileRequest,
    ) -> SyncResult<User> {
        let url = format!("{}/profile", self.endpoints.users_url);
        let request = HttpRequest::new(Method::Put, url)
            .with_bearer(token)
            .with_body(encode(request)?);
        let response = expect_success(self.send(request).await?, SyncError::Unauthenticated)?;
        Ok(decode(&response.body)?)
    }

    async fn my_posts(&self, token: &str) -> SyncResult<Vec<Post>> {
        let request =
            HttpRequest::new(Method::Get, self.posts_url("/my-posts")).with_bearer(token);
        let response = expect_success(self.send(request).await?, SyncError::Unauthenticated)?;
        Ok(decode(&response.body)?)
    }
}
