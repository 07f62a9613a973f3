//! Request routing and handlers.

use crate::auth::TokenValidator;
use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::store::Directory;
use chirp_protocol::{
    decode, encode, validate_content, AuthResponse, CreatePostRequest, ErrorBody, HttpRequest,
    HttpResponse, LoginRequest, Method, PostId, RegisterRequest, UpdateProfileRequest, User,
};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Context shared by all handlers.
pub struct HandlerContext {
    /// Server configuration.
    pub config: ServerConfig,
    /// Users and posts.
    pub directory: Arc<Directory>,
    validator: TokenValidator,
    faults: Mutex<Option<(u16, u32)>>,
}

impl HandlerContext {
    /// Creates a handler context.
    pub fn new(config: ServerConfig, directory: Arc<Directory>) -> Self {
        let validator = TokenValidator::new(config.auth.clone());
        Self {
            config,
            directory,
            validator,
            faults: Mutex::new(None),
        }
    }

    /// Returns the token validator.
    pub fn validator(&self) -> &TokenValidator {
        &self.validator
    }

    /// Makes the next `times` requests fail with `status`.
    pub fn inject_failure(&self, status: u16, times: u32) {
        *self.faults.lock() = (times > 0).then_some((status, times));
    }

    fn take_fault(&self) -> Option<u16> {
        let mut faults = self.faults.lock();
        let (status, remaining) = (*faults)?;
        *faults = (remaining > 1).then_some((status, remaining - 1));
        Some(status)
    }
}

/// Routes requests to handlers.
///
/// | Route | Handler |
/// |-------|---------|
/// | `POST /auth/login` | [`login`](Self::login) |
/// | `POST /auth/register` | [`register`](Self::register) |
/// | `GET`, `HEAD /posts` | feed |
/// | `POST /posts` | create |
/// | `GET /posts/my-posts` | own posts |
/// | `DELETE /posts/{id}` | delete |
/// | `GET`, `PUT /users/profile` | profile |
pub struct RequestHandler {
    context: Arc<HandlerContext>,
}

impl RequestHandler {
    /// Creates a request handler.
    pub fn new(context: Arc<HandlerContext>) -> Self {
        Self { context }
    }

    /// Handles one request and always produces a response.
    pub fn handle(&self, request: &HttpRequest) -> HttpResponse {
        let path = request.path();
        let response = match self.context.take_fault() {
            Some(status) => Err(ServerError::Injected(status)),
            None => self.route(request.method, path, request),
        };

        let method = request.method.as_str();
        match response {
            Ok(response) => {
                tracing::debug!(method, path, status = response.status, "handled");
                response
            }
            Err(err) if err.is_server_error() => {
                tracing::warn!(method, path, error = %err, "request failed");
                error_response(&err)
            }
            Err(err) => {
                tracing::debug!(method, path, error = %err, "request rejected");
                error_response(&err)
            }
        }
    }

    fn route(
        &self,
        method: Method,
        path: &str,
        request: &HttpRequest,
    ) -> ServerResult<HttpResponse> {
        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
        match (method, segments.as_slice()) {
            (Method::Post, ["auth", "login"]) => json(200, &self.login(&body(request)?)?),
            (Method::Post, ["auth", "register"]) => json(201, &self.register(&body(request)?)?),
            (Method::Get, ["posts"]) => self.feed(request, false),
            (Method::Head, ["posts"]) => self.feed(request, true),
            (Method::Post, ["posts"]) => {
                let user = self.authenticate(request)?;
                let create: CreatePostRequest = body(request)?;
                validate_content(&create.content)
                    .map_err(|e| ServerError::InvalidRequest(e.to_string()))?;
                json(201, &self.context.directory.create_post(&user, &create.content))
            }
            (Method::Get, ["posts", "my-posts"]) => {
                let user = self.authenticate(request)?;
                json(200, &self.context.directory.posts_by(&user.id))
            }
            (Method::Delete, ["posts", id]) => {
                let user = self.authenticate(request)?;
                self.context
                    .directory
                    .delete_post(&user.id, &PostId::new(*id))?;
                Ok(HttpResponse::new(204, Vec::new()))
            }
            (Method::Get, ["users", "profile"]) => json(200, &self.authenticate(request)?),
            (Method::Put, ["users", "profile"]) => {
                let user = self.authenticate(request)?;
                let update: UpdateProfileRequest = body(request)?;
                json(200, &self.update_profile(&user, update)?)
            }
            _ => Err(ServerError::NotFound(format!(
                "no route for {} {path}",
                method.as_str()
            ))),
        }
    }

    /// Checks credentials and issues a token.
    pub fn login(&self, request: &LoginRequest) -> ServerResult<AuthResponse> {
        let user = self
            .context
            .directory
            .authenticate(request.email.trim(), &request.password)?;
        self.issue(user)
    }

    /// Creates an account and issues its first token.
    pub fn register(&self, request: &RegisterRequest) -> ServerResult<AuthResponse> {
        let username = request.username.trim();
        let email = request.email.trim();
        if username.is_empty() || email.is_empty() {
            return Err(ServerError::InvalidRequest(
                "username and email are required".into(),
            ));
        }
        if request.password.chars().count() < self.context.config.min_password_len {
            return Err(ServerError::InvalidRequest(format!(
                "password must be at least {} characters",
                self.context.config.min_password_len
            )));
        }
        let user = self
            .context
            .directory
            .register(username, email, &request.password)?;
        tracing::info!(user = %user.id, "account registered");
        self.issue(user)
    }

    fn update_profile(&self, user: &User, update: UpdateProfileRequest) -> ServerResult<User> {
        let update = UpdateProfileRequest::new(&update.username, &update.email);
        if update.username.is_empty() || update.email.is_empty() {
            return Err(ServerError::InvalidRequest(
                "username and email are required".into(),
            ));
        }
        self.context
            .directory
            .update_profile(&user.id, &update.username, &update.email)
    }

    fn feed(&self, request: &HttpRequest, head: bool) -> ServerResult<HttpResponse> {
        self.authenticate(request)?;
        let posts = self.context.directory.posts(self.context.config.feed_limit);
        let body = encode(&posts).map_err(|e| ServerError::Internal(e.to_string()))?;

        let mut response = HttpResponse::new(200, Vec::new())
            .with_header("content-type", "application/json")
            .with_header("content-length", body.len().to_string());
        if self.context.config.emit_etag {
            let etag = format!("\"{}\"", hex::encode(Sha256::digest(&body)));
            response = response.with_header("etag", etag);
        }
        if !head {
            response.body = body;
        }
        Ok(response)
    }

    fn authenticate(&self, request: &HttpRequest) -> ServerResult<User> {
        let token = request
            .bearer
            .as_deref()
            .ok_or_else(|| ServerError::NotAuthorized("Missing token".into()))?;
        let user_id = self.context.validator.validate_token(token)?;
        self.context
            .directory
            .user(&user_id)
            .ok_or_else(|| ServerError::NotAuthorized("Unknown user".into()))
    }

    fn issue(&self, user: User) -> ServerResult<AuthResponse> {
        let token = self.context.validator.create_token(&user.id)?;
        Ok(AuthResponse { user, token })
    }
}

fn body<T: DeserializeOwned>(request: &HttpRequest) -> ServerResult<T> {
    let bytes = request
        .body
        .as_deref()
        .ok_or_else(|| ServerError::InvalidRequest("missing body".into()))?;
    decode(bytes).map_err(|e| ServerError::InvalidRequest(e.to_string()))
}

fn json<T: Serialize>(status: u16, value: &T) -> ServerResult<HttpResponse> {
    let body = encode(value).map_err(|e| ServerError::Internal(e.to_string()))?;
    Ok(HttpResponse::new(status, body).with_header("content-type", "application/json"))
}

fn error_response(err: &ServerError) -> HttpResponse {
    let message = match err {
        ServerError::NotAuthorized(msg)
        | ServerError::InvalidRequest(msg)
        | ServerError::Conflict(msg)
        | ServerError::Forbidden(msg)
        | ServerError::NotFound(msg) => msg.clone(),
        other => other.to_string(),
    };
    let body = encode(&ErrorBody::new(message)).unwrap_or_default();
    HttpResponse::new(err.status(), body).with_header("content-type", "application/json")
}
