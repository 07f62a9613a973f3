//! Main reference server.

use crate::config::ServerConfig;
use crate::handler::{HandlerContext, RequestHandler};
use crate::store::Directory;
use chirp_protocol::{HttpRequest, HttpResponse, LoopbackServer};
use std::sync::Arc;

/// The reference server.
///
/// Serves the Chirp wire contract from memory. It has no socket of its
/// own; requests arrive through [`handle`](Self::handle), typically via a
/// loopback client.
///
/// # Example
///
/// ```
/// use chirp_protocol::{HttpRequest, Method};
/// use chirp_server::{ChirpServer, ServerConfig};
///
/// let server = ChirpServer::new(ServerConfig::default());
///
/// let response = server.handle(&HttpRequest::new(Method::Get, "/posts"));
/// assert_eq!(response.status, 401);
/// ```
pub struct ChirpServer {
    handler: RequestHandler,
    context: Arc<HandlerContext>,
}

impl ChirpServer {
    /// Creates a server with an empty directory.
    pub fn new(config: ServerConfig) -> Self {
        Self::with_directory(config, Arc::new(Directory::new()))
    }

    /// Creates a server over an existing directory.
    pub fn with_directory(config: ServerConfig, directory: Arc<Directory>) -> Self {
        let context = Arc::new(HandlerContext::new(config, directory));
        let handler = RequestHandler::new(Arc::clone(&context));
        Self { handler, context }
    }

    /// Handles a request.
    pub fn handle(&self, request: &HttpRequest) -> HttpResponse {
        self.handler.handle(request)
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.context.config
    }

    /// Returns the directory.
    pub fn directory(&self) -> &Arc<Directory> {
        &self.context.directory
    }

    /// Makes the next `times` requests fail with `status`.
    pub fn inject_failure(&self, status: u16, times: u32) {
        self.context.inject_failure(status, times);
    }

    /// Returns the number of registered users.
    pub fn user_count(&self) -> usize {
        self.context.directory.user_count()
    }

    /// Returns the number of posts.
    pub fn post_count(&self) -> usize {
        self.context.directory.post_count()
    }
}

impl Default for ChirpServer {
    fn default() -> Self {
        Self::new(ServerConfig::default())
    }
}

impl LoopbackServer for ChirpServer {
    fn handle(&self, request: &HttpRequest) -> HttpResponse {
        self.handler.handle(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chirp_protocol::{
        decode, encode, AuthResponse, CreatePostRequest, ErrorBody, LoginRequest, Method, Post,
        RegisterRequest, UpdateProfileRequest, User,
    };

    fn post_json<T: serde::Serialize>(url: &str, value: &T) -> HttpRequest {
        HttpRequest::new(Method::Post, url).with_body(encode(value).unwrap())
    }

    fn register(server: &ChirpServer, name: &str) -> AuthResponse {
        let request = RegisterRequest::new(name, format!("{name}@example.com"), "pw");
        let response = server.handle(&post_json("/auth/register", &request));
        assert_eq!(response.status, 201);
        decode(&response.body).unwrap()
    }

    fn error_of(response: &HttpResponse) -> String {
        decode::<ErrorBody>(&response.body).unwrap().error
    }

    #[test]
    fn server_lifecycle() {
        let server = ChirpServer::default();
        assert_eq!(server.user_count(), 0);
        assert_eq!(server.post_count(), 0);
    }

    #[test]
    fn register_login_and_post() {
        let server = ChirpServer::default();
        let auth = register(&server, "ana");

        let login = server.handle(&post_json(
            "/auth/login",
            &LoginRequest::new("ana@example.com", "pw"),
        ));
        assert_eq!(login.status, 200);
        let login: AuthResponse = decode(&login.body).unwrap();
        assert_eq!(login.user.id, auth.user.id);

        let create = post_json("/posts", &CreatePostRequest::new("hello")).with_bearer(&login.token);
        let response = server.handle(&create);
        assert_eq!(response.status, 201);
        let post: Post = decode(&response.body).unwrap();
        assert_eq!(post.content, "hello");
        assert_eq!(post.author.username, "ana");

        let feed = server.handle(&HttpRequest::new(Method::Get, "/posts").with_bearer(&login.token));
        let posts: Vec<Post> = decode(&feed.body).unwrap();
        assert_eq!(posts, vec![post]);
    }

    #[test]
    fn bad_credentials() {
        let server = ChirpServer::default();
        register(&server, "ana");

        let response = server.handle(&post_json(
            "/auth/login",
            &LoginRequest::new("ana@example.com", "wrong"),
        ));

        assert_eq!(response.status, 401);
        assert_eq!(error_of(&response), "Invalid credentials");
    }

    #[test]
    fn duplicate_registration() {
        let server = ChirpServer::default();
        register(&server, "ana");

        let request = RegisterRequest::new("ana", "ana@example.com", "pw");
        let response = server.handle(&post_json("/auth/register", &request));

        assert_eq!(response.status, 400);
        assert_eq!(error_of(&response), "User or email already exists");
    }

    #[test]
    fn head_matches_get_length() {
        let server = ChirpServer::default();
        let auth = register(&server, "ana");
        let create = post_json("/posts", &CreatePostRequest::new("hi")).with_bearer(&auth.token);
        server.handle(&create);

        let get = server.handle(&HttpRequest::new(Method::Get, "/posts").with_bearer(&auth.token));
        let head =
            server.handle(&HttpRequest::new(Method::Head, "/posts").with_bearer(&auth.token));

        assert!(head.body.is_empty());
        assert_eq!(head.header("content-length"), get.header("content-length"));
        assert_eq!(
            get.header("content-length"),
            Some(get.body.len().to_string().as_str())
        );
        assert_eq!(head.header("etag"), None);
    }

    #[test]
    fn etag_when_enabled() {
        let server = ChirpServer::new(ServerConfig::default().with_etag(true));
        let auth = register(&server, "ana");

        let head =
            server.handle(&HttpRequest::new(Method::Head, "/posts").with_bearer(&auth.token));

        assert!(head.header("etag").is_some());
    }

    #[test]
    fn requests_without_token_are_rejected() {
        let server = ChirpServer::default();
        for (method, path) in [
            (Method::Get, "/posts"),
            (Method::Head, "/posts"),
            (Method::Get, "/posts/my-posts"),
            (Method::Delete, "/posts/p1"),
            (Method::Get, "/users/profile"),
        ] {
            let response = server.handle(&HttpRequest::new(method, path));
            assert_eq!(response.status, 401, "{} {path}", method.as_str());
        }

        let bogus = HttpRequest::new(Method::Get, "/posts").with_bearer("u1.0.abcd");
        assert_eq!(server.handle(&bogus).status, 401);
    }

    #[test]
    fn invalid_content_is_rejected() {
        let server = ChirpServer::default();
        let auth = register(&server, "ana");

        let long = "x".repeat(281);
        for content in ["", "   ", long.as_str()] {
            let create =
                post_json("/posts", &CreatePostRequest::new(content)).with_bearer(&auth.token);
            assert_eq!(server.handle(&create).status, 400);
        }
        assert_eq!(server.post_count(), 0);
    }

    #[test]
    fn delete_rules() {
        let server = ChirpServer::default();
        let ana = register(&server, "ana");
        let bob = register(&server, "bob");
        let create = post_json("/posts", &CreatePostRequest::new("mine")).with_bearer(&ana.token);
        let post: Post = decode(&server.handle(&create).body).unwrap();
        let url = format!("/posts/{}", post.id);

        let by_bob = HttpRequest::new(Method::Delete, url.as_str()).with_bearer(&bob.token);
        assert_eq!(server.handle(&by_bob).status, 403);

        let by_ana = HttpRequest::new(Method::Delete, url.as_str()).with_bearer(&ana.token);
        assert_eq!(server.handle(&by_ana).status, 204);
        assert_eq!(server.handle(&by_ana).status, 404);
    }

    #[test]
    fn profile_update() {
        let server = ChirpServer::default();
        let ana = register(&server, "ana");
        register(&server, "bob");

        let put = |username: &str| {
            HttpRequest::new(Method::Put, "/users/profile")
                .with_bearer(&ana.token)
                .with_body(encode(&UpdateProfileRequest::new(username, "ana@example.com")).unwrap())
        };

        assert_eq!(server.handle(&put("bob")).status, 400);

        let response = server.handle(&put("  ana2 "));
        assert_eq!(response.status, 200);
        let user: User = decode(&response.body).unwrap();
        assert_eq!(user.username, "ana2");

        let get = HttpRequest::new(Method::Get, "/users/profile").with_bearer(&ana.token);
        let user: User = decode(&server.handle(&get).body).unwrap();
        assert_eq!(user.username, "ana2");
    }

    #[test]
    fn my_posts_only_lists_own() {
        let server = ChirpServer::default();
        let ana = register(&server, "ana");
        let bob = register(&server, "bob");
        for (auth, text) in [(&ana, "a1"), (&bob, "b1"), (&ana, "a2")] {
            let create =
                post_json("/posts", &CreatePostRequest::new(text)).with_bearer(&auth.token);
            server.handle(&create);
        }

        let mine =
            server.handle(&HttpRequest::new(Method::Get, "/posts/my-posts").with_bearer(&ana.token));
        let posts: Vec<Post> = decode(&mine.body).unwrap();

        let contents: Vec<_> = posts.iter().map(|p| p.content.as_str()).collect();
        assert_eq!(contents, vec!["a2", "a1"]);
    }

    #[test]
    fn injected_failures_are_counted() {
        let server = ChirpServer::default();
        let ana = register(&server, "ana");
        server.inject_failure(503, 2);

        let get = HttpRequest::new(Method::Get, "/posts").with_bearer(&ana.token);
        assert_eq!(server.handle(&get).status, 503);
        assert_eq!(server.handle(&get).status, 503);
        assert_eq!(server.handle(&get).status, 200);
    }

    #[test]
    fn unknown_route() {
        let server = ChirpServer::default();
        let response = server.handle(&HttpRequest::new(Method::Get, "/nope"));
        assert_eq!(response.status, 404);
    }

    #[test]
    fn full_url_is_routed_by_path() {
        let server = ChirpServer::default();
        let request = RegisterRequest::new("ana", "ana@example.com", "pw");
        let response = server.handle(&post_json("http://localhost:3000/auth/register", &request));
        assert_eq!(response.status, 201);
    }
}
