//! Transport-neutral HTTP request and response records.
//!
//! These carry exactly what the client and the reference service exchange:
//! a method, a URL or path, an optional bearer token and a JSON body. They
//! let the client talk to an in-process service without a network stack.

use std::collections::BTreeMap;

/// HTTP method subset used by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// `GET`
    Get,
    /// `HEAD`
    Head,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `DELETE`
    Delete,
}

impl Method {
    /// Returns the method name as sent on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

/// An outgoing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Method.
    pub method: Method,
    /// Absolute URL, or a path when routed in-process.
    pub url: String,
    /// Bearer token for the `Authorization` header.
    pub bearer: Option<String>,
    /// JSON body.
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    /// Creates a request without token or body.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            bearer: None,
            body: None,
        }
    }

    /// Attaches a bearer token.
    pub fn with_bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer = Some(token.into());
        self
    }

    /// Attaches a JSON body.
    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }

    /// Returns the path component of the URL (everything after the host),
    /// without query string.
    ///
    /// `https://api.example.com/posts/7?x=1` gives `/posts/7`; a URL that
    /// is already a path is returned unchanged.
    pub fn path(&self) -> &str {
        let rest = match self.url.find("://") {
            Some(i) => {
                let after_scheme = &self.url[i + 3..];
                match after_scheme.find('/') {
                    Some(j) => &after_scheme[j..],
                    None => "/",
                }
            }
            None => self.url.as_str(),
        };
        rest.split('?').next().unwrap_or(rest)
    }
}

/// An incoming response.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Headers, with lower-case names.
    pub headers: BTreeMap<String, String>,
    /// Body bytes (empty for `HEAD`).
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Creates a response with the given status and body.
    pub fn new(status: u16, body: Vec<u8>) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body,
        }
    }

    /// Adds a header; the name is lower-cased.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Returns a header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A service that answers requests in-process.
///
/// The reference service implements this so a client can be wired to it
/// directly, with requests and responses still going through the JSON
/// encoding used on the network.
pub trait LoopbackServer: Send + Sync {
    /// Handles one request. `request.url` holds only the path.
    fn handle(&self, request: &HttpRequest) -> HttpResponse;
}

impl<S: LoopbackServer + ?Sized> LoopbackServer for std::sync::Arc<S> {
    fn handle(&self, request: &HttpRequest) -> HttpResponse {
        (**self).handle(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_extraction() {
        let req = HttpRequest::new(Method::Get, "https://api.example.com/posts/7?x=1");
        assert_eq!(req.path(), "/posts/7");

        let req = HttpRequest::new(Method::Get, "loopback://chirp");
        assert_eq!(req.path(), "/");

        let req = HttpRequest::new(Method::Delete, "/posts/abc");
        assert_eq!(req.path(), "/posts/abc");
    }

    #[test]
    fn headers_are_case_insensitive() {
        let resp = HttpResponse::new(200, Vec::new()).with_header("ETag", "\"v1\"");
        assert_eq!(resp.header("etag"), Some("\"v1\""));
        assert_eq!(resp.header("ETAG"), Some("\"v1\""));
        assert_eq!(resp.header("content-length"), None);
    }

    #[test]
    fn success_range() {
        assert!(HttpResponse::new(204, Vec::new()).is_success());
        assert!(!HttpResponse::new(401, Vec::new()).is_success());
        assert!(!HttpResponse::new(199, Vec::new()).is_success());
    }

    #[test]
    fn builder() {
        let req = HttpRequest::new(Method::Post, "/posts")
            .with_bearer("t")
            .with_body(b"{}".to_vec());
        assert_eq!(req.bearer.as_deref(), Some("t"));
        assert_eq!(req.body.as_deref(), Some(&b"{}"[..]));
        assert_eq!(req.method.as_str(), "POST");
    }
}
