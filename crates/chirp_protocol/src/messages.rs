//! Request and response bodies of the service endpoints.

use crate::types::User;
use serde::{Deserialize, Serialize};

/// Body of `POST /auth/login`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    /// Account email.
    pub email: String,
    /// Account password.
    pub password: String,
}

impl LoginRequest {
    /// Creates a login request.
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

/// Body of `POST /auth/register`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterRequest {
    /// Desired handle.
    pub username: String,
    /// Account email.
    pub email: String,
    /// Account password.
    pub password: String,
}

impl RegisterRequest {
    /// Creates a registration request.
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            password: password.into(),
        }
    }
}

/// Successful login or registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResponse {
    /// The authenticated user.
    pub user: User,
    /// Bearer token for subsequent calls.
    pub token: String,
}

/// Body of `POST /posts`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePostRequest {
    /// Post text.
    pub content: String,
}

impl CreatePostRequest {
    /// Creates a post creation request.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

/// Body of `PUT /users/profile`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateProfileRequest {
    /// New handle.
    pub username: String,
    /// New email.
    pub email: String,
}

impl UpdateProfileRequest {
    /// Creates a profile update; both fields are trimmed.
    pub fn new(username: &str, email: &str) -> Self {
        Self {
            username: username.trim().to_string(),
            email: email.trim().to_string(),
        }
    }
}

/// Error body returned with non-2xx responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human-readable reason.
    pub error: String,
}

impl ErrorBody {
    /// Creates an error body.
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode, encode};

    #[test]
    fn profile_update_is_trimmed() {
        let req = UpdateProfileRequest::new("  ana ", "\tana@example.com\n");
        assert_eq!(req.username, "ana");
        assert_eq!(req.email, "ana@example.com");
    }

    #[test]
    fn auth_response_decodes() {
        let body = br#"{
            "user": {"id":"u1","username":"ana","email":"a@x.io","createdAt":"2024-01-01T00:00:00Z"},
            "token": "t0k"
        }"#;
        let resp: AuthResponse = decode(body).unwrap();
        assert_eq!(resp.token, "t0k");
        assert_eq!(resp.user.username, "ana");
    }

    #[test]
    fn login_request_shape() {
        let bytes = encode(&LoginRequest::new("a@x.io", "pw")).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["email"], "a@x.io");
        assert_eq!(value["password"], "pw");
    }
}
