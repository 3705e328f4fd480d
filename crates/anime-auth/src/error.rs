//! Authentication error types

use axum::http::{HeaderValue, StatusCode, header::WWW_AUTHENTICATE};
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

/// Realm advertised in `WWW-Authenticate` when none is configured
pub const DEFAULT_REALM: &str = "anime-service";

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Missing authorization header")]
    MissingCredentials,

    #[error("Malformed basic credentials: {0}")]
    MalformedCredentials(String),

    #[error("Unknown user: {0}")]
    UnknownUser(String),

    #[error("Bad password for user: {0}")]
    BadPassword(String),

    #[error("User {username} lacks role {required}")]
    InsufficientRole { username: String, required: String },

    #[error("Access denied for user: {0}")]
    AccessDenied(String),

    #[error("Dot segment in request path: {0}")]
    InvalidPath(String),

    #[error("Access policy misconfigured: {0}")]
    PolicyMisconfiguration(String),

    #[error("Password hashing error: {0}")]
    PasswordHash(String),

    #[error("Credential store error: {0}")]
    Store(String),
}

impl From<anime_db::DbError> for AuthError {
    fn from(err: anime_db::DbError) -> Self {
        AuthError::Store(err.to_string())
    }
}

impl AuthError {
    /// HTTP status this error resolves to
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::MissingCredentials
            | AuthError::MalformedCredentials(_)
            | AuthError::UnknownUser(_)
            | AuthError::BadPassword(_) => StatusCode::UNAUTHORIZED,
            AuthError::InsufficientRole { .. } | AuthError::AccessDenied(_) => {
                StatusCode::FORBIDDEN
            }
            AuthError::InvalidPath(_) => StatusCode::BAD_REQUEST,
            AuthError::PolicyMisconfiguration(_)
            | AuthError::PasswordHash(_)
            | AuthError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message sent to the client
    ///
    /// Unknown users and wrong passwords share one message so responses
    /// cannot be used to enumerate accounts.
    pub fn public_message(&self) -> &'static str {
        match self {
            AuthError::MissingCredentials => "Missing authorization header",
            AuthError::MalformedCredentials(_) => "Invalid authorization header format",
            AuthError::UnknownUser(_) | AuthError::BadPassword(_) => "Invalid credentials",
            AuthError::InsufficientRole { .. } | AuthError::AccessDenied(_) => {
                "Insufficient permissions"
            }
            AuthError::InvalidPath(_) => "Invalid request path",
            AuthError::PolicyMisconfiguration(_)
            | AuthError::PasswordHash(_)
            | AuthError::Store(_) => "Internal error",
        }
    }

    /// Short label used for metrics
    pub fn outcome(&self) -> &'static str {
        match self {
            AuthError::MissingCredentials => "missing_credentials",
            AuthError::MalformedCredentials(_) => "malformed_credentials",
            AuthError::UnknownUser(_) => "unknown_user",
            AuthError::BadPassword(_) => "bad_password",
            AuthError::InsufficientRole { .. } => "insufficient_role",
            AuthError::AccessDenied(_) => "access_denied",
            AuthError::InvalidPath(_) => "invalid_path",
            AuthError::PolicyMisconfiguration(_) => "policy_misconfiguration",
            AuthError::PasswordHash(_) => "hash_error",
            AuthError::Store(_) => "store_error",
        }
    }

    /// Build the response, challenging with `realm` on 401
    pub fn into_response_with_realm(self, realm: &str) -> Response {
        let status = self.status();
        let body = axum::Json(json!({
            "error": self.public_message()
        }));

        let mut response = (status, body).into_response();

        if status == StatusCode::UNAUTHORIZED {
            let challenge = format!("Basic realm=\"{}\", charset=\"UTF-8\"", realm);
            if let Ok(value) = HeaderValue::from_str(&challenge) {
                response.headers_mut().insert(WWW_AUTHENTICATE, value);
            }
        }

        response
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        self.into_response_with_realm(DEFAULT_REALM)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_user_and_bad_password_look_identical() {
        let unknown = AuthError::UnknownUser("ghost".to_string());
        let bad = AuthError::BadPassword("devdojo".to_string());

        assert_eq!(unknown.status(), bad.status());
        assert_eq!(unknown.public_message(), bad.public_message());
        assert_ne!(unknown.outcome(), bad.outcome());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(AuthError::MissingCredentials.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AuthError::MalformedCredentials("x".into()).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::InsufficientRole {
                username: "devdojo".into(),
                required: "ADMIN".into()
            }
            .status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(AuthError::InvalidPath("/a/..".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(AuthError::Store("down".into()).status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_challenge_header_only_on_unauthorized() {
        let response = AuthError::MissingCredentials.into_response_with_realm("animes");
        assert_eq!(
            response.headers().get(WWW_AUTHENTICATE).unwrap(),
            "Basic realm=\"animes\", charset=\"UTF-8\""
        );

        let response = AuthError::AccessDenied("devdojo".into()).into_response();
        assert!(response.headers().get(WWW_AUTHENTICATE).is_none());
    }
}
