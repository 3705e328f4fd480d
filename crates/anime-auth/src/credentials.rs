//! HTTP Basic credential extraction

use base64::{Engine, engine::general_purpose::STANDARD};
use std::fmt;

use crate::error::AuthError;

/// Username and password taken from a `Basic` authorization header
#[derive(Clone, PartialEq, Eq)]
pub struct BasicCredentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for BasicCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl BasicCredentials {
    /// Encode as an `Authorization` header value
    pub fn to_header_value(&self) -> String {
        format!(
            "Basic {}",
            STANDARD.encode(format!("{}:{}", self.username, self.password))
        )
    }
}

/// Parse an `Authorization: Basic <base64(user:pass)>` header value
///
/// The scheme is matched case-insensitively. The password is everything
/// after the first `:` and may itself contain colons.
pub fn parse_basic_authorization(header: &str) -> Result<BasicCredentials, AuthError> {
    let header = header.trim();
    let (scheme, encoded) = header
        .split_once(' ')
        .ok_or_else(|| AuthError::MalformedCredentials("missing scheme".to_string()))?;

    if !scheme.eq_ignore_ascii_case("basic") {
        return Err(AuthError::MalformedCredentials(format!(
            "unsupported scheme '{}'",
            scheme
        )));
    }

    let decoded = STANDARD
        .decode(encoded.trim())
        .map_err(|e| AuthError::MalformedCredentials(format!("invalid base64: {}", e)))?;

    let decoded = String::from_utf8(decoded)
        .map_err(|_| AuthError::MalformedCredentials("credentials are not UTF-8".to_string()))?;

    let (username, password) = decoded
        .split_once(':')
        .ok_or_else(|| AuthError::MalformedCredentials("missing ':' separator".to_string()))?;

    if username.is_empty() {
        return Err(AuthError::MalformedCredentials("empty username".to_string()));
    }

    Ok(BasicCredentials {
        username: username.to_string(),
        password: password.to_string(),
    })
}
