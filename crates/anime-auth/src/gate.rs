//! Per-request authentication and authorization
//!
//! The gate walks each request through a fixed sequence: resolve the
//! required access, extract basic credentials, look the user up, verify
//! the password, then check roles. Every step either advances or ends in a
//! terminal rejection; there are no retries.

use anime_db::User;
use axum::http::{Method, StatusCode, Uri};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::credentials::parse_basic_authorization;
use crate::error::{AuthError, DEFAULT_REALM};
use crate::middleware::AuthUser;
use crate::password::PasswordService;
use crate::policy::{Access, AccessPolicy, has_dot_segment};
use crate::store::CredentialStore;

/// Secret hashed at startup to stand in for unknown users
const DUMMY_PASSWORD: &str = "anime-service-unknown-user";

/// Outcome of running one request through the gate
#[derive(Debug)]
pub struct AuthDecision {
    pub authenticated: bool,
    pub identity: Option<AuthUser>,
    pub authorized: bool,
    pub required: Access,
    pub rejection: Option<AuthError>,
}

impl AuthDecision {
    fn allowed(required: Access, identity: Option<AuthUser>) -> Self {
        Self {
            authenticated: identity.is_some(),
            identity,
            authorized: true,
            required,
            rejection: None,
        }
    }

    fn unauthenticated(required: Access, error: AuthError) -> Self {
        Self {
            authenticated: false,
            identity: None,
            authorized: false,
            required,
            rejection: Some(error),
        }
    }

    fn forbidden(required: Access, identity: AuthUser, error: AuthError) -> Self {
        Self {
            authenticated: true,
            identity: Some(identity),
            authorized: false,
            required,
            rejection: Some(error),
        }
    }

    pub fn is_allowed(&self) -> bool {
        self.authorized && self.rejection.is_none()
    }

    /// Status the request ends with if it is not forwarded
    pub fn status(&self) -> StatusCode {
        match &self.rejection {
            Some(err) => err.status(),
            None => StatusCode::OK,
        }
    }

    /// Split into the identity to forward or the error to answer with
    pub fn into_result(self) -> Result<Option<AuthUser>, AuthError> {
        match self.rejection {
            Some(err) => Err(err),
            None => Ok(self.identity),
        }
    }
}

/// Authentication gate, built once at startup and shared by all requests
#[derive(Clone)]
pub struct AuthGate {
    store: Arc<dyn CredentialStore>,
    hasher: PasswordService,
    policy: Arc<AccessPolicy>,
    realm: Arc<str>,
    /// Verified in place of a real hash when the user does not exist, with
    /// the same parameters as stored hashes so both failure paths cost the same
    dummy_hash: Arc<str>,
}

impl AuthGate {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        hasher: PasswordService,
        policy: Arc<AccessPolicy>,
    ) -> Result<Self, AuthError> {
        let dummy_hash: Arc<str> = Arc::from(hasher.hash(DUMMY_PASSWORD)?);
        Ok(Self {
            store,
            hasher,
            policy,
            realm: Arc::from(DEFAULT_REALM),
            dummy_hash,
        })
    }

    /// Set the realm advertised in `WWW-Authenticate`
    pub fn with_realm(mut self, realm: &str) -> Self {
        self.realm = Arc::from(realm);
        self
    }

    pub fn realm(&self) -> &str {
        &self.realm
    }

    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    pub fn hasher(&self) -> &PasswordService {
        &self.hasher
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    /// Decide whether a request may proceed
    pub async fn handle(
        &self,
        method: &Method,
        uri: &Uri,
        authorization: Option<&str>,
    ) -> AuthDecision {
        let path = uri.path();
        let required = self.policy.required_role(method, path);

        // The router does not resolve dot segments, so neither does the policy
        let decision = if has_dot_segment(path) {
            AuthDecision::unauthenticated(required, AuthError::InvalidPath(path.to_string()))
        } else {
            self.evaluate(required, authorization).await
        };
        Self::record(method, path, &decision);
        decision
    }

    async fn evaluate(&self, required: Access, authorization: Option<&str>) -> AuthDecision {
        // Open routes skip credential checks entirely
        if required == Access::Any {
            return AuthDecision::allowed(required, None);
        }

        let Some(header) = authorization else {
            return AuthDecision::unauthenticated(required, AuthError::MissingCredentials);
        };

        let credentials = match parse_basic_authorization(header) {
            Ok(credentials) => credentials,
            Err(err) => return AuthDecision::unauthenticated(required, err),
        };

        let user = match self.store.find_by_username(&credentials.username).await {
            Ok(user) => user,
            Err(err) => return AuthDecision::unauthenticated(required, err),
        };

        let hash = user
            .as_ref()
            .map_or_else(|| self.dummy_hash.to_string(), |u| u.password_hash.clone());
        let password_valid = match self.verify_blocking(credentials.password, hash).await {
            Ok(valid) => valid,
            Err(err) => return AuthDecision::unauthenticated(required, err),
        };

        let user = match (user, password_valid) {
            (Some(user), true) => user,
            (None, _) => {
                return AuthDecision::unauthenticated(
                    required,
                    AuthError::UnknownUser(credentials.username),
                );
            }
            (Some(user), false) => {
                return AuthDecision::unauthenticated(
                    required,
                    AuthError::BadPassword(user.username),
                );
            }
        };

        let identity = AuthUser::from(&user);

        match &required {
            Access::Any | Access::Authenticated => AuthDecision::allowed(required, Some(identity)),
            Access::Role(role) if identity.has_role(role) => {
                AuthDecision::allowed(required, Some(identity))
            }
            Access::Role(role) => {
                let error = AuthError::InsufficientRole {
                    username: identity.username.clone(),
                    required: role.clone(),
                };
                AuthDecision::forbidden(required, identity, error)
            }
            Access::Deny => {
                let error = AuthError::AccessDenied(identity.username.clone());
                AuthDecision::forbidden(required, identity, error)
            }
        }
    }

    /// Run Argon2 off the async workers
    async fn verify_blocking(&self, password: String, hash: String) -> Result<bool, AuthError> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .map_err(|e| AuthError::PasswordHash(format!("verification task failed: {}", e)))
    }

    fn record(method: &Method, path: &str, decision: &AuthDecision) {
        let outcome = match &decision.rejection {
            None => "allowed",
            Some(err) => err.outcome(),
        };
        metrics::counter!("anime_auth_decisions_total", "outcome" => outcome).increment(1);

        match &decision.rejection {
            None => debug!(
                "Allowed {} {} (requires {}) for {}",
                method,
                path,
                decision.required,
                decision
                    .identity
                    .as_ref()
                    .map_or("anonymous", |u| u.username.as_str())
            ),
            Some(err @ (AuthError::UnknownUser(_) | AuthError::BadPassword(_))) => {
                info!("Authentication failed for {} {}: {}", method, path, err)
            }
            Some(err) if err.status().is_server_error() => {
                warn!("Authentication error for {} {}: {}", method, path, err)
            }
            Some(err) => debug!("Rejected {} {}: {}", method, path, err),
        }
    }
}

impl From<&User> for AuthUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            name: user.name.clone(),
            roles: user.roles.clone(),
        }
    }
}
