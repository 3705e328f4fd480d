//! Anime Service Authentication and Authorization
//!
//! This crate provides HTTP Basic authentication backed by Argon2
//! password hashes, an ordered route policy, and the axum middleware
//! that enforces both before any handler runs.

pub mod credentials;
pub mod error;
pub mod gate;
pub mod middleware;
pub mod password;
pub mod policy;
pub mod store;

pub use credentials::{BasicCredentials, parse_basic_authorization};
pub use error::AuthError;
pub use gate::{AuthDecision, AuthGate};
pub use middleware::{AuthUser, RequireAdmin, RequireAuth, auth_middleware, require_role};
pub use password::{HashingParams, PasswordService};
pub use policy::{Access, AccessPolicy, RoutePolicy};
pub use store::{CredentialStore, InMemoryCredentialStore};
