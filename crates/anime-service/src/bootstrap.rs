//! Startup user provisioning

use anime_auth::{CredentialStore, PasswordService};
use anime_db::{NewUser, ROLE_ADMIN, ROLE_USER, Roles};
use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::config::UserConfig;

const DEFAULT_ADMIN_USERNAME: &str = "admin";
const DEFAULT_ADMIN_PASSWORD: &str = "admin";

/// Upsert the configured users, or seed a default admin into an empty store
///
/// Returns the number of users written.
pub async fn bootstrap_users(
    store: &dyn CredentialStore,
    hasher: &PasswordService,
    users: &[UserConfig],
    store_is_empty: bool,
) -> Result<usize> {
    if users.is_empty() {
        if !store_is_empty {
            return Ok(0);
        }

        warn!(
            "No users configured; creating default admin user (username: {}, password: {}). Change it before exposing the service",
            DEFAULT_ADMIN_USERNAME, DEFAULT_ADMIN_PASSWORD
        );

        let roles = Roles::from_labels([ROLE_ADMIN, ROLE_USER])?;
        store
            .save(NewUser {
                username: DEFAULT_ADMIN_USERNAME.to_string(),
                name: "Administrator".to_string(),
                password_hash: hasher.hash(DEFAULT_ADMIN_PASSWORD)?,
                roles,
            })
            .await?;
        return Ok(1);
    }

    for user in users {
        let new_user = user.to_new_user(hasher)?;
        let saved = store
            .save(new_user)
            .await
            .with_context(|| format!("Failed to save user {}", user.username))?;
        info!("Provisioned user {} ({})", saved.username, saved.roles);
    }

    Ok(users.len())
}
