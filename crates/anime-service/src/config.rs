//! Configuration loading and management
//!
//! Values are layered, highest precedence first:
//! 1. Environment variables (`ANIME_SERVICE_*`, `__` separates sections)
//! 2. Configuration file (TOML)
//! 3. Default values

use anime_auth::{Access, AccessPolicy, HashingParams, PasswordService, RoutePolicy};
use anime_db::{NewUser, Roles};
use anyhow::{Context, Result, bail};
use axum::http::Method;
use config::{Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Prefix for environment overrides, e.g. `ANIME_SERVICE_SERVER__PORT`
const ENV_PREFIX: &str = "ANIME_SERVICE";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite file path, or `:memory:`
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

impl DatabaseConfig {
    pub fn is_in_memory(&self) -> bool {
        self.path == ":memory:"
    }
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Realm advertised in `WWW-Authenticate`
    #[serde(default = "default_realm")]
    pub realm: String,
    #[serde(default)]
    pub hashing: HashingConfig,
    /// Route policies in evaluation order; empty means the built-in policy
    #[serde(default)]
    pub policies: Vec<PolicyConfig>,
    /// Users upserted at startup
    #[serde(default)]
    pub users: Vec<UserConfig>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            realm: default_realm(),
            hashing: HashingConfig::default(),
            policies: Vec::new(),
            users: Vec::new(),
        }
    }
}

/// Argon2 cost parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashingConfig {
    #[serde(default = "default_memory_kib")]
    pub memory_kib: u32,
    #[serde(default = "default_iterations")]
    pub iterations: u32,
    #[serde(default = "default_parallelism")]
    pub parallelism: u32,
}

impl Default for HashingConfig {
    fn default() -> Self {
        Self {
            memory_kib: default_memory_kib(),
            iterations: default_iterations(),
            parallelism: default_parallelism(),
        }
    }
}

/// One `[[auth.policies]]` entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Path pattern (`*` one segment, `**` any number of segments)
    pub pattern: String,
    /// Restrict the entry to one HTTP method
    #[serde(default)]
    pub method: Option<String>,
    /// `ANY`, `AUTHENTICATED`, `DENY` or a role name
    pub access: String,
}

/// One `[[auth.users]]` entry
#[derive(Clone, Serialize, Deserialize)]
pub struct UserConfig {
    pub username: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Plaintext password, hashed at startup
    #[serde(default)]
    pub password: Option<String>,
    /// Pre-computed PHC hash, stored as is
    #[serde(default)]
    pub password_hash: Option<String>,
    pub roles: Vec<String>,
}

impl std::fmt::Debug for UserConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserConfig")
            .field("username", &self.username)
            .field("name", &self.name)
            .field("roles", &self.roles)
            .finish_non_exhaustive()
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
        }
    }
}

// Default value functions
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_db_path() -> String {
    "./data/anime-service.db".to_string()
}

fn default_realm() -> String {
    anime_auth::error::DEFAULT_REALM.to_string()
}

fn default_memory_kib() -> u32 {
    HashingParams::default().memory_kib
}

fn default_iterations() -> u32 {
    HashingParams::default().iterations
}

fn default_parallelism() -> u32 {
    HashingParams::default().parallelism
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_metrics_enabled() -> bool {
    true
}

/// Where the file layer of a loaded configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(String),
    /// The file was missing
    Defaults(String),
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::File(path) => write!(f, "configuration file {}", path),
            ConfigSource::Defaults(path) => write!(f, "defaults ({} not found)", path),
        }
    }
}

impl Config {
    /// Load configuration from a file, layered with environment overrides
    ///
    /// A missing file is not an error; defaults apply. Runs before logging
    /// is set up, so the source is returned for the caller to log.
    pub fn load(path: &str) -> Result<(Self, ConfigSource)> {
        let mut builder = config::Config::builder();

        let source = if Path::new(path).exists() {
            builder = builder.add_source(File::new(path, FileFormat::Toml));
            ConfigSource::File(path.to_string())
        } else {
            ConfigSource::Defaults(path.to_string())
        };

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let config: Config = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .with_context(|| format!("Failed to load configuration from {}", path))?;

        config.validate()?;
        Ok((config, source))
    }

    /// Parse configuration from a TOML string, without environment overrides
    #[cfg(test)]
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = config::Config::builder()
            .add_source(File::from_str(content, FileFormat::Toml))
            .build()
            .and_then(|c| c.try_deserialize())
            .context("Failed to parse configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Check everything that can be checked before startup
    pub fn validate(&self) -> Result<()> {
        self.access_policy()?;

        for user in &self.auth.users {
            user.validate()?;
        }

        if self.auth.realm.contains('"') {
            bail!("auth.realm must not contain double quotes");
        }

        Ok(())
    }

    /// Database URL for sqlx
    pub fn database_url(&self) -> String {
        if self.database.is_in_memory() {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite:{}", self.database.path)
        }
    }

    pub fn hashing_params(&self) -> HashingParams {
        HashingParams {
            memory_kib: self.auth.hashing.memory_kib,
            iterations: self.auth.hashing.iterations,
            parallelism: self.auth.hashing.parallelism,
        }
    }

    /// Build the route policy; no configured entries means the built-in one
    pub fn access_policy(&self) -> Result<AccessPolicy> {
        if self.auth.policies.is_empty() {
            return Ok(AccessPolicy::default());
        }

        let policies = self
            .auth
            .policies
            .iter()
            .map(PolicyConfig::to_route_policy)
            .collect::<Result<Vec<_>>>()?;

        let policy = AccessPolicy::new(policies);
        policy.validate().context("Invalid auth.policies")?;
        Ok(policy)
    }
}

impl PolicyConfig {
    fn to_route_policy(&self) -> Result<RoutePolicy> {
        if self.pattern.trim().is_empty() {
            bail!("auth.policies: pattern cannot be empty");
        }

        let access = Access::from_str(&self.access)
            .with_context(|| format!("auth.policies: invalid access for {}", self.pattern))?;
        let policy = RoutePolicy::new(self.pattern.trim(), access);

        match &self.method {
            Some(method) => {
                let method = Method::from_str(&method.trim().to_ascii_uppercase())
                    .with_context(|| format!("auth.policies: invalid method {}", method))?;
                Ok(policy.with_method(method))
            }
            None => Ok(policy),
        }
    }
}

impl UserConfig {
    fn validate(&self) -> Result<()> {
        if self.username.trim().is_empty() {
            bail!("auth.users: username cannot be empty");
        }
        if self.username.contains(':') {
            bail!("auth.users: username {} cannot contain ':'", self.username);
        }
        match (&self.password, &self.password_hash) {
            (Some(_), Some(_)) => bail!(
                "auth.users: {} sets both password and password_hash",
                self.username
            ),
            (None, None) => bail!(
                "auth.users: {} needs a password or password_hash",
                self.username
            ),
            _ => {}
        }

        let roles = self.roles()?;
        if roles.is_empty() {
            bail!("auth.users: {} needs at least one role", self.username);
        }
        Ok(())
    }

    fn roles(&self) -> Result<Roles> {
        Roles::from_labels(&self.roles)
            .with_context(|| format!("auth.users: invalid roles for {}", self.username))
    }

    /// Build the record to upsert, hashing a plaintext password
    pub fn to_new_user(&self, hasher: &PasswordService) -> Result<NewUser> {
        let password_hash = match (&self.password, &self.password_hash) {
            (_, Some(hash)) => hash.clone(),
            (Some(password), None) => hasher
                .hash(password)
                .with_context(|| format!("Failed to hash password for {}", self.username))?,
            (None, None) => bail!(
                "auth.users: {} needs a password or password_hash",
                self.username
            ),
        };

        let username = self.username.trim().to_string();
        Ok(NewUser {
            name: self.name.clone().unwrap_or_else(|| username.clone()),
            username,
            password_hash,
            roles: self.roles()?,
        })
    }
}
