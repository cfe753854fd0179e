//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The configuration
//! file path defaults to `config.yaml` but can be specified via `-f` flag or `BOOKSTORAGE_CONFIG`
//! environment variable. A missing file is not an error: every field has a default.
//!
//! ## Loading Priority
//!
//! Configuration sources are merged in the following order (later sources override earlier ones):
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **Environment variables** - Variables prefixed with `BOOKSTORAGE_` override YAML values
//! 3. **DATABASE_URL** - Special case: overrides `database.url` if set
//!
//! For nested config values, use double underscores in environment variables. For example,
//! `BOOKSTORAGE_AUTH__SESSION__TIMEOUT=30m` sets the `auth.session.timeout` field.
//!
//! ## Environment Variable Examples
//!
//! ```bash
//! BOOKSTORAGE_HOST=0.0.0.0
//! BOOKSTORAGE_PORT=8080
//! DATABASE_URL="sqlite://library.db?mode=rwc"
//! BOOKSTORAGE_SUPERADMIN_USERNAME=librarian
//! BOOKSTORAGE_SUPERADMIN_PASSWORD='pbkdf2:sha256:600000$...'
//! ```

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::Error;

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "BOOKSTORAGE_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Override for `database.url`, read from the plain `DATABASE_URL` variable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
    pub database: DatabaseConfig,
    /// Username of the super administrator created on first startup
    pub superadmin_username: String,
    /// Password for that account. Stored verbatim, so it may be a pre-computed `pbkdf2:` hash.
    pub superadmin_password: Option<String>,
    pub auth: AuthConfig,
    /// Enable OpenTelemetry OTLP export for distributed tracing
    pub enable_otel_export: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    /// SQLite connection string
    pub url: String,
    pub pool: PoolSettings,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://database.db?mode=rwc".to_string(),
            pool: PoolSettings::default(),
        }
    }
}

/// Connection pool settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolSettings {
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of idle connections to maintain
    pub min_connections: u32,
    /// Maximum time to wait for a connection (seconds)
    pub acquire_timeout_secs: u64,
    /// Time before idle connections are closed (seconds, 0 = never)
    pub idle_timeout_secs: u64,
    /// Maximum lifetime of a connection (seconds, 0 = never)
    pub max_lifetime_secs: u64,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 5,
            min_connections: 0,
            acquire_timeout_secs: 30,
            idle_timeout_secs: 600,  // 10 minutes
            max_lifetime_secs: 1800, // 30 minutes
        }
    }
}

/// Authentication and access-control settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    pub session: SessionConfig,
    /// Where page requests without a session are redirected
    pub login_path: String,
    /// Requests under this prefix get JSON errors instead of pages and redirects
    pub api_prefix: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            login_path: "/login".to_string(),
            api_prefix: "/api/".to_string(),
        }
    }
}

/// Session cookie configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Cookie lifetime, renewed on every authenticated request
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Cookie name for the session token
    pub cookie_name: String,
    /// Set Secure flag on cookies (HTTPS only)
    pub cookie_secure: bool,
    /// SameSite cookie attribute ("strict", "lax", or "none")
    pub cookie_same_site: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60 * 60),
            cookie_name: "user_id".to_string(),
            cookie_secure: false,
            cookie_same_site: "lax".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            database_url: None,
            database: DatabaseConfig::default(),
            superadmin_username: "superadmin".to_string(),
            superadmin_password: None,
            auth: AuthConfig::default(),
            enable_otel_export: false,
        }
    }
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let mut config: Self = Self::figment(args).extract()?;

        // if database_url is set, use it (preserving pool settings)
        if let Some(url) = config.database_url.take() {
            config.database.url = url;
        }

        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> Result<(), Error> {
        let session = &self.auth.session;
        if session.cookie_name.is_empty() || session.cookie_name.contains([';', '=', ' ']) {
            return Err(Error::Internal {
                operation: format!(
                    "Config validation: auth.session.cookie_name {:?} is not a valid cookie name",
                    session.cookie_name
                ),
            });
        }

        if session.timeout.as_secs() == 0 {
            return Err(Error::Internal {
                operation: "Config validation: auth.session.timeout must be at least one second".to_string(),
            });
        }

        if !matches!(session.cookie_same_site.to_ascii_lowercase().as_str(), "strict" | "lax" | "none") {
            return Err(Error::Internal {
                operation: format!(
                    "Config validation: auth.session.cookie_same_site must be strict, lax or none, got {:?}",
                    session.cookie_same_site
                ),
            });
        }

        for (field, value) in [("auth.login_path", &self.auth.login_path), ("auth.api_prefix", &self.auth.api_prefix)] {
            if !value.starts_with('/') {
                return Err(Error::Internal {
                    operation: format!("Config validation: {field} must start with '/', got {value:?}"),
                });
            }
        }

        if self.superadmin_username.trim().is_empty() {
            return Err(Error::Internal {
                operation: "Config validation: superadmin_username cannot be empty".to_string(),
            });
        }

        let pool = &self.database.pool;
        if pool.max_connections == 0 || pool.min_connections > pool.max_connections {
            return Err(Error::Internal {
                operation: format!(
                    "Config validation: Invalid pool configuration: min_connections ({}) must not exceed max_connections ({}), which must be positive",
                    pool.min_connections, pool.max_connections
                ),
            });
        }

        Ok(())
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            // Load base config file
            .merge(Yaml::file(&args.config))
            // Environment variables can still override specific values
            // (BOOKSTORAGE_CONFIG names the file itself and is read by clap)
            .merge(Env::prefixed("BOOKSTORAGE_").ignore(&["CONFIG"]).split("__"))
            .merge(Env::raw().only(&["DATABASE_URL"]))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
