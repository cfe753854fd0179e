//! Test utilities for integration testing (available with `test-utils` feature).

use std::collections::HashMap;
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};
use std::time::Duration;

use anyhow::anyhow;
use axum_test::TestServer;
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};

use crate::{
    AppState,
    auth::directory::UserDirectory,
    config::{Config, DatabaseConfig, PoolSettings},
    db::{
        errors::{DbError, Result},
        models::users::{UserCredential, UserFlags},
    },
    templates::Templates,
    types::UserId,
};

/// In-memory [`UserDirectory`] keyed by user id.
///
/// Counts flag lookups so tests can assert that a guard never reached the directory, and can be
/// switched to fail every lookup to simulate a broken database. Clones share the counter.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    users: HashMap<UserId, UserCredential>,
    failing: bool,
    flag_lookups: Arc<AtomicUsize>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(self, id: UserId, username: &str, password: &str, validated: bool, is_admin: bool) -> Self {
        self.with_credential(UserCredential {
            id,
            username: username.to_string(),
            password_hash: password.to_string(),
            validated,
            is_admin,
            is_superadmin: false,
        })
    }

    pub fn with_superadmin(self, id: UserId, username: &str, password: &str) -> Self {
        self.with_credential(UserCredential {
            id,
            username: username.to_string(),
            password_hash: password.to_string(),
            validated: true,
            is_admin: true,
            is_superadmin: true,
        })
    }

    pub fn with_credential(mut self, credential: UserCredential) -> Self {
        self.users.insert(credential.id, credential);
        self
    }

    /// Every lookup returns a database error from now on
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    pub fn flag_lookups(&self) -> usize {
        self.flag_lookups.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<()> {
        if self.failing {
            return Err(DbError::Other(anyhow!("directory unavailable")));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl UserDirectory for StaticDirectory {
    async fn lookup_flags(&self, user_id: UserId) -> Result<Option<UserFlags>> {
        self.flag_lookups.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        Ok(self.users.get(&user_id).map(UserCredential::flags))
    }

    async fn lookup_credential(&self, username: &str) -> Result<Option<UserCredential>> {
        self.check_available()?;
        Ok(self.users.values().find(|user| user.username == username).cloned())
    }
}

pub fn create_test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        database: DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            // One connection that is never recycled, or the in-memory database goes with it
            pool: PoolSettings {
                max_connections: 1,
                min_connections: 1,
                idle_timeout_secs: 0,
                max_lifetime_secs: 0,
                ..Default::default()
            },
        },
        superadmin_username: "superadmin".to_string(),
        superadmin_password: Some("test-superadmin-password".to_string()),
        ..Default::default()
    }
}

/// A migrated in-memory database.
///
/// In-memory SQLite databases live as long as their connection, so the pool holds exactly one
/// connection and never recycles it.
pub async fn create_test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .acquire_timeout(Duration::from_secs(5))
        .connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory database");

    crate::migrator().run(&pool).await.expect("Failed to run migrations");
    pool
}

pub fn create_test_state(directory: impl UserDirectory + 'static) -> AppState {
    let config = create_test_config();
    let templates = Templates::load()
        .expect("Failed to load templates")
        .with_login_path(&config.auth.login_path);
    AppState::builder().config(config).directory(Arc::new(directory)).templates(templates).build()
}

/// The full router, backed by the given directory
pub fn create_test_server(directory: impl UserDirectory + 'static) -> TestServer {
    let router = crate::build_router(create_test_state(directory));
    TestServer::new(router).expect("Failed to create test server")
}
