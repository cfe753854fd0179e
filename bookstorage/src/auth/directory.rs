//! The user lookups the auth layer depends on.
//!
//! Guards and the login flow only ever need two point reads, so they talk to a
//! [`UserDirectory`] rather than to a pool. [`SqliteUserDirectory`] is the production
//! implementation; tests substitute an in-memory one.

use sqlx::SqlitePool;
use tracing::instrument;

use crate::{
    db::{
        errors::Result,
        handlers::Users,
        models::users::{UserCredential, UserFlags},
    },
    types::UserId,
};

#[async_trait::async_trait]
pub trait UserDirectory: Send + Sync {
    /// Privilege flags by primary key. `Ok(None)` when the account does not exist.
    async fn lookup_flags(&self, user_id: UserId) -> Result<Option<UserFlags>>;

    /// Stored credential by username. `Ok(None)` when no such account exists.
    async fn lookup_credential(&self, username: &str) -> Result<Option<UserCredential>>;
}

#[derive(Debug, Clone)]
pub struct SqliteUserDirectory {
    pool: SqlitePool,
}

impl SqliteUserDirectory {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl UserDirectory for SqliteUserDirectory {
    #[instrument(skip(self), err)]
    async fn lookup_flags(&self, user_id: UserId) -> Result<Option<UserFlags>> {
        let mut conn = self.pool.acquire().await?;
        Users::new(&mut conn).get_flags(user_id).await
    }

    #[instrument(skip(self), err)]
    async fn lookup_credential(&self, username: &str) -> Result<Option<UserCredential>> {
        let mut conn = self.pool.acquire().await?;
        Users::new(&mut conn).get_credential_by_username(username).await
    }
}
