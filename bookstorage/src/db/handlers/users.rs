//! Database repository for users.

use crate::db::{
    errors::Result,
    models::users::{UserCreateDBRequest, UserCredential, UserFlags},
};
use crate::types::UserId;
use sqlx::SqliteConnection;
use tracing::instrument;

pub struct Users<'c> {
    db: &'c mut SqliteConnection,
}

impl<'c> Users<'c> {
    pub fn new(db: &'c mut SqliteConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(username = %request.username), err)]
    pub async fn create(&mut self, request: &UserCreateDBRequest) -> Result<UserId> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO users (username, password, validated, is_admin, is_superadmin) VALUES (?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(&request.username)
        .bind(&request.password)
        .bind(request.validated)
        .bind(request.is_admin)
        .bind(request.is_superadmin)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(id)
    }

    /// Privilege flags by primary key. `None` when the account no longer exists.
    #[instrument(skip(self), err)]
    pub async fn get_flags(&mut self, id: UserId) -> Result<Option<UserFlags>> {
        let flags = sqlx::query_as::<_, UserFlags>("SELECT is_admin, is_superadmin FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(flags)
    }

    #[instrument(skip(self, username), err)]
    pub async fn get_credential_by_username(&mut self, username: &str) -> Result<Option<UserCredential>> {
        let credential = sqlx::query_as::<_, UserCredential>(
            "SELECT id, username, password, validated, is_admin, is_superadmin FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(credential)
    }

    #[instrument(skip(self), err)]
    pub async fn superadmin_exists(&mut self) -> Result<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE is_superadmin = 1")
            .fetch_one(&mut *self.db)
            .await?;

        Ok(count > 0)
    }
}
