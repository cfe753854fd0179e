//! Database models for users.

use crate::types::UserId;
use serde::Serialize;
use sqlx::FromRow;

/// Database request for creating a new user
#[derive(Debug, Clone)]
pub struct UserCreateDBRequest {
    pub username: String,
    /// Stored verbatim; may be plaintext or a pre-computed `pbkdf2:` hash
    pub password: String,
    pub validated: bool,
    pub is_admin: bool,
    pub is_superadmin: bool,
}

/// Privilege flags for one account, as read by the admin guard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, FromRow)]
pub struct UserFlags {
    pub is_admin: bool,
    pub is_superadmin: bool,
}

/// Everything the login flow needs to decide on a credential
#[derive(Debug, Clone, FromRow)]
pub struct UserCredential {
    pub id: UserId,
    pub username: String,
    #[sqlx(rename = "password")]
    pub password_hash: String,
    pub validated: bool,
    pub is_admin: bool,
    pub is_superadmin: bool,
}

impl UserCredential {
    /// Accounts wait for an administrator's approval unless they are admins themselves
    pub fn awaiting_approval(&self) -> bool {
        !self.validated && !self.is_admin
    }

    pub fn flags(&self) -> UserFlags {
        UserFlags {
            is_admin: self.is_admin,
            is_superadmin: self.is_superadmin,
        }
    }
}
