//! Resolving the caller of a request.
//!
//! Identity is derived fresh from the session cookie on every request and never cached. Two
//! levels exist:
//!
//! - [`session_user_id`]: the id claimed by the cookie. No I/O; this is all "logged in" means.
//! - [`resolve_identity`]: the id plus privilege flags from the [`UserDirectory`]. A missing
//!   account or a failed lookup degrades to no privileges rather than to "logged out", so a
//!   user deleted after login keeps their session but loses admin rights immediately.
//!
//! The guards in [`crate::auth::middleware`] store the result in request extensions, where the
//! [`SessionUser`] and [`Identity`] extractors pick it up.

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, request::Parts},
};
use serde::Serialize;
use tracing::{trace, warn};

use crate::{
    auth::{directory::UserDirectory, session},
    config::SessionConfig,
    db::models::users::UserFlags,
    errors::Error,
    types::UserId,
};

/// An authenticated caller and their privilege flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub user_id: UserId,
    pub is_admin: bool,
    pub is_superadmin: bool,
}

impl Identity {
    fn new(user_id: UserId, flags: UserFlags) -> Self {
        Self {
            user_id,
            is_admin: flags.is_admin,
            is_superadmin: flags.is_superadmin,
        }
    }
}

/// The id of a caller holding a session, as established by the authenticated guard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionUser(pub UserId);

/// User id claimed by the session cookie, if any
pub fn session_user_id(headers: &HeaderMap, config: &SessionConfig) -> Option<UserId> {
    session::cookie_value(headers, &config.cookie_name).and_then(session::decode_session)
}

/// Resolve the caller and their privileges. `None` only when there is no usable session cookie.
pub async fn resolve_identity(headers: &HeaderMap, config: &SessionConfig, directory: &dyn UserDirectory) -> Option<Identity> {
    let user_id = session_user_id(headers, config)?;

    let flags = match directory.lookup_flags(user_id).await {
        Ok(Some(flags)) => flags,
        Ok(None) => {
            warn!(user_id, "Session refers to a missing account; treating it as unprivileged");
            UserFlags::default()
        }
        Err(e) => {
            warn!(user_id, error = %e, "Privilege lookup failed; treating session as unprivileged");
            UserFlags::default()
        }
    };

    trace!(user_id, is_admin = flags.is_admin, "Resolved identity");
    Some(Identity::new(user_id, flags))
}

impl<S> FromRequestParts<S> for SessionUser
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<SessionUser>() {
            return Ok(*user);
        }
        // Routes behind the admin guard only carry the full identity
        parts
            .extensions
            .get::<Identity>()
            .map(|identity| SessionUser(identity.user_id))
            .ok_or(Error::Unauthenticated { message: None })
    }
}

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .copied()
            .ok_or(Error::Unauthenticated { message: None })
    }
}
