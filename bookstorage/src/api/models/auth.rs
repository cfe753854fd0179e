//! Login form and session endpoint models.

use axum::{
    http::{HeaderValue, header},
    response::{IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Serialize};

use crate::{errors::Error, types::UserId};

/// Body of `POST /login`
#[derive(Debug, Clone, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

/// Banner flags on `GET /login`, set by the redirects that lead back to the form
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoginQuery {
    pub error: Option<String>,
    pub pending: Option<String>,
    pub registered: Option<String>,
    pub expired: Option<String>,
}

impl LoginQuery {
    fn flag(value: &Option<String>) -> bool {
        value.as_deref().is_some_and(|v| !v.is_empty() && v != "0")
    }

    pub fn error(&self) -> bool {
        Self::flag(&self.error)
    }

    pub fn pending(&self) -> bool {
        Self::flag(&self.pending)
    }

    pub fn registered(&self) -> bool {
        Self::flag(&self.registered)
    }

    pub fn expired(&self) -> bool {
        Self::flag(&self.expired)
    }
}

/// A redirect that also sets or clears the session cookie
#[derive(Debug)]
pub struct SessionRedirect {
    pub location: String,
    pub cookie: String,
}

impl IntoResponse for SessionRedirect {
    fn into_response(self) -> Response {
        let cookie = match HeaderValue::from_str(&self.cookie) {
            Ok(cookie) => cookie,
            Err(e) => {
                return Error::Internal {
                    operation: format!("build session cookie header: {e}"),
                }
                .into_response();
            }
        };
        let mut response = Redirect::to(&self.location).into_response();
        response.headers_mut().append(header::SET_COOKIE, cookie);
        response
    }
}

/// Response of `GET /api/session`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionResponse {
    pub user_id: UserId,
}

/// Response of `GET /api/admin/accounts/{id}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountFlagsResponse {
    pub user_id: UserId,
    pub is_admin: bool,
    pub is_superadmin: bool,
}
