use crate::db::errors::DbError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Authentication required but not provided
    #[error("Not authenticated")]
    Unauthenticated { message: Option<String> },

    /// Page request without a session; the browser is sent to the login form
    #[error("Login required, redirecting to {location}")]
    LoginRequired { location: String },

    /// Authenticated, but the account lacks the privilege the route needs
    #[error("Forbidden: {resource}")]
    Forbidden { resource: String },

    /// Unknown username or wrong password. Deliberately indistinguishable.
    #[error("Invalid username or password")]
    InvalidCredentials,

    /// Credentials are correct but an administrator has not approved the account yet
    #[error("Account awaiting approval")]
    PendingApproval,

    /// Requested resource not found
    #[error("{resource} with ID {id} not found")]
    NotFound { resource: String, id: String },

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// Database operation error
    #[error(transparent)]
    Database(#[from] DbError),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Unauthenticated { .. } | Error::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Error::LoginRequired { .. } => StatusCode::SEE_OTHER,
            Error::Forbidden { .. } | Error::PendingApproval => StatusCode::FORBIDDEN,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Database(db_err) => match db_err {
                DbError::NotFound => StatusCode::NOT_FOUND,
                DbError::UniqueViolation { .. } => StatusCode::CONFLICT,
                DbError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::Unauthenticated { message } => message.clone().unwrap_or_else(|| "Authentication required".to_string()),
            Error::LoginRequired { .. } => "Login required".to_string(),
            Error::Forbidden { .. } => "Forbidden".to_string(),
            Error::InvalidCredentials => "Invalid username or password".to_string(),
            Error::PendingApproval => "Your account is awaiting approval by an administrator".to_string(),
            Error::NotFound { resource, id } => format!("{resource} with ID {id} not found"),
            Error::Internal { .. } => "Internal server error".to_string(),
            Error::Database(db_err) => match db_err {
                DbError::NotFound => "Resource not found".to_string(),
                DbError::UniqueViolation { table, .. } if table.as_deref() == Some("users") => {
                    "This username is already taken".to_string()
                }
                DbError::UniqueViolation { .. } => "Resource already exists".to_string(),
                DbError::Other(_) => "Database error occurred".to_string(),
            },
        }
    }

    /// Log full error details - different log levels based on severity
    pub fn log(&self) {
        match self {
            Error::Database(DbError::Other(_)) | Error::Internal { .. } => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::Database(_) => {
                tracing::warn!("Database constraint error: {}", self);
            }
            Error::Unauthenticated { .. }
            | Error::Forbidden { .. }
            | Error::InvalidCredentials
            | Error::PendingApproval => {
                tracing::info!("Authorization error: {}", self);
            }
            Error::LoginRequired { .. } | Error::NotFound { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        self.log();

        match &self {
            Error::LoginRequired { location } => Redirect::to(location).into_response(),
            _ => (self.status_code(), self.user_message()).into_response(),
        }
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;
