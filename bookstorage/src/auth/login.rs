//! Credential checks for the login form.

use tracing::{debug, info, instrument};

use crate::{
    auth::{directory::UserDirectory, password::verify_password_blocking},
    errors::Error,
    types::UserId,
};

/// Check a username and password against the directory, returning the account id on success.
///
/// An unknown username and a wrong password both give [`Error::InvalidCredentials`]. The password
/// is verified before the approval state is looked at, so [`Error::PendingApproval`] is never
/// revealed to someone who does not know the account's password.
#[instrument(skip(directory, password), err(level = "debug"))]
pub async fn authenticate(directory: &dyn UserDirectory, username: &str, password: &str) -> Result<UserId, Error> {
    let Some(credential) = directory.lookup_credential(username).await? else {
        debug!("Login attempt for unknown username");
        return Err(Error::InvalidCredentials);
    };

    if !verify_password_blocking(credential.password_hash.clone(), password.to_string()).await? {
        debug!(user_id = credential.id, "Login attempt with wrong password");
        return Err(Error::InvalidCredentials);
    }

    if credential.awaiting_approval() {
        info!(user_id = credential.id, "Login refused: account awaiting approval");
        return Err(Error::PendingApproval);
    }

    info!(user_id = credential.id, "User logged in");
    Ok(credential.id)
}
