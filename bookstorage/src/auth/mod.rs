//! Authentication and access control.
//!
//! A session is nothing more than a `user_id` cookie holding the account's numeric id. There is
//! no server-side session state and the cookie is not signed, so anyone who can set a cookie can
//! claim any id. Treat this as the trust model of the deployment, not as a secure one.
//!
//! - [`password`]: verifying stored credentials, either werkzeug `pbkdf2:sha256` hashes or
//!   legacy plaintext.
//! - [`session`]: encoding the cookie and building `Set-Cookie` values.
//! - [`directory`]: the two user lookups the rest of this module needs.
//! - [`identity`]: turning a request's cookie into a caller, with privilege flags on demand.
//! - [`middleware`]: the authenticated and admin guards.
//! - [`login`]: the username/password check behind the login form.

pub mod directory;
pub mod identity;
pub mod login;
pub mod middleware;
pub mod password;
pub mod session;
