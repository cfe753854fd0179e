//! HTTP handlers.
//!
//! - [`auth`]: login form, login and logout
//! - [`pages`]: server-rendered pages
//! - [`accounts`]: JSON endpoints under the API prefix
//!
//! Handlers never build error bodies. They return an [`crate::errors::Error`] or a bare status and
//! [`crate::intercept`] presents it.

pub mod accounts;
pub mod auth;
pub mod pages;
