//! Request and response data models.
//!
//! Kept separate from the database models in [`crate::db::models`] so the HTTP surface can change
//! without touching storage.

pub mod auth;
