//! HTTP surface: route handlers and their request/response models.
//!
//! - **[`handlers`]**: axum handlers
//! - **[`models`]**: form, query and JSON bodies
//!
//! Routes are assembled in [`crate::build_router`].

pub mod handlers;
pub mod models;
