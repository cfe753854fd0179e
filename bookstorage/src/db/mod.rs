//! Database layer for data persistence and access.
//!
//! This module implements the data access layer using SQLx with SQLite. It follows the
//! Repository pattern: handlers borrow a connection and return models.
//!
//! ```text
//! ┌──────────────┐
//! │ Auth / pages │  (guards, login flow)
//! └──────┬───────┘
//!        ↓
//! ┌──────────────┐
//! │ Repositories │  (db::handlers)
//! └──────┬───────┘
//!        ↓
//! ┌──────────────┐
//! │    SQLite    │
//! └──────────────┘
//! ```
//!
//! Only the `users` table is owned here. Works, catalog entries and the rest of the reading
//! tracker schema belong to other parts of the application.
//!
//! # Migrations
//!
//! Migrations live in `migrations/` and are embedded at compile time; see [`crate::migrator`].

pub mod errors;
pub mod handlers;
pub mod models;
