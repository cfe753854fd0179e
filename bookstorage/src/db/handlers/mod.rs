//! Repository implementations for database access.
//!
//! Each repository wraps a borrowed SQLx connection (or transaction) and exposes strongly-typed
//! queries returning models from [`crate::db::models`]:
//!
//! ```ignore
//! use bookstorage::db::handlers::Users;
//!
//! let mut conn = pool.acquire().await?;
//! let mut users = Users::new(&mut conn);
//! let flags = users.get_flags(user_id).await?;
//! ```

pub mod users;

pub use users::Users;
