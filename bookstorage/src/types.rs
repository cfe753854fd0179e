//! Common type definitions.
//!
//! Account identifiers are the SQLite `INTEGER PRIMARY KEY` of the `users` table, so they are
//! plain signed 64-bit integers. A valid identifier is always strictly positive; anything else
//! read from the outside world is treated as "no user".

/// User account identifier (`users.id`).
pub type UserId = i64;

/// Returns `true` when `id` could name a stored account.
pub fn is_valid_user_id(id: UserId) -> bool {
    id > 0
}
