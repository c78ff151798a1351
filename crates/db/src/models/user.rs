//! User entity model (minimal -- profile data lives in external collaborators).

use serde::Serialize;
use sqlx::FromRow;

use lucid_core::types::{DbId, Timestamp};

/// A row from the `users` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: DbId,
    pub display_name: String,
    pub created_at: Timestamp,
}
