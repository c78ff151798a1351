//! Role name constants shared by the auth layer and handlers.

/// Administrators may inspect any user's jobs.
pub const ROLE_ADMIN: &str = "admin";

/// Regular authenticated users.
pub const ROLE_USER: &str = "user";
