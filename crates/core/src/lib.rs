//! Domain logic for the Lucid video-generation backend.
//!
//! Zero internal dependencies so it can be used by the repository layer,
//! the render orchestrator, and any future CLI tooling.

pub mod error;
pub mod progress;
pub mod quota;
pub mod roles;
pub mod signing;
pub mod types;
