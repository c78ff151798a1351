//! Request handlers, grouped by resource.

pub mod videos;
pub mod webhooks;
