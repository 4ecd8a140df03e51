//! Web surface for Sundial.
//!
//! This crate exposes a manager's state over HTTP:
//! - Status page and JSON for every registered job
//! - Paginated run history, as HTML and JSON
//! - Manager info and a health check

mod error;
mod routes;

pub use error::WebError;
pub use routes::create_router;
