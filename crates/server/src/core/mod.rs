//! Core Service Layer
//!
//! Shared infrastructure: configuration, app state, the error type and the
//! route table.

pub mod config;
pub mod error;
pub mod router;

pub use config::{AppState, ServerConfig};
pub use error::{Error, Result};
pub use router::router;
