//! GitHub users API client.
//!
//! Only the public `GET /users/{username}` endpoint is used: registrations
//! are enriched with the display name, avatar and bio found there.

pub mod client;
pub mod config;
pub mod error;
pub mod profile;
pub mod retry;

pub use client::GithubClient;
pub use config::GithubConfig;
pub use error::{GithubError, Result};
pub use profile::{GithubUser, ProfileSource};
pub use retry::{parse_retry_after, RetryConfig, RetryDecision, RetryState};
