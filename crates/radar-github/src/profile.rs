use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// The subset of a GitHub `/users/{username}` response we keep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GithubUser {
    pub login: String,
    pub name: Option<String>,
    pub avatar_url: String,
    pub bio: Option<String>,
}

impl GithubUser {
    /// Display name, falling back to the login for accounts without one.
    pub fn display_name(&self) -> &str {
        match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name,
            _ => &self.login,
        }
    }
}

/// Resolves a username to its public profile.
#[async_trait]
pub trait ProfileSource: Send + Sync + 'static {
    async fn fetch_profile(&self, username: &str) -> Result<GithubUser>;
}

/// GitHub's username rule: alphanumerics and single inner hyphens, 1-39 chars.
pub fn is_valid_username(username: &str) -> bool {
    !username.is_empty()
        && username.len() <= 39
        && !username.starts_with('-')
        && !username.ends_with('-')
        && !username.contains("--")
        && username.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}
