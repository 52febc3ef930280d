//! Configuration for the GitHub client.

use std::fmt;

/// Configuration for the GitHub client.
#[derive(Clone, PartialEq, Eq)]
pub struct GithubConfig {
    /// API root, without trailing slash.
    pub api_url: String,
    /// Personal access token; anonymous requests when empty.
    pub token: String,
    /// Sent as `User-Agent`, which GitHub requires.
    pub user_agent: String,
    /// Maximum retries for failed requests.
    pub max_retries: u32,
    /// Base retry delay in milliseconds.
    pub retry_delay_ms: u64,
    /// Request timeout in milliseconds.
    pub request_timeout_ms: u64,
    /// Enable request logging.
    pub enable_logging: bool,
}

impl Default for GithubConfig {
    fn default() -> Self {
        GithubConfig {
            api_url: "https://api.github.com".to_string(),
            token: String::new(),
            user_agent: concat!("dev-radar/", env!("CARGO_PKG_VERSION")).to_string(),
            max_retries: 2,
            retry_delay_ms: 500,
            request_timeout_ms: 10_000,
            enable_logging: true,
        }
    }
}

impl fmt::Debug for GithubConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = if self.token.is_empty() { "<none>" } else { "<redacted>" };
        f.debug_struct("GithubConfig")
            .field("api_url", &self.api_url)
            .field("token", &token)
            .field("user_agent", &self.user_agent)
            .field("max_retries", &self.max_retries)
            .field("retry_delay_ms", &self.retry_delay_ms)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .field("enable_logging", &self.enable_logging)
            .finish()
    }
}

impl GithubConfig {
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = token.into();
        self
    }

    pub fn user_url(&self, username: &str) -> String {
        format!("{}/users/{}", self.api_url.trim_end_matches('/'), username)
    }
}
