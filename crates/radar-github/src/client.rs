//! HTTP client for the GitHub users API.

use crate::config::GithubConfig;
use crate::error::{GithubError, Result};
use crate::profile::{is_valid_username, GithubUser, ProfileSource};
use crate::retry::{parse_retry_after, RetryConfig, RetryDecision, RetryState};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, RETRY_AFTER};
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct GithubClient {
    http: reqwest::Client,
    config: Arc<GithubConfig>,
}

impl GithubClient {
    pub fn new() -> Result<Self> {
        Self::with_config(GithubConfig::default())
    }

    pub fn with_config(config: GithubConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert(
            "x-github-api-version",
            HeaderValue::from_static("2022-11-28"),
        );
        if !config.token.is_empty() {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", config.token))
                .map_err(|e| GithubError::Config(e.to_string()))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .pool_idle_timeout(Duration::from_secs(90))
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .build()
            .map_err(|e| GithubError::Config(e.to_string()))?;

        Ok(Self {
            http,
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &GithubConfig {
        &self.config
    }

    fn retry_config(&self) -> RetryConfig {
        if self.config.max_retries == 0 {
            RetryConfig::no_retry()
        } else {
            RetryConfig::default()
                .with_max_retries(self.config.max_retries)
                .with_initial_backoff(Duration::from_millis(self.config.retry_delay_ms))
        }
    }

    /// Fetch a user's public profile, retrying transient failures.
    pub async fn fetch_user(&self, username: &str) -> Result<GithubUser> {
        if !is_valid_username(username) {
            return Err(GithubError::InvalidUsername(username.to_string()));
        }

        let url = self.config.user_url(username);
        let mut retry_state = RetryState::new(self.retry_config());

        loop {
            if self.config.enable_logging {
                debug!("[GitHub] GET {}", url);
            }

            match self.http.get(&url).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response
                            .json::<GithubUser>()
                            .await
                            .map_err(|e| GithubError::Decode(e.to_string()));
                    }
                    if status == StatusCode::NOT_FOUND {
                        return Err(GithubError::NotFound(username.to_string()));
                    }

                    let retry_after = response
                        .headers()
                        .get(RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(parse_retry_after);

                    match retry_state.should_retry_status(status.as_u16(), retry_after) {
                        RetryDecision::Retry(delay) => {
                            if self.config.enable_logging {
                                warn!(
                                    "[GitHub] status {} for {} (attempt {}), retrying in {:?}",
                                    status, username, retry_state.attempts, delay
                                );
                            }
                            tokio::time::sleep(delay).await;
                        }
                        RetryDecision::DontRetry => {
                            return Err(GithubError::Status(status.as_u16()));
                        }
                    }
                }
                Err(e) => match retry_state.should_retry_error() {
                    RetryDecision::Retry(delay) => {
                        if self.config.enable_logging {
                            warn!(
                                "[GitHub] request for {} failed (attempt {}), retrying in {:?}: {}",
                                username, retry_state.attempts, delay, e
                            );
                        }
                        tokio::time::sleep(delay).await;
                    }
                    RetryDecision::DontRetry => return Err(GithubError::Http(e.to_string())),
                },
            }
        }
    }
}

#[async_trait]
impl ProfileSource for GithubClient {
    async fn fetch_profile(&self, username: &str) -> Result<GithubUser> {
        self.fetch_user(username).await
    }
}
