//! Server configuration

use std::fmt::Display;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use radar_github::{GithubConfig, ProfileSource};
use tracing::{info, warn};

use crate::realtime::LiveHub;
use crate::store::DevStore;

/// Configuration for the Radar server
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Data root (database lives here unless overridden)
    pub data_root: PathBuf,
    /// sqlx connection string
    pub database_url: String,
    /// Max pooled database connections
    pub db_max_connections: u32,
    /// Listen address
    pub bind_addr: SocketAddr,
    /// Search and live-update radius
    pub search_radius_km: f64,
    /// Grid size of live-update rooms, in degrees
    pub cell_degrees: f64,
    /// Per-socket queue length before events are dropped
    pub subscriber_queue: usize,
    /// GitHub lookup settings
    pub github: GithubConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::with_data_root(radar_common::radar_root())
    }
}

impl ServerConfig {
    /// Defaults rooted at `data_root`, ignoring the environment.
    pub fn with_data_root(data_root: impl Into<PathBuf>) -> Self {
        let data_root = data_root.into();
        Self {
            database_url: format!("sqlite:{}", radar_common::database_path(&data_root).display()),
            data_root,
            db_max_connections: 5,
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3333)),
            search_radius_km: 10.0,
            cell_degrees: 0.1,
            subscriber_queue: 32,
            github: GithubConfig::default(),
        }
    }

    /// Load from the environment, falling back to defaults per key.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(url) = var("RADAR_DATABASE_URL") {
            config.database_url = url;
        }
        config.db_max_connections = try_load("RADAR_DB_MAX_CONNECTIONS", config.db_max_connections);
        config.bind_addr = try_load("RADAR_BIND", config.bind_addr);
        config.search_radius_km = try_load("RADAR_SEARCH_RADIUS_KM", config.search_radius_km);
        config.cell_degrees = try_load("RADAR_CELL_DEGREES", config.cell_degrees);
        config.subscriber_queue = try_load("RADAR_SUBSCRIBER_QUEUE", config.subscriber_queue);

        if let Some(url) = var("GITHUB_API_URL") {
            config.github = config.github.with_api_url(url);
        }
        if let Some(token) = var("GITHUB_TOKEN") {
            config.github = config.github.with_token(token);
        }
        config.github.max_retries = try_load("GITHUB_MAX_RETRIES", config.github.max_retries);
        config.github.request_timeout_ms =
            try_load("GITHUB_TIMEOUT_MS", config.github.request_timeout_ms);

        config.sanitize();
        config
    }

    fn sanitize(&mut self) {
        if self.search_radius_km.is_nan() || self.search_radius_km <= 0.0 {
            warn!("Search radius must be positive, using 10 km");
            self.search_radius_km = 10.0;
        }
        if self.cell_degrees.is_nan() || self.cell_degrees <= 0.0 || self.cell_degrees > 90.0 {
            warn!("Cell size must be within (0, 90] degrees, using 0.1");
            self.cell_degrees = 0.1;
        }
        self.db_max_connections = self.db_max_connections.max(1);
        self.subscriber_queue = self.subscriber_queue.max(1);
    }

    /// Ensure the data root exists
    pub fn ensure_dirs(&self) -> anyhow::Result<()> {
        radar_common::ensure_dir(&self.data_root)
    }
}

fn var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn try_load<T>(key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match var(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|e| {
            warn!("Invalid {key} value {raw:?}: {e}, using default: {default}");
            default
        }),
        None => {
            info!("{key} not set, using default: {default}");
            default
        }
    }
}

/// App state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub store: Arc<DevStore>,
    pub hub: Arc<LiveHub>,
    pub profiles: Arc<dyn ProfileSource>,
}

impl AppState {
    pub fn new(config: ServerConfig, store: DevStore, profiles: Arc<dyn ProfileSource>) -> Self {
        let hub = LiveHub::new(
            config.search_radius_km,
            config.cell_degrees,
            config.subscriber_queue,
        );
        Self {
            config: Arc::new(config),
            store: Arc::new(store),
            hub: Arc::new(hub),
            profiles,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_follow_data_root() {
        let config = ServerConfig::with_data_root("/tmp/radar-x");
        assert_eq!(config.database_url, "sqlite:/tmp/radar-x/radar.sqlite");
        assert_eq!(config.bind_addr.port(), 3333);
        assert_eq!(config.search_radius_km, 10.0);
    }

    #[test]
    fn test_sanitize_replaces_nonsense() {
        let mut config = ServerConfig::with_data_root("/tmp/radar-x");
        config.search_radius_km = -1.0;
        config.cell_degrees = f64::NAN;
        config.subscriber_queue = 0;
        config.sanitize();
        assert_eq!(config.search_radius_km, 10.0);
        assert_eq!(config.cell_degrees, 0.1);
        assert_eq!(config.subscriber_queue, 1);
    }

    #[test]
    fn test_debug_output_hides_github_token() {
        let mut config = ServerConfig::with_data_root("/tmp/radar-x");
        config.github = config.github.with_token("ghp_secret123");
        assert!(!format!("{config:?}").contains("ghp_secret123"));
    }
}
