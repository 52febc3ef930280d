//! Shared pieces for Dev Radar
//!
//! Directory layout:
//! ```text
//! radar_data/
//! └── radar.sqlite     # Developer profiles
//! ```
//!
//! Also hosts the wire types the server and its clients agree on.

pub mod geo;
pub mod model;
pub mod techs;

pub use geo::{GeoError, GeoPoint};
pub use model::{Developer, DeveloperEvent, RemovedDeveloper};
pub use techs::{parse_techs, normalize_techs};

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable that overrides the data root.
pub const ROOT_ENV: &str = "RADAR_ROOT";

pub const DATABASE_FILE: &str = "radar.sqlite";

#[derive(Deserialize, Debug)]
struct RadarConfig {
    radar_root: Option<PathBuf>,
}

fn get_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("dev_radar").join("config.json"))
}

/// Load the persistent root from `<config dir>/dev_radar/config.json`
pub fn load_persistent_root() -> Option<PathBuf> {
    let path = get_config_path()?;
    load_root_from(&path)
}

fn load_root_from(path: &Path) -> Option<PathBuf> {
    if !path.exists() {
        return None;
    }

    match fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str::<RadarConfig>(&content) {
            Ok(config) => config.radar_root,
            Err(e) => {
                warn!("Failed to parse config file at {:?}: {}", path, e);
                None
            }
        },
        Err(e) => {
            warn!("Failed to read config file at {:?}: {}", path, e);
            None
        }
    }
}

/// Get the data root from environment, persistent config, or default
pub fn radar_root() -> PathBuf {
    if let Ok(val) = std::env::var(ROOT_ENV) {
        return PathBuf::from(val);
    }

    if let Some(root) = load_persistent_root() {
        return root;
    }

    PathBuf::from("radar_data")
}

/// Database file inside a data root
pub fn database_path(root: &Path) -> PathBuf {
    root.join(DATABASE_FILE)
}

/// Ensure a single directory exists
pub fn ensure_dir(path: &Path) -> anyhow::Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)?;
        info!("Created directory: {:?}", path);
    }
    Ok(())
}
