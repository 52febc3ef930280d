//! Wire types shared by the server and anything that talks to it.

use crate::geo::GeoPoint;
use serde::{Deserialize, Serialize};

/// A registered developer as stored and returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Developer {
    #[serde(rename = "_id")]
    pub id: String,
    pub github_username: String,
    pub name: String,
    pub avatar_url: String,
    pub bio: Option<String>,
    pub techs: Vec<String>,
    pub location: GeoPoint,
}

impl Developer {
    /// True when any of `filter` is one of this developer's techs.
    pub fn has_any_tech(&self, filter: &[String]) -> bool {
        self.techs.iter().any(|t| filter.contains(t))
    }

    pub fn github_url(&self) -> String {
        format!("https://github.com/{}", self.github_username)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemovedDeveloper {
    #[serde(rename = "_id")]
    pub id: String,
}

/// Pushed over the live-update socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum DeveloperEvent {
    NewDev(Developer),
    RemovedDev(RemovedDeveloper),
}
