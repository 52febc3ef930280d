//! Request payloads.
//!
//! The web form posts `techs` as one comma-separated string and may send
//! coordinates as strings, so both shapes are accepted here and normalized
//! before anything reaches the store.

use radar_common::{normalize_techs, parse_techs, GeoPoint};
use serde::{Deserialize, Deserializer, Serialize};

use crate::core::{Error, Result};

/// `"Rust, Go"` or `["Rust", "Go"]`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TechsInput {
    List(Vec<String>),
    Csv(String),
}

impl TechsInput {
    pub fn into_techs(self) -> Vec<String> {
        match self {
            TechsInput::List(list) => normalize_techs(&list),
            TechsInput::Csv(csv) => parse_techs(&csv),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawCoordinate {
    Number(f64),
    Text(String),
}

impl RawCoordinate {
    fn into_f64<E: serde::de::Error>(self) -> std::result::Result<f64, E> {
        match self {
            RawCoordinate::Number(n) => Ok(n),
            RawCoordinate::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| E::custom(format!("invalid coordinate {s:?}"))),
        }
    }
}

/// Accepts `-23.5` as well as `"-23.5"`.
pub fn coordinate<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    RawCoordinate::deserialize(deserializer)?.into_f64()
}

pub fn optional_coordinate<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<RawCoordinate>::deserialize(deserializer)? {
        Some(raw) => raw.into_f64().map(Some),
        None => Ok(None),
    }
}

fn require_techs(techs: Vec<String>) -> Result<Vec<String>> {
    if techs.is_empty() {
        return Err(Error::BadRequest("at least one tech is required".to_string()));
    }
    Ok(techs)
}

/// POST /devs body
#[derive(Debug, Clone, Deserialize)]
pub struct CreateDeveloperInput {
    pub github_username: String,
    pub techs: TechsInput,
    #[serde(deserialize_with = "coordinate")]
    pub latitude: f64,
    #[serde(deserialize_with = "coordinate")]
    pub longitude: f64,
}

/// A registration that passed validation, not yet enriched.
#[derive(Debug, Clone, PartialEq)]
pub struct Registration {
    pub github_username: String,
    pub techs: Vec<String>,
    pub location: GeoPoint,
}

impl CreateDeveloperInput {
    pub fn validate(self) -> Result<Registration> {
        let github_username = self.github_username.trim().to_string();
        if github_username.is_empty() {
            return Err(Error::BadRequest("github_username is required".to_string()));
        }
        let techs = require_techs(self.techs.into_techs())?;
        let location = GeoPoint::new(self.latitude, self.longitude)?;

        Ok(Registration {
            github_username,
            techs,
            location,
        })
    }
}

/// PUT /devs/{id} body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateDeveloperInput {
    pub techs: Option<TechsInput>,
    #[serde(default, deserialize_with = "optional_coordinate")]
    pub latitude: Option<f64>,
    #[serde(default, deserialize_with = "optional_coordinate")]
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeveloperChanges {
    pub techs: Option<Vec<String>>,
    pub location: Option<GeoPoint>,
}

impl UpdateDeveloperInput {
    pub fn validate(self) -> Result<DeveloperChanges> {
        let techs = self
            .techs
            .map(|t| require_techs(t.into_techs()))
            .transpose()?;

        let location = match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some(GeoPoint::new(lat, lon)?),
            (None, None) => None,
            _ => {
                return Err(Error::BadRequest(
                    "latitude and longitude must be sent together".to_string(),
                ))
            }
        };

        if techs.is_none() && location.is_none() {
            return Err(Error::BadRequest("nothing to update".to_string()));
        }

        Ok(DeveloperChanges { techs, location })
    }
}

/// DELETE /devs body, as sent by the web dashboard.
#[derive(Debug, Clone, Deserialize)]
pub struct DeleteDeveloperInput {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
}

/// GET /search query
#[derive(Debug, Clone, Deserialize)]
pub struct SearchParams {
    #[serde(deserialize_with = "coordinate")]
    pub latitude: f64,
    #[serde(deserialize_with = "coordinate")]
    pub longitude: f64,
    #[serde(default)]
    pub techs: String,
}

impl SearchParams {
    pub fn center(&self) -> Result<GeoPoint> {
        Ok(GeoPoint::new(self.latitude, self.longitude)?)
    }

    pub fn techs(&self) -> Vec<String> {
        parse_techs(&self.techs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub devs: Vec<radar_common::Developer>,
}
