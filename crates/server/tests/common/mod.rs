#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use radar_github::{GithubError, GithubUser, ProfileSource};
use radar_server::store::DevStore;
use radar_server::{app, AppState, ServerConfig};
use serde_json::{json, Value};
use tempfile::{tempdir, TempDir};
use tower::ServiceExt;

pub struct FakeProfiles {
    users: HashMap<String, GithubUser>,
}

impl FakeProfiles {
    pub fn new() -> Self {
        let mut users = HashMap::new();
        for user in [
            GithubUser {
                login: "diego3g".to_string(),
                name: Some("Diego Fernandes".to_string()),
                avatar_url: "https://avatars.example/diego3g".to_string(),
                bio: Some("CTO".to_string()),
            },
            GithubUser {
                login: "FerrisDev".to_string(),
                name: None,
                avatar_url: "https://avatars.example/ferris".to_string(),
                bio: None,
            },
            GithubUser {
                login: "javadev".to_string(),
                name: Some("Java Dev".to_string()),
                avatar_url: "https://avatars.example/javadev".to_string(),
                bio: None,
            },
        ] {
            users.insert(user.login.to_lowercase(), user);
        }
        Self { users }
    }
}

#[async_trait]
impl ProfileSource for FakeProfiles {
    async fn fetch_profile(&self, username: &str) -> radar_github::Result<GithubUser> {
        self.users
            .get(&username.to_lowercase())
            .cloned()
            .ok_or_else(|| GithubError::NotFound(username.to_string()))
    }
}

/// Fresh database, fake GitHub, and the router over them.
pub async fn setup() -> (TempDir, AppState, Router) {
    let dir = tempdir().unwrap();
    let config = ServerConfig::with_data_root(dir.path());
    let store = DevStore::open(&dir.path().join("radar.sqlite")).await.unwrap();
    let state = AppState::new(config, store, Arc::new(FakeProfiles::new()));
    let router = app(state.clone());
    (dir, state, router)
}

pub async fn send(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };

    let response = router
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, value)
}

pub async fn register(router: &Router, username: &str, techs: Value, lat: f64, lon: f64) -> (StatusCode, Value) {
    send(
        router,
        Method::POST,
        "/devs",
        Some(json!({
            "github_username": username,
            "techs": techs,
            "latitude": lat,
            "longitude": lon,
        })),
    )
    .await
}

