use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use radar_common::Developer;
use tracing::info;

use crate::core::{AppState, Error, Result};
use crate::models::{CreateDeveloperInput, DeleteDeveloperInput, UpdateDeveloperInput};
use crate::store::NewDeveloper;

/// GET /devs
pub async fn list_devs(State(state): State<AppState>) -> Result<Json<Vec<Developer>>> {
    info!("GET /devs");
    Ok(Json(state.store.list().await?))
}

/// GET /devs/{id}
pub async fn get_dev(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Developer>> {
    info!("GET /devs/{}", id);
    state
        .store
        .get(&id)
        .await?
        .map(Json)
        .ok_or(Error::DeveloperNotFound(id))
}

/// POST /devs
///
/// Registers a developer, enriching the record from their GitHub profile.
/// A username that is already registered returns the stored record with
/// 200 instead of 201.
pub async fn create_dev(
    State(state): State<AppState>,
    payload: std::result::Result<Json<CreateDeveloperInput>, JsonRejection>,
) -> Result<(StatusCode, Json<Developer>)> {
    let Json(input) = payload?;
    let registration = input.validate()?;
    info!("POST /devs - {}", registration.github_username);

    if let Some(existing) = state
        .store
        .find_by_username(&registration.github_username)
        .await?
    {
        info!("{} already registered", existing.github_username);
        return Ok((StatusCode::OK, Json(existing)));
    }

    let profile = state
        .profiles
        .fetch_profile(&registration.github_username)
        .await?;

    let new = NewDeveloper {
        name: profile.display_name().to_string(),
        github_username: profile.login,
        avatar_url: profile.avatar_url,
        bio: profile.bio,
        techs: registration.techs,
        location: registration.location,
    };

    let (dev, created) = state.store.insert_or_existing(new).await?;
    if !created {
        return Ok((StatusCode::OK, Json(dev)));
    }

    state.hub.publish_new(&dev);
    Ok((StatusCode::CREATED, Json(dev)))
}

/// PUT /devs/{id}
pub async fn update_dev(
    Path(id): Path<String>,
    State(state): State<AppState>,
    payload: std::result::Result<Json<UpdateDeveloperInput>, JsonRejection>,
) -> Result<Json<Developer>> {
    let Json(input) = payload?;
    let changes = input.validate()?;
    info!("PUT /devs/{}", id);

    state
        .store
        .update(&id, changes)
        .await?
        .map(Json)
        .ok_or(Error::DeveloperNotFound(id))
}

/// DELETE /devs/{id}
pub async fn delete_dev(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<StatusCode> {
    info!("DELETE /devs/{}", id);
    remove(&state, id).await
}

/// DELETE /devs with `{"_id": ...}`, the form the web dashboard sends.
pub async fn delete_dev_by_body(
    State(state): State<AppState>,
    payload: std::result::Result<Json<DeleteDeveloperInput>, JsonRejection>,
) -> Result<StatusCode> {
    let Json(input) = payload?;
    info!("DELETE /devs - {}", input.id);
    remove(&state, input.id).await
}

async fn remove(state: &AppState, id: String) -> Result<StatusCode> {
    match state.store.delete(&id).await? {
        Some(dev) => {
            state.hub.publish_removed(&dev);
            Ok(StatusCode::NO_CONTENT)
        }
        None => Err(Error::DeveloperNotFound(id)),
    }
}
