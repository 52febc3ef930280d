use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use tracing::info;

use crate::core::{AppState, Result};
use crate::models::{SearchParams, SearchResponse};

/// GET /search?latitude=..&longitude=..&techs=a,b
///
/// Developers within the configured radius having any of the techs,
/// nearest first.
pub async fn search_devs(
    State(state): State<AppState>,
    params: std::result::Result<Query<SearchParams>, QueryRejection>,
) -> Result<Json<SearchResponse>> {
    let Query(params) = params?;
    let center = params.center()?;
    let techs = params.techs();
    info!(
        "GET /search - ({}, {}) techs={:?}",
        center.latitude(),
        center.longitude(),
        techs
    );

    let devs = state
        .store
        .search_nearby(&center, state.config.search_radius_km, &techs)
        .await?;

    Ok(Json(SearchResponse { devs }))
}
