//! Core Router
//!
//! Developer registry, search and live-update routes.

use crate::core::AppState;
use crate::handlers::{devs, search};
use crate::realtime::socket;
use axum::{routing::get, Router};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/devs",
            get(devs::list_devs)
                .post(devs::create_dev)
                .delete(devs::delete_dev_by_body),
        )
        .route(
            "/devs/{id}",
            get(devs::get_dev)
                .put(devs::update_dev)
                .delete(devs::delete_dev),
        )
        .route("/search", get(search::search_devs))
        // Live updates for the caller's last search area
        .route("/ws", get(socket::live_socket))
}
