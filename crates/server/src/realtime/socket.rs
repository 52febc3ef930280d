//! GET /ws
//!
//! The handshake query carries the first search (`latitude`, `longitude`,
//! `techs`), the same parameters the map client sends to `/search`. Later
//! searches re-subscribe over the open socket:
//!
//! ```json
//! {"type": "subscribe", "latitude": -23.55, "longitude": -46.63, "techs": "Rust, Go"}
//! ```

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use radar_common::{parse_techs, GeoPoint};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::core::{AppState, Error, Result};
use crate::models::{optional_coordinate, TechsInput};
use crate::realtime::{ConnectionId, Subscription};

#[derive(Debug, Default, Deserialize)]
pub struct SubscribeParams {
    #[serde(default, deserialize_with = "optional_coordinate")]
    pub latitude: Option<f64>,
    #[serde(default, deserialize_with = "optional_coordinate")]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub techs: Option<String>,
}

impl SubscribeParams {
    /// `None` when the client connects without a search yet.
    pub fn into_subscription(self) -> Result<Option<Subscription>> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Ok(Some(Subscription {
                center: GeoPoint::new(lat, lon)?,
                techs: parse_techs(self.techs.as_deref().unwrap_or_default()),
            })),
            (None, None) => Ok(None),
            _ => Err(Error::BadRequest(
                "latitude and longitude must be sent together".to_string(),
            )),
        }
    }
}

/// Frames a client may send.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    Subscribe {
        #[serde(deserialize_with = "crate::models::coordinate")]
        latitude: f64,
        #[serde(deserialize_with = "crate::models::coordinate")]
        longitude: f64,
        techs: TechsInput,
    },
    Unsubscribe,
}

pub async fn live_socket(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    params: std::result::Result<Query<SubscribeParams>, axum::extract::rejection::QueryRejection>,
) -> Result<Response> {
    let Query(params) = params?;
    let initial = params.into_subscription()?;
    info!("GET /ws - initial subscription: {:?}", initial);

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, initial)))
}

async fn handle_socket(socket: WebSocket, state: AppState, initial: Option<Subscription>) {
    let (id, mut events) = state.hub.connect();
    if let Some(subscription) = initial {
        state.hub.subscribe(id, subscription);
    }

    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                let text = match serde_json::to_string(&event) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!("[Socket {}] failed to encode event: {}", id, e);
                        continue;
                    }
                };
                if sender.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            frame = receiver.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(reply) = handle_client_message(&state, id, text.as_str()) {
                            if sender.send(Message::Text(reply.into())).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!("[Socket {}] receive error: {}", id, e);
                        break;
                    }
                }
            }
        }
    }

    state.hub.disconnect(id);
    info!("[Socket {}] closed", id);
}

/// Applies a client frame; returns an error frame to send back, if any.
fn handle_client_message(state: &AppState, id: ConnectionId, text: &str) -> Option<String> {
    let message = match serde_json::from_str::<ClientMessage>(text) {
        Ok(message) => message,
        Err(e) => return Some(error_frame(&format!("invalid message: {e}"))),
    };

    match message {
        ClientMessage::Subscribe {
            latitude,
            longitude,
            techs,
        } => match GeoPoint::new(latitude, longitude) {
            Ok(center) => {
                let techs = techs.into_techs();
                debug!("[Socket {}] subscribe {:?} {:?}", id, center, techs);
                state.hub.subscribe(id, Subscription { center, techs });
                None
            }
            Err(e) => Some(error_frame(&e.to_string())),
        },
        ClientMessage::Unsubscribe => {
            state.hub.unsubscribe(id);
            None
        }
    }
}

fn error_frame(message: &str) -> String {
    json!({ "type": "error", "data": { "message": message } }).to_string()
}
