//! Live lot updates over WebSocket
//!
//! `GET /api/v1/locations/{id}/live` streams every committed change at one
//! location. The first frame is a `connected` welcome carrying the current
//! availability; every later frame is an event. Events are hints: clients
//! re-read the lot when one arrives.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use tokio::select;
use tracing::{debug, error, info, warn};

use crate::application::events::SharedEventBus;
use crate::application::LotService;
use crate::interfaces::http::common::ApiError;
use crate::interfaces::http::middleware::CurrentUser;

/// State for the live update handler
#[derive(Clone)]
pub struct LiveState {
    pub event_bus: SharedEventBus,
    pub lots: Arc<LotService>,
}

/// WebSocket upgrade handler. Unknown locations are refused before the
/// upgrade with a regular 404.
#[utoipa::path(
    get,
    path = "/api/v1/locations/{location_id}/live",
    tag = "Live Updates",
    security(("bearer_auth" = [])),
    params(("location_id" = i32, Path, description = "Location ID")),
    responses(
        (status = 101, description = "Switching to the live event stream"),
        (status = 404, description = "Location not found")
    )
)]
pub async fn live_updates_handler(
    ws: WebSocketUpgrade,
    State(state): State<LiveState>,
    Path(location_id): Path<i32>,
    user: CurrentUser,
) -> Response {
    // Subscribe before reading availability so no commit falls in between.
    let subscriber = state.event_bus.subscribe(location_id);
    let availability = match state.lots.availability(location_id).await {
        Ok(a) => a,
        Err(e) => return ApiError(e).into_response(),
    };

    info!(location_id, user_id = %user.user_id, "Live viewer connecting");
    ws.on_upgrade(move |socket| async move {
        let welcome = serde_json::json!({
            "type": "connected",
            "location_id": location_id,
            "availability": availability,
        });
        handle_live_socket(socket, subscriber, welcome, location_id).await
    })
}

async fn handle_live_socket(
    socket: WebSocket,
    mut subscriber: crate::application::EventSubscriber,
    welcome: serde_json::Value,
    location_id: i32,
) {
    let (mut sender, mut receiver) = socket.split();

    if let Err(e) = sender
        .send(Message::Text(welcome.to_string().into()))
        .await
    {
        error!(location_id, "Failed to send welcome message: {}", e);
        return;
    }

    loop {
        select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = sender.send(Message::Pong(data)).await {
                            error!(location_id, "Failed to send pong: {}", e);
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(location_id, "WebSocket error: {}", e);
                        break;
                    }
                }
            }

            event = subscriber.recv() => {
                let Some(event_msg) = event else {
                    warn!(location_id, "Event bus closed");
                    break;
                };
                match serde_json::to_string(&event_msg) {
                    Ok(json) => {
                        if let Err(e) = sender.send(Message::Text(json.into())).await {
                            debug!(location_id, "Viewer went away: {}", e);
                            break;
                        }
                    }
                    Err(e) => error!(location_id, "Failed to serialize event: {}", e),
                }
            }
        }
    }

    info!(location_id, "Live viewer disconnected");
}
