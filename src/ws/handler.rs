//! Axum WebSocket upgrade handler.

use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::response::IntoResponse;

use super::connection::{Audience, run_connection};
use crate::api::extract::MaybeUser;
use crate::app_state::AppState;

/// `GET /ws`: Upgrade HTTP connection to WebSocket.
///
/// Anyone may watch the public channels; the owner's token additionally
/// unlocks the ledger channel.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    MaybeUser(user): MaybeUser,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let event_rx = state.event_bus.subscribe();
    let audience = Audience {
        is_owner: user == Some(state.owner_user_id),
    };

    ws.on_upgrade(move |socket| run_connection(socket, event_rx, audience))
}
