//! WebSocket connection state machine.
//!
//! Handles the read/write loop for a single WebSocket connection,
//! dispatching incoming commands and forwarding filtered events.

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;

use super::messages::{WsCommand, WsMessage, WsMessageType};
use super::subscription::SubscriptionManager;
use crate::domain::{Channel, LedgerEvent};

/// What the connected client may see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Audience {
    /// The owner may subscribe to the private ledger channel and `"*"`.
    pub is_owner: bool,
}

/// Runs the read/write loop for a single WebSocket connection.
///
/// - Reads commands from the client and dispatches them.
/// - Forwards matching events from the [`broadcast::Receiver`] to the client.
pub async fn run_connection(
    socket: WebSocket,
    mut event_rx: broadcast::Receiver<LedgerEvent>,
    audience: Audience,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let mut subs = SubscriptionManager::new();

    loop {
        tokio::select! {
            // Incoming message from client
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let response = handle_text_message(&text, &mut subs, audience);
                        if let Some(resp_json) = response
                            && ws_tx.send(Message::text(resp_json)).await.is_err() {
                                break;
                            }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    _ => {}
                }
            }
            // Event from EventBus
            event = event_rx.recv() => {
                match event {
                    Ok(ledger_event) => {
                        if subs.matches(ledger_event.channel()) {
                            let msg = WsMessage::new(
                                uuid::Uuid::new_v4().to_string(),
                                WsMessageType::Event,
                                serde_json::to_value(&ledger_event).unwrap_or_default(),
                            );
                            let json = serde_json::to_string(&msg).unwrap_or_default();
                            if ws_tx.send(Message::text(json)).await.is_err() {
                                break;
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(lagged = n, "ws client lagged behind event bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    tracing::debug!("ws connection closed");
}

/// Splits channel labels into parsed channels and the wildcard flag.
fn parse_channels(labels: &[String]) -> Result<(Vec<Channel>, bool), String> {
    let mut channels = Vec::with_capacity(labels.len());
    let mut wildcard = false;
    for label in labels {
        if label == "*" {
            wildcard = true;
        } else {
            channels.push(Channel::parse(label).ok_or_else(|| format!("unknown channel {label}"))?);
        }
    }
    Ok((channels, wildcard))
}

/// Handles a text message from the client, returning an optional JSON response.
fn handle_text_message(
    text: &str,
    subs: &mut SubscriptionManager,
    audience: Audience,
) -> Option<String> {
    let Ok(msg) = serde_json::from_str::<WsMessage>(text) else {
        return serde_json::to_string(&WsMessage::error("", 400, "malformed JSON")).ok();
    };
    let Ok(command) = serde_json::from_value::<WsCommand>(msg.payload) else {
        return serde_json::to_string(&WsMessage::error(msg.id, 404, "unknown command")).ok();
    };

    let response = match command {
        WsCommand::Subscribe { channels } => match parse_channels(&channels) {
            Err(reason) => WsMessage::error(msg.id, 400, &reason),
            Ok((parsed, wildcard))
                if !audience.is_owner && (wildcard || parsed.contains(&Channel::Ledger)) =>
            {
                WsMessage::error(msg.id, 403, "channel requires owner access")
            }
            Ok((parsed, wildcard)) => {
                subs.subscribe(&parsed, wildcard);
                WsMessage::new(
                    msg.id,
                    WsMessageType::Response,
                    serde_json::json!({
                        "subscribed": parsed.iter().map(Channel::label).collect::<Vec<_>>(),
                        "count": subs.count(),
                        "wildcard": subs.is_subscribed_all(),
                    }),
                )
            }
        },
        WsCommand::Unsubscribe { channels } => match parse_channels(&channels) {
            Err(reason) => WsMessage::error(msg.id, 400, &reason),
            Ok((parsed, wildcard)) => {
                subs.unsubscribe(&parsed, wildcard);
                WsMessage::new(
                    msg.id,
                    WsMessageType::Response,
                    serde_json::json!({
                        "unsubscribed": parsed.iter().map(Channel::label).collect::<Vec<_>>(),
                        "remaining_count": subs.count(),
                    }),
                )
            }
        },
        WsCommand::Ping => WsMessage::new(
            msg.id,
            WsMessageType::Response,
            serde_json::json!({ "pong": true }),
        ),
    };
    serde_json::to_string(&response).ok()
}
