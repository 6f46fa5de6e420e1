//! WebSocket layer: connection handling, message routing, subscriptions.
//!
//! The WebSocket endpoint at `/ws` streams [`crate::domain::LedgerEvent`]s
//! to clients subscribed to the matching channels.

pub mod connection;
pub mod handler;
pub mod messages;
pub mod subscription;
