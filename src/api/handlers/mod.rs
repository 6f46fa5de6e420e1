//! REST endpoint handlers organized by resource.

pub mod admin;
pub mod checkout;
pub mod gift;
pub mod system;
pub mod wallet;
pub mod webhook;

use axum::Router;

use crate::app_state::AppState;

/// Composes all resource routes under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(checkout::routes())
        .merge(webhook::routes())
        .merge(gift::routes())
        .merge(wallet::routes())
        .merge(admin::routes())
}
