//! Request extractors for the caller's identity and address.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::HeaderMap;
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::request::Parts;

use crate::app_state::AppState;
use crate::domain::UserId;
use crate::error::GatewayError;

/// Cookie the managed auth provider's browser SDK stores the token in.
pub const ACCESS_TOKEN_COOKIE: &str = "sb-access-token";

/// A signed-in member. Rejects with `401` when no valid token is present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser(pub UserId);

/// An optional member. A missing token yields `None`; a present but
/// invalid token is still rejected with `401`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaybeUser(pub Option<UserId>);

/// Client address for rate limiting; see [`resolve_client_ip`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

/// Reads the access token from `Authorization: Bearer` or the auth cookie.
#[must_use]
pub fn access_token(headers: &HeaderMap) -> Option<&str> {
    if let Some(token) = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
    {
        return Some(token);
    }
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == ACCESS_TOKEN_COOKIE && !value.is_empty())
        .map(|(_, value)| value)
}

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = GatewayError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match access_token(&parts.headers) {
            Some(token) => state.auth.verify(token).map(|user| Self(Some(user))),
            None => Ok(Self(None)),
        }
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = GatewayError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let MaybeUser(user) = MaybeUser::from_request_parts(parts, state).await?;
        user.map(Self).ok_or(GatewayError::Unauthorized)
    }
}

/// Resolves the client address used as the rate-limit identity.
///
/// Without a trusted proxy the peer address is used and forwarding headers
/// are ignored. Behind a proxy the right-most `X-Forwarded-For` hop (the one
/// the proxy appended) wins, then `X-Real-IP`, then the peer.
#[must_use]
pub fn resolve_client_ip(headers: &HeaderMap, peer: Option<SocketAddr>, trust_proxy: bool) -> String {
    let header_value = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    let proxied = if trust_proxy {
        header_value("x-forwarded-for")
            .and_then(|v| v.rsplit(',').map(str::trim).find(|hop| !hop.is_empty()))
            .or_else(|| header_value("x-real-ip").map(str::trim))
            .filter(|v| !v.is_empty())
    } else {
        None
    };
    match (proxied, peer) {
        (Some(ip), _) => ip.to_string(),
        (None, Some(addr)) => addr.ip().to_string(),
        (None, None) => "unknown".to_string(),
    }
}

impl FromRequestParts<AppState> for ClientIp {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Ok(Self(resolve_client_ip(
            &parts.headers,
            peer,
            state.trust_proxy_headers,
        )))
    }
}
