//! Request gate for note and resource routes.
//!
//! Two optional checks, both off unless configured:
//!   1. Client IP must be in the whitelist. Behind an ingress the first
//!      `X-Forwarded-For` entry is the client; otherwise the peer address.
//!   2. `User-Agent` must contain the configured substring, ignoring case.

use super::state::ApiState;
use crate::error::{Error, Result};

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, header};
use axum::middleware::Next;
use axum::response::Response;
use std::net::SocketAddr;
use std::sync::Arc;

pub(super) async fn check_access(
    State(state): State<Arc<ApiState>>,
    request: Request,
    next: Next,
) -> Result<Response> {
    if let Some(whitelist) = &state.config.ip_whitelist {
        let peer = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        let allowed = client_ip(request.headers(), peer)
            .is_some_and(|ip| whitelist.contains(&ip));
        if !allowed {
            return Err(Error::Forbidden("IP not allowed".to_string()));
        }
    }

    if let Some(required) = &state.config.required_user_agent {
        let agent = request
            .headers()
            .get(header::USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_lowercase();
        if !agent.contains(required.as_str()) {
            return Err(Error::Forbidden("user agent not allowed".to_string()));
        }
    }

    Ok(next.run(request).await)
}

fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|first| !first.is_empty());

    match forwarded {
        Some(first) => Some(first.to_string()),
        None => peer.map(|addr| addr.ip().to_string()),
    }
}
