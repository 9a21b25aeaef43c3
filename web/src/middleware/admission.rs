//! Admission control middleware.
//!
//! Runs before routing and authorization. Requests carrying a validly signed
//! bearer token are charged to that identity; everything else is charged to
//! the caller's network origin. Forwarding headers only name that origin when
//! the socket peer is a configured trusted proxy.

use crate::extractors::authenticated_user::bearer_token;
use crate::AppState;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use domain::{error::Error as DomainError, identity};
use log::*;
use std::net::{IpAddr, SocketAddr};

pub(crate) async fn admission_control(
    State(app_state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let partition_key = partition_key(&app_state, &request);

    match app_state.app_state.admission.try_acquire(&partition_key) {
        Ok(_permit) => next.run(request).await,
        Err(rejected) => {
            let admission = &app_state.app_state.admission;
            warn!(
                "Admission limit reached for {partition_key} on {}, retry after {:?} ({} partitions tracked)",
                request.uri().path(),
                rejected.retry_after,
                admission.partition_count()
            );
            crate::Error::from(DomainError::too_many_requests(rejected.retry_after)).into_response()
        }
    }
}

/// `user:<id>` for a caller with a valid token, otherwise `origin:<ip>`.
///
/// Only the token signature and expiry are checked here; whether the user
/// still exists is left to the route's own authentication.
fn partition_key(app_state: &AppState, request: &Request) -> String {
    let verified = bearer_token(request.headers(), request.uri())
        .and_then(|token| identity::verify_token(app_state.config().jwt_secret(), &token).ok());

    match verified {
        Some(user_id) => format!("user:{user_id}"),
        None => {
            let peer_ip = request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip());
            format!(
                "origin:{}",
                extract_client_ip(request.headers(), peer_ip, &app_state.config().trusted_proxies)
            )
        }
    }
}

/// Client address. X-Forwarded-For, then X-Real-IP, are honoured only when
/// the socket peer is one of `trusted_proxies`; otherwise the peer itself is
/// the client.
pub(crate) fn extract_client_ip(headers: &HeaderMap, peer_ip: Option<IpAddr>, trusted_proxies: &[IpAddr]) -> String {
    let behind_trusted_proxy = peer_ip.is_some_and(|peer| trusted_proxies.contains(&peer));

    let forwarded = || {
        // First address in X-Forwarded-For is the original client
        headers
            .get("x-forwarded-for")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .and_then(|first| first.trim().parse::<IpAddr>().ok())
    };

    let real_ip = || {
        headers
            .get("x-real-ip")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<IpAddr>().ok())
    };

    behind_trusted_proxy
        .then(|| forwarded().or_else(real_ip))
        .flatten()
        .or(peer_ip)
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
