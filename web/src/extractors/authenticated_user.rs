use crate::error::status_for;
use crate::extractors::RejectionType;
use crate::AppState;
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap, StatusCode, Uri},
};
use domain::{identity, UserId};
use log::*;

/// The caller's identity, resolved from a bearer token.
///
/// Browsers cannot set headers on an `EventSource`, so an `access_token`
/// query parameter is accepted as well.
pub(crate) struct AuthenticatedUser(pub UserId);

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = RejectionType;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers, &parts.uri)
            .ok_or_else(|| (StatusCode::UNAUTHORIZED, "UNAUTHORIZED".to_string()))?;

        match identity::resolve(state.db_conn_ref(), state.config().jwt_secret(), &token).await {
            Ok(user_id) => Ok(AuthenticatedUser(user_id)),
            Err(e) => {
                let status = status_for(e.kind());
                if status == StatusCode::INTERNAL_SERVER_ERROR {
                    error!("Failed to resolve caller identity: {e:?}");
                    Err((status, "INTERNAL SERVER ERROR".to_string()))
                } else {
                    debug!("Rejected bearer token: {e:?}");
                    Err((StatusCode::UNAUTHORIZED, "UNAUTHORIZED".to_string()))
                }
            }
        }
    }
}

/// Token from `Authorization: Bearer ...`, falling back to `?access_token=`.
pub(crate) fn bearer_token(headers: &HeaderMap, uri: &Uri) -> Option<String> {
    if let Some(token) = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
    {
        return Some(token.trim().to_owned());
    }

    uri.query().and_then(|query| {
        query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(key, _)| *key == "access_token")
            .map(|(_, value)| value.to_owned())
    })
}
