//! Caller identity resolution.
//!
//! Callers present an HS256 bearer token whose `sub` claim is their identity
//! id. Issuing those tokens belongs to the identity provider; [`issue_token`]
//! exists for development tooling and tests.

use crate::error::{DomainErrorKind, Error, InternalErrorKind, RejectedKind};
use crate::{user, UserId};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use log::*;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: UserId,
    pub exp: usize,
}

/// Validates signature and expiry and returns the token's subject.
pub fn verify_token(secret: &str, token: &str) -> Result<UserId, Error> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_required_spec_claims(&["exp", "sub"]);

    let token_data = decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)?;

    if token_data.claims.sub.is_empty() {
        return Err(Error::rejected(RejectedKind::Unauthenticated, "token has no subject"));
    }

    Ok(token_data.claims.sub)
}

/// Resolves the caller behind `token`, who must be a known user.
pub async fn resolve(db: &DatabaseConnection, secret: &str, token: &str) -> Result<UserId, Error> {
    let user_id = verify_token(secret, token)?;

    if !user::exists(db, &user_id).await? {
        warn!("Valid token presented for unknown user {user_id}");
        return Err(Error::rejected(RejectedKind::Unauthenticated, "unknown user"));
    }

    Ok(user_id)
}

pub fn issue_token(secret: &str, user_id: &str, ttl: Duration) -> Result<String, Error> {
    let claims = Claims {
        sub: user_id.to_owned(),
        exp: (Utc::now() + ttl).timestamp().max(0) as usize,
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| Error {
        source: Some(Box::new(e)),
        error_kind: DomainErrorKind::Internal(InternalErrorKind::Other(
            "JWT encoding related error".to_string(),
        )),
    })
}
