//! Participant authentication.
//!
//! An [`AccountDirectory`] turns a bearer token into the stable
//! [`ParticipantId`] the engine records as poll owner or voter. Handlers
//! that write take an [`Authenticated`] argument, which reads
//! `Authorization: Bearer <token>` and rejects with `401` when the header
//! is missing or the directory refuses the token.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;
use chrono::Utc;
use daypoll_db::KeyValueStore;
use daypoll_types::ParticipantId;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

/// Errors from token validation or issuance.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// No `Authorization: Bearer` header was sent.
    #[error("missing bearer token")]
    MissingToken,

    /// The token was rejected.
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// A token could not be signed.
    #[error("failed to issue token: {0}")]
    Issue(String),
}

/// Resolves bearer tokens to participants.
pub trait AccountDirectory: Send + Sync {
    /// Validate `token` and return the participant it belongs to.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidToken`] if the token is not accepted.
    fn authenticate(&self, token: &str) -> Result<ParticipantId, AuthError>;
}

/// JWT claims carried by participant tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Participant identifier.
    pub sub: String,
    /// Expiry, seconds since the Unix epoch.
    pub exp: u64,
}

/// Validates HS256 JWTs signed with a shared secret.
#[derive(Clone)]
pub struct JwtDirectory {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl JwtDirectory {
    /// Create a directory for tokens signed with `secret`.
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp", "sub"]);
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Sign a token for `participant` that expires after `ttl`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Issue`] if signing fails.
    pub fn issue(&self, participant: &ParticipantId, ttl: Duration) -> Result<String, AuthError> {
        let now = u64::try_from(Utc::now().timestamp()).unwrap_or(0);
        let claims = Claims {
            sub: participant.to_string(),
            exp: now.saturating_add(ttl.as_secs()),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::Issue(e.to_string()))
    }
}

impl AccountDirectory for JwtDirectory {
    fn authenticate(&self, token: &str) -> Result<ParticipantId, AuthError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?;
        if data.claims.sub.trim().is_empty() {
            return Err(AuthError::InvalidToken("empty subject".to_owned()));
        }
        Ok(ParticipantId::new(data.claims.sub))
    }
}

/// Fixed token table, for tests and local development.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    tokens: HashMap<String, ParticipantId>,
}

impl StaticDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `token` as `participant`.
    #[must_use]
    pub fn with_token(mut self, token: &str, participant: &str) -> Self {
        self.tokens
            .insert(token.to_owned(), ParticipantId::new(participant));
        self
    }
}

impl AccountDirectory for StaticDirectory {
    fn authenticate(&self, token: &str) -> Result<ParticipantId, AuthError> {
        self.tokens
            .get(token)
            .cloned()
            .ok_or_else(|| AuthError::InvalidToken("unknown token".to_owned()))
    }
}

/// The authenticated caller of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authenticated(pub ParticipantId);

fn bearer_token(parts: &Parts) -> Option<&str> {
    let raw = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())?;
    raw.strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

impl<S: KeyValueStore> FromRequestParts<Arc<AppState<S>>> for Authenticated {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState<S>>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(AuthError::MissingToken)?;
        Ok(Self(state.directory.authenticate(token)?))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn jwt_round_trip_yields_subject() {
        let directory = JwtDirectory::new("secret");
        let token = directory
            .issue(&ParticipantId::new("alice"), Duration::from_secs(60))
            .unwrap();
        assert_eq!(
            directory.authenticate(&token).unwrap(),
            ParticipantId::new("alice")
        );
    }

    #[test]
    fn jwt_with_wrong_secret_is_rejected() {
        let token = JwtDirectory::new("one")
            .issue(&ParticipantId::new("alice"), Duration::from_secs(60))
            .unwrap();
        let result = JwtDirectory::new("two").authenticate(&token);
        assert!(matches!(result, Err(AuthError::InvalidToken(_))));
    }

    #[test]
    fn expired_jwt_is_rejected() {
        let directory = JwtDirectory::new("secret");
        let claims = Claims {
            sub: "alice".to_owned(),
            exp: 1_000,
        };
        let token = encode(&Header::default(), &claims, &directory.encoding).unwrap();
        assert!(matches!(
            directory.authenticate(&token),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(JwtDirectory::new("secret").authenticate("not.a.jwt").is_err());
    }

    #[test]
    fn static_directory_maps_known_tokens() {
        let directory = StaticDirectory::new().with_token("t-1", "alice");
        assert_eq!(
            directory.authenticate("t-1").unwrap(),
            ParticipantId::new("alice")
        );
        assert!(directory.authenticate("t-2").is_err());
    }
}
