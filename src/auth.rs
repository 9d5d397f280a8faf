use std::{sync::Arc, time::Duration};

use axum::{RequestPartsExt, extract::FromRequestParts, http::request::Parts};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    AppState,
    config::AuthSettings,
    error::{AppError, AppResult},
};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// Issues and verifies HS256 bearer tokens for the configured admin account.
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    admin_username: String,
    admin_password: String,
    ttl: Duration,
}

impl TokenService {
    pub fn new(settings: &AuthSettings) -> Self {
        let secret = settings.jwt_secret.as_bytes();
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation: Validation::new(Algorithm::HS256),
            admin_username: settings.admin_username.clone(),
            admin_password: settings.admin_password.clone(),
            ttl: settings.token_ttl,
        }
    }

    /// Returns a token when the credentials match the admin account.
    pub fn login(&self, username: &str, password: &str) -> AppResult<Option<String>> {
        if username != self.admin_username || password != self.admin_password {
            return Ok(None);
        }
        self.issue(username).map(Some)
    }

    pub fn issue(&self, subject: &str) -> AppResult<String> {
        let now = jiff::Timestamp::now().as_second();
        let claims = Claims {
            sub: subject.to_string(),
            iat: now,
            exp: now + self.ttl.as_secs() as i64,
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        decode::<Claims>(token, &self.decoding, &self.validation).map(|data| data.claims)
    }
}

/// A request that carried a valid bearer token.
#[derive(Debug)]
pub struct AuthUser(pub Claims);

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|rejection| {
                if rejection.is_missing() {
                    warn!("access token missing");
                    AppError::Unauthorized("Access token required")
                } else {
                    warn!("malformed authorization header");
                    AppError::Forbidden("Invalid token")
                }
            })?;

        let claims = state.tokens.verify(bearer.token()).map_err(|err| {
            warn!(error = %err, "invalid token provided");
            AppError::Forbidden("Invalid token")
        })?;

        Ok(AuthUser(claims))
    }
}
