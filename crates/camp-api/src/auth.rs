//! # Admin Authentication
//!
//! Bearer tokens are `hex(username).expires_unix.hex(hmac_sha256)`,
//! signed with `ADMIN_TOKEN_SECRET`. No server-side session table.

use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use camp_core::{CampError, CampResult};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use std::sync::Arc;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// A freshly issued admin token
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Signs and verifies admin bearer tokens
#[derive(Clone)]
pub struct TokenSigner {
    secret: Arc<Vec<u8>>,
    ttl_secs: i64,
}

impl TokenSigner {
    pub fn new(secret: &[u8], ttl_secs: i64) -> Self {
        Self {
            secret: Arc::new(secret.to_vec()),
            ttl_secs,
        }
    }

    /// Per-process key; tokens do not survive a restart
    pub fn random(ttl_secs: i64) -> Self {
        let mut secret = Uuid::new_v4().as_bytes().to_vec();
        secret.extend_from_slice(Uuid::new_v4().as_bytes());
        Self::new(&secret, ttl_secs)
    }

    fn mac(&self, message: &str) -> CampResult<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| CampError::Configuration(format!("Invalid token secret: {}", e)))?;
        mac.update(message.as_bytes());
        Ok(mac)
    }

    pub fn issue(&self, username: &str, now: DateTime<Utc>) -> CampResult<IssuedToken> {
        let expires = now.timestamp() + self.ttl_secs;
        let claims = format!("{}.{}", hex::encode(username), expires);
        let signature = hex::encode(self.mac(&claims)?.finalize().into_bytes());

        Ok(IssuedToken {
            token: format!("{}.{}", claims, signature),
            expires_at: DateTime::from_timestamp(expires, 0).unwrap_or(now),
        })
    }

    /// Returns the username the token was issued to
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> CampResult<String> {
        let invalid = || CampError::Auth("Invalid token".to_string());

        let mut parts = token.splitn(3, '.');
        let (Some(user_hex), Some(expires), Some(signature)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };

        let signature = hex::decode(signature).map_err(|_| invalid())?;
        self.mac(&format!("{}.{}", user_hex, expires))?
            .verify_slice(&signature)
            .map_err(|_| invalid())?;

        let expires: i64 = expires.parse().map_err(|_| invalid())?;
        if expires <= now.timestamp() {
            return Err(CampError::Auth("Token expired".to_string()));
        }

        let username = hex::decode(user_hex).map_err(|_| invalid())?;
        String::from_utf8(username).map_err(|_| invalid())
    }
}

/// Extracts a verified admin from `Authorization: Bearer <token>`
#[derive(Debug, Clone)]
pub struct AdminSession {
    pub username: String,
}

impl AdminSession {
    pub fn from_headers(headers: &HeaderMap, state: &AppState) -> CampResult<Self> {
        let header = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| CampError::Auth("Missing bearer token".to_string()))?;

        let token = header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| CampError::Auth("Missing bearer token".to_string()))?;

        let username = state.tokens.verify(token, Utc::now())?;
        Ok(Self { username })
    }
}

impl FromRequestParts<AppState> for AdminSession {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Self::from_headers(&parts.headers, state).map_err(ApiError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_issue_and_verify() {
        let signer = TokenSigner::new(b"test-secret", 3600);
        let now = Utc::now();
        let issued = signer.issue("admin", now).unwrap();

        assert_eq!(signer.verify(&issued.token, now).unwrap(), "admin");
        assert_eq!(issued.expires_at.timestamp(), now.timestamp() + 3600);
    }

    #[test]
    fn test_expired_token() {
        let signer = TokenSigner::new(b"test-secret", 60);
        let now = Utc::now();
        let issued = signer.issue("admin", now).unwrap();

        let err = signer
            .verify(&issued.token, now + Duration::seconds(61))
            .unwrap_err();
        assert!(err.to_string().contains("expired"));
    }

    #[test]
    fn test_tampered_token() {
        let signer = TokenSigner::new(b"test-secret", 3600);
        let now = Utc::now();
        let issued = signer.issue("admin", now).unwrap();

        let forged = issued
            .token
            .replacen(&hex::encode("admin"), &hex::encode("root"), 1);
        assert!(signer.verify(&forged, now).is_err());
        assert!(signer.verify("garbage", now).is_err());
    }

    #[test]
    fn test_other_secret_rejected() {
        let now = Utc::now();
        let issued = TokenSigner::new(b"one", 3600).issue("admin", now).unwrap();
        assert!(TokenSigner::new(b"two", 3600).verify(&issued.token, now).is_err());
        assert!(TokenSigner::random(3600).verify(&issued.token, now).is_err());
    }
}
