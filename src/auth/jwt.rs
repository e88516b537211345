use std::time::Duration;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts, StatusCode},
    response::{IntoResponse, Response},
};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{debug, warn};

use crate::auth::repo::User;
use crate::config::JwtConfig;
use crate::state::AppState;

/// Token type used to distinguish access tokens from email-confirmation tokens.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Confirm,
}

/// JWT payload; `sub` carries the user's email.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub iat: usize,
    pub exp: usize,
    pub iss: String,
    pub aud: String,
    pub kind: TokenKind,
}

/// Holds JWT signing and verification keys with config data.
#[derive(Clone)]
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub algorithm: Algorithm,
    pub issuer: String,
    pub audience: String,
    pub access_ttl: Duration,
    pub confirm_ttl: Duration,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        let JwtConfig {
            secret,
            algorithm,
            issuer,
            audience,
            access_ttl_minutes,
            confirm_ttl_hours,
        } = state.config.jwt.clone();
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            algorithm,
            issuer,
            audience,
            access_ttl: Duration::from_secs((access_ttl_minutes as u64) * 60),
            confirm_ttl: Duration::from_secs((confirm_ttl_hours as u64) * 3600),
        }
    }
}

impl JwtKeys {
    fn sign_with_kind(&self, email: &str, kind: TokenKind) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Confirm => self.confirm_ttl,
        };
        let exp = now + TimeDuration::seconds(ttl.as_secs() as i64);
        let claims = Claims {
            sub: email.to_string(),
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            kind,
        };
        let token = encode(&Header::new(self.algorithm), &claims, &self.encoding)?;
        debug!(email = %email, kind = ?kind, "jwt signed");
        Ok(token)
    }

    pub fn sign_access(&self, email: &str) -> anyhow::Result<String> {
        self.sign_with_kind(email, TokenKind::Access)
    }
    pub fn sign_confirm(&self, email: &str) -> anyhow::Result<String> {
        self.sign_with_kind(email, TokenKind::Confirm)
    }

    /// Signature, expiry, issuer and audience failures all land in the same
    /// error; callers cannot tell expired from tampered from malformed.
    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let mut validation = Validation::new(self.algorithm);
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        debug!(email = %data.claims.sub, kind = ?data.claims.kind, "jwt verified");
        Ok(data.claims)
    }

    pub fn verify_confirm(&self, token: &str) -> anyhow::Result<Claims> {
        let claims = self.verify(token)?;
        if claims.kind != TokenKind::Confirm {
            anyhow::bail!("not a confirmation token");
        }
        Ok(claims)
    }
}

/// 401 rejection carrying the WWW-Authenticate hint required for bearer auth.
pub struct AuthRejection(String);

impl AuthRejection {
    fn new(msg: &str) -> Self {
        Self(msg.to_string())
    }
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            [(header::WWW_AUTHENTICATE, "Bearer")],
            self.0,
        )
            .into_response()
    }
}

/// Extracts the bearer token, verifies it and loads the matching user row.
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AuthRejection::new("Missing Authorization header"))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .or_else(|| auth_header.strip_prefix("bearer "))
            .ok_or_else(|| AuthRejection::new("Invalid Authorization header"))?;

        let keys = JwtKeys::from_ref(state);
        let claims = match keys.verify(token) {
            Ok(c) => c,
            Err(_) => {
                warn!("invalid or expired token");
                return Err(AuthRejection::new("Could not validate credentials"));
            }
        };

        if claims.kind != TokenKind::Access {
            return Err(AuthRejection::new("Access token required"));
        }

        let user = User::find_by_email(&state.db, &claims.sub)
            .await
            .ok()
            .flatten()
            .ok_or_else(|| AuthRejection::new("Could not validate credentials"))?;

        Ok(CurrentUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_keys() -> JwtKeys {
        let state = AppState::fake();
        JwtKeys::from_ref(&state)
    }

    #[tokio::test]
    async fn sign_and_verify_access_token() {
        let keys = make_keys();
        let token = keys.sign_access("user@example.com").expect("sign access");
        let claims = keys.verify(&token).expect("verify token");
        assert_eq!(claims.sub, "user@example.com");
        assert_eq!(claims.iss, "test-issuer");
        assert_eq!(claims.aud, "test-aud");
        assert_eq!(claims.kind, TokenKind::Access);
    }

    #[tokio::test]
    async fn sign_and_verify_confirm_token() {
        let keys = make_keys();
        let token = keys.sign_confirm("user@example.com").expect("sign confirm");
        let claims = keys.verify_confirm(&token).expect("verify confirm");
        assert_eq!(claims.sub, "user@example.com");
        assert_eq!(claims.kind, TokenKind::Confirm);
    }

    #[tokio::test]
    async fn verify_confirm_rejects_access_token() {
        let keys = make_keys();
        let token = keys.sign_access("user@example.com").expect("sign access");
        let err = keys.verify_confirm(&token).unwrap_err();
        assert!(err.to_string().contains("not a confirmation token"));
    }

    #[tokio::test]
    async fn verify_rejects_expired_token() {
        let keys = make_keys();
        let now = OffsetDateTime::now_utc().unix_timestamp();
        // Expired well past the default validation leeway.
        let claims = Claims {
            sub: "user@example.com".into(),
            iat: (now - 7200) as usize,
            exp: (now - 3600) as usize,
            iss: keys.issuer.clone(),
            aud: keys.audience.clone(),
            kind: TokenKind::Access,
        };
        let token = encode(&Header::new(keys.algorithm), &claims, &keys.encoding)
            .expect("encode expired token");
        assert!(keys.verify(&token).is_err());
    }

    #[tokio::test]
    async fn verify_rejects_foreign_signature() {
        let keys = make_keys();
        let mut other = make_keys();
        other.encoding = EncodingKey::from_secret(b"some-other-secret");
        other.decoding = DecodingKey::from_secret(b"some-other-secret");
        let token = other.sign_access("user@example.com").expect("sign");
        assert!(keys.verify(&token).is_err());
    }
}
