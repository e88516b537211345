use axum::{
    extract::{FromRef, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        dto::{ConfirmResponse, LoginRequest, PublicUser, RegisterRequest, TokenResponse},
        jwt::JwtKeys,
        password::{hash_password, verify_password},
        repo::User,
    },
    state::AppState,
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/confirm_email/:token", get(confirm_email))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<Json<PublicUser>, (StatusCode, String)> {
    payload.email = payload.email.trim().to_lowercase();

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err((StatusCode::BAD_REQUEST, "Invalid email".into()));
    }

    if payload.password.len() < 8 {
        warn!("password too short");
        return Err((StatusCode::BAD_REQUEST, "Password too short".into()));
    }

    // Ensure email is not taken
    if let Ok(Some(_)) = User::find_by_email(&state.db, &payload.email).await {
        warn!(email = %payload.email, "email already registered");
        return Err((StatusCode::BAD_REQUEST, "Email already registered".into()));
    }

    let hash = match hash_password(&payload.password) {
        Ok(h) => h,
        Err(e) => {
            error!(error = %e, "hash_password failed");
            return Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()));
        }
    };

    let user = match User::create(&state.db, &payload.username, &payload.email, &hash).await {
        Ok(u) => u,
        Err(e) => {
            error!(error = %e, "create user failed");
            return Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()));
        }
    };

    // The confirmation mail goes out after the response; delivery failures
    // only ever become log lines.
    spawn_confirmation_email(&state, user.email.clone(), user.username.clone());

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok(Json(PublicUser::from(user)))
}

fn spawn_confirmation_email(state: &AppState, email: String, username: String) {
    let keys = JwtKeys::from_ref(state);
    let mailer = state.mailer.clone();
    let host = state.config.public_host.clone();
    tokio::spawn(async move {
        let token = match keys.sign_confirm(&email) {
            Ok(t) => t,
            Err(e) => {
                error!(error = %e, email = %email, "confirmation token sign failed");
                return;
            }
        };
        let confirmation_url = format!("{host}/auth/confirm_email/{token}");
        if let Err(e) = mailer
            .send_confirmation(&email, &username, &confirmation_url)
            .await
        {
            warn!(error = %e, email = %email, "confirmation email failed");
        }
    });
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, (StatusCode, String)> {
    payload.email = payload.email.trim().to_lowercase();

    let user = match User::find_by_email(&state.db, &payload.email).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            warn!(email = %payload.email, "login unknown email");
            return Err((StatusCode::UNAUTHORIZED, "Invalid credentials".into()));
        }
        Err(e) => {
            error!(error = %e, "find_by_email failed");
            return Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()));
        }
    };

    let ok = match verify_password(&payload.password, &user.password_hash) {
        Ok(v) => v,
        Err(e) => {
            error!(error = %e, "verify_password failed");
            return Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()));
        }
    };

    if !ok {
        warn!(email = %payload.email, user_id = %user.id, "login invalid password");
        return Err((StatusCode::UNAUTHORIZED, "Invalid credentials".into()));
    }

    let keys = JwtKeys::from_ref(&state);
    let access_token = match keys.sign_access(&user.email) {
        Ok(t) => t,
        Err(e) => {
            error!(error = %e, "jwt sign access failed");
            return Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()));
        }
    };

    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer",
    }))
}

#[instrument(skip(state, token))]
pub async fn confirm_email(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<ConfirmResponse>, (StatusCode, String)> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys.verify_confirm(&token).map_err(|_| {
        warn!("invalid confirmation token");
        (StatusCode::BAD_REQUEST, "Invalid token".to_string())
    })?;

    User::confirm_email(&state.db, &claims.sub)
        .await
        .map_err(|e| {
            error!(error = %e, email = %claims.sub, "confirm_email failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        })?;

    info!(email = %claims.sub, "email confirmed");
    Ok(Json(ConfirmResponse {
        message: "Email confirmed",
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_regex_accepts_plain_addresses() {
        assert!(is_valid_email("user@example.com"));
        assert!(is_valid_email("first.last@sub.domain.org"));
    }

    #[test]
    fn email_regex_rejects_garbage() {
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("user@nodot"));
        assert!(!is_valid_email("spaces in@address.com"));
    }

    #[test]
    fn token_response_serialization() {
        let response = TokenResponse {
            access_token: "abc.def.ghi".into(),
            token_type: "bearer",
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"access_token\":\"abc.def.ghi\""));
        assert!(json.contains("\"token_type\":\"bearer\""));
    }
}
