use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use bytes::Bytes;
use tracing::{error, instrument, warn};

use crate::{
    auth::{jwt::CurrentUser, repo::User},
    state::AppState,
};

use super::dto::{ContactPayload, Pagination, SearchParams};
use super::repo::Contact;

pub fn contacts_routes() -> Router<AppState> {
    Router::new()
        .route("/contacts", post(create_contact).get(list_contacts))
        .route("/contacts/search", get(search_contacts))
        .route("/contacts/upcoming_birthdays", get(upcoming_birthdays))
        .route(
            "/contacts/avatar",
            patch(update_avatar).layer(DefaultBodyLimit::max(10 * 1024 * 1024)),
        )
        .route(
            "/contacts/:id",
            get(read_contact).put(update_contact).delete(delete_contact),
        )
}

#[instrument(skip(state, payload, _auth))]
pub async fn create_contact(
    State(state): State<AppState>,
    _auth: CurrentUser,
    Json(payload): Json<ContactPayload>,
) -> Result<Json<Contact>, (StatusCode, String)> {
    let contact = Contact::create(&state.db, &payload)
        .await
        .map_err(internal)?;
    Ok(Json(contact))
}

#[instrument(skip(state, _auth))]
pub async fn list_contacts(
    State(state): State<AppState>,
    _auth: CurrentUser,
    Query(p): Query<Pagination>,
) -> Result<Json<Vec<Contact>>, (StatusCode, String)> {
    let contacts = Contact::list(&state.db, p.skip, p.limit)
        .await
        .map_err(internal)?;
    Ok(Json(contacts))
}

#[instrument(skip(state, _auth))]
pub async fn read_contact(
    State(state): State<AppState>,
    _auth: CurrentUser,
    Path(id): Path<i32>,
) -> Result<Json<Contact>, (StatusCode, String)> {
    match Contact::find(&state.db, id).await.map_err(internal)? {
        Some(contact) => Ok(Json(contact)),
        None => Err((StatusCode::NOT_FOUND, "Contact not found".into())),
    }
}

#[instrument(skip(state, payload, _auth))]
pub async fn update_contact(
    State(state): State<AppState>,
    _auth: CurrentUser,
    Path(id): Path<i32>,
    Json(payload): Json<ContactPayload>,
) -> Result<Json<Contact>, (StatusCode, String)> {
    match Contact::update(&state.db, id, &payload)
        .await
        .map_err(internal)?
    {
        Some(contact) => Ok(Json(contact)),
        None => Err((StatusCode::NOT_FOUND, "Contact not found".into())),
    }
}

#[instrument(skip(state, _auth))]
pub async fn delete_contact(
    State(state): State<AppState>,
    _auth: CurrentUser,
    Path(id): Path<i32>,
) -> Result<Json<Contact>, (StatusCode, String)> {
    match Contact::delete(&state.db, id).await.map_err(internal)? {
        Some(contact) => Ok(Json(contact)),
        None => Err((StatusCode::NOT_FOUND, "Contact not found".into())),
    }
}

#[instrument(skip(state, _auth))]
pub async fn search_contacts(
    State(state): State<AppState>,
    _auth: CurrentUser,
    Query(p): Query<SearchParams>,
) -> Result<Json<Vec<Contact>>, (StatusCode, String)> {
    if p.query.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "query must not be empty".into()));
    }
    let contacts = Contact::search(&state.db, &p.query)
        .await
        .map_err(internal)?;
    Ok(Json(contacts))
}

#[instrument(skip(state, _auth))]
pub async fn upcoming_birthdays(
    State(state): State<AppState>,
    _auth: CurrentUser,
) -> Result<Json<Vec<Contact>>, (StatusCode, String)> {
    let contacts = Contact::upcoming_birthdays(&state.db)
        .await
        .map_err(internal)?;
    Ok(Json(contacts))
}

/// PATCH /contacts/avatar (multipart, field `file`)
#[instrument(skip(state, user, mp))]
pub async fn update_avatar(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    mut mp: Multipart,
) -> Result<Json<User>, (StatusCode, String)> {
    let mut file: Option<(Bytes, String)> = None;
    while let Ok(Some(field)) = mp.next_field().await {
        if field.name() == Some("file") {
            let content_type = field
                .content_type()
                .map(|s| s.to_string())
                .unwrap_or_else(|| "application/octet-stream".into());
            let data = field.bytes().await.map_err(|e| {
                warn!(error = %e, "failed to read avatar upload");
                (StatusCode::BAD_REQUEST, "Failed to read file".to_string())
            })?;
            file = Some((data, content_type));
            break;
        }
    }

    let (data, content_type) =
        file.ok_or((StatusCode::BAD_REQUEST, "No file provided".to_string()))?;

    let public_id = format!("avatars/{}", user.username);
    let url = state
        .images
        .upload_avatar(data, &content_type, &public_id)
        .await
        .map_err(|e| {
            error!(error = %e, user_id = %user.id, "avatar upload failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to upload avatar: {e}"),
            )
        })?;

    let updated = User::update_avatar(&state.db, &user.email, &url)
        .await
        .map_err(internal)?;
    Ok(Json(updated))
}

fn internal<E: std::fmt::Display>(e: E) -> (StatusCode, String) {
    error!(error = %e, "internal error");
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}
