pub mod avatar;
pub mod repo;
pub mod store;

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::Identity;
use crate::profile::avatar::{AvatarError, AvatarUpload, MAX_AVATAR_BYTES};
use crate::shared::errors::StoreError;
use crate::shared::schema::user_profiles;
use crate::shared::state::AppState;

/// One row per authenticated user, keyed by the auth subject id. Created on
/// first access when missing.
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable)]
#[diesel(table_name = user_profiles)]
pub struct UserProfile {
    pub id: Uuid,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub location: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub plan: Option<String>,
    pub member_since: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize, AsChangeset)]
#[diesel(table_name = user_profiles)]
pub struct UpdateProfileData {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub location: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
}

fn reject(e: StoreError) -> (StatusCode, String) {
    (e.status_code(), e.to_string())
}

fn reject_avatar(e: AvatarError) -> (StatusCode, String) {
    match e {
        AvatarError::Invalid(v) => (StatusCode::BAD_REQUEST, v.to_string()),
        AvatarError::Store(s) => (s.status_code(), s.to_string()),
    }
}

pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    user: Identity,
) -> Result<Json<UserProfile>, (StatusCode, String)> {
    let store = state.sessions.profile_store(&user).await;
    let mut store = store.lock().await;
    store.load().await.map_err(reject)?;
    let profile = store
        .profile()
        .cloned()
        .ok_or((StatusCode::NOT_FOUND, "Profile not found".to_string()))?;
    Ok(Json(profile))
}

pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    user: Identity,
    Json(updates): Json<UpdateProfileData>,
) -> Result<Json<UserProfile>, (StatusCode, String)> {
    let store = state.sessions.profile_store(&user).await;
    let mut store = store.lock().await;
    store.load().await.map_err(reject)?;
    let profile = store.update(updates).await.map_err(reject)?;
    Ok(Json(profile))
}

pub async fn upload_avatar(
    State(state): State<Arc<AppState>>,
    user: Identity,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let mut upload = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?
    {
        if field.name() == Some("avatar") {
            let file_name = field.file_name().unwrap_or("avatar.bin").to_string();
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
            upload = Some(AvatarUpload {
                file_name,
                content_type,
                bytes,
            });
        }
    }

    let upload = upload.ok_or((
        StatusCode::BAD_REQUEST,
        "avatar field is required".to_string(),
    ))?;

    let store = state.sessions.profile_store(&user).await;
    let mut store = store.lock().await;
    store.load().await.map_err(reject)?;
    let url = store.upload_avatar(upload).await.map_err(reject_avatar)?;
    Ok(Json(serde_json::json!({ "avatar_url": url })))
}

pub async fn delete_avatar(
    State(state): State<Arc<AppState>>,
    user: Identity,
) -> Result<StatusCode, (StatusCode, String)> {
    let store = state.sessions.profile_store(&user).await;
    let mut store = store.lock().await;
    store.load().await.map_err(reject)?;
    store.delete_avatar().await.map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn configure_profile_api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/profile", get(get_profile).put(update_profile))
        .route(
            "/api/profile/avatar",
            post(upload_avatar).delete(delete_avatar),
        )
        // The multipart body must be allowed to exceed the 5 MiB avatar cap
        // so oversized uploads reach our validation instead of a blind 413.
        .layer(DefaultBodyLimit::max(MAX_AVATAR_BYTES * 2))
}
