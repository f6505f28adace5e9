pub mod repo;
pub mod store;
pub mod webhook;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use chrono::{DateTime, Utc};
use diesel::deserialize::FromSqlRow;
use diesel::expression::AsExpression;
use diesel::prelude::*;
use log::error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::Identity;
use crate::kb::webhook::KbProcessingPayload;
use crate::shared::errors::{Operation, StoreError, ValidationError};
use crate::shared::schema::{kb_documents, kb_urls};
use crate::shared::state::AppState;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsExpression, FromSqlRow, Default,
)]
#[diesel(sql_type = diesel::sql_types::Text)]
#[serde(rename_all = "snake_case")]
pub enum KbStatus {
    #[default]
    Pending,
    Processed,
    Failed,
}

impl KbStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            KbStatus::Pending => "pending",
            KbStatus::Processed => "processed",
            KbStatus::Failed => "failed",
        }
    }
}

impl FromStr for KbStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(KbStatus::Pending),
            "processed" => Ok(KbStatus::Processed),
            "failed" => Ok(KbStatus::Failed),
            other => Err(format!("unrecognized knowledge base status: {other}")),
        }
    }
}

impl fmt::Display for KbStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

mod sql_enum_impls {
    use super::KbStatus;
    use diesel::deserialize::{self, FromSql};
    use diesel::pg::{Pg, PgValue};
    use diesel::serialize::{self, IsNull, Output, ToSql};
    use diesel::sql_types::Text;
    use std::io::Write;

    impl ToSql<Text, Pg> for KbStatus {
        fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
            out.write_all(self.as_str().as_bytes())?;
            Ok(IsNull::No)
        }
    }

    impl FromSql<Text, Pg> for KbStatus {
        fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
            std::str::from_utf8(bytes.as_bytes())?
                .parse()
                .map_err(Into::into)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable)]
#[diesel(table_name = kb_urls)]
pub struct KnowledgeBaseUrl {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub drive_url: String,
    pub status: Option<KbStatus>,
    pub created_at: DateTime<Utc>,
}

/// Row extracted from a knowledge-base URL by the external processing
/// pipeline. Only the foreign key matters to this service: documents are
/// cleaned up when their URL goes away.
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable)]
#[diesel(table_name = kb_documents)]
pub struct KbDocument {
    pub id: Uuid,
    pub url_id: Uuid,
    pub content: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateUrlData {
    pub title: String,
    pub drive_url: String,
}

fn reject(e: StoreError) -> (StatusCode, String) {
    (e.status_code(), e.to_string())
}

pub async fn list_urls(
    State(state): State<Arc<AppState>>,
    user: Identity,
) -> Result<Json<Vec<KnowledgeBaseUrl>>, (StatusCode, String)> {
    let store = state.sessions.kb_store(&user).await;
    let mut store = store.lock().await;
    store.load().await.map_err(reject)?;
    Ok(Json(store.urls().to_vec()))
}

pub async fn create_url(
    State(state): State<Arc<AppState>>,
    user: Identity,
    Json(data): Json<CreateUrlData>,
) -> Result<StatusCode, (StatusCode, String)> {
    if data.title.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            ValidationError::MissingField("title").to_string(),
        ));
    }
    if data.drive_url.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            ValidationError::MissingField("drive_url").to_string(),
        ));
    }

    let store = state.sessions.kb_store(&user).await;
    let mut store = store.lock().await;
    store.create(data.title, data.drive_url).await.map_err(reject)?;
    Ok(StatusCode::CREATED)
}

pub async fn delete_url(
    State(state): State<Arc<AppState>>,
    user: Identity,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    let store = state.sessions.kb_store(&user).await;
    let mut store = store.lock().await;
    store.delete(id).await.map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Hand a knowledge-base URL to the external processing webhook. The POST is
/// one-shot: any non-2xx answer is a failure and there is no retry.
pub async fn process_url(
    State(state): State<Arc<AppState>>,
    user: Identity,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let url = {
        let store = state.sessions.kb_store(&user).await;
        let mut store = store.lock().await;
        store.load().await.map_err(reject)?;
        store
            .urls()
            .iter()
            .find(|u| u.id == id)
            .cloned()
            .ok_or((StatusCode::NOT_FOUND, "URL not found".to_string()))?
    };

    let username = {
        let store = state.sessions.profile_store(&user).await;
        let mut store = store.lock().await;
        store.load().await.map_err(reject)?;
        store
            .profile()
            .and_then(|p| p.full_name.clone())
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| user.email_local_part().to_string())
    };

    let payload = KbProcessingPayload {
        user_id: user.id,
        username,
        url_id: url.id,
        drive_url: url.drive_url,
        title: url.title,
    };

    state.webhook.send_for_processing(&payload).await.map_err(|e| {
        error!("error sending url {id} to processing webhook: {e}");
        (
            StatusCode::BAD_GATEWAY,
            StoreError::new(Operation::Send, "URL to webhook").to_string(),
        )
    })?;

    Ok(Json(serde_json::json!({ "sent": true, "url_id": id })))
}

pub fn configure_kb_api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/kb/urls", get(list_urls).post(create_url))
        .route("/api/kb/urls/:id", axum::routing::delete(delete_url))
        .route("/api/kb/urls/:id/process", post(process_url))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kb_status_round_trips_through_strings() {
        for status in [KbStatus::Pending, KbStatus::Processed, KbStatus::Failed] {
            assert_eq!(status.as_str().parse::<KbStatus>().unwrap(), status);
        }
        assert!("queued".parse::<KbStatus>().is_err());
    }
}
