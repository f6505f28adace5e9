pub mod repo;
pub mod store;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};

use chrono::{DateTime, Utc};
use diesel::deserialize::FromSqlRow;
use diesel::expression::AsExpression;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::Identity;
use crate::shared::errors::{StoreError, ValidationError};
use crate::shared::schema::leads;
use crate::shared::state::AppState;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsExpression, FromSqlRow, Default,
)]
#[diesel(sql_type = diesel::sql_types::Text)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    #[default]
    New,
    Contacted,
    Interested,
    Hot,
    Warm,
    Cold,
    Won,
    Lost,
}

impl LeadStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            LeadStatus::New => "new",
            LeadStatus::Contacted => "contacted",
            LeadStatus::Interested => "interested",
            LeadStatus::Hot => "hot",
            LeadStatus::Warm => "warm",
            LeadStatus::Cold => "cold",
            LeadStatus::Won => "won",
            LeadStatus::Lost => "lost",
        }
    }
}

impl FromStr for LeadStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(LeadStatus::New),
            "contacted" => Ok(LeadStatus::Contacted),
            "interested" => Ok(LeadStatus::Interested),
            "hot" => Ok(LeadStatus::Hot),
            "warm" => Ok(LeadStatus::Warm),
            "cold" => Ok(LeadStatus::Cold),
            "won" => Ok(LeadStatus::Won),
            "lost" => Ok(LeadStatus::Lost),
            other => Err(format!("unrecognized lead status: {other}")),
        }
    }
}

impl fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsExpression, FromSqlRow, Default,
)]
#[diesel(sql_type = diesel::sql_types::Text)]
#[serde(rename_all = "snake_case")]
pub enum LeadSource {
    Chat,
    VisitingCard,
    #[default]
    Manual,
}

impl LeadSource {
    pub fn as_str(self) -> &'static str {
        match self {
            LeadSource::Chat => "chat",
            LeadSource::VisitingCard => "visiting_card",
            LeadSource::Manual => "manual",
        }
    }
}

impl FromStr for LeadSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chat" => Ok(LeadSource::Chat),
            "visiting_card" => Ok(LeadSource::VisitingCard),
            "manual" => Ok(LeadSource::Manual),
            other => Err(format!("unrecognized lead source: {other}")),
        }
    }
}

impl fmt::Display for LeadSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

mod sql_enum_impls {
    use super::{LeadStatus, LeadSource};
    use diesel::deserialize::{self, FromSql};
    use diesel::pg::{Pg, PgValue};
    use diesel::serialize::{self, IsNull, Output, ToSql};
    use diesel::sql_types::Text;
    use std::io::Write;

    impl ToSql<Text, Pg> for LeadStatus {
        fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
            out.write_all(self.as_str().as_bytes())?;
            Ok(IsNull::No)
        }
    }

    impl FromSql<Text, Pg> for LeadStatus {
        fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
            std::str::from_utf8(bytes.as_bytes())?
                .parse()
                .map_err(Into::into)
        }
    }

    impl ToSql<Text, Pg> for LeadSource {
        fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
            out.write_all(self.as_str().as_bytes())?;
            Ok(IsNull::No)
        }
    }

    impl FromSql<Text, Pg> for LeadSource {
        fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
            std::str::from_utf8(bytes.as_bytes())?
                .parse()
                .map_err(Into::into)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable)]
#[diesel(table_name = leads)]
pub struct Lead {
    pub id: Uuid,
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub designation: Option<String>,
    pub inquiry_type: Option<String>,
    pub status: LeadStatus,
    pub note: Option<String>,
    pub source: LeadSource,
    pub row_content: Option<serde_json::Value>,
    pub assigned_to: Option<Uuid>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateLeadData {
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub designation: Option<String>,
    pub inquiry_type: Option<String>,
    pub status: Option<LeadStatus>,
    pub note: Option<String>,
    pub source: Option<LeadSource>,
}

#[derive(Debug, Clone, Default, Deserialize, AsChangeset)]
#[diesel(table_name = leads)]
pub struct UpdateLeadData {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub designation: Option<String>,
    pub inquiry_type: Option<String>,
    pub status: Option<LeadStatus>,
    pub note: Option<String>,
}

/// The query descriptor a lead load runs under. `None` on an enum field is
/// the "all" sentinel: the predicate is omitted entirely.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeadFilters {
    pub search: String,
    pub status: Option<LeadStatus>,
    pub source: Option<LeadSource>,
}

impl LeadFilters {
    /// Shallow merge: absent patch fields leave the current value alone.
    pub fn merge(&mut self, patch: LeadFilterPatch) {
        if let Some(search) = patch.search {
            self.search = search;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(source) = patch.source {
            self.source = source;
        }
    }

    /// Mirror of the remote predicate, used by the in-memory repository and
    /// by tests: owner scoping is handled by the caller, this covers the
    /// filter descriptor itself.
    pub fn matches(&self, lead: &Lead) -> bool {
        if !self.search.is_empty() {
            let needle = self.search.to_lowercase();
            let name_hit = lead.full_name.to_lowercase().contains(&needle);
            let email_hit = lead
                .email
                .as_deref()
                .map(|e| e.to_lowercase().contains(&needle))
                .unwrap_or(false);
            if !name_hit && !email_hit {
                return false;
            }
        }
        if let Some(status) = self.status {
            if lead.status != status {
                return false;
            }
        }
        if let Some(source) = self.source {
            if lead.source != source {
                return false;
            }
        }
        true
    }
}

/// Wire form of a filter change. The literal string `all` clears an enum
/// predicate, a missing parameter keeps whatever was set before.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LeadFilterPatch {
    pub search: Option<String>,
    #[serde(default, deserialize_with = "de_status_filter")]
    pub status: Option<Option<LeadStatus>>,
    #[serde(default, deserialize_with = "de_source_filter")]
    pub source: Option<Option<LeadSource>>,
}

fn de_status_filter<'de, D>(deserializer: D) -> Result<Option<Option<LeadStatus>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref() {
        None => Ok(None),
        Some("all") => Ok(Some(None)),
        Some(value) => value
            .parse()
            .map(|s| Some(Some(s)))
            .map_err(serde::de::Error::custom),
    }
}

fn de_source_filter<'de, D>(deserializer: D) -> Result<Option<Option<LeadSource>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref() {
        None => Ok(None),
        Some("all") => Ok(Some(None)),
        Some(value) => value
            .parse()
            .map(|s| Some(Some(s)))
            .map_err(serde::de::Error::custom),
    }
}

fn reject(e: StoreError) -> (StatusCode, String) {
    (e.status_code(), e.to_string())
}

pub async fn list_leads(
    State(state): State<Arc<AppState>>,
    user: Identity,
    Query(patch): Query<LeadFilterPatch>,
) -> Result<Json<Vec<Lead>>, (StatusCode, String)> {
    let store = state.sessions.lead_store(&user).await;
    let mut store = store.lock().await;
    store.update_filters(patch).await.map_err(reject)?;
    Ok(Json(store.leads().to_vec()))
}

pub async fn create_lead(
    State(state): State<Arc<AppState>>,
    user: Identity,
    Json(data): Json<CreateLeadData>,
) -> Result<StatusCode, (StatusCode, String)> {
    if data.full_name.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            ValidationError::MissingField("full_name").to_string(),
        ));
    }

    let store = state.sessions.lead_store(&user).await;
    let mut store = store.lock().await;
    store.create(data).await.map_err(reject)?;
    Ok(StatusCode::CREATED)
}

pub async fn update_lead(
    State(state): State<Arc<AppState>>,
    user: Identity,
    Path(id): Path<Uuid>,
    Json(changes): Json<UpdateLeadData>,
) -> Result<StatusCode, (StatusCode, String)> {
    let store = state.sessions.lead_store(&user).await;
    let mut store = store.lock().await;
    store.update(id, changes).await.map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_lead(
    State(state): State<Arc<AppState>>,
    user: Identity,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    let store = state.sessions.lead_store(&user).await;
    let mut store = store.lock().await;
    store.delete(id).await.map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn configure_lead_api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/leads", get(list_leads).post(create_lead))
        .route("/api/leads/:id", axum::routing::put(update_lead).delete(delete_lead))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            LeadStatus::New,
            LeadStatus::Contacted,
            LeadStatus::Interested,
            LeadStatus::Hot,
            LeadStatus::Warm,
            LeadStatus::Cold,
            LeadStatus::Won,
            LeadStatus::Lost,
        ] {
            assert_eq!(status.as_str().parse::<LeadStatus>().unwrap(), status);
        }
        assert!("stale".parse::<LeadStatus>().is_err());
    }

    #[test]
    fn source_round_trips_through_strings() {
        for source in [LeadSource::Chat, LeadSource::VisitingCard, LeadSource::Manual] {
            assert_eq!(source.as_str().parse::<LeadSource>().unwrap(), source);
        }
    }

    #[test]
    fn filter_patch_all_clears_predicate() {
        let patch: LeadFilterPatch =
            serde_urlencoded::from_str("search=sarah&status=hot&source=all").unwrap();
        assert_eq!(patch.search.as_deref(), Some("sarah"));
        assert_eq!(patch.status, Some(Some(LeadStatus::Hot)));
        assert_eq!(patch.source, Some(None));

        let mut filters = LeadFilters {
            search: String::new(),
            status: Some(LeadStatus::Cold),
            source: Some(LeadSource::Chat),
        };
        filters.merge(patch);
        assert_eq!(filters.search, "sarah");
        assert_eq!(filters.status, Some(LeadStatus::Hot));
        assert_eq!(filters.source, None);
    }

    #[test]
    fn filter_patch_absent_fields_leave_filters_alone() {
        let patch: LeadFilterPatch = serde_urlencoded::from_str("").unwrap();
        let mut filters = LeadFilters {
            search: "sarah".to_string(),
            status: Some(LeadStatus::Hot),
            source: None,
        };
        let before = filters.clone();
        filters.merge(patch);
        assert_eq!(filters, before);
    }

    #[test]
    fn composed_filters_are_a_logical_and() {
        let lead = Lead {
            id: Uuid::new_v4(),
            full_name: "Sarah Connor".to_string(),
            email: Some("sarah@example.com".to_string()),
            phone: None,
            company: None,
            designation: None,
            inquiry_type: None,
            status: LeadStatus::Hot,
            note: None,
            source: LeadSource::Chat,
            row_content: None,
            assigned_to: None,
            created_by: Uuid::new_v4(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let both = LeadFilters {
            search: "SARAH".to_string(),
            status: Some(LeadStatus::Hot),
            source: Some(LeadSource::Chat),
        };
        assert!(both.matches(&lead));

        let wrong_status = LeadFilters {
            status: Some(LeadStatus::Cold),
            ..both.clone()
        };
        assert!(!wrong_status.matches(&lead));
    }
}
