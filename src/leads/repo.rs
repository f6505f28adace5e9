use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use log::debug;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::leads::{Lead, LeadFilters, UpdateLeadData};
use crate::realtime::ChangeEvent;
use crate::shared::errors::RepoError;
use crate::shared::schema::leads;
use crate::shared::utils::DbPool;

/// Table-scoped CRUD against the lead store. Every operation that touches an
/// existing row carries the owner id alongside the row id; the implementation
/// must apply both predicates.
#[async_trait]
pub trait LeadRepository: Send + Sync {
    async fn select(&self, owner: Uuid, filters: &LeadFilters) -> Result<Vec<Lead>, RepoError>;
    async fn insert(&self, lead: Lead) -> Result<Lead, RepoError>;
    async fn update(&self, owner: Uuid, id: Uuid, changes: UpdateLeadData)
        -> Result<Lead, RepoError>;
    async fn delete(&self, owner: Uuid, id: Uuid) -> Result<(), RepoError>;
}

/// Postgres-backed repository. Mutations publish a [`ChangeEvent`] on the
/// change feed after they commit; nobody listening is not an error.
pub struct PgLeadRepository {
    pool: DbPool,
    feed: broadcast::Sender<ChangeEvent>,
}

impl PgLeadRepository {
    pub fn new(pool: DbPool, feed: broadcast::Sender<ChangeEvent>) -> Self {
        Self { pool, feed }
    }

    fn publish(&self, event: ChangeEvent) {
        if let Err(e) = self.feed.send(event) {
            debug!("no dashboard listening on the change feed: {e}");
        }
    }
}

#[async_trait]
impl LeadRepository for PgLeadRepository {
    async fn select(&self, owner: Uuid, filters: &LeadFilters) -> Result<Vec<Lead>, RepoError> {
        let mut conn = self.pool.get()?;

        let mut q = leads::table
            .filter(leads::created_by.eq(owner))
            .into_boxed();

        if !filters.search.is_empty() {
            let pattern = format!("%{}%", filters.search);
            q = q.filter(
                leads::full_name
                    .ilike(pattern.clone())
                    .or(leads::email.ilike(pattern)),
            );
        }

        if let Some(status) = filters.status {
            q = q.filter(leads::status.eq(status));
        }

        if let Some(source) = filters.source {
            q = q.filter(leads::source.eq(source));
        }

        let rows = q.order(leads::created_at.desc()).load::<Lead>(&mut conn)?;
        Ok(rows)
    }

    async fn insert(&self, lead: Lead) -> Result<Lead, RepoError> {
        let mut conn = self.pool.get()?;

        diesel::insert_into(leads::table)
            .values(&lead)
            .execute(&mut conn)?;

        self.publish(ChangeEvent::insert(lead.clone()));
        Ok(lead)
    }

    async fn update(
        &self,
        owner: Uuid,
        id: Uuid,
        changes: UpdateLeadData,
    ) -> Result<Lead, RepoError> {
        let mut conn = self.pool.get()?;

        let row: Lead = diesel::update(
            leads::table
                .filter(leads::id.eq(id))
                .filter(leads::created_by.eq(owner)),
        )
        .set((changes, leads::updated_at.eq(Utc::now())))
        .get_result(&mut conn)?;

        self.publish(ChangeEvent::update(row.clone()));
        Ok(row)
    }

    async fn delete(&self, owner: Uuid, id: Uuid) -> Result<(), RepoError> {
        let mut conn = self.pool.get()?;

        let old: Lead = leads::table
            .filter(leads::id.eq(id))
            .filter(leads::created_by.eq(owner))
            .first(&mut conn)?;

        diesel::delete(
            leads::table
                .filter(leads::id.eq(id))
                .filter(leads::created_by.eq(owner)),
        )
        .execute(&mut conn)?;

        self.publish(ChangeEvent::delete(old));
        Ok(())
    }
}
