use async_trait::async_trait;
use diesel::prelude::*;
use uuid::Uuid;

use crate::kb::KnowledgeBaseUrl;
use crate::shared::errors::RepoError;
use crate::shared::schema::{kb_documents, kb_urls};
use crate::shared::utils::DbPool;

#[async_trait]
pub trait KnowledgeBaseRepository: Send + Sync {
    async fn select(&self, owner: Uuid) -> Result<Vec<KnowledgeBaseUrl>, RepoError>;
    async fn insert(&self, url: KnowledgeBaseUrl) -> Result<KnowledgeBaseUrl, RepoError>;
    /// Remove all document rows extracted from the given URL, but only when
    /// that URL belongs to `owner`; a foreign URL deletes nothing. Returns
    /// how many were deleted.
    async fn delete_documents(&self, owner: Uuid, url_id: Uuid) -> Result<usize, RepoError>;
    async fn delete(&self, owner: Uuid, id: Uuid) -> Result<(), RepoError>;
}

pub struct PgKnowledgeBaseRepository {
    pool: DbPool,
}

impl PgKnowledgeBaseRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl KnowledgeBaseRepository for PgKnowledgeBaseRepository {
    async fn select(&self, owner: Uuid) -> Result<Vec<KnowledgeBaseUrl>, RepoError> {
        let mut conn = self.pool.get()?;

        let rows = kb_urls::table
            .filter(kb_urls::user_id.eq(owner))
            .order(kb_urls::created_at.desc())
            .load::<KnowledgeBaseUrl>(&mut conn)?;
        Ok(rows)
    }

    async fn insert(&self, url: KnowledgeBaseUrl) -> Result<KnowledgeBaseUrl, RepoError> {
        let mut conn = self.pool.get()?;

        diesel::insert_into(kb_urls::table)
            .values(&url)
            .execute(&mut conn)?;
        Ok(url)
    }

    async fn delete_documents(&self, owner: Uuid, url_id: Uuid) -> Result<usize, RepoError> {
        let mut conn = self.pool.get()?;

        let owned_url = kb_urls::table
            .filter(kb_urls::id.eq(url_id))
            .filter(kb_urls::user_id.eq(owner))
            .select(kb_urls::id);

        let deleted = diesel::delete(
            kb_documents::table.filter(kb_documents::url_id.eq_any(owned_url)),
        )
        .execute(&mut conn)?;
        Ok(deleted)
    }

    async fn delete(&self, owner: Uuid, id: Uuid) -> Result<(), RepoError> {
        let mut conn = self.pool.get()?;

        let deleted = diesel::delete(
            kb_urls::table
                .filter(kb_urls::id.eq(id))
                .filter(kb_urls::user_id.eq(owner)),
        )
        .execute(&mut conn)?;

        if deleted == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}
