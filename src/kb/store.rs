use chrono::Utc;
use log::error;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::Identity;
use crate::kb::repo::KnowledgeBaseRepository;
use crate::kb::{KbStatus, KnowledgeBaseUrl};
use crate::shared::errors::{Operation, StoreError};

/// Per-identity mirror of the user's knowledge-base URLs.
pub struct KnowledgeBaseStore<R> {
    repo: Arc<R>,
    identity: Identity,
    urls: Vec<KnowledgeBaseUrl>,
    loading: bool,
    creating: bool,
    deleting: bool,
}

impl<R: KnowledgeBaseRepository> KnowledgeBaseStore<R> {
    pub fn new(repo: Arc<R>, identity: Identity) -> Self {
        Self {
            repo,
            identity,
            urls: Vec::new(),
            loading: false,
            creating: false,
            deleting: false,
        }
    }

    pub fn urls(&self) -> &[KnowledgeBaseUrl] {
        &self.urls
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_creating(&self) -> bool {
        self.creating
    }

    pub fn is_deleting(&self) -> bool {
        self.deleting
    }

    pub async fn load(&mut self) -> Result<(), StoreError> {
        self.loading = true;
        let result = self.repo.select(self.identity.id).await;
        self.loading = false;

        match result {
            Ok(rows) => {
                self.urls = rows;
                Ok(())
            }
            Err(e) => {
                error!("error loading urls for {}: {e}", self.identity.id);
                Err(StoreError::new(Operation::Load, "URLs"))
            }
        }
    }

    pub async fn create(&mut self, title: String, drive_url: String) -> Result<(), StoreError> {
        self.creating = true;

        let url = KnowledgeBaseUrl {
            id: Uuid::new_v4(),
            user_id: self.identity.id,
            title,
            drive_url,
            status: Some(KbStatus::Pending),
            created_at: Utc::now(),
        };

        let result = self.repo.insert(url).await;
        let outcome = match result {
            Ok(_) => {
                let _ = self.load().await;
                Ok(())
            }
            Err(e) => {
                error!("error creating url for {}: {e}", self.identity.id);
                Err(StoreError::new(Operation::Create, "URL"))
            }
        };
        self.creating = false;
        outcome
    }

    /// Delete a URL and, best effort, the document rows extracted from it.
    /// A failed document cleanup is logged and the URL delete proceeds; an
    /// orphaned document is acceptable, a dangling URL is not. The cleanup
    /// is owner-scoped the same as the URL delete, so a foreign id touches
    /// nothing.
    pub async fn delete(&mut self, id: Uuid) -> Result<(), StoreError> {
        self.deleting = true;

        if let Err(e) = self.repo.delete_documents(self.identity.id, id).await {
            error!("error deleting documents for url {id}: {e}");
        }

        let result = self.repo.delete(self.identity.id, id).await;
        let outcome = match result {
            Ok(()) => {
                let _ = self.load().await;
                Ok(())
            }
            Err(e) => {
                error!("error deleting url {id} for {}: {e}", self.identity.id);
                Err(StoreError::new(Operation::Delete, "URL"))
            }
        };
        self.deleting = false;
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::test_utils::{test_identity, MemoryKnowledgeBaseRepository};

    #[tokio::test]
    async fn create_defaults_to_pending_status() {
        let me = test_identity();
        let repo = Arc::new(MemoryKnowledgeBaseRepository::default());
        let mut store = KnowledgeBaseStore::new(repo, me);

        store
            .create("Q3 price list".to_string(), "https://drive/x".to_string())
            .await
            .unwrap();

        assert_eq!(store.urls().len(), 1);
        assert_eq!(store.urls()[0].status, Some(KbStatus::Pending));
        assert!(!store.is_creating());
    }

    #[tokio::test]
    async fn load_is_owner_scoped() {
        let me = test_identity();
        let repo = Arc::new(MemoryKnowledgeBaseRepository::default());
        repo.seed_url(me.id, "mine").await;
        repo.seed_url(Uuid::new_v4(), "theirs").await;

        let mut store = KnowledgeBaseStore::new(repo, me);
        store.load().await.unwrap();

        assert_eq!(store.urls().len(), 1);
        assert_eq!(store.urls()[0].title, "mine");
    }

    #[tokio::test]
    async fn delete_removes_url_and_its_documents() {
        let me = test_identity();
        let repo = Arc::new(MemoryKnowledgeBaseRepository::default());
        let url_id = repo.seed_url(me.id, "doomed").await;
        repo.seed_document(url_id).await;
        repo.seed_document(url_id).await;

        let mut store = KnowledgeBaseStore::new(repo.clone(), me);
        store.delete(url_id).await.unwrap();

        assert!(store.urls().is_empty());
        assert_eq!(repo.document_count(url_id).await, 0);
    }

    #[tokio::test]
    async fn failed_document_cleanup_does_not_block_url_delete() {
        let me = test_identity();
        let repo = Arc::new(MemoryKnowledgeBaseRepository::default());
        let url_id = repo.seed_url(me.id, "sticky documents").await;
        repo.seed_document(url_id).await;
        repo.fail_next_delete_documents();

        let mut store = KnowledgeBaseStore::new(repo.clone(), me);
        store.delete(url_id).await.unwrap();

        // The parent row is gone even though the cleanup sub-call failed.
        assert!(store.urls().is_empty());
        assert_eq!(repo.document_count(url_id).await, 1);
    }

    #[tokio::test]
    async fn foreign_url_documents_survive_a_delete_attempt() {
        let me = test_identity();
        let repo = Arc::new(MemoryKnowledgeBaseRepository::default());
        let victim = Uuid::new_v4();
        let url_id = repo.seed_url(victim, "someone else's corpus").await;
        repo.seed_document(url_id).await;
        repo.seed_document(url_id).await;

        let mut store = KnowledgeBaseStore::new(repo.clone(), me);
        assert!(store.delete(url_id).await.is_err());

        assert!(repo.url_exists(url_id).await);
        assert_eq!(repo.document_count(url_id).await, 2);
    }

    #[tokio::test]
    async fn deleting_someone_elses_url_fails_generically() {
        let me = test_identity();
        let repo = Arc::new(MemoryKnowledgeBaseRepository::default());
        let foreign = repo.seed_url(Uuid::new_v4(), "not yours").await;

        let mut store = KnowledgeBaseStore::new(repo.clone(), me);
        let err = store.delete(foreign).await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to delete URL. Please try again.");
        assert!(repo.url_exists(foreign).await);
    }
}
