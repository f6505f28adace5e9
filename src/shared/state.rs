use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use uuid::Uuid;

use crate::auth::Identity;
use crate::kb::repo::PgKnowledgeBaseRepository;
use crate::kb::store::KnowledgeBaseStore;
use crate::kb::webhook::WebhookClient;
use crate::leads::repo::PgLeadRepository;
use crate::leads::store::LeadStore;
use crate::profile::avatar::AvatarStorage;
use crate::profile::repo::PgProfileRepository;
use crate::profile::store::ProfileStore;
use crate::realtime::ChangeEvent;
use crate::shared::utils::DbPool;

pub struct AppState {
    pub change_feed: broadcast::Sender<ChangeEvent>,
    pub webhook: WebhookClient,
    pub sessions: SessionRegistry,
}

type Shared<T> = Arc<Mutex<T>>;

/// Per-identity store instances, created lazily on first touch and kept for
/// the lifetime of the process so flags and cached collections survive
/// across requests of the same dashboard session.
pub struct SessionRegistry {
    pool: DbPool,
    feed: broadcast::Sender<ChangeEvent>,
    avatars: Arc<dyn AvatarStorage>,
    lead_stores: Mutex<HashMap<Uuid, Shared<LeadStore<PgLeadRepository>>>>,
    kb_stores: Mutex<HashMap<Uuid, Shared<KnowledgeBaseStore<PgKnowledgeBaseRepository>>>>,
    profile_stores: Mutex<HashMap<Uuid, Shared<ProfileStore<PgProfileRepository>>>>,
}

impl SessionRegistry {
    pub fn new(
        pool: DbPool,
        feed: broadcast::Sender<ChangeEvent>,
        avatars: Arc<dyn AvatarStorage>,
    ) -> Self {
        Self {
            pool,
            feed,
            avatars,
            lead_stores: Mutex::new(HashMap::new()),
            kb_stores: Mutex::new(HashMap::new()),
            profile_stores: Mutex::new(HashMap::new()),
        }
    }

    pub async fn lead_store(&self, user: &Identity) -> Shared<LeadStore<PgLeadRepository>> {
        let mut map = self.lead_stores.lock().await;
        map.entry(user.id)
            .or_insert_with(|| {
                let repo = Arc::new(PgLeadRepository::new(self.pool.clone(), self.feed.clone()));
                Arc::new(Mutex::new(LeadStore::new(repo, user.clone())))
            })
            .clone()
    }

    pub async fn kb_store(
        &self,
        user: &Identity,
    ) -> Shared<KnowledgeBaseStore<PgKnowledgeBaseRepository>> {
        let mut map = self.kb_stores.lock().await;
        map.entry(user.id)
            .or_insert_with(|| {
                let repo = Arc::new(PgKnowledgeBaseRepository::new(self.pool.clone()));
                Arc::new(Mutex::new(KnowledgeBaseStore::new(repo, user.clone())))
            })
            .clone()
    }

    pub async fn profile_store(&self, user: &Identity) -> Shared<ProfileStore<PgProfileRepository>> {
        let mut map = self.profile_stores.lock().await;
        map.entry(user.id)
            .or_insert_with(|| {
                let repo = Arc::new(PgProfileRepository::new(self.pool.clone()));
                Arc::new(Mutex::new(ProfileStore::new(
                    repo,
                    self.avatars.clone(),
                    user.clone(),
                )))
            })
            .clone()
    }
}
