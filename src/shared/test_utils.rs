//! In-memory doubles for the repository and storage traits, shared between
//! unit tests and the integration suite.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex as StdMutex;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::auth::Identity;
use crate::kb::repo::KnowledgeBaseRepository;
use crate::kb::{KbStatus, KnowledgeBaseUrl};
use crate::leads::repo::LeadRepository;
use crate::leads::{Lead, LeadFilters, LeadSource, LeadStatus, UpdateLeadData};
use crate::profile::avatar::{AvatarStorage, StorageError};
use crate::profile::repo::ProfileRepository;
use crate::profile::{UpdateProfileData, UserProfile};
use crate::shared::errors::RepoError;

pub fn test_identity() -> Identity {
    Identity {
        id: Uuid::new_v4(),
        email: "sarah@example.com".to_string(),
    }
}

pub fn sample_lead(owner: Uuid, name: &str) -> Lead {
    let now = Utc::now();
    let local = name
        .split_whitespace()
        .next()
        .unwrap_or("lead")
        .to_lowercase();
    Lead {
        id: Uuid::new_v4(),
        full_name: name.to_string(),
        email: Some(format!("{local}@example.com")),
        phone: None,
        company: None,
        designation: None,
        inquiry_type: None,
        status: LeadStatus::New,
        note: None,
        source: LeadSource::Manual,
        row_content: None,
        assigned_to: None,
        created_by: owner,
        created_at: now,
        updated_at: now,
    }
}

#[derive(Default)]
pub struct MemoryLeadRepository {
    rows: Mutex<Vec<Lead>>,
    fail_select: AtomicBool,
}

impl MemoryLeadRepository {
    pub async fn seed(&self, lead: Lead) {
        self.rows.lock().await.push(lead);
    }

    /// Make the next `select` call fail once.
    pub fn fail_next_select(&self) {
        self.fail_select.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl LeadRepository for MemoryLeadRepository {
    async fn select(&self, owner: Uuid, filters: &LeadFilters) -> Result<Vec<Lead>, RepoError> {
        if self.fail_select.swap(false, Ordering::SeqCst) {
            return Err(RepoError::Database("simulated select failure".to_string()));
        }
        let mut rows: Vec<Lead> = self
            .rows
            .lock()
            .await
            .iter()
            .filter(|l| l.created_by == owner && filters.matches(l))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn insert(&self, lead: Lead) -> Result<Lead, RepoError> {
        self.rows.lock().await.push(lead.clone());
        Ok(lead)
    }

    async fn update(
        &self,
        owner: Uuid,
        id: Uuid,
        changes: UpdateLeadData,
    ) -> Result<Lead, RepoError> {
        let mut rows = self.rows.lock().await;
        let row = rows
            .iter_mut()
            .find(|l| l.id == id && l.created_by == owner)
            .ok_or(RepoError::NotFound)?;

        if let Some(full_name) = changes.full_name {
            row.full_name = full_name;
        }
        if let Some(email) = changes.email {
            row.email = Some(email);
        }
        if let Some(phone) = changes.phone {
            row.phone = Some(phone);
        }
        if let Some(company) = changes.company {
            row.company = Some(company);
        }
        if let Some(designation) = changes.designation {
            row.designation = Some(designation);
        }
        if let Some(inquiry_type) = changes.inquiry_type {
            row.inquiry_type = Some(inquiry_type);
        }
        if let Some(status) = changes.status {
            row.status = status;
        }
        if let Some(note) = changes.note {
            row.note = Some(note);
        }
        row.updated_at = Utc::now();
        Ok(row.clone())
    }

    async fn delete(&self, owner: Uuid, id: Uuid) -> Result<(), RepoError> {
        let mut rows = self.rows.lock().await;
        let position = rows
            .iter()
            .position(|l| l.id == id && l.created_by == owner)
            .ok_or(RepoError::NotFound)?;
        rows.remove(position);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryKnowledgeBaseRepository {
    urls: Mutex<Vec<KnowledgeBaseUrl>>,
    documents: Mutex<Vec<Uuid>>,
    fail_delete_documents: AtomicBool,
}

impl MemoryKnowledgeBaseRepository {
    pub async fn seed_url(&self, owner: Uuid, title: &str) -> Uuid {
        let url = KnowledgeBaseUrl {
            id: Uuid::new_v4(),
            user_id: owner,
            title: title.to_string(),
            drive_url: format!("https://drive.example.com/{title}"),
            status: Some(KbStatus::Pending),
            created_at: Utc::now(),
        };
        let id = url.id;
        self.urls.lock().await.push(url);
        id
    }

    pub async fn seed_document(&self, url_id: Uuid) {
        self.documents.lock().await.push(url_id);
    }

    pub fn fail_next_delete_documents(&self) {
        self.fail_delete_documents.store(true, Ordering::SeqCst);
    }

    pub async fn document_count(&self, url_id: Uuid) -> usize {
        self.documents
            .lock()
            .await
            .iter()
            .filter(|d| **d == url_id)
            .count()
    }

    pub async fn url_exists(&self, id: Uuid) -> bool {
        self.urls.lock().await.iter().any(|u| u.id == id)
    }
}

#[async_trait]
impl KnowledgeBaseRepository for MemoryKnowledgeBaseRepository {
    async fn select(&self, owner: Uuid) -> Result<Vec<KnowledgeBaseUrl>, RepoError> {
        let mut rows: Vec<KnowledgeBaseUrl> = self
            .urls
            .lock()
            .await
            .iter()
            .filter(|u| u.user_id == owner)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn insert(&self, url: KnowledgeBaseUrl) -> Result<KnowledgeBaseUrl, RepoError> {
        self.urls.lock().await.push(url.clone());
        Ok(url)
    }

    async fn delete_documents(&self, owner: Uuid, url_id: Uuid) -> Result<usize, RepoError> {
        if self.fail_delete_documents.swap(false, Ordering::SeqCst) {
            return Err(RepoError::Database(
                "simulated document cleanup failure".to_string(),
            ));
        }
        let owned = self
            .urls
            .lock()
            .await
            .iter()
            .any(|u| u.id == url_id && u.user_id == owner);
        if !owned {
            return Ok(0);
        }
        let mut documents = self.documents.lock().await;
        let before = documents.len();
        documents.retain(|d| *d != url_id);
        Ok(before - documents.len())
    }

    async fn delete(&self, owner: Uuid, id: Uuid) -> Result<(), RepoError> {
        let mut urls = self.urls.lock().await;
        let position = urls
            .iter()
            .position(|u| u.id == id && u.user_id == owner)
            .ok_or(RepoError::NotFound)?;
        urls.remove(position);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryProfileRepository {
    rows: Mutex<HashMap<Uuid, UserProfile>>,
}

impl MemoryProfileRepository {
    pub async fn row_count(&self) -> usize {
        self.rows.lock().await.len()
    }
}

#[async_trait]
impl ProfileRepository for MemoryProfileRepository {
    async fn find(&self, id: Uuid) -> Result<UserProfile, RepoError> {
        self.rows
            .lock()
            .await
            .get(&id)
            .cloned()
            .ok_or(RepoError::NotFound)
    }

    async fn insert(&self, profile: UserProfile) -> Result<UserProfile, RepoError> {
        self.rows.lock().await.insert(profile.id, profile.clone());
        Ok(profile)
    }

    async fn update(&self, id: Uuid, changes: UpdateProfileData) -> Result<UserProfile, RepoError> {
        let mut rows = self.rows.lock().await;
        let row = rows.get_mut(&id).ok_or(RepoError::NotFound)?;

        if let Some(full_name) = changes.full_name {
            row.full_name = Some(full_name);
        }
        if let Some(phone) = changes.phone {
            row.phone = Some(phone);
        }
        if let Some(location) = changes.location {
            row.location = Some(location);
        }
        if let Some(bio) = changes.bio {
            row.bio = Some(bio);
        }
        if let Some(avatar_url) = changes.avatar_url {
            row.avatar_url = Some(avatar_url);
        }
        row.updated_at = Utc::now();
        Ok(row.clone())
    }

    async fn set_avatar(&self, id: Uuid, url: Option<String>) -> Result<UserProfile, RepoError> {
        let mut rows = self.rows.lock().await;
        let row = rows.get_mut(&id).ok_or(RepoError::NotFound)?;
        row.avatar_url = url;
        row.updated_at = Utc::now();
        Ok(row.clone())
    }
}

#[derive(Default)]
pub struct MemoryAvatarStorage {
    objects: StdMutex<HashMap<String, Vec<u8>>>,
    puts: AtomicUsize,
}

impl MemoryAvatarStorage {
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }
}

#[async_trait]
impl AvatarStorage for MemoryAvatarStorage {
    async fn put(&self, path: &str, bytes: &[u8]) -> Result<String, StorageError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.objects
            .lock()
            .unwrap()
            .insert(path.to_string(), bytes.to_vec());
        Ok(format!("memory://avatars/{path}"))
    }

    async fn remove(&self, path: &str) -> Result<(), StorageError> {
        self.objects.lock().unwrap().remove(path);
        Ok(())
    }
}
