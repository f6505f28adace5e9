use chrono::Utc;
use log::{debug, error};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::Identity;
use crate::leads::repo::LeadRepository;
use crate::leads::{CreateLeadData, Lead, LeadFilterPatch, LeadFilters, UpdateLeadData};
use crate::shared::errors::{Operation, StoreError};

/// Per-identity lead collection mirrored from the repository.
///
/// The collection is always replaced wholesale by a reload, never patched in
/// place; after a failed load it stays at its last-known-good content. Each
/// mutation triggers a full reload rather than a local edit, so a `create`
/// followed by the reload contains the new row exactly once.
pub struct LeadStore<R> {
    repo: Arc<R>,
    identity: Identity,
    leads: Vec<Lead>,
    filters: LeadFilters,
    generation: u64,
    loading: bool,
    creating: bool,
    updating: bool,
    deleting: bool,
}

impl<R: LeadRepository> LeadStore<R> {
    pub fn new(repo: Arc<R>, identity: Identity) -> Self {
        Self {
            repo,
            identity,
            leads: Vec::new(),
            filters: LeadFilters::default(),
            generation: 0,
            loading: false,
            creating: false,
            updating: false,
            deleting: false,
        }
    }

    pub fn leads(&self) -> &[Lead] {
        &self.leads
    }

    pub fn filters(&self) -> &LeadFilters {
        &self.filters
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_creating(&self) -> bool {
        self.creating
    }

    pub fn is_updating(&self) -> bool {
        self.updating
    }

    pub fn is_deleting(&self) -> bool {
        self.deleting
    }

    /// Replace the collection with the owner-scoped, filtered, newest-first
    /// result set. On failure the collection keeps its previous content.
    pub async fn load(&mut self) -> Result<(), StoreError> {
        self.loading = true;
        let generation = self.generation;
        let result = self.repo.select(self.identity.id, &self.filters).await;
        self.loading = false;

        match result {
            Ok(rows) => {
                self.apply_loaded(generation, rows);
                Ok(())
            }
            Err(e) => {
                error!("error loading leads for {}: {e}", self.identity.id);
                Err(StoreError::new(Operation::Load, "leads"))
            }
        }
    }

    /// A load result only lands if no newer load generation has started in
    /// the meantime; stale responses are dropped instead of clobbering
    /// fresher data. Returns whether the rows were applied.
    fn apply_loaded(&mut self, generation: u64, rows: Vec<Lead>) -> bool {
        if generation != self.generation {
            debug!(
                "discarding stale lead load (generation {generation}, current {})",
                self.generation
            );
            return false;
        }
        self.leads = rows;
        true
    }

    pub async fn create(&mut self, data: CreateLeadData) -> Result<(), StoreError> {
        self.creating = true;

        let now = Utc::now();
        let lead = Lead {
            id: Uuid::new_v4(),
            full_name: data.full_name,
            email: data.email,
            phone: data.phone,
            company: data.company,
            designation: data.designation,
            inquiry_type: data.inquiry_type,
            status: data.status.unwrap_or_default(),
            note: data.note,
            source: data.source.unwrap_or_default(),
            row_content: None,
            assigned_to: None,
            created_by: self.identity.id,
            created_at: now,
            updated_at: now,
        };

        let result = self.repo.insert(lead).await;
        let outcome = match result {
            Ok(_) => {
                // Reconcile by reloading; a reload failure is surfaced by
                // load itself and does not undo the successful insert.
                let _ = self.load().await;
                Ok(())
            }
            Err(e) => {
                error!("error creating lead for {}: {e}", self.identity.id);
                Err(StoreError::new(Operation::Create, "lead"))
            }
        };
        self.creating = false;
        outcome
    }

    pub async fn update(&mut self, id: Uuid, changes: UpdateLeadData) -> Result<(), StoreError> {
        self.updating = true;

        let result = self.repo.update(self.identity.id, id, changes).await;
        let outcome = match result {
            Ok(_) => {
                let _ = self.load().await;
                Ok(())
            }
            Err(e) => {
                error!("error updating lead {id} for {}: {e}", self.identity.id);
                Err(StoreError::new(Operation::Update, "lead"))
            }
        };
        self.updating = false;
        outcome
    }

    pub async fn delete(&mut self, id: Uuid) -> Result<(), StoreError> {
        self.deleting = true;

        let result = self.repo.delete(self.identity.id, id).await;
        let outcome = match result {
            Ok(()) => {
                let _ = self.load().await;
                Ok(())
            }
            Err(e) => {
                error!("error deleting lead {id} for {}: {e}", self.identity.id);
                Err(StoreError::new(Operation::Delete, "lead"))
            }
        };
        self.deleting = false;
        outcome
    }

    /// Shallow-merge the patch into the filter descriptor and reload. The
    /// merge starts a new load generation, so a load still in flight for the
    /// old descriptor can no longer land.
    pub async fn update_filters(&mut self, patch: LeadFilterPatch) -> Result<(), StoreError> {
        self.filters.merge(patch);
        self.generation = self.generation.wrapping_add(1);
        self.load().await
    }
}
