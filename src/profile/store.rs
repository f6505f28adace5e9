use chrono::Utc;
use log::{error, info};
use std::sync::Arc;

use crate::auth::Identity;
use crate::profile::avatar::{object_path_from_url, AvatarError, AvatarStorage, AvatarUpload};
use crate::profile::repo::ProfileRepository;
use crate::profile::{UpdateProfileData, UserProfile};
use crate::shared::errors::{Operation, RepoError, StoreError};

/// Singleton-resource mirror of the user's profile row.
///
/// The first load for an identity that has no row yet inserts one seeded
/// from the auth identity and keeps going; callers never observe the
/// missing-row state.
pub struct ProfileStore<R> {
    repo: Arc<R>,
    avatars: Arc<dyn AvatarStorage>,
    identity: Identity,
    profile: Option<UserProfile>,
    loading: bool,
    updating: bool,
}

impl<R: ProfileRepository> ProfileStore<R> {
    pub fn new(repo: Arc<R>, avatars: Arc<dyn AvatarStorage>, identity: Identity) -> Self {
        Self {
            repo,
            avatars,
            identity,
            profile: None,
            loading: false,
            updating: false,
        }
    }

    pub fn profile(&self) -> Option<&UserProfile> {
        self.profile.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_updating(&self) -> bool {
        self.updating
    }

    pub async fn load(&mut self) -> Result<(), StoreError> {
        self.loading = true;
        let result = self.repo.find(self.identity.id).await;
        self.loading = false;

        match result {
            Ok(profile) => {
                self.profile = Some(profile);
                Ok(())
            }
            Err(RepoError::NotFound) => {
                info!("no profile for {}, creating one", self.identity.id);
                self.create_initial().await
            }
            Err(e) => {
                error!("error loading profile for {}: {e}", self.identity.id);
                Err(StoreError::new(Operation::Load, "profile data"))
            }
        }
    }

    async fn create_initial(&mut self) -> Result<(), StoreError> {
        let now = Utc::now();
        let seed = UserProfile {
            id: self.identity.id,
            full_name: None,
            email: Some(self.identity.email.clone()),
            phone: None,
            location: None,
            bio: None,
            avatar_url: None,
            plan: None,
            member_since: Some(now.date_naive()),
            created_at: now,
            updated_at: now,
        };

        match self.repo.insert(seed).await {
            Ok(profile) => {
                self.profile = Some(profile);
                Ok(())
            }
            Err(e) => {
                error!("error creating profile for {}: {e}", self.identity.id);
                Err(StoreError::new(Operation::Create, "profile"))
            }
        }
    }

    pub async fn update(&mut self, updates: UpdateProfileData) -> Result<UserProfile, StoreError> {
        self.updating = true;
        let result = self.repo.update(self.identity.id, updates).await;
        self.updating = false;

        match result {
            Ok(profile) => {
                self.profile = Some(profile.clone());
                Ok(profile)
            }
            Err(e) => {
                error!("error updating profile for {}: {e}", self.identity.id);
                Err(StoreError::new(Operation::Update, "profile"))
            }
        }
    }

    /// Validate, store under `<user_id>/<millis>.<ext>`, and persist the
    /// resulting URL onto the profile. Validation failures never reach the
    /// storage backend.
    pub async fn upload_avatar(&mut self, upload: AvatarUpload) -> Result<String, AvatarError> {
        upload.validate()?;

        let path = format!(
            "{}/{}.{}",
            self.identity.id,
            Utc::now().timestamp_millis(),
            upload.extension()
        );

        let url = match self.avatars.put(&path, &upload.bytes).await {
            Ok(url) => url,
            Err(e) => {
                error!("error storing avatar for {}: {e}", self.identity.id);
                return Err(StoreError::new(Operation::Upload, "profile picture").into());
            }
        };

        self.update(UpdateProfileData {
            avatar_url: Some(url.clone()),
            ..Default::default()
        })
        .await?;

        Ok(url)
    }

    /// Remove the stored object and clear `avatar_url`. A profile without an
    /// avatar is a no-op.
    pub async fn delete_avatar(&mut self) -> Result<(), StoreError> {
        let Some(url) = self.profile.as_ref().and_then(|p| p.avatar_url.clone()) else {
            return Ok(());
        };

        if let Some(path) = object_path_from_url(&url) {
            if let Err(e) = self.avatars.remove(&path).await {
                error!("error removing avatar object for {}: {e}", self.identity.id);
                return Err(StoreError::new(Operation::Delete, "profile picture"));
            }
        }

        match self.repo.set_avatar(self.identity.id, None).await {
            Ok(profile) => {
                self.profile = Some(profile);
                Ok(())
            }
            Err(e) => {
                error!("error clearing avatar url for {}: {e}", self.identity.id);
                Err(StoreError::new(Operation::Delete, "profile picture"))
            }
        }
    }
}
