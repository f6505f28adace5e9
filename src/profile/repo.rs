use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use uuid::Uuid;

use crate::profile::{UpdateProfileData, UserProfile};
use crate::shared::errors::RepoError;
use crate::shared::schema::user_profiles;
use crate::shared::utils::DbPool;

#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// Look up the profile row for the given user. `RepoError::NotFound`
    /// signals the caller to run the create-on-first-access path.
    async fn find(&self, id: Uuid) -> Result<UserProfile, RepoError>;
    async fn insert(&self, profile: UserProfile) -> Result<UserProfile, RepoError>;
    async fn update(&self, id: Uuid, changes: UpdateProfileData) -> Result<UserProfile, RepoError>;
    /// Set or clear the avatar URL. Split from `update` because clearing
    /// needs an explicit NULL write, which the partial changeset skips.
    async fn set_avatar(&self, id: Uuid, url: Option<String>) -> Result<UserProfile, RepoError>;
}

pub struct PgProfileRepository {
    pool: DbPool,
}

impl PgProfileRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProfileRepository for PgProfileRepository {
    async fn find(&self, id: Uuid) -> Result<UserProfile, RepoError> {
        let mut conn = self.pool.get()?;

        let profile = user_profiles::table
            .filter(user_profiles::id.eq(id))
            .first::<UserProfile>(&mut conn)?;
        Ok(profile)
    }

    async fn insert(&self, profile: UserProfile) -> Result<UserProfile, RepoError> {
        let mut conn = self.pool.get()?;

        diesel::insert_into(user_profiles::table)
            .values(&profile)
            .execute(&mut conn)?;
        Ok(profile)
    }

    async fn update(&self, id: Uuid, changes: UpdateProfileData) -> Result<UserProfile, RepoError> {
        let mut conn = self.pool.get()?;

        let profile = diesel::update(user_profiles::table.filter(user_profiles::id.eq(id)))
            .set((changes, user_profiles::updated_at.eq(Utc::now())))
            .get_result::<UserProfile>(&mut conn)?;
        Ok(profile)
    }

    async fn set_avatar(&self, id: Uuid, url: Option<String>) -> Result<UserProfile, RepoError> {
        let mut conn = self.pool.get()?;

        let profile = diesel::update(user_profiles::table.filter(user_profiles::id.eq(id)))
            .set((
                user_profiles::avatar_url.eq(url),
                user_profiles::updated_at.eq(Utc::now()),
            ))
            .get_result::<UserProfile>(&mut conn)?;
        Ok(profile)
    }
}
