//! Local profile storage, used when the baseline engine is unavailable and
//! as the only home of profile status rows.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{
    NewProfile, Profile, ProfileChanges, ProfileOverview, ProfileStatus, StatusUpdate,
    StatusWithProfileName,
};

#[cfg(test)]
pub mod memory;
mod postgres;

pub use postgres::PgProfileStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    #[error("timed out waiting for a database connection")]
    PoolTimeout,

    #[error("profile already exists: {0}")]
    Duplicate(String),
}

impl From<bb8::RunError<tokio_postgres::Error>> for StoreError {
    fn from(err: bb8::RunError<tokio_postgres::Error>) -> Self {
        match err {
            bb8::RunError::User(e) => StoreError::Database(e),
            bb8::RunError::TimedOut => StoreError::PoolTimeout,
        }
    }
}

/// Persistence for profiles and their status rows.
///
/// Methods returning `Option` yield `None` when no row matched.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// All profiles, newest first.
    async fn list_profiles(&self) -> Result<Vec<Profile>, StoreError>;

    async fn get_profile(&self, id: &str) -> Result<Option<Profile>, StoreError>;

    /// Insert a profile and its `stopped` status row in one transaction.
    async fn create_profile(&self, profile: &NewProfile) -> Result<Profile, StoreError>;

    async fn update_profile(
        &self,
        id: &str,
        changes: &ProfileChanges,
    ) -> Result<Option<Profile>, StoreError>;

    /// Delete a profile; its status row goes with it.
    async fn delete_profile(&self, id: &str) -> Result<Option<Profile>, StoreError>;

    /// Status rows joined with their profile name, newest profile first.
    async fn list_statuses(&self) -> Result<Vec<StatusWithProfileName>, StoreError>;

    async fn get_status(&self, profile_id: &str) -> Result<Option<ProfileStatus>, StoreError>;

    /// Apply a non-empty update. Stamps `last_run` when the new status is
    /// `running` and always stamps `updated_at`.
    async fn update_status(
        &self,
        profile_id: &str,
        update: &StatusUpdate,
    ) -> Result<Option<ProfileStatus>, StoreError>;

    /// Every profile with its status columns, if any.
    async fn list_profiles_with_status(&self) -> Result<Vec<ProfileOverview>, StoreError>;
}
