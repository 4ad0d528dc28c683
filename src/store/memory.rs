//! In-memory `ProfileStore` for router tests.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use super::{ProfileStore, StoreError};
use crate::models::{
    NewProfile, Profile, ProfileChanges, ProfileOverview, ProfileStatus, StatusUpdate,
    StatusWithProfileName,
};

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Tables>,
    offline: AtomicBool,
}

#[derive(Default)]
struct Tables {
    profiles: Vec<Profile>,
    statuses: Vec<ProfileStatus>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make list queries fail as if the database were unreachable.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::PoolTimeout);
        }
        Ok(())
    }

    pub fn profile_count(&self) -> usize {
        self.inner.lock().unwrap().profiles.len()
    }

    pub fn status_count(&self) -> usize {
        self.inner.lock().unwrap().statuses.len()
    }

    /// Seed a profile whose `created_at` is offset by `age_secs` into the past.
    pub fn seed(&self, id: &str, name: &str, age_secs: i64) {
        let now = Utc::now() - Duration::seconds(age_secs);
        let mut t = self.inner.lock().unwrap();
        t.profiles.push(Profile {
            id: id.into(),
            name: name.into(),
            profile_type: Some("user".into()),
            analysis_scope: Some("department".into()),
            log_source_name: None,
            log_source_type: None,
            description: None,
            data: serde_json::json!({}),
            created_at: now,
            updated_at: now,
        });
        t.statuses.push(ProfileStatus {
            profile_id: id.into(),
            status: "stopped".into(),
            last_run: None,
            next_run: None,
            priority: Some("medium".into()),
            updated_at: now,
        });
    }
}

impl Tables {
    fn newest_first(&self) -> Vec<Profile> {
        let mut profiles = self.profiles.clone();
        profiles.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        profiles
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn list_profiles(&self) -> Result<Vec<Profile>, StoreError> {
        self.check_online()?;
        Ok(self.inner.lock().unwrap().newest_first())
    }

    async fn get_profile(&self, id: &str) -> Result<Option<Profile>, StoreError> {
        let t = self.inner.lock().unwrap();
        Ok(t.profiles.iter().find(|p| p.id == id).cloned())
    }

    async fn create_profile(&self, new: &NewProfile) -> Result<Profile, StoreError> {
        let mut t = self.inner.lock().unwrap();
        if t.profiles.iter().any(|p| p.id == new.id) {
            return Err(StoreError::Duplicate(new.id.clone()));
        }
        let now = Utc::now();
        let profile = Profile {
            id: new.id.clone(),
            name: new.name.clone(),
            profile_type: new.profile_type.clone(),
            analysis_scope: new.analysis_scope.clone(),
            log_source_name: new.log_source_name.clone(),
            log_source_type: new.log_source_type.clone(),
            description: new.description.clone(),
            data: new.data.clone(),
            created_at: now,
            updated_at: now,
        };
        t.profiles.push(profile.clone());
        t.statuses.push(ProfileStatus {
            profile_id: new.id.clone(),
            status: "stopped".into(),
            last_run: None,
            next_run: None,
            priority: Some("medium".into()),
            updated_at: now,
        });
        Ok(profile)
    }

    async fn update_profile(
        &self,
        id: &str,
        changes: &ProfileChanges,
    ) -> Result<Option<Profile>, StoreError> {
        let mut t = self.inner.lock().unwrap();
        let Some(p) = t.profiles.iter_mut().find(|p| p.id == id) else {
            return Ok(None);
        };
        if let Some(name) = &changes.name {
            p.name = name.clone();
        }
        p.profile_type = changes.profile_type.clone();
        p.analysis_scope = changes.analysis_scope.clone();
        p.log_source_name = changes.log_source_name.clone();
        p.log_source_type = changes.log_source_type.clone();
        p.description = changes.description.clone();
        p.data = changes.data.clone();
        p.updated_at = Utc::now();
        Ok(Some(p.clone()))
    }

    async fn delete_profile(&self, id: &str) -> Result<Option<Profile>, StoreError> {
        let mut t = self.inner.lock().unwrap();
        let Some(pos) = t.profiles.iter().position(|p| p.id == id) else {
            return Ok(None);
        };
        let removed = t.profiles.remove(pos);
        t.statuses.retain(|s| s.profile_id != id);
        Ok(Some(removed))
    }

    async fn list_statuses(&self) -> Result<Vec<StatusWithProfileName>, StoreError> {
        self.check_online()?;
        let t = self.inner.lock().unwrap();
        Ok(t.newest_first()
            .into_iter()
            .filter_map(|p| {
                t.statuses
                    .iter()
                    .find(|s| s.profile_id == p.id)
                    .map(|s| StatusWithProfileName {
                        status: s.clone(),
                        profile_name: p.name.clone(),
                    })
            })
            .collect())
    }

    async fn get_status(&self, profile_id: &str) -> Result<Option<ProfileStatus>, StoreError> {
        let t = self.inner.lock().unwrap();
        Ok(t.statuses.iter().find(|s| s.profile_id == profile_id).cloned())
    }

    async fn update_status(
        &self,
        profile_id: &str,
        update: &StatusUpdate,
    ) -> Result<Option<ProfileStatus>, StoreError> {
        let mut t = self.inner.lock().unwrap();
        let Some(s) = t.statuses.iter_mut().find(|s| s.profile_id == profile_id) else {
            return Ok(None);
        };
        let now = Utc::now();
        if let Some(status) = &update.status {
            s.status = status.clone();
        }
        if let Some(next_run) = update.next_run {
            s.next_run = next_run;
        }
        if let Some(priority) = &update.priority {
            s.priority = Some(priority.clone());
        }
        if update.marks_running() {
            s.last_run = Some(now);
        }
        s.updated_at = now;
        Ok(Some(s.clone()))
    }

    async fn list_profiles_with_status(&self) -> Result<Vec<ProfileOverview>, StoreError> {
        let t = self.inner.lock().unwrap();
        Ok(t.newest_first()
            .into_iter()
            .map(|p| {
                let s = t.statuses.iter().find(|s| s.profile_id == p.id);
                ProfileOverview {
                    id: p.id,
                    name: p.name,
                    profile_type: p.profile_type,
                    analysis_scope: p.analysis_scope,
                    status: s.map(|s| s.status.clone()),
                    last_run: s.and_then(|s| s.last_run),
                    next_run: s.and_then(|s| s.next_run),
                    priority: s.and_then(|s| s.priority.clone()),
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn new_profile(id: &str) -> NewProfile {
        NewProfile {
            id: id.into(),
            name: "Test".into(),
            profile_type: Some("user".into()),
            analysis_scope: Some("department".into()),
            log_source_name: None,
            log_source_type: None,
            description: None,
            data: json!({}),
        }
    }

    #[tokio::test]
    async fn delete_removes_status_row() {
        let store = MemoryStore::new();
        store.create_profile(&new_profile("p1")).await.unwrap();
        assert_eq!(store.status_count(), 1);

        let removed = store.delete_profile("p1").await.unwrap();
        assert_eq!(removed.map(|p| p.id), Some("p1".to_string()));
        assert_eq!(store.status_count(), 0);
        assert!(store.get_status("p1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_ids_are_rejected() {
        let store = MemoryStore::new();
        store.create_profile(&new_profile("p1")).await.unwrap();
        let err = store.create_profile(&new_profile("p1")).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(id) if id == "p1"));
    }

    #[tokio::test]
    async fn running_stamps_last_run() {
        let store = MemoryStore::new();
        store.seed("p1", "VPN", 0);
        let update = StatusUpdate {
            status: Some("running".into()),
            ..Default::default()
        };
        let row = store.update_status("p1", &update).await.unwrap().unwrap();
        assert_eq!(row.status, "running");
        assert!(row.last_run.is_some());
    }
}
