use async_trait::async_trait;
use futures::FutureExt;
use std::sync::Arc;
use tokio_postgres::error::SqlState;
use tokio_postgres::types::ToSql;
use tokio_postgres::Row;

use super::{ProfileStore, StoreError};
use crate::models::{
    NewProfile, Profile, ProfileChanges, ProfileOverview, ProfileStatus, StatusUpdate,
    StatusWithProfileName,
};
use crate::serve::db::Pool;

const PROFILE_COLUMNS: &str = "id, name, profile_type, analysis_scope, log_source_name, \
     log_source_type, description, data, created_at, updated_at";

const STATUS_COLUMNS: &str = "profile_id, status, last_run, next_run, priority, updated_at";

/// `ProfileStore` backed by the `profiles` and `profile_status` tables.
pub struct PgProfileStore {
    pool: Arc<Pool>,
}

impl PgProfileStore {
    pub fn new(pool: Arc<Pool>) -> Self {
        Self { pool }
    }
}

fn profile_from_row(row: &Row) -> Result<Profile, StoreError> {
    Ok(Profile {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        profile_type: row.try_get("profile_type")?,
        analysis_scope: row.try_get("analysis_scope")?,
        log_source_name: row.try_get("log_source_name")?,
        log_source_type: row.try_get("log_source_type")?,
        description: row.try_get("description")?,
        data: row.try_get("data")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn status_from_row(row: &Row) -> Result<ProfileStatus, StoreError> {
    Ok(ProfileStatus {
        profile_id: row.try_get("profile_id")?,
        status: row.try_get("status")?,
        last_run: row.try_get("last_run")?,
        next_run: row.try_get("next_run")?,
        priority: row.try_get("priority")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn overview_from_row(row: &Row) -> Result<ProfileOverview, StoreError> {
    Ok(ProfileOverview {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        profile_type: row.try_get("profile_type")?,
        analysis_scope: row.try_get("analysis_scope")?,
        status: row.try_get("status")?,
        last_run: row.try_get("last_run")?,
        next_run: row.try_get("next_run")?,
        priority: row.try_get("priority")?,
    })
}

fn classify(err: StoreError, id: &str) -> StoreError {
    match &err {
        StoreError::Database(db) if db.code() == Some(&SqlState::UNIQUE_VIOLATION) => {
            StoreError::Duplicate(id.to_string())
        }
        _ => err,
    }
}

/// Dynamic `UPDATE profile_status` for the fields present in `update`.
/// `$1` is the profile id; the remaining placeholders follow the order
/// status, next_run, priority. `None` when nothing is updatable.
fn status_update_sql(update: &StatusUpdate) -> Option<String> {
    let mut sets = Vec::new();
    let mut idx = 2;
    if update.status.is_some() {
        sets.push(format!("status = ${idx}"));
        idx += 1;
    }
    if update.next_run.is_some() {
        sets.push(format!("next_run = ${idx}"));
        idx += 1;
    }
    if update.priority.is_some() {
        sets.push(format!("priority = ${idx}"));
    }
    if update.marks_running() {
        sets.push("last_run = now()".to_string());
    }
    if sets.is_empty() {
        return None;
    }
    sets.push("updated_at = now()".to_string());
    Some(format!(
        "UPDATE profile_status SET {} WHERE profile_id = $1 RETURNING {STATUS_COLUMNS}",
        sets.join(", ")
    ))
}

#[async_trait]
impl ProfileStore for PgProfileStore {
    async fn list_profiles(&self) -> Result<Vec<Profile>, StoreError> {
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM profiles ORDER BY created_at DESC");
        let rows = self.pool.query(&sql, &[]).await?;
        rows.iter().map(profile_from_row).collect()
    }

    async fn get_profile(&self, id: &str) -> Result<Option<Profile>, StoreError> {
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = $1");
        let row = self.pool.query_opt(&sql, &[&id]).await?;
        row.as_ref().map(profile_from_row).transpose()
    }

    async fn create_profile(&self, profile: &NewProfile) -> Result<Profile, StoreError> {
        let owned = profile.clone();
        self.pool
            .with_transaction(move |tx| {
                async move {
                    let sql = format!(
                        "INSERT INTO profiles
                         (id, name, profile_type, analysis_scope, log_source_name,
                          log_source_type, description, data)
                         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                         RETURNING {PROFILE_COLUMNS}"
                    );
                    let row = tx
                        .query_one(
                            &sql,
                            &[
                                &owned.id,
                                &owned.name,
                                &owned.profile_type,
                                &owned.analysis_scope,
                                &owned.log_source_name,
                                &owned.log_source_type,
                                &owned.description,
                                &owned.data,
                            ],
                        )
                        .await?;
                    tx.execute(
                        "INSERT INTO profile_status (profile_id, status) VALUES ($1, 'stopped')",
                        &[&owned.id],
                    )
                    .await?;
                    profile_from_row(&row)
                }
                .boxed()
            })
            .await
            .map_err(|e| classify(e, &profile.id))
    }

    async fn update_profile(
        &self,
        id: &str,
        changes: &ProfileChanges,
    ) -> Result<Option<Profile>, StoreError> {
        let sql = format!(
            "UPDATE profiles
             SET name = COALESCE($1, name), profile_type = $2, analysis_scope = $3,
                 log_source_name = $4, log_source_type = $5, description = $6,
                 data = $7, updated_at = now()
             WHERE id = $8
             RETURNING {PROFILE_COLUMNS}"
        );
        let row = self
            .pool
            .query_opt(
                &sql,
                &[
                    &changes.name,
                    &changes.profile_type,
                    &changes.analysis_scope,
                    &changes.log_source_name,
                    &changes.log_source_type,
                    &changes.description,
                    &changes.data,
                    &id,
                ],
            )
            .await?;
        row.as_ref().map(profile_from_row).transpose()
    }

    async fn delete_profile(&self, id: &str) -> Result<Option<Profile>, StoreError> {
        let sql = format!("DELETE FROM profiles WHERE id = $1 RETURNING {PROFILE_COLUMNS}");
        let row = self.pool.query_opt(&sql, &[&id]).await?;
        row.as_ref().map(profile_from_row).transpose()
    }

    async fn list_statuses(&self) -> Result<Vec<StatusWithProfileName>, StoreError> {
        let rows = self
            .pool
            .query(
                "SELECT ps.profile_id, ps.status, ps.last_run, ps.next_run, ps.priority,
                        ps.updated_at, p.name AS profile_name
                 FROM profile_status ps
                 JOIN profiles p ON ps.profile_id = p.id
                 ORDER BY p.created_at DESC",
                &[],
            )
            .await?;
        rows.iter()
            .map(|row| {
                Ok(StatusWithProfileName {
                    status: status_from_row(row)?,
                    profile_name: row.try_get("profile_name")?,
                })
            })
            .collect()
    }

    async fn get_status(&self, profile_id: &str) -> Result<Option<ProfileStatus>, StoreError> {
        let sql = format!("SELECT {STATUS_COLUMNS} FROM profile_status WHERE profile_id = $1");
        let row = self.pool.query_opt(&sql, &[&profile_id]).await?;
        row.as_ref().map(status_from_row).transpose()
    }

    async fn update_status(
        &self,
        profile_id: &str,
        update: &StatusUpdate,
    ) -> Result<Option<ProfileStatus>, StoreError> {
        let Some(sql) = status_update_sql(update) else {
            return self.get_status(profile_id).await;
        };

        let mut params: Vec<&(dyn ToSql + Sync)> = vec![&profile_id];
        if let Some(status) = &update.status {
            params.push(status);
        }
        if let Some(next_run) = &update.next_run {
            params.push(next_run);
        }
        if let Some(priority) = &update.priority {
            params.push(priority);
        }

        let row = self.pool.query_opt(&sql, &params).await?;
        row.as_ref().map(status_from_row).transpose()
    }

    async fn list_profiles_with_status(&self) -> Result<Vec<ProfileOverview>, StoreError> {
        let rows = self
            .pool
            .query(
                "SELECT p.id, p.name, p.profile_type, p.analysis_scope,
                        ps.status, ps.last_run, ps.next_run, ps.priority
                 FROM profiles p
                 LEFT JOIN profile_status ps ON p.id = ps.profile_id
                 ORDER BY p.created_at DESC",
                &[],
            )
            .await?;
        rows.iter().map(overview_from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn status_update_numbers_placeholders_in_order() {
        let update = StatusUpdate {
            status: Some("running".into()),
            next_run: Some(None),
            priority: Some("high".into()),
        };
        let sql = status_update_sql(&update).unwrap();
        assert!(sql.contains("status = $2, next_run = $3, priority = $4"));
        assert!(sql.contains("last_run = now()"));
        assert!(sql.contains("updated_at = now()"));
        assert!(sql.contains("WHERE profile_id = $1"));
    }

    #[test]
    fn priority_only_skips_last_run() {
        let update = StatusUpdate {
            priority: Some("low".into()),
            ..Default::default()
        };
        let sql = status_update_sql(&update).unwrap();
        assert!(sql.contains("SET priority = $2, updated_at = now()"));
        assert!(!sql.contains("last_run"));
    }

    #[test]
    fn next_run_set_without_status() {
        let update = StatusUpdate {
            next_run: Some(Some(Utc::now())),
            ..Default::default()
        };
        let sql = status_update_sql(&update).unwrap();
        assert!(sql.contains("SET next_run = $2"));
    }

    #[test]
    fn nothing_to_update() {
        assert!(status_update_sql(&StatusUpdate::default()).is_none());
    }
}
