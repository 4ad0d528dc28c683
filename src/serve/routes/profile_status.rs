use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;

use super::AppState;
use crate::error::ApiError;
use crate::models::{ProfileOverview, ProfileStatus, StatusUpdate, StatusWithProfileName};

const LOOKUP_FAILED: &str = "프로파일 상태 조회 중 오류가 발생했습니다.";
const UPDATE_FAILED: &str = "프로파일 상태 업데이트 중 오류가 발생했습니다.";
const NOT_FOUND: &str = "프로파일 상태를 찾을 수 없습니다.";

/// GET /api/profile-status
pub async fn list_statuses(
    State(state): State<AppState>,
) -> Result<Json<Vec<StatusWithProfileName>>, ApiError> {
    let rows = state
        .store
        .list_statuses()
        .await
        .map_err(ApiError::store(LOOKUP_FAILED))?;
    Ok(Json(rows))
}

/// GET /api/profile-status/{profile_id}
pub async fn get_status(
    State(state): State<AppState>,
    Path(profile_id): Path<String>,
) -> Result<Json<ProfileStatus>, ApiError> {
    state
        .store
        .get_status(&profile_id)
        .await
        .map_err(ApiError::store(LOOKUP_FAILED))?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(NOT_FOUND))
}

/// PUT /api/profile-status/{profile_id}
pub async fn update_status(
    State(state): State<AppState>,
    Path(profile_id): Path<String>,
    body: Result<Json<StatusUpdate>, JsonRejection>,
) -> Result<Json<ProfileStatus>, ApiError> {
    let Json(update) = body?;
    let update = update.normalized();
    if update.is_empty() {
        return Err(ApiError::bad_request("업데이트할 필드가 없습니다."));
    }

    let row = state
        .store
        .update_status(&profile_id, &update)
        .await
        .map_err(ApiError::store(UPDATE_FAILED))?
        .ok_or_else(|| ApiError::not_found(NOT_FOUND))?;
    tracing::info!(profile_id = %profile_id, status = %row.status, "profile status updated");
    Ok(Json(row))
}

/// GET /api/profile-status/all/with-profile
pub async fn profiles_with_status(
    State(state): State<AppState>,
) -> Result<Json<Vec<ProfileOverview>>, ApiError> {
    let rows = state
        .store
        .list_profiles_with_status()
        .await
        .map_err(ApiError::store(LOOKUP_FAILED))?;
    Ok(Json(rows))
}
