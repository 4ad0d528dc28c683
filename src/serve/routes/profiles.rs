use axum::body::Bytes;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{present, AppState};
use crate::engine::{AnomalyQuery, DeviationRequest, ProfileFilters, ProfileView};
use crate::error::ApiError;
use crate::models::{Profile, Sourced};
use crate::payload::ProfileRequest;
use crate::simulate;

const LIST_FAILED: &str = "프로파일 조회 중 오류가 발생했습니다.";
const NOT_FOUND: &str = "프로파일을 찾을 수 없습니다.";
const CREATE_FAILED: &str = "프로파일 생성 중 오류가 발생했습니다.";
const UPDATE_FAILED: &str = "프로파일 업데이트 중 오류가 발생했습니다.";
const DELETE_FAILED: &str = "프로파일 삭제 중 오류가 발생했습니다.";
const DELETED: &str = "프로파일이 삭제되었습니다.";

/// Pull the profile array out of whatever list shape the engine answered
/// with: a bare array, or the first array under `profiles`, `data` or
/// `results`. Anything else is an empty list.
pub fn normalize_profile_list(body: Value) -> Vec<Value> {
    match body {
        Value::Array(items) => items,
        Value::Object(mut map) => ["profiles", "data", "results"]
            .iter()
            .find_map(|key| match map.remove(*key) {
                Some(Value::Array(items)) => Some(items),
                _ => None,
            })
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

/// GET /api/profiles
pub async fn list_profiles(
    State(state): State<AppState>,
    filters: Result<Query<ProfileFilters>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(filters) = filters?;

    match state.engine.list_profiles(&filters).await {
        Ok(body) if present(&body) => {
            let profiles = normalize_profile_list(body);
            tracing::info!(count = profiles.len(), "profiles listed from baseline engine");
            return Ok(Sourced::remote(profiles).into_response());
        }
        Ok(_) => tracing::warn!("baseline engine returned no profile list, using local store"),
        Err(e) => tracing::warn!(error = %e, "baseline engine unavailable, using local store"),
    }

    let profiles = state
        .store
        .list_profiles()
        .await
        .map_err(ApiError::store(LIST_FAILED))?;
    tracing::info!(count = profiles.len(), "profiles listed from local store");
    Ok(Sourced::local(profiles).into_response())
}

/// GET /api/profiles/{id}
pub async fn get_profile(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    match state.engine.get_profile(&id).await {
        Ok(body) if present(&body) => return Ok(Sourced::remote(body).into_response()),
        Ok(_) => tracing::warn!(profile_id = %id, "empty profile from baseline engine"),
        Err(e) => tracing::warn!(profile_id = %id, error = %e, "baseline engine lookup failed"),
    }

    let profile = state
        .store
        .get_profile(&id)
        .await
        .map_err(ApiError::store(LIST_FAILED))?
        .ok_or_else(|| ApiError::not_found(NOT_FOUND))?;
    Ok(Sourced::local(profile).into_response())
}

/// POST /api/profiles
pub async fn create_profile(
    State(state): State<AppState>,
    body: Result<Json<ProfileRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(req) = body?;
    let name = req
        .require_name()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let payload = req.create_payload();
    if !payload.unrecognized_metrics.is_empty() {
        tracing::warn!(
            metrics = ?payload.unrecognized_metrics,
            "unrecognized metric labels passed through"
        );
    }
    tracing::debug!(
        body = %serde_json::to_string(&payload).unwrap_or_default(),
        "profile create payload"
    );

    match state.engine.create_profile(&payload).await {
        Ok(body) if present(&body) => {
            tracing::info!(name, "profile created on baseline engine");
            return Ok((StatusCode::CREATED, Sourced::remote(body)).into_response());
        }
        Ok(_) => tracing::warn!(name, "baseline engine returned an empty create response"),
        Err(e) => tracing::warn!(name, error = %e, "baseline engine create failed, using local store"),
    }

    let new = req
        .new_profile()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    let profile = state
        .store
        .create_profile(&new)
        .await
        .map_err(ApiError::store(CREATE_FAILED))?;
    tracing::info!(profile_id = %profile.id, "profile created in local store");
    Ok((StatusCode::CREATED, Sourced::local(profile)).into_response())
}

/// PUT /api/profiles/{id}
pub async fn update_profile(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<ProfileRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(req) = body?;
    let payload = req.update_payload();
    if !payload.unrecognized_metrics.is_empty() {
        tracing::warn!(
            profile_id = %id,
            metrics = ?payload.unrecognized_metrics,
            "unrecognized metric labels passed through"
        );
    }

    match state.engine.update_profile(&id, &payload).await {
        Ok(body) if present(&body) => return Ok(Sourced::remote(body).into_response()),
        Ok(_) => tracing::warn!(profile_id = %id, "empty update response from baseline engine"),
        Err(e) => tracing::warn!(profile_id = %id, error = %e, "baseline engine update failed"),
    }

    let profile = state
        .store
        .update_profile(&id, &req.changes())
        .await
        .map_err(ApiError::store(UPDATE_FAILED))?
        .ok_or_else(|| ApiError::not_found(NOT_FOUND))?;
    tracing::info!(profile_id = %id, "profile updated in local store");
    Ok(Sourced::local(profile).into_response())
}

#[derive(Serialize)]
struct Deleted<'a> {
    message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    profile_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    profile: Option<Profile>,
}

/// DELETE /api/profiles/{id}
pub async fn delete_profile(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    match state.engine.delete_profile(&id).await {
        Ok(()) => {
            let body = Deleted {
                message: DELETED,
                profile_id: Some(&id),
                profile: None,
            };
            return Ok(Sourced::remote(body).into_response());
        }
        Err(e) => tracing::warn!(profile_id = %id, error = %e, "baseline engine delete failed"),
    }

    let profile = state
        .store
        .delete_profile(&id)
        .await
        .map_err(ApiError::store(DELETE_FAILED))?
        .ok_or_else(|| ApiError::not_found(NOT_FOUND))?;
    tracing::info!(profile_id = %id, "profile deleted from local store");
    let body = Deleted {
        message: DELETED,
        profile_id: None,
        profile: Some(profile),
    };
    Ok(Sourced::local(body).into_response())
}

/// GET /api/profiles/{id}/baseline-status
pub async fn baseline_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let body = state
        .engine
        .profile_baseline_status(&id)
        .await
        .map_err(ApiError::engine("베이스라인 상태 조회 중 오류가 발생했습니다."))?;
    Ok(Sourced::remote(body).into_response())
}

#[derive(Debug, Default, Deserialize)]
pub struct BaselineResultsQuery {
    pub metric_name: Option<String>,
    pub version: Option<String>,
}

/// GET /api/profiles/{id}/baseline-results
pub async fn baseline_results(
    State(state): State<AppState>,
    Path(id): Path<String>,
    query: Result<Query<BaselineResultsQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query?;
    let body = state
        .engine
        .baselines(&id, query.metric_name.as_deref(), query.version.as_deref())
        .await
        .map_err(ApiError::engine("베이스라인 결과 조회 중 오류가 발생했습니다."))?;
    Ok(Sourced::remote(body).into_response())
}

#[derive(Debug, Default, Deserialize)]
pub struct DeviationQuery {
    pub target_entity: Option<String>,
    pub calculation_date: Option<String>,
    /// Comma-separated metric keys.
    pub metric_names: Option<String>,
}

impl DeviationQuery {
    fn into_request(self, profile_id: String) -> Option<DeviationRequest> {
        let target_entity = self.target_entity.filter(|t| !t.is_empty())?;
        let metric_names = self
            .metric_names
            .map(|names| {
                names
                    .split(',')
                    .map(str::trim)
                    .filter(|n| !n.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .filter(|names| !names.is_empty());
        Some(DeviationRequest {
            profile_id,
            target_entity,
            calculation_date: self.calculation_date.filter(|d| !d.is_empty()),
            metric_names,
        })
    }
}

/// GET /api/profiles/{id}/deviation
pub async fn deviation(
    State(state): State<AppState>,
    Path(id): Path<String>,
    query: Result<Query<DeviationQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query?;
    let request = query
        .into_request(id)
        .ok_or_else(|| ApiError::bad_request("대상 엔티티(target_entity)가 필요합니다."))?;
    let body = state
        .engine
        .calculate_deviations(&request)
        .await
        .map_err(ApiError::engine("편차 계산 중 오류가 발생했습니다."))?;
    Ok(Sourced::remote(body).into_response())
}

/// GET /api/profiles/{id}/anomalies
pub async fn anomalies(
    State(state): State<AppState>,
    Path(id): Path<String>,
    query: Result<Query<AnomalyQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query?;
    let body = state
        .engine
        .anomalies(&id, &query)
        .await
        .map_err(ApiError::engine("이상치 조회 중 오류가 발생했습니다."))?;
    Ok(Sourced::remote(body).into_response())
}

async fn analytics_view(
    state: AppState,
    id: String,
    view: ProfileView,
    query: Vec<(String, String)>,
) -> Response {
    match state.engine.profile_analytics(&id, view, &query).await {
        Ok(body) if present(&body) => return Sourced::remote(body).into_response(),
        Ok(_) => tracing::warn!(profile_id = %id, view = view.name(), "empty analytics view, simulating"),
        Err(e) => tracing::warn!(
            profile_id = %id,
            view = view.name(),
            error = %e,
            "analytics view unavailable, simulating"
        ),
    }
    Sourced::simulated(simulate::profile_view(&id, view, Utc::now().date_naive())).into_response()
}

/// GET /api/profiles/{id}/timeline
pub async fn timeline(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<Vec<(String, String)>>,
) -> Response {
    analytics_view(state, id, ProfileView::Timeline, query).await
}

/// GET /api/profiles/{id}/hourly-patterns
pub async fn hourly_patterns(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<Vec<(String, String)>>,
) -> Response {
    analytics_view(state, id, ProfileView::HourlyPatterns, query).await
}

/// GET /api/profiles/{id}/quality-trends
pub async fn quality_trends(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<Vec<(String, String)>>,
) -> Response {
    analytics_view(state, id, ProfileView::QualityTrends, query).await
}

/// GET /api/profiles/{id}/anomalies-timeline
pub async fn anomalies_timeline(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<Vec<(String, String)>>,
) -> Response {
    analytics_view(state, id, ProfileView::AnomaliesTimeline, query).await
}

#[derive(Debug, Default, Deserialize)]
struct GenerateRequest {
    #[serde(default)]
    force: bool,
}

/// POST /api/profiles/{id}/baseline/generate
///
/// The body is optional; `{"force": true}` regenerates an existing baseline.
pub async fn generate_baseline(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let request: GenerateRequest = if body.is_empty() {
        GenerateRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::bad_request(format!("잘못된 요청 본문입니다: {e}")))?
    };
    let body = state
        .engine
        .generate_manual_baseline(&[id], request.force)
        .await
        .map_err(ApiError::engine("베이스라인 생성 요청 중 오류가 발생했습니다."))?;
    Ok(Sourced::remote(body).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn list_shapes_are_normalized() {
        let items = json!([{"id": "a"}]);
        assert_eq!(normalize_profile_list(items.clone()), vec![json!({"id": "a"})]);
        assert_eq!(normalize_profile_list(json!({"profiles": items.clone(), "count": 1})).len(), 1);
        assert_eq!(normalize_profile_list(json!({"data": items.clone()})).len(), 1);
        assert_eq!(normalize_profile_list(json!({"results": items})).len(), 1);
    }

    #[test]
    fn first_array_key_wins() {
        let body = json!({"profiles": "not-a-list", "data": [{"id": "d"}], "results": [{"id": "r"}]});
        assert_eq!(normalize_profile_list(body), vec![json!({"id": "d"})]);
    }

    #[test]
    fn other_shapes_are_empty() {
        assert!(normalize_profile_list(json!({"items": [1]})).is_empty());
        assert!(normalize_profile_list(json!("x")).is_empty());
    }

    #[test]
    fn deviation_query_splits_metric_names() {
        let q = DeviationQuery {
            target_entity: Some("user0001".into()),
            calculation_date: Some(String::new()),
            metric_names: Some("session_duration, login_time_pattern,".into()),
        };
        let req = q.into_request("p1".into()).unwrap();
        assert_eq!(
            req.metric_names,
            Some(vec!["session_duration".to_string(), "login_time_pattern".to_string()])
        );
        assert_eq!(req.calculation_date, None);

        let missing = DeviationQuery::default();
        assert!(missing.into_request("p1".into()).is_none());
    }
}
