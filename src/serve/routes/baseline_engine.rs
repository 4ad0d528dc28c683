//! `/api/baseline-engine/*`: thin passthrough to the engine with every
//! answer wrapped in a `{status, data, timestamp}` envelope.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::AppState;
use crate::engine::vpn::{validate_vpn_metrics, vpn_metric_groups, vpn_profile_config, VpnProfileRequest};
use crate::engine::{AnomalyQuery, DeviationRequest, EngineError, HistoryFilters, ProfileFilters};
use crate::error::ApiError;

#[derive(Serialize)]
struct Envelope<T> {
    status: &'static str,
    data: T,
    timestamp: DateTime<Utc>,
}

fn success<T: Serialize>(data: T) -> Response {
    Json(Envelope {
        status: "success",
        data,
        timestamp: Utc::now(),
    })
    .into_response()
}

/// `ApiError` rendered with `status: "error"` and a timestamp.
#[derive(Debug)]
pub struct EnvelopeError(pub ApiError);

impl From<ApiError> for EnvelopeError {
    fn from(err: ApiError) -> Self {
        EnvelopeError(err)
    }
}

impl From<JsonRejection> for EnvelopeError {
    fn from(rejection: JsonRejection) -> Self {
        EnvelopeError(rejection.into())
    }
}

impl From<QueryRejection> for EnvelopeError {
    fn from(rejection: QueryRejection) -> Self {
        EnvelopeError(rejection.into())
    }
}

impl IntoResponse for EnvelopeError {
    fn into_response(self) -> Response {
        let (status, mut body) = self.0.parts();
        if status.is_server_error() {
            tracing::error!(status = %status, error = %self.0, "baseline engine request failed");
        }
        body.insert("status".into(), Value::String("error".into()));
        body.insert("timestamp".into(), Value::String(Utc::now().to_rfc3339()));
        (status, Json(Value::Object(body))).into_response()
    }
}

type Enveloped = Result<Response, EnvelopeError>;

/// Remote 404 becomes `not_found`; anything else keeps `failed`.
fn lookup_error(not_found: &'static str, failed: &'static str) -> impl FnOnce(EngineError) -> ApiError {
    move |e| {
        if e.is_not_found() {
            ApiError::not_found(not_found)
        } else {
            ApiError::engine(failed)(e)
        }
    }
}

/// GET /api/baseline-engine/health
pub async fn health(State(state): State<AppState>) -> Enveloped {
    let body = state
        .engine
        .health()
        .await
        .map_err(ApiError::unavailable("베이스라인 엔진 서버에 연결할 수 없습니다."))?;
    Ok(success(body))
}

/// GET /api/baseline-engine/metrics/supported
pub async fn supported_metrics(State(state): State<AppState>) -> Enveloped {
    let body = state
        .engine
        .supported_metrics()
        .await
        .map_err(ApiError::engine("지원 메트릭 조회 중 오류가 발생했습니다."))?;
    Ok(success(body))
}

/// GET /api/baseline-engine/profiles
pub async fn list_profiles(
    State(state): State<AppState>,
    filters: Result<Query<ProfileFilters>, QueryRejection>,
) -> Enveloped {
    let Query(filters) = filters?;
    let body = state
        .engine
        .list_profiles(&filters)
        .await
        .map_err(ApiError::engine("프로파일 목록 조회 중 오류가 발생했습니다."))?;
    Ok(success(body))
}

/// GET /api/baseline-engine/profiles/{id}
pub async fn get_profile(State(state): State<AppState>, Path(id): Path<String>) -> Enveloped {
    let body = state.engine.get_profile(&id).await.map_err(lookup_error(
        "프로파일을 찾을 수 없습니다.",
        "프로파일 조회 중 오류가 발생했습니다.",
    ))?;
    Ok(success(body))
}

/// POST /api/baseline-engine/profiles
///
/// VPN profiles with a metric selection are validated before forwarding.
pub async fn create_profile(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Enveloped {
    let Json(profile) = body?;

    let is_vpn = profile.get("log_source").and_then(Value::as_str) == Some("vpn");
    if let (true, Some(selected)) = (is_vpn, profile.get("selected_metrics").and_then(Value::as_array)) {
        let selected: Vec<String> = selected
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect();
        let validation = validate_vpn_metrics(&selected);
        if !validation.is_valid {
            tracing::warn!(
                invalid = ?validation.invalid_metrics,
                missing = ?validation.missing_essential,
                "vpn profile rejected"
            );
            let mut details = Map::new();
            details.insert(
                "validation_result".into(),
                serde_json::to_value(&validation).unwrap_or(Value::Null),
            );
            return Err(ApiError::rejected("메트릭 검증 실패", details).into());
        }
    }

    let created = state
        .engine
        .create_profile(&profile)
        .await
        .map_err(ApiError::engine("프로파일 생성 중 오류가 발생했습니다."))?;
    Ok((StatusCode::CREATED, success(created)).into_response())
}

/// PUT /api/baseline-engine/profiles/{id}
pub async fn update_profile(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Enveloped {
    let Json(profile) = body?;
    let updated = state
        .engine
        .update_profile(&id, &profile)
        .await
        .map_err(ApiError::engine("프로파일 업데이트 중 오류가 발생했습니다."))?;
    Ok(success(updated))
}

#[derive(Debug, Deserialize)]
pub struct StatusChange {
    pub status: Option<String>,
    pub reason: Option<String>,
}

/// PATCH /api/baseline-engine/profiles/{id}/status
pub async fn update_profile_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<StatusChange>, JsonRejection>,
) -> Enveloped {
    let Json(change) = body?;
    let status = change
        .status
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::bad_request("상태 값이 필요합니다."))?;
    let updated = state
        .engine
        .update_profile_status(&id, &status, change.reason.as_deref())
        .await
        .map_err(ApiError::engine("프로파일 상태 업데이트 중 오류가 발생했습니다."))?;
    Ok(success(updated))
}

/// POST /api/baseline-engine/profiles/{id}/diagnose
pub async fn diagnose_profile(State(state): State<AppState>, Path(id): Path<String>) -> Enveloped {
    let diagnosis = state
        .engine
        .diagnose_profile(&id)
        .await
        .map_err(ApiError::engine("프로파일 진단 중 오류가 발생했습니다."))?;
    Ok(success(diagnosis))
}

#[derive(Serialize)]
struct DeletedEnvelope {
    status: &'static str,
    message: &'static str,
    profile_id: String,
    timestamp: DateTime<Utc>,
}

/// DELETE /api/baseline-engine/profiles/{id}
pub async fn delete_profile(State(state): State<AppState>, Path(id): Path<String>) -> Enveloped {
    state
        .engine
        .delete_profile(&id)
        .await
        .map_err(ApiError::engine("프로파일 삭제 중 오류가 발생했습니다."))?;
    Ok(Json(DeletedEnvelope {
        status: "success",
        message: "프로파일이 성공적으로 삭제되었습니다.",
        profile_id: id,
        timestamp: Utc::now(),
    })
    .into_response())
}

/// POST /api/baseline-engine/vpn-profile/validate
pub async fn validate_vpn(body: Result<Json<Value>, JsonRejection>) -> Enveloped {
    let Json(body) = body?;
    let selected: Vec<String> = body
        .get("selected_metrics")
        .and_then(Value::as_array)
        .ok_or_else(|| ApiError::bad_request("선택된 메트릭 배열이 필요합니다."))?
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect();
    Ok(success(validate_vpn_metrics(&selected)))
}

/// POST /api/baseline-engine/vpn-profile/config
pub async fn vpn_config(body: Result<Json<VpnProfileRequest>, JsonRejection>) -> Enveloped {
    let Json(request) = body?;
    Ok(success(vpn_profile_config(&request)))
}

/// GET /api/baseline-engine/vpn-profile/metrics
pub async fn vpn_metrics() -> Response {
    success(vpn_metric_groups())
}

/// POST /api/baseline-engine/baselines/create
pub async fn create_baseline(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Enveloped {
    let Json(config) = body?;
    let job = state
        .engine
        .create_baseline(&config)
        .await
        .map_err(ApiError::engine("베이스라인 생성 중 오류가 발생했습니다."))?;
    Ok((StatusCode::CREATED, success(job)).into_response())
}

#[derive(Debug, Deserialize)]
pub struct ManualBaselineRequest {
    #[serde(default)]
    pub profile_ids: Vec<String>,
    #[serde(default)]
    pub force: bool,
}

/// POST /api/baseline-engine/baselines/manual
pub async fn manual_baseline(
    State(state): State<AppState>,
    body: Result<Json<ManualBaselineRequest>, JsonRejection>,
) -> Enveloped {
    let Json(request) = body?;
    if request.profile_ids.is_empty() {
        return Err(ApiError::bad_request("프로파일 ID 목록이 필요합니다.").into());
    }
    let job = state
        .engine
        .generate_manual_baseline(&request.profile_ids, request.force)
        .await
        .map_err(ApiError::engine("수동 베이스라인 생성 중 오류가 발생했습니다."))?;
    Ok(success(job))
}

/// GET /api/baseline-engine/baselines/jobs/{job_id}
pub async fn job_status(State(state): State<AppState>, Path(job_id): Path<String>) -> Enveloped {
    let job = state.engine.baseline_job_status(&job_id).await.map_err(lookup_error(
        "베이스라인 작업을 찾을 수 없습니다.",
        "베이스라인 작업 상태 조회 중 오류가 발생했습니다.",
    ))?;
    Ok(success(job))
}

/// GET /api/baseline-engine/baselines/history
pub async fn history(
    State(state): State<AppState>,
    filters: Result<Query<HistoryFilters>, QueryRejection>,
) -> Enveloped {
    let Query(filters) = filters?;
    let body = state
        .engine
        .baseline_history(&filters)
        .await
        .map_err(ApiError::engine("베이스라인 실행 이력 조회 중 오류가 발생했습니다."))?;
    Ok(success(body))
}

#[derive(Debug, Default, Deserialize)]
pub struct BaselineListQuery {
    pub metric_name: Option<String>,
    pub version: Option<String>,
}

/// GET /api/baseline-engine/baselines/{profile_id}
pub async fn baselines(
    State(state): State<AppState>,
    Path(profile_id): Path<String>,
    query: Result<Query<BaselineListQuery>, QueryRejection>,
) -> Enveloped {
    let Query(query) = query?;
    let body = state
        .engine
        .baselines(&profile_id, query.metric_name.as_deref(), query.version.as_deref())
        .await
        .map_err(ApiError::engine("베이스라인 조회 중 오류가 발생했습니다."))?;
    Ok(success(body))
}

/// GET /api/baseline-engine/baselines/{profile_id}/{baseline_id}
pub async fn baseline_detail(
    State(state): State<AppState>,
    Path((profile_id, baseline_id)): Path<(String, String)>,
) -> Enveloped {
    let body = state
        .engine
        .baseline_detail(&profile_id, &baseline_id)
        .await
        .map_err(lookup_error(
            "베이스라인을 찾을 수 없습니다.",
            "베이스라인 상세 조회 중 오류가 발생했습니다.",
        ))?;
    Ok(success(body))
}

#[derive(Debug, Deserialize)]
pub struct CalculateRequest {
    pub profile_id: Option<String>,
    pub target_entity: Option<String>,
    pub calculation_date: Option<String>,
    pub metric_names: Option<Vec<String>>,
}

/// POST /api/baseline-engine/deviations/calculate
pub async fn calculate_deviations(
    State(state): State<AppState>,
    body: Result<Json<CalculateRequest>, JsonRejection>,
) -> Enveloped {
    let Json(req) = body?;
    let (Some(profile_id), Some(target_entity)) = (
        req.profile_id.filter(|p| !p.is_empty()),
        req.target_entity.filter(|t| !t.is_empty()),
    ) else {
        return Err(ApiError::bad_request("profile_id와 target_entity가 필요합니다.").into());
    };
    let request = DeviationRequest {
        profile_id,
        target_entity,
        calculation_date: req.calculation_date,
        metric_names: req.metric_names,
    };
    let body = state
        .engine
        .calculate_deviations(&request)
        .await
        .map_err(ApiError::engine("편차 계산 중 오류가 발생했습니다."))?;
    Ok(success(body))
}

/// GET /api/baseline-engine/deviations/{profile_id}/anomalies
pub async fn anomalies(
    State(state): State<AppState>,
    Path(profile_id): Path<String>,
    query: Result<Query<AnomalyQuery>, QueryRejection>,
) -> Enveloped {
    let Query(query) = query?;
    let body = state
        .engine
        .anomalies(&profile_id, &query)
        .await
        .map_err(ApiError::engine("이상치 조회 중 오류가 발생했습니다."))?;
    Ok(success(body))
}
