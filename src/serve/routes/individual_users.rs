use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;

use super::{present, AppState};
use crate::engine::{EngineError, UserView};
use crate::error::ApiError;
use crate::models::Sourced;
use crate::simulate;
use crate::users::{
    comparison_from_details, remote_users, user_detail as assemble_detail, UserDetailParts,
    UserListQuery, UserSummary,
};

const LIST_FAILED: &str = "개별 사용자 목록을 가져올 수 없습니다.";
const DETAIL_FAILED: &str = "사용자 상세 정보를 가져올 수 없습니다.";

/// GET /api/individual-users
pub async fn list_users(
    State(state): State<AppState>,
    query: Result<Query<UserListQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query?;
    let (page, limit) = (query.page(), query.limit());

    // Over-fetch so the page survives in-process filtering.
    let body = state
        .engine
        .user_baselines(&state.users_profile_id, page, limit.saturating_mul(3))
        .await
        .map_err(ApiError::engine(LIST_FAILED))?;
    let remote = remote_users(&body).ok_or_else(|| {
        ApiError::internal(
            LIST_FAILED,
            "베이스라인 엔진에서 사용자 데이터를 받을 수 없습니다.",
        )
    })?;

    let now = Utc::now();
    let users: Vec<UserSummary> = remote
        .iter()
        .map(|u| UserSummary::from_remote(u, now))
        .collect();
    let page = query.paginate(query.filter(users));
    tracing::debug!(
        total = page.total_count,
        page = page.page,
        returned = page.users.len(),
        "individual users listed"
    );
    Ok(Sourced::remote(page).into_response())
}

fn or_default(view: &str, result: Result<Value, EngineError>, default: fn() -> Value) -> Value {
    result.unwrap_or_else(|e| {
        tracing::warn!(view, error = %e, "user view unavailable, using default");
        default()
    })
}

/// GET /api/individual-users/{user_id}
pub async fn user_detail(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Response, ApiError> {
    let profile_id = state.users_profile_id.as_str();
    let details = state
        .engine
        .user_view(profile_id, &user_id, UserView::BaselineDetails)
        .await
        .map_err(ApiError::engine(DETAIL_FAILED))?;

    let (anomalies, temporal, quality) = tokio::join!(
        state.engine.user_view(profile_id, &user_id, UserView::Anomalies),
        state.engine.user_view(profile_id, &user_id, UserView::TemporalPatterns),
        state.engine.user_view(profile_id, &user_id, UserView::BaselineQuality),
    );
    let parts = UserDetailParts {
        details,
        anomalies: or_default("anomalies", anomalies, UserDetailParts::default_anomalies),
        temporal_patterns: or_default(
            "temporal-patterns",
            temporal,
            UserDetailParts::default_temporal_patterns,
        ),
        quality: or_default("baseline-quality", quality, UserDetailParts::default_quality),
    };

    Ok(Sourced::remote(assemble_detail(&user_id, parts, Utc::now())).into_response())
}

#[derive(Debug, Default, Deserialize)]
pub struct ComparisonQuery {
    #[serde(rename = "metricName")]
    pub metric_name: Option<String>,
}

/// GET /api/individual-users/{user_id}/baseline-comparison
pub async fn baseline_comparison(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    query: Result<Query<ComparisonQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query?;
    let metric = query.metric_name.as_deref();

    match state
        .engine
        .user_view(&state.users_profile_id, &user_id, UserView::BaselineDetails)
        .await
    {
        Ok(details) => {
            if let Some(cmp) = comparison_from_details(&user_id, metric, &details) {
                return Ok(Sourced::remote(cmp).into_response());
            }
            tracing::warn!(user_id = %user_id, metric = ?metric, "no matching baseline, simulating comparison");
        }
        Err(e) => {
            tracing::warn!(user_id = %user_id, error = %e, "baseline details unavailable, simulating comparison")
        }
    }
    Ok(Sourced::simulated(simulate::baseline_comparison(&user_id, metric)).into_response())
}

/// GET /api/individual-users/{user_id}/temporal-patterns
pub async fn temporal_patterns(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Response {
    match state
        .engine
        .user_view(&state.users_profile_id, &user_id, UserView::TemporalPatterns)
        .await
    {
        Ok(body) if present(&body) => return Sourced::remote(body).into_response(),
        Ok(_) => tracing::warn!(user_id = %user_id, "empty temporal patterns, simulating"),
        Err(e) => {
            tracing::warn!(user_id = %user_id, error = %e, "temporal patterns unavailable, simulating")
        }
    }
    Sourced::simulated(simulate::user_temporal_patterns(&user_id)).into_response()
}
