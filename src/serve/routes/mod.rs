pub mod baseline_engine;
pub mod individual_users;
pub mod profile_status;
pub mod profiles;

use axum::http::{HeaderName, HeaderValue, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use crate::engine::BaselineEngineClient;
use crate::error::ApiError;
use crate::models::Sourced;
use crate::store::ProfileStore;

pub const DATA_SOURCE_HEADER: HeaderName = HeaderName::from_static("x-data-source");

/// Shared handler dependencies.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ProfileStore>,
    pub engine: Arc<BaselineEngineClient>,
    /// Engine profile whose users back `/api/individual-users`.
    pub users_profile_id: String,
}

impl<T: Serialize> IntoResponse for Sourced<T> {
    fn into_response(self) -> Response {
        let mut res = Json(self.data).into_response();
        res.headers_mut()
            .insert(DATA_SOURCE_HEADER, HeaderValue::from_static(self.source.as_str()));
        res
    }
}

/// Whether an engine answer counts as a usable result. `null`, `false`,
/// `0` and `""` do not.
pub(crate) fn present(body: &Value) -> bool {
    match body {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

async fn api_not_found(uri: Uri) -> ApiError {
    ApiError::not_found(format!("요청한 API를 찾을 수 없습니다: {}", uri.path()))
}

/// Build the application router with all API routes.
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        // Profiles, engine first with local fallback
        .route("/profiles", get(profiles::list_profiles).post(profiles::create_profile))
        .route(
            "/profiles/{id}",
            get(profiles::get_profile)
                .put(profiles::update_profile)
                .delete(profiles::delete_profile),
        )
        .route("/profiles/{id}/baseline-status", get(profiles::baseline_status))
        .route("/profiles/{id}/baseline-results", get(profiles::baseline_results))
        .route("/profiles/{id}/deviation", get(profiles::deviation))
        .route("/profiles/{id}/anomalies", get(profiles::anomalies))
        .route("/profiles/{id}/timeline", get(profiles::timeline))
        .route("/profiles/{id}/hourly-patterns", get(profiles::hourly_patterns))
        .route("/profiles/{id}/quality-trends", get(profiles::quality_trends))
        .route("/profiles/{id}/anomalies-timeline", get(profiles::anomalies_timeline))
        .route("/profiles/{id}/baseline/generate", post(profiles::generate_baseline))
        // Profile status, local only
        .route("/profile-status", get(profile_status::list_statuses))
        .route(
            "/profile-status/{profile_id}",
            get(profile_status::get_status).put(profile_status::update_status),
        )
        .route(
            "/profile-status/all/with-profile",
            get(profile_status::profiles_with_status),
        )
        // Baseline engine passthrough
        .route("/baseline-engine/health", get(baseline_engine::health))
        .route(
            "/baseline-engine/metrics/supported",
            get(baseline_engine::supported_metrics),
        )
        .route(
            "/baseline-engine/profiles",
            get(baseline_engine::list_profiles).post(baseline_engine::create_profile),
        )
        .route(
            "/baseline-engine/profiles/{id}",
            get(baseline_engine::get_profile)
                .put(baseline_engine::update_profile)
                .delete(baseline_engine::delete_profile),
        )
        .route(
            "/baseline-engine/profiles/{id}/status",
            patch(baseline_engine::update_profile_status),
        )
        .route(
            "/baseline-engine/profiles/{id}/diagnose",
            post(baseline_engine::diagnose_profile),
        )
        .route(
            "/baseline-engine/vpn-profile/validate",
            post(baseline_engine::validate_vpn),
        )
        .route("/baseline-engine/vpn-profile/config", post(baseline_engine::vpn_config))
        .route("/baseline-engine/vpn-profile/metrics", get(baseline_engine::vpn_metrics))
        .route("/baseline-engine/baselines/create", post(baseline_engine::create_baseline))
        .route("/baseline-engine/baselines/manual", post(baseline_engine::manual_baseline))
        .route("/baseline-engine/baselines/jobs/{job_id}", get(baseline_engine::job_status))
        .route("/baseline-engine/baselines/history", get(baseline_engine::history))
        .route("/baseline-engine/baselines/{profile_id}", get(baseline_engine::baselines))
        .route(
            "/baseline-engine/baselines/{profile_id}/{baseline_id}",
            get(baseline_engine::baseline_detail),
        )
        .route(
            "/baseline-engine/deviations/calculate",
            post(baseline_engine::calculate_deviations),
        )
        .route(
            "/baseline-engine/deviations/{profile_id}/anomalies",
            get(baseline_engine::anomalies),
        )
        // Individual users
        .route("/individual-users", get(individual_users::list_users))
        .route("/individual-users/{user_id}", get(individual_users::user_detail))
        .route(
            "/individual-users/{user_id}/baseline-comparison",
            get(individual_users::baseline_comparison),
        )
        .route(
            "/individual-users/{user_id}/temporal-patterns",
            get(individual_users::temporal_patterns),
        )
        .fallback(api_not_found)
        .with_state(state);

    Router::new().nest("/api", api)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::json;
    use std::time::Duration;
    use tower::ServiceExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const UNREACHABLE: &str = "http://127.0.0.1:9";

    fn app(store: Arc<MemoryStore>, engine_url: &str) -> Router {
        let engine = BaselineEngineClient::new(engine_url, Duration::from_secs(2)).unwrap();
        build_router(AppState {
            store,
            engine: Arc::new(engine),
            users_profile_id: "prof-1".into(),
        })
    }

    async fn send(app: Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Option<String>, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(v) => {
                req = req.header("content-type", "application/json");
                Body::from(v.to_string())
            }
            None => Body::empty(),
        };
        let res = app.oneshot(req.body(body).unwrap()).await.unwrap();
        let status = res.status();
        let source = res
            .headers()
            .get(DATA_SOURCE_HEADER)
            .map(|v| v.to_str().unwrap().to_string());
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, source, value)
    }

    #[test]
    fn presence_follows_js_truthiness() {
        assert!(!present(&Value::Null));
        assert!(!present(&json!(false)));
        assert!(!present(&json!(0)));
        assert!(!present(&json!("")));
        assert!(present(&json!([])));
        assert!(present(&json!({})));
    }

    #[tokio::test]
    async fn create_falls_back_to_local_store() {
        let store = Arc::new(MemoryStore::new());
        let body = json!({
            "id": "p1",
            "name": "Test",
            "profileType": "user",
            "analysisScope": "department",
            "selectedMetrics": ["로그인 시간 패턴"],
        });
        let (status, source, v) =
            send(app(store.clone(), UNREACHABLE), Method::POST, "/api/profiles", Some(body)).await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(source.as_deref(), Some("local"));
        assert_eq!(v["id"], "p1");
        assert!(v["data"].get("selected_metrics").is_none());
        assert_eq!(v["data"]["selectedMetrics"][0], "로그인 시간 패턴");

        let status_row = store.get_status("p1").await.unwrap().unwrap();
        assert_eq!(status_row.status, "stopped");
    }

    #[tokio::test]
    async fn create_without_name_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let (status, _, v) = send(
            app(store.clone(), UNREACHABLE),
            Method::POST,
            "/api/profiles",
            Some(json!({"profileType": "user"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(v["error"], "프로파일 이름이 필요합니다.");
        assert_eq!(store.profile_count(), 0);
    }

    #[tokio::test]
    async fn update_and_delete_fall_back() {
        let store = Arc::new(MemoryStore::new());
        store.seed("p1", "VPN", 10);

        let (status, source, v) = send(
            app(store.clone(), UNREACHABLE),
            Method::PUT,
            "/api/profiles/p1",
            Some(json!({"name": "VPN 2", "description": "updated"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(source.as_deref(), Some("local"));
        assert_eq!(v["name"], "VPN 2");

        let (status, _, _) = send(
            app(store.clone(), UNREACHABLE),
            Method::PUT,
            "/api/profiles/missing",
            Some(json!({"name": "x"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _, v) =
            send(app(store.clone(), UNREACHABLE), Method::DELETE, "/api/profiles/p1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["message"], "프로파일이 삭제되었습니다.");
        assert_eq!(v["profile"]["id"], "p1");
        assert_eq!(store.status_count(), 0);

        let (status, _, v) =
            send(app(store, UNREACHABLE), Method::DELETE, "/api/profiles/p1", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(v["error"], "프로파일을 찾을 수 없습니다.");
    }

    #[tokio::test]
    async fn list_prefers_engine() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/profiles/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"profiles": [{"id": "r1"}, {"id": "r2"}], "count": 2})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(MemoryStore::new());
        store.seed("local-only", "Local", 0);
        let (status, source, v) =
            send(app(store, &server.uri()), Method::GET, "/api/profiles", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(source.as_deref(), Some("remote"));
        assert_eq!(v, json!([{"id": "r1"}, {"id": "r2"}]));
    }

    #[tokio::test]
    async fn list_falls_back_newest_first() {
        let store = Arc::new(MemoryStore::new());
        store.seed("old", "Old", 100);
        store.seed("new", "New", 1);
        let (status, source, v) =
            send(app(store, UNREACHABLE), Method::GET, "/api/profiles", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(source.as_deref(), Some("local"));
        assert_eq!(v[0]["id"], "new");
        assert_eq!(v[1]["id"], "old");
    }

    #[tokio::test]
    async fn database_failures_hide_internal_detail() {
        let store = Arc::new(MemoryStore::new());
        store.set_offline(true);

        let (status, _, v) =
            send(app(store.clone(), UNREACHABLE), Method::GET, "/api/profiles", None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(v["error"], "프로파일 조회 중 오류가 발생했습니다.");
        assert_eq!(v["message"], v["error"]);

        let (status, _, v) =
            send(app(store, UNREACHABLE), Method::GET, "/api/profile-status", None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let text = v.to_string();
        assert!(!text.contains("timed out"));
        assert!(!text.contains("database"));
    }

    #[tokio::test]
    async fn unknown_api_route_is_json_404() {
        let store = Arc::new(MemoryStore::new());
        let (status, _, v) = send(app(store, UNREACHABLE), Method::GET, "/api/nope", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(v["error"].as_str().is_some_and(|e| e.contains("/api/nope")));
    }

    #[tokio::test]
    async fn status_update_rules() {
        let store = Arc::new(MemoryStore::new());
        store.seed("p1", "VPN", 0);

        let (status, _, v) = send(
            app(store.clone(), UNREACHABLE),
            Method::PUT,
            "/api/profile-status/p1",
            Some(json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(v["error"], "업데이트할 필드가 없습니다.");

        let (status, _, v) = send(
            app(store.clone(), UNREACHABLE),
            Method::PUT,
            "/api/profile-status/p1",
            Some(json!({"status": "running", "priority": "high"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["status"], "running");
        assert_eq!(v["priority"], "high");
        assert!(!v["last_run"].is_null());

        let (status, _, _) = send(
            app(store.clone(), UNREACHABLE),
            Method::PUT,
            "/api/profile-status/ghost",
            Some(json!({"status": "stopped"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _, v) = send(
            app(store, UNREACHABLE),
            Method::GET,
            "/api/profile-status/all/with-profile",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v[0]["name"], "VPN");
        assert_eq!(v[0]["status"], "running");
    }

    #[tokio::test]
    async fn engine_health_unreachable_is_503() {
        let store = Arc::new(MemoryStore::new());
        let (status, _, v) = send(
            app(store, UNREACHABLE),
            Method::GET,
            "/api/baseline-engine/health",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(v["status"], "error");
        assert_eq!(v["error"], "베이스라인 엔진 서버에 연결할 수 없습니다.");
        assert!(v["timestamp"].is_string());
    }

    #[tokio::test]
    async fn vpn_create_is_validated_before_forwarding() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/profiles/"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "x"})))
            .expect(0)
            .mount(&server)
            .await;

        let store = Arc::new(MemoryStore::new());
        let (status, _, v) = send(
            app(store, &server.uri()),
            Method::POST,
            "/api/baseline-engine/profiles",
            Some(json!({
                "name": "vpn",
                "log_source": "vpn",
                "selected_metrics": ["login_time_pattern", "email_behavior_pattern"],
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(v["error"], "메트릭 검증 실패");
        assert_eq!(v["validation_result"]["is_valid"], false);
        assert_eq!(v["status"], "error");
    }

    #[tokio::test]
    async fn passthrough_wraps_in_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/baselines/jobs/job-7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"state": "done"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/profiles/gone"))
            .respond_with(ResponseTemplate::new(404).set_body_string("missing"))
            .mount(&server)
            .await;

        let store = Arc::new(MemoryStore::new());
        let (status, _, v) = send(
            app(store.clone(), &server.uri()),
            Method::GET,
            "/api/baseline-engine/baselines/jobs/job-7",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["status"], "success");
        assert_eq!(v["data"]["state"], "done");

        let (status, _, v) = send(
            app(store, &server.uri()),
            Method::GET,
            "/api/baseline-engine/profiles/gone",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(v["error"], "프로파일을 찾을 수 없습니다.");
    }

    #[tokio::test]
    async fn manual_baseline_needs_profile_ids() {
        let store = Arc::new(MemoryStore::new());
        let (status, _, v) = send(
            app(store, UNREACHABLE),
            Method::POST,
            "/api/baseline-engine/baselines/manual",
            Some(json!({"profile_ids": []})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(v["status"], "error");
    }

    #[tokio::test]
    async fn analytics_views_simulate_when_engine_is_down() {
        let store = Arc::new(MemoryStore::new());
        let (status, source, v) = send(
            app(store.clone(), UNREACHABLE),
            Method::GET,
            "/api/profiles/p1/hourly-patterns",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(source.as_deref(), Some("simulated"));
        assert_eq!(v["simulation_mode"], true);

        let (status, source, v) = send(
            app(store, UNREACHABLE),
            Method::GET,
            "/api/individual-users/user0042/temporal-patterns",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(source.as_deref(), Some("simulated"));
        assert_eq!(v["userId"], "user0042");
    }

    #[tokio::test]
    async fn deviation_requires_target_entity() {
        let store = Arc::new(MemoryStore::new());
        let (status, _, _) = send(
            app(store, UNREACHABLE),
            Method::GET,
            "/api/profiles/p1/deviation",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn individual_users_are_reshaped_and_paged() {
        let server = MockServer::start().await;
        let users: Vec<Value> = (0..5)
            .map(|i| {
                json!({
                    "user_id": format!("user{i:04}"),
                    "baseline_summary": {"overall_deviation_score": 0.9, "average_quality_score": 0.8},
                    "top_anomalies": [],
                })
            })
            .collect();
        Mock::given(method("GET"))
            .and(path("/api/v1/users/prof-1/baselines"))
            .and(wiremock::matchers::query_param("limit", "6"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "users": users })))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(MemoryStore::new());
        let (status, _, v) = send(
            app(store, &server.uri()),
            Method::GET,
            "/api/individual-users?page=2&limit=2&riskLevel=high",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        // 0.9 * 200 = 180 before jitter, always high
        assert_eq!(v["totalCount"], 5);
        assert_eq!(v["totalPages"], 3);
        assert_eq!(v["page"], 2);
        assert_eq!(v["users"].as_array().map(Vec::len), Some(2));
        assert_eq!(v["users"][0]["id"], "user0002");
        assert_eq!(v["users"][0]["name"], "박민수");
        assert_eq!(v["users"][0]["metrics"][0], "정상 범위");
    }

    #[tokio::test]
    async fn individual_users_without_users_array_is_500() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/users/prof-1/baselines"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
            .mount(&server)
            .await;

        let store = Arc::new(MemoryStore::new());
        let (status, _, v) =
            send(app(store, &server.uri()), Method::GET, "/api/individual-users", None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(v["error"], "개별 사용자 목록을 가져올 수 없습니다.");
    }

    #[tokio::test]
    async fn user_detail_defaults_failed_auxiliary_views() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/users/prof-1/user0042/baseline-details"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "individual_baselines": [{"metric_name": "session_duration"}],
                "common_baselines": [],
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/users/prof-1/user0042/baseline-quality"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "overall_quality": {"average_quality_score": 0.9}
            })))
            .mount(&server)
            .await;

        let store = Arc::new(MemoryStore::new());
        let (status, _, v) = send(
            app(store, &server.uri()),
            Method::GET,
            "/api/individual-users/user0042",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["individualBaseline"]["quality"], 90);
        assert_eq!(v["anomalies"]["anomalies"], json!([]));
        assert_eq!(v["temporalPatterns"]["hourly_patterns"], json!([]));
        assert_eq!(v["metricComparisons"][0]["metricName"], "세션 지속시간");
    }
}
