use reqwest::{header, Client, Method, StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid baseline engine url: {0}")]
    InvalidUrl(String),

    #[error("failed to build http client: {0}")]
    Build(#[source] reqwest::Error),

    #[error("request to {path} failed: {source}")]
    Transport {
        path: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("baseline engine returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("invalid JSON from {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl EngineError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, EngineError::Status { status, .. } if *status == StatusCode::NOT_FOUND)
    }
}

/// Optional filters for the profile list.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ProfileFilters {
    pub status: Option<String>,
    pub profile_type: Option<String>,
    pub log_source: Option<String>,
}

impl ProfileFilters {
    fn query(&self) -> Vec<(&'static str, String)> {
        [
            ("status", &self.status),
            ("profile_type", &self.profile_type),
            ("log_source", &self.log_source),
        ]
        .into_iter()
        .filter_map(|(k, v)| v.clone().map(|v| (k, v)))
        .collect()
    }
}

/// Filters for the baseline execution history.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct HistoryFilters {
    pub profile_id: Option<String>,
    pub status: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl HistoryFilters {
    fn query(&self) -> Vec<(&'static str, String)> {
        let mut q = Vec::new();
        if let Some(v) = &self.profile_id {
            q.push(("profile_id", v.clone()));
        }
        if let Some(v) = &self.status {
            q.push(("status", v.clone()));
        }
        if let Some(v) = self.limit {
            q.push(("limit", v.to_string()));
        }
        if let Some(v) = self.offset {
            q.push(("offset", v.to_string()));
        }
        q
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DeviationRequest {
    pub profile_id: String,
    pub target_entity: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calculation_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric_names: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct AnomalyQuery {
    pub date: Option<String>,
    pub min_score: Option<f64>,
    pub limit: Option<u32>,
}

impl AnomalyQuery {
    fn query(&self) -> Vec<(&'static str, String)> {
        let mut q = vec![
            ("min_score", self.min_score.unwrap_or(0.7).to_string()),
            ("limit", self.limit.unwrap_or(50).to_string()),
        ];
        if let Some(date) = &self.date {
            q.push(("date", date.clone()));
        }
        q
    }
}

/// Per-user analytics views under `/api/v1/users/{profile}/{user}/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserView {
    BaselineDetails,
    Anomalies,
    TemporalPatterns,
    BaselineQuality,
}

impl UserView {
    fn segment(self) -> &'static str {
        match self {
            UserView::BaselineDetails => "baseline-details",
            UserView::Anomalies => "anomalies",
            UserView::TemporalPatterns => "temporal-patterns",
            UserView::BaselineQuality => "baseline-quality",
        }
    }
}

/// Per-profile analytics views under `/api/v1/profiles/{id}/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileView {
    Timeline,
    HourlyPatterns,
    QualityTrends,
    AnomaliesTimeline,
}

impl ProfileView {
    fn segments(self) -> &'static [&'static str] {
        match self {
            ProfileView::Timeline => &["timeline"],
            ProfileView::HourlyPatterns => &["hourly-patterns"],
            ProfileView::QualityTrends => &["quality-trends"],
            ProfileView::AnomaliesTimeline => &["anomalies", "timeline"],
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ProfileView::Timeline => "timeline",
            ProfileView::HourlyPatterns => "hourly-patterns",
            ProfileView::QualityTrends => "quality-trends",
            ProfileView::AnomaliesTimeline => "anomalies-timeline",
        }
    }
}

/// HTTP client for the baseline engine REST API.
///
/// Every call returns an error on transport failure or a non-2xx status;
/// there is no retry. Empty success bodies decode to `Value::Null`.
pub struct BaselineEngineClient {
    http: Client,
    base_url: Url,
}

impl BaselineEngineClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, EngineError> {
        let base_url =
            Url::parse(base_url).map_err(|_| EngineError::InvalidUrl(base_url.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(EngineError::InvalidUrl(base_url.to_string()));
        }

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );

        let http = Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .default_headers(headers)
            .user_agent(concat!("uba-gateway/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(EngineError::Build)?;

        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, EngineError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| EngineError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Issue a request and decode the body, keeping the success status.
    async fn exchange<B>(
        &self,
        method: Method,
        segments: &[&str],
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> Result<(StatusCode, Value), EngineError>
    where
        B: Serialize + ?Sized,
    {
        let url = self.endpoint(segments)?;
        let path = url.path().to_string();
        tracing::info!(method = %method, path = %path, "baseline engine request");

        let mut request = self.http.request(method.clone(), url);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let started = Instant::now();
        let transport = |source: reqwest::Error| EngineError::Transport {
            path: path.clone(),
            source,
        };
        let response = request.send().await.map_err(|e| {
            tracing::warn!(method = %method, path = %path, error = %e, "baseline engine unreachable");
            transport(e)
        })?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(transport)?;

        if !status.is_success() {
            let body = String::from_utf8_lossy(&bytes).into_owned();
            tracing::warn!(method = %method, path = %path, status = %status, body = %body, "baseline engine error response");
            return Err(EngineError::Status { status, body });
        }

        tracing::info!(
            method = %method,
            path = %path,
            status = %status,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "baseline engine response"
        );

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok((status, Value::Null));
        }
        serde_json::from_slice(&bytes)
            .map(|value| (status, value))
            .map_err(|source| EngineError::Decode { path, source })
    }

    async fn send<B>(
        &self,
        method: Method,
        segments: &[&str],
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> Result<Value, EngineError>
    where
        B: Serialize + ?Sized,
    {
        let (_, value) = self.exchange(method, segments, query, body).await?;
        Ok(value)
    }

    async fn get(&self, segments: &[&str], query: &[(&str, String)]) -> Result<Value, EngineError> {
        self.send::<Value>(Method::GET, segments, query, None).await
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        segments: &[&str],
        body: &B,
    ) -> Result<Value, EngineError> {
        self.send(Method::POST, segments, &[], Some(body)).await
    }

    // Health and metadata

    pub async fn health(&self) -> Result<Value, EngineError> {
        self.get(&["health"], &[]).await
    }

    pub async fn supported_metrics(&self) -> Result<Value, EngineError> {
        self.get(&["api", "v1", "profiles", "metrics", "supported"], &[])
            .await
    }

    // Profiles

    pub async fn list_profiles(&self, filters: &ProfileFilters) -> Result<Value, EngineError> {
        self.get(&["api", "v1", "profiles", ""], &filters.query()).await
    }

    pub async fn get_profile(&self, id: &str) -> Result<Value, EngineError> {
        self.get(&["api", "v1", "profiles", id], &[]).await
    }

    pub async fn create_profile<B: Serialize + ?Sized>(&self, profile: &B) -> Result<Value, EngineError> {
        self.post(&["api", "v1", "profiles", ""], profile).await
    }

    pub async fn update_profile<B: Serialize + ?Sized>(
        &self,
        id: &str,
        profile: &B,
    ) -> Result<Value, EngineError> {
        tracing::debug!(
            profile_id = %id,
            body = %serde_json::to_string(profile).unwrap_or_default(),
            "profile update payload"
        );
        self.send(Method::PUT, &["api", "v1", "profiles", id], &[], Some(profile))
            .await
    }

    pub async fn update_profile_status(
        &self,
        id: &str,
        status: &str,
        reason: Option<&str>,
    ) -> Result<Value, EngineError> {
        let mut body = json!({ "status": status });
        if let Some(reason) = reason.filter(|r| !r.is_empty()) {
            body["reason"] = Value::String(reason.to_string());
        }
        self.send(
            Method::PATCH,
            &["api", "v1", "profiles", id, "status"],
            &[],
            Some(&body),
        )
        .await
    }

    pub async fn diagnose_profile(&self, id: &str) -> Result<Value, EngineError> {
        self.send::<Value>(
            Method::POST,
            &["api", "v1", "profiles", id, "diagnose"],
            &[],
            None,
        )
        .await
    }

    /// Only 200 and 204 count as deleted.
    pub async fn delete_profile(&self, id: &str) -> Result<(), EngineError> {
        let (status, body) = self
            .exchange::<Value>(Method::DELETE, &["api", "v1", "profiles", id], &[], None)
            .await?;
        if status != StatusCode::OK && status != StatusCode::NO_CONTENT {
            tracing::warn!(profile_id = %id, status = %status, "unexpected delete status");
            return Err(EngineError::Status {
                status,
                body: body.to_string(),
            });
        }
        tracing::info!(profile_id = %id, "profile deleted on baseline engine");
        Ok(())
    }

    pub async fn profile_baseline_status(&self, id: &str) -> Result<Value, EngineError> {
        self.get(&["api", "v1", "profiles", id, "baseline", "status"], &[])
            .await
    }

    /// Timeline and pattern views for one profile; `query` is forwarded as is.
    pub async fn profile_analytics(
        &self,
        id: &str,
        view: ProfileView,
        query: &[(String, String)],
    ) -> Result<Value, EngineError> {
        let mut segments = vec!["api", "v1", "profiles", id];
        segments.extend_from_slice(view.segments());
        let query: Vec<(&str, String)> =
            query.iter().map(|(k, v)| (k.as_str(), v.clone())).collect();
        self.get(&segments, &query).await
    }

    // Baselines

    pub async fn create_baseline(&self, config: &Value) -> Result<Value, EngineError> {
        self.post(&["api", "v1", "baselines", "create"], config).await
    }

    pub async fn generate_manual_baseline(
        &self,
        profile_ids: &[String],
        force: bool,
    ) -> Result<Value, EngineError> {
        let body = json!({ "profile_ids": profile_ids, "force": force });
        self.post(&["api", "v1", "baselines", "manual"], &body).await
    }

    pub async fn baseline_job_status(&self, job_id: &str) -> Result<Value, EngineError> {
        self.get(&["api", "v1", "baselines", "jobs", job_id], &[]).await
    }

    pub async fn baseline_history(&self, filters: &HistoryFilters) -> Result<Value, EngineError> {
        self.get(&["api", "v1", "baselines", "history"], &filters.query())
            .await
    }

    pub async fn baselines(
        &self,
        profile_id: &str,
        metric_name: Option<&str>,
        version: Option<&str>,
    ) -> Result<Value, EngineError> {
        let mut query = Vec::new();
        if let Some(m) = metric_name.filter(|m| !m.is_empty()) {
            query.push(("metric_name", m.to_string()));
        }
        if let Some(v) = version.filter(|v| !v.is_empty()) {
            query.push(("version", v.to_string()));
        }
        self.get(&["api", "v1", "baselines", profile_id], &query).await
    }

    pub async fn baseline_detail(
        &self,
        profile_id: &str,
        baseline_id: &str,
    ) -> Result<Value, EngineError> {
        self.get(&["api", "v1", "baselines", profile_id, baseline_id], &[])
            .await
    }

    // Deviations

    pub async fn calculate_deviations(&self, request: &DeviationRequest) -> Result<Value, EngineError> {
        self.post(&["api", "v1", "deviations", "calculate"], request)
            .await
    }

    pub async fn anomalies(&self, profile_id: &str, query: &AnomalyQuery) -> Result<Value, EngineError> {
        self.get(
            &["api", "v1", "deviations", profile_id, "anomalies"],
            &query.query(),
        )
        .await
    }

    // Users

    pub async fn user_baselines(
        &self,
        profile_id: &str,
        page: u32,
        limit: u32,
    ) -> Result<Value, EngineError> {
        self.get(
            &["api", "v1", "users", profile_id, "baselines"],
            &[("page", page.to_string()), ("limit", limit.to_string())],
        )
        .await
    }

    pub async fn user_view(
        &self,
        profile_id: &str,
        user_id: &str,
        view: UserView,
    ) -> Result<Value, EngineError> {
        self.get(
            &["api", "v1", "users", profile_id, user_id, view.segment()],
            &[],
        )
        .await
    }
}
