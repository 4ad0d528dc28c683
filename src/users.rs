//! Reshaping of the engine's per-user baselines into the dashboard's
//! individual-user views.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};

use crate::simulate::rng_for;
use crate::translate::metric_display_name;

pub const SURNAMES: [&str; 20] = [
    "김", "이", "박", "최", "정", "강", "조", "윤", "장", "임", "한", "오", "서", "신", "권", "황",
    "안", "송", "류", "전",
];

pub const GIVEN_NAMES: [&str; 20] = [
    "민수", "영희", "철수", "지영", "현우", "수민", "도현", "서윤", "준혁", "다은", "지훈", "소영",
    "태현", "하늘", "예진", "민재", "세은", "건우", "유진", "승현",
];

pub const DEPARTMENTS: [&str; 12] = [
    "IT팀", "재무팀", "인사팀", "영업팀", "마케팅팀", "개발팀", "디자인팀", "기획팀", "운영팀",
    "QA팀", "보안팀", "총무팀",
];

pub const NO_DEPARTMENT: &str = "없음";
pub const NORMAL_RANGE_LABEL: &str = "정상 범위";
pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_LIMIT: u32 = 50;
pub const DEFAULT_QUALITY: f64 = 0.75;

/// Number from the first run of ASCII digits in `user_id`
/// (`user0042` → 42). Runs too long for a `u64` count as 0.
pub fn user_number(user_id: &str) -> Option<u64> {
    let start = user_id.find(|c: char| c.is_ascii_digit())?;
    let digits: &str = user_id[start..]
        .split(|c: char| !c.is_ascii_digit())
        .next()
        .unwrap_or_default();
    Some(digits.parse().unwrap_or(0))
}

pub fn display_name_for(user_id: &str) -> Option<String> {
    let n = user_number(user_id)?;
    let surname = SURNAMES[(n % 20) as usize];
    let given = GIVEN_NAMES[((n / 20) % 20) as usize];
    Some(format!("{surname}{given}"))
}

pub fn department_for(user_id: &str) -> Option<&'static str> {
    user_number(user_id).map(|n| DEPARTMENTS[(n % 12) as usize])
}

/// `round(raw * 200 + jitter)`, jitter in `[0, 50)` seeded by the user id.
pub fn deviation_score(raw: f64, user_id: &str) -> i64 {
    let jitter: f64 = rng_for(user_id).gen_range(0.0..50.0);
    (raw * 200.0 + jitter).round() as i64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    High,
    Medium,
    Normal,
}

impl RiskLevel {
    pub fn from_score(score: i64) -> Self {
        if score > 150 {
            RiskLevel::High
        } else if score > 80 {
            RiskLevel::Medium
        } else {
            RiskLevel::Normal
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::High => "high",
            RiskLevel::Medium => "medium",
            RiskLevel::Normal => "normal",
        }
    }
}

// Engine-side shapes. Missing or null pieces default rather than fail the page.

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoteUser {
    pub user_id: String,
    #[serde(default)]
    pub user_info: Option<RemoteUserInfo>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub baseline_summary: BaselineSummary,
    #[serde(default, deserialize_with = "null_as_default")]
    pub top_anomalies: Vec<TopAnomaly>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoteUserInfo {
    pub name: Option<String>,
    pub department: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BaselineSummary {
    #[serde(default, deserialize_with = "null_as_default")]
    pub overall_deviation_score: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub average_quality_score: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TopAnomaly {
    pub metric_name: String,
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.trim().is_empty())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: String,
    pub name: String,
    pub department: String,
    pub deviation: i64,
    pub risk_level: RiskLevel,
    pub last_activity: DateTime<Utc>,
    pub baseline_quality: i64,
    pub metrics: Vec<String>,
}

impl UserSummary {
    pub fn from_remote(user: &RemoteUser, now: DateTime<Utc>) -> Self {
        let info = user.user_info.as_ref();
        let name = non_blank(info.and_then(|i| i.name.as_deref()))
            .map(str::to_string)
            .or_else(|| display_name_for(&user.user_id))
            .unwrap_or_else(|| user.user_id.clone());
        let department = non_blank(info.and_then(|i| i.department.as_deref()))
            .or_else(|| department_for(&user.user_id))
            .unwrap_or(NO_DEPARTMENT)
            .to_string();

        let deviation = deviation_score(user.baseline_summary.overall_deviation_score, &user.user_id);
        let mut metrics: Vec<String> = user
            .top_anomalies
            .iter()
            .map(|a| metric_display_name(&a.metric_name))
            .collect();
        if metrics.is_empty() {
            metrics.push(NORMAL_RANGE_LABEL.to_string());
        }

        let idle_secs = rng_for(&format!("{}/activity", user.user_id)).gen_range(0..7 * 24 * 3600);

        UserSummary {
            id: user.user_id.clone(),
            name,
            department,
            deviation,
            risk_level: RiskLevel::from_score(deviation),
            last_activity: now - Duration::seconds(idle_secs),
            baseline_quality: (user.baseline_summary.average_quality_score * 100.0).round() as i64,
            metrics,
        }
    }

    fn matches_search(&self, needle: &str) -> bool {
        [&self.id, &self.name, &self.department]
            .iter()
            .any(|field| field.to_lowercase().contains(needle))
    }
}

/// Query string of `GET /api/individual-users`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub search: Option<String>,
    #[serde(rename = "riskLevel")]
    pub risk_level: Option<String>,
}

impl UserListQuery {
    pub fn page(&self) -> u32 {
        self.page.filter(|p| *p > 0).unwrap_or(DEFAULT_PAGE)
    }

    pub fn limit(&self) -> u32 {
        self.limit.filter(|l| *l > 0).unwrap_or(DEFAULT_LIMIT)
    }

    /// Search then risk-level filtering. Blank filters are ignored; an
    /// unknown risk level matches nothing.
    pub fn filter(&self, users: Vec<UserSummary>) -> Vec<UserSummary> {
        let needle = self
            .search
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);
        let risk = self.risk_level.as_deref().filter(|r| !r.is_empty());

        users
            .into_iter()
            .filter(|u| needle.as_deref().map_or(true, |n| u.matches_search(n)))
            .filter(|u| risk.map_or(true, |r| u.risk_level.as_str() == r))
            .collect()
    }

    pub fn paginate(&self, users: Vec<UserSummary>) -> UserPage {
        let page = self.page();
        let limit = self.limit();
        let total_count = users.len();
        let offset = (page as usize - 1).saturating_mul(limit as usize);
        let total_pages = total_count.div_ceil(limit as usize);
        UserPage {
            users: users.into_iter().skip(offset).take(limit as usize).collect(),
            total_count,
            page,
            limit,
            total_pages,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPage {
    pub users: Vec<UserSummary>,
    pub total_count: usize,
    pub page: u32,
    pub limit: u32,
    pub total_pages: usize,
}

/// Decode the `users` array of a remote baselines page. `None` when the
/// body has no such array.
pub fn remote_users(body: &Value) -> Option<Vec<RemoteUser>> {
    let users = body.get("users")?.as_array()?;
    Some(
        users
            .iter()
            .filter_map(|u| match serde_json::from_value::<RemoteUser>(u.clone()) {
                Ok(user) => Some(user),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping malformed user baseline");
                    None
                }
            })
            .collect(),
    )
}

fn mean_hour(baseline: &Value) -> f64 {
    baseline
        .pointer("/normal_range/statistical_range/mean_hour")
        .and_then(Value::as_f64)
        .unwrap_or(0.0)
}

fn baselines<'a>(details: &'a Value, key: &str) -> &'a [Value] {
    details
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn find_metric<'a>(list: &'a [Value], metric_name: &str) -> Option<&'a Value> {
    list.iter()
        .find(|b| b.get("metric_name").and_then(Value::as_str) == Some(metric_name))
}

/// The auxiliary views a detail page is assembled from. Each has already
/// been defaulted if its remote call failed.
#[derive(Debug, Clone)]
pub struct UserDetailParts {
    pub details: Value,
    pub anomalies: Value,
    pub temporal_patterns: Value,
    pub quality: Value,
}

impl UserDetailParts {
    pub fn default_anomalies() -> Value {
        json!({ "anomalies": [], "summary": { "total_anomalies": 0 } })
    }

    pub fn default_temporal_patterns() -> Value {
        json!({ "hourly_patterns": [] })
    }

    pub fn default_quality() -> Value {
        json!({ "overall_quality": { "average_quality_score": DEFAULT_QUALITY } })
    }

    fn quality_score(&self) -> f64 {
        self.quality
            .pointer("/overall_quality/average_quality_score")
            .and_then(Value::as_f64)
            .unwrap_or(DEFAULT_QUALITY)
    }
}

/// Body of `GET /api/individual-users/{userId}`.
pub fn user_detail(user_id: &str, parts: UserDetailParts, now: DateTime<Utc>) -> Value {
    let mut rng = rng_for(&format!("{user_id}/detail"));
    let department = department_for(user_id).unwrap_or(NO_DEPARTMENT);
    let quality = parts.quality_score();
    let individual = baselines(&parts.details, "individual_baselines");
    let common = baselines(&parts.details, "common_baselines");

    let user = json!({
        "id": user_id,
        "name": display_name_for(user_id).unwrap_or_else(|| user_id.to_string()),
        "department": department,
        "lastActivity": now - Duration::seconds(rng.gen_range(0..24 * 3600)),
    });

    let individual_baseline = json!({
        "id": format!("baseline-{user_id}"),
        "userId": user_id,
        "learningPeriod": 30,
        "quality": (quality * 100.0).round() as i64,
        "lastUpdate": now,
        "metricsCount": individual.len(),
        "dataPoints": rng.gen_range(10_000..15_000),
        "confidence": quality,
    });

    let common_baseline = json!({
        "id": format!("common-baseline-{department}"),
        "department": department,
        "quality": 85,
        "userCount": rng.gen_range(20..70),
        "lastUpdate": now,
        "metricsCount": common.len(),
    });

    let metric_comparisons: Vec<Value> = individual
        .iter()
        .map(|metric| {
            let name = metric.get("metric_name").and_then(Value::as_str).unwrap_or_default();
            let individual_value = mean_hour(metric);
            let common_value = find_metric(common, name).map_or(0.0, mean_hour);
            let trend = if individual_value >= common_value {
                "increasing"
            } else {
                "decreasing"
            };
            json!({
                "metricName": metric_display_name(name),
                "individualValue": individual_value,
                "commonValue": common_value,
                "deviation": (individual_value - common_value).abs(),
                "trend": trend,
                "qualityScore": metric
                    .get("quality_score")
                    .and_then(Value::as_f64)
                    .filter(|q| *q != 0.0)
                    .unwrap_or(DEFAULT_QUALITY),
            })
        })
        .collect();

    json!({
        "user": user,
        "individualBaseline": individual_baseline,
        "commonBaseline": common_baseline,
        "metricComparisons": metric_comparisons,
        "anomalies": parts.anomalies,
        "temporalPatterns": parts.temporal_patterns,
        "analysisDate": now,
    })
}

fn comparison_side(baseline: &Value, confidence: f64) -> Value {
    let range = baseline.pointer("/normal_range/statistical_range");
    let bound = |key: &str| range.and_then(|r| r.get(key)).and_then(Value::as_f64);
    let normal_range = match (bound("lower_bound"), bound("upper_bound")) {
        (Some(lo), Some(hi)) => Value::String(format!("{lo} - {hi}")),
        _ => Value::Null,
    };
    json!({
        "mean": mean_hour(baseline),
        "std": bound("std_hour").unwrap_or(0.0),
        "normalRange": normal_range,
        "confidence": confidence,
    })
}

/// Individual-vs-common comparison built from a remote baseline-details
/// body. Picks `metric_name` when given, else the first individual
/// baseline. `None` when there is nothing to compare.
pub fn comparison_from_details(
    user_id: &str,
    metric_name: Option<&str>,
    details: &Value,
) -> Option<Value> {
    let individual = baselines(details, "individual_baselines");
    let chosen = match metric_name.filter(|m| !m.is_empty()) {
        Some(name) => find_metric(individual, name)?,
        None => individual.first()?,
    };
    let name = chosen.get("metric_name").and_then(Value::as_str).unwrap_or_default();
    let common = find_metric(baselines(details, "common_baselines"), name);

    let confidence = chosen
        .get("quality_score")
        .and_then(Value::as_f64)
        .unwrap_or(DEFAULT_QUALITY);
    let individual_mean = mean_hour(chosen);
    let common_mean = common.map_or(0.0, mean_hour);

    Some(json!({
        "userId": user_id,
        "metricName": name,
        "individual": comparison_side(chosen, confidence),
        "common": common.map_or(Value::Null, |c| comparison_side(c, 0.85)),
        "deviation": (individual_mean - common_mean).abs(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(id: &str, name: &str, dept: &str, deviation: i64) -> UserSummary {
        UserSummary {
            id: id.into(),
            name: name.into(),
            department: dept.into(),
            deviation,
            risk_level: RiskLevel::from_score(deviation),
            last_activity: Utc::now(),
            baseline_quality: 80,
            metrics: vec![NORMAL_RANGE_LABEL.into()],
        }
    }

    #[test]
    fn risk_boundaries() {
        assert_eq!(RiskLevel::from_score(151), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(150), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(81), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(80), RiskLevel::Normal);
        assert_eq!(serde_json::to_value(RiskLevel::High).unwrap(), "high");
    }

    #[test]
    fn names_from_digits() {
        assert_eq!(user_number("user0042"), Some(42));
        assert_eq!(user_number("a1b22"), Some(1));
        assert_eq!(user_number("kim.chulsoo"), None);
        assert_eq!(user_number("u99999999999999999999999"), Some(0));

        // 42 % 20 = 2 → 박, (42 / 20) % 20 = 2 → 철수
        assert_eq!(display_name_for("user0042").as_deref(), Some("박철수"));
        assert_eq!(display_name_for("user0000").as_deref(), Some("김민수"));
        assert_eq!(department_for("user0042"), Some("디자인팀"));
        assert_eq!(department_for("nobody"), None);
    }

    #[test]
    fn deviation_jitter_is_bounded_and_stable() {
        let a = deviation_score(0.5, "user0001");
        assert_eq!(a, deviation_score(0.5, "user0001"));
        assert!((100..=150).contains(&a));
        assert!((0..=50).contains(&deviation_score(0.0, "user0002")));
    }

    #[test]
    fn remote_user_uses_info_when_present() {
        let body = json!({"users": [
            {
                "user_id": "user0042",
                "user_info": {"name": "홍길동", "department": " "},
                "baseline_summary": {"overall_deviation_score": 0.1, "average_quality_score": 0.876},
                "top_anomalies": [{"metric_name": "session_duration"}, {"metric_name": "custom"}]
            },
            {"user_id": "svc-account"}
        ]});
        let users = remote_users(&body).unwrap();
        let now = Utc::now();

        let first = UserSummary::from_remote(&users[0], now);
        assert_eq!(first.name, "홍길동");
        assert_eq!(first.department, "디자인팀");
        assert_eq!(first.baseline_quality, 88);
        assert_eq!(first.metrics, vec!["세션 지속시간", "custom"]);
        assert!(first.last_activity <= now);

        let second = UserSummary::from_remote(&users[1], now);
        assert_eq!(second.name, "svc-account");
        assert_eq!(second.department, NO_DEPARTMENT);
        assert_eq!(second.metrics, vec![NORMAL_RANGE_LABEL]);
    }

    #[test]
    fn null_summary_values_count_as_zero() {
        let body = json!({"users": [
            {
                "user_id": "user0003",
                "baseline_summary": {"overall_deviation_score": null, "average_quality_score": null},
                "top_anomalies": null
            },
            {"user_id": "user0004", "baseline_summary": null}
        ]});
        let users = remote_users(&body).unwrap();
        assert_eq!(users.len(), 2);

        let first = UserSummary::from_remote(&users[0], Utc::now());
        assert_eq!(first.baseline_quality, 0);
        assert!((0..=50).contains(&first.deviation));
        assert_eq!(first.metrics, vec![NORMAL_RANGE_LABEL]);
        assert_eq!(users[1].baseline_summary.overall_deviation_score, 0.0);
    }

    #[test]
    fn body_without_users_is_rejected() {
        assert!(remote_users(&json!({"data": []})).is_none());
        assert!(remote_users(&json!({"users": "nope"})).is_none());
    }

    #[test]
    fn search_and_risk_filters() {
        let users = vec![
            summary("user0001", "김영희", "IT팀", 160),
            summary("user0002", "이철수", "재무팀", 90),
            summary("admin", "Admin", "보안팀", 10),
        ];
        let q = UserListQuery {
            search: Some("ADM".into()),
            ..Default::default()
        };
        assert_eq!(q.filter(users.clone()).len(), 1);

        let q = UserListQuery {
            risk_level: Some("medium".into()),
            ..Default::default()
        };
        let out = q.filter(users.clone());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "user0002");

        let q = UserListQuery {
            risk_level: Some("extreme".into()),
            ..Default::default()
        };
        assert!(q.filter(users).is_empty());
    }

    #[test]
    fn pagination_counts() {
        let users: Vec<_> = (0..7)
            .map(|i| summary(&format!("user{i}"), "n", "d", 0))
            .collect();
        let q = UserListQuery {
            page: Some(2),
            limit: Some(3),
            ..Default::default()
        };
        let page = q.paginate(users);
        assert_eq!(page.total_count, 7);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.users.len(), 3);
        assert_eq!(page.users[0].id, "user3");

        let v = serde_json::to_value(&page).unwrap();
        assert_eq!(v["totalCount"], 7);
        assert_eq!(v["totalPages"], 3);
        assert!(v["users"][0].get("riskLevel").is_some());
    }

    #[test]
    fn page_past_the_end_is_empty() {
        let q = UserListQuery {
            page: Some(9),
            ..Default::default()
        };
        let page = q.paginate(vec![summary("a", "n", "d", 0)]);
        assert!(page.users.is_empty());
        assert_eq!(page.total_pages, 1);
        assert_eq!(page.limit, DEFAULT_LIMIT);
    }

    fn details() -> Value {
        json!({
            "individual_baselines": [
                {"metric_name": "session_duration", "quality_score": 0.9,
                 "normal_range": {"statistical_range": {"mean_hour": 12.0, "lower_bound": 8.0, "upper_bound": 16.0}}},
                {"metric_name": "login_time_pattern"}
            ],
            "common_baselines": [
                {"metric_name": "session_duration",
                 "normal_range": {"statistical_range": {"mean_hour": 9.5}}}
            ]
        })
    }

    #[test]
    fn detail_assembles_comparisons() {
        let parts = UserDetailParts {
            details: details(),
            anomalies: UserDetailParts::default_anomalies(),
            temporal_patterns: UserDetailParts::default_temporal_patterns(),
            quality: UserDetailParts::default_quality(),
        };
        let v = user_detail("user0042", parts, Utc::now());

        assert_eq!(v["user"]["name"], "박철수");
        assert_eq!(v["individualBaseline"]["id"], "baseline-user0042");
        assert_eq!(v["individualBaseline"]["quality"], 75);
        assert_eq!(v["individualBaseline"]["metricsCount"], 2);
        assert_eq!(v["commonBaseline"]["id"], "common-baseline-디자인팀");
        assert_eq!(v["commonBaseline"]["metricsCount"], 1);

        let cmp = v["metricComparisons"].as_array().unwrap();
        assert_eq!(cmp[0]["metricName"], "세션 지속시간");
        assert_eq!(cmp[0]["deviation"], 2.5);
        assert_eq!(cmp[0]["trend"], "increasing");
        assert_eq!(cmp[1]["individualValue"], 0.0);
        assert_eq!(cmp[1]["qualityScore"], DEFAULT_QUALITY);
        assert_eq!(v["anomalies"]["summary"]["total_anomalies"], 0);
    }

    #[test]
    fn comparison_picks_requested_metric() {
        let v = comparison_from_details("user0042", Some("session_duration"), &details()).unwrap();
        assert_eq!(v["individual"]["normalRange"], "8 - 16");
        assert_eq!(v["common"]["confidence"], 0.85);
        assert_eq!(v["deviation"], 2.5);

        let first = comparison_from_details("user0042", None, &details()).unwrap();
        assert_eq!(first["metricName"], "session_duration");

        assert!(comparison_from_details("user0042", Some("nope"), &details()).is_none());
        assert!(comparison_from_details("user0042", None, &json!({})).is_none());
    }
}
