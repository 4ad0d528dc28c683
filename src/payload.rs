//! Conversion of wizard-shaped profile bodies into engine payloads and
//! local rows.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::models::{NewProfile, ProfileChanges};
use crate::translate::{
    leading_int, map_analysis_scope, metric_labels, translate_metrics, NotificationSettings,
    Sensitivity,
};

const DEFAULT_LEARNING_PERIOD: i64 = 30;
const DEFAULT_RISK_SCORE: i64 = 70;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("프로파일 이름이 필요합니다.")]
    MissingName,
}

/// Profile body as the dashboard sends it. Everything outside the named
/// columns lands in `other` and is stored as the row's `data`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRequest {
    pub id: Option<String>,
    pub name: Option<String>,
    pub profile_type: Option<String>,
    pub analysis_scope: Option<String>,
    pub log_source_name: Option<String>,
    pub log_source_type: Option<String>,
    pub description: Option<String>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// Body sent to `/api/v1/profiles/`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EnginePayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub profile_type: String,
    pub analysis_scope: String,
    pub log_source: String,
    pub learning_period: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_entities: Option<Value>,
    pub selected_metrics: Vec<String>,
    pub threshold_settings: Value,
    pub notification_settings: Value,
    /// Labels that were neither a known wizard label nor a canonical key.
    #[serde(skip)]
    pub unrecognized_metrics: Vec<String>,
}

impl ProfileRequest {
    fn named(&self) -> Option<&str> {
        self.name.as_deref().filter(|n| !n.trim().is_empty())
    }

    pub fn require_name(&self) -> Result<&str, PayloadError> {
        self.named().ok_or(PayloadError::MissingName)
    }

    fn threshold_settings(&self) -> Value {
        let sensitivity =
            Sensitivity::from_text(self.other.get("anomalyThreshold").and_then(Value::as_str));
        let t = sensitivity.thresholds();
        let risk = leading_int(self.other.get("riskScore"))
            .filter(|n| *n != 0)
            .unwrap_or(DEFAULT_RISK_SCORE);
        json!({
            "alert_threshold": t.alert_threshold,
            "warning_threshold": t.warning_threshold,
            "minimum_deviation_score": t.minimum_deviation_score,
            "risk_score_threshold": risk,
        })
    }

    fn notification_settings(&self) -> Value {
        let n = NotificationSettings::from_alerts(self.other.get("alerts"));
        json!({
            "email_enabled": n.email_enabled,
            "slack_enabled": n.slack_enabled,
            "sms_enabled": n.sms_enabled,
            "dashboard_enabled": n.dashboard_enabled,
        })
    }

    fn learning_period(&self) -> i64 {
        ["learningPeriod", "learning_period"]
            .iter()
            .filter_map(|k| leading_int(self.other.get(*k)))
            .find(|n| *n != 0)
            .unwrap_or(DEFAULT_LEARNING_PERIOD)
    }

    fn base_payload(&self, default_log_source: &str) -> EnginePayload {
        let translation = translate_metrics(&metric_labels(self.other.get("selectedMetrics")));
        EnginePayload {
            name: self.name.clone(),
            description: self.description.clone(),
            profile_type: self.profile_type.clone().unwrap_or_else(|| "user".into()),
            analysis_scope: map_analysis_scope(self.analysis_scope.as_deref()).to_string(),
            log_source: self
                .log_source_type
                .clone()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| default_log_source.to_string()),
            learning_period: DEFAULT_LEARNING_PERIOD,
            target_entities: None,
            selected_metrics: translation.metrics,
            threshold_settings: self.threshold_settings(),
            notification_settings: self.notification_settings(),
            unrecognized_metrics: translation.unrecognized,
        }
    }

    /// Engine payload for a new profile.
    pub fn create_payload(&self) -> EnginePayload {
        self.base_payload("syslog")
    }

    /// Engine payload for an update. Settings already in engine shape are
    /// forwarded untouched.
    pub fn update_payload(&self) -> EnginePayload {
        let mut payload = self.base_payload("vpn");
        payload.learning_period = self.learning_period();
        payload.target_entities = self.other.get("target_entities").cloned();
        if let Some(existing) = self.other.get("threshold_settings").filter(|v| !v.is_null()) {
            payload.threshold_settings = existing.clone();
        }
        if let Some(existing) = self
            .other
            .get("notification_settings")
            .filter(|v| !v.is_null())
        {
            payload.notification_settings = existing.clone();
        }
        payload
    }

    /// Local row for the fallback path. The raw wizard values are stored,
    /// not the engine translations.
    pub fn new_profile(&self) -> Result<NewProfile, PayloadError> {
        let name = self.require_name()?.to_string();
        let id = self
            .id
            .clone()
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        Ok(NewProfile {
            id,
            name,
            profile_type: self.profile_type.clone(),
            analysis_scope: self.analysis_scope.clone(),
            log_source_name: self.log_source_name.clone(),
            log_source_type: self.log_source_type.clone(),
            description: self.description.clone(),
            data: Value::Object(self.other.clone()),
        })
    }

    pub fn changes(&self) -> ProfileChanges {
        ProfileChanges {
            name: self.named().map(str::to_string),
            profile_type: self.profile_type.clone(),
            analysis_scope: self.analysis_scope.clone(),
            log_source_name: self.log_source_name.clone(),
            log_source_type: self.log_source_type.clone(),
            description: self.description.clone(),
            data: Value::Object(self.other.clone()),
        }
    }
}
