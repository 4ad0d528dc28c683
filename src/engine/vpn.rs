//! Metric rules and defaults for VPN-sourced profiles.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::translate::Metric;

/// Metrics meaningful for VPN logs: time, network and remote-access
/// families.
pub const VPN_RELEVANT_METRICS: [Metric; 21] = [
    Metric::LoginTimePattern,
    Metric::SessionDuration,
    Metric::AfterHoursActivity,
    Metric::WeekendHolidayAccess,
    Metric::LoginFrequencyChange,
    Metric::ConcurrentSessionDetection,
    Metric::TimezoneAnomalyAccess,
    Metric::IdleTimePattern,
    Metric::IpAddressPattern,
    Metric::GeoLocationAnalysis,
    Metric::DataVolumeTransfer,
    Metric::ImpossibleTravelDetection,
    Metric::VpnUsagePattern,
    Metric::NetworkDeviceChange,
    Metric::BandwidthUsageAnomaly,
    Metric::ConnectionPatternAnalysis,
    Metric::ProxyBypassAttempt,
    Metric::AuthenticationFailureCount,
    Metric::PrivilegeEscalationAttempt,
    Metric::RemoteAccessPattern,
    Metric::ResourceAccessPattern,
];

pub const VPN_INCOMPATIBLE_METRICS: [Metric; 5] = [
    Metric::DatabaseQueryPattern,
    Metric::EmailBehaviorPattern,
    Metric::SystemCommandExecution,
    Metric::SharedFolderAccess,
    Metric::ApplicationUsagePattern,
];

pub const VPN_ESSENTIAL_METRICS: [Metric; 3] = [
    Metric::LoginTimePattern,
    Metric::SessionDuration,
    Metric::VpnUsagePattern,
];

const DEFAULT_VPN_METRICS: [Metric; 6] = [
    Metric::LoginTimePattern,
    Metric::SessionDuration,
    Metric::VpnUsagePattern,
    Metric::GeoLocationAnalysis,
    Metric::ImpossibleTravelDetection,
    Metric::NetworkDeviceChange,
];

const MIN_RECOMMENDED_METRICS: usize = 3;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct VpnValidation {
    pub is_valid: bool,
    pub warnings: Vec<String>,
    pub recommendations: Vec<String>,
    pub invalid_metrics: Vec<String>,
    pub missing_essential: Vec<String>,
}

/// Check a selection of canonical metric keys against the VPN rules.
pub fn validate_vpn_metrics(selected: &[String]) -> VpnValidation {
    let invalid_metrics: Vec<String> = selected
        .iter()
        .filter(|m| VPN_INCOMPATIBLE_METRICS.iter().any(|i| i.key() == m.as_str()))
        .cloned()
        .collect();
    let missing_essential: Vec<String> = VPN_ESSENTIAL_METRICS
        .iter()
        .map(|m| m.key())
        .filter(|key| !selected.iter().any(|s| s == key))
        .map(str::to_string)
        .collect();

    let mut warnings = Vec::new();
    let mut recommendations = Vec::new();

    if !invalid_metrics.is_empty() {
        warnings.push(format!(
            "VPN 로그에 적합하지 않은 메트릭: {}",
            invalid_metrics.join(", ")
        ));
        recommendations.push("VPN 로그에 적합한 메트릭으로 변경하세요".to_string());
    }
    if !missing_essential.is_empty() {
        warnings.push(format!("필수 메트릭 누락: {}", missing_essential.join(", ")));
        recommendations.push("VPN 분석을 위한 필수 메트릭을 추가하세요".to_string());
    }
    if selected.len() < MIN_RECOMMENDED_METRICS {
        warnings.push("선택된 메트릭이 너무 적습니다".to_string());
        recommendations.push("최소 3개 이상의 메트릭을 선택하세요".to_string());
    }

    VpnValidation {
        is_valid: invalid_metrics.is_empty() && missing_essential.is_empty(),
        warnings,
        recommendations,
        invalid_metrics,
        missing_essential,
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VpnProfileRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub departments: Option<Vec<String>>,
    pub user_types: Option<Vec<String>>,
    pub selected_metrics: Option<Vec<String>>,
    pub learning_period: Option<i64>,
    pub alert_threshold: Option<f64>,
    pub warning_threshold: Option<f64>,
}

/// Engine-shaped profile config for a VPN profile, filling defaults.
pub fn vpn_profile_config(req: &VpnProfileRequest) -> Value {
    let name = req.name.clone().unwrap_or_default();
    let description = req
        .description
        .clone()
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| format!("{name} - VPN 접속 패턴 및 네트워크 행동 분석"));
    let departments = req.departments.clone().unwrap_or_else(|| {
        ["IT", "Finance", "HR", "Sales", "Engineering"]
            .map(String::from)
            .to_vec()
    });
    let user_types = req
        .user_types
        .clone()
        .unwrap_or_else(|| ["employee", "contractor", "admin"].map(String::from).to_vec());
    let selected_metrics = req
        .selected_metrics
        .clone()
        .unwrap_or_else(|| DEFAULT_VPN_METRICS.iter().map(|m| m.key().to_string()).collect());

    json!({
        "name": name,
        "description": description,
        "profile_type": "user",
        "analysis_scope": "network_access",
        "log_source": "vpn",
        "learning_period": req.learning_period.unwrap_or(30),
        "selected_metrics": selected_metrics,
        "threshold_settings": {
            "alert_threshold": req.alert_threshold.unwrap_or(0.8),
            "warning_threshold": req.warning_threshold.unwrap_or(0.6),
            "minimum_deviation_score": 0.3,
        },
        "target_entities": {
            "departments": departments,
            "user_types": user_types,
        },
    })
}

const TIME_KEYWORDS: [&str; 7] = [
    "time",
    "session",
    "frequency",
    "timezone",
    "concurrent",
    "hours",
    "weekend",
];
const NETWORK_KEYWORDS: [&str; 8] = [
    "ip",
    "geo",
    "data",
    "travel",
    "vpn",
    "network",
    "bandwidth",
    "connection",
];

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct VpnMetricGroups {
    pub vpn_relevant_metrics: Vec<&'static str>,
    pub time_based: Vec<&'static str>,
    pub network_based: Vec<&'static str>,
}

/// VPN-relevant keys split into time and network groups by keyword.
/// A key can land in both groups or neither.
pub fn vpn_metric_groups() -> VpnMetricGroups {
    let keys: Vec<&'static str> = VPN_RELEVANT_METRICS.iter().map(|m| m.key()).collect();
    let matching = |words: &[&str]| -> Vec<&'static str> {
        keys.iter()
            .copied()
            .filter(|k| words.iter().any(|w| k.contains(w)))
            .collect()
    };
    VpnMetricGroups {
        time_based: matching(&TIME_KEYWORDS),
        network_based: matching(&NETWORK_KEYWORDS),
        vpn_relevant_metrics: keys.clone(),
    }
}
