//! Static vocabularies shared by the dashboard and the baseline engine.
//!
//! The dashboard speaks Korean labels and free-form sensitivity text; the
//! engine expects canonical snake_case metric keys and numeric thresholds.

use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Metric families, in the order the dashboard groups them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricCategory {
    Time,
    Network,
    Access,
}

/// Every behavioural metric the baseline engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    LoginTimePattern,
    SessionDuration,
    AfterHoursActivity,
    WeekendHolidayAccess,
    LoginFrequencyChange,
    ConcurrentSessionDetection,
    TimezoneAnomalyAccess,
    IdleTimePattern,
    IpAddressPattern,
    GeoLocationAnalysis,
    DataVolumeTransfer,
    ImpossibleTravelDetection,
    VpnUsagePattern,
    NetworkDeviceChange,
    BandwidthUsageAnomaly,
    ConnectionPatternAnalysis,
    ProxyBypassAttempt,
    AuthenticationFailureCount,
    PrivilegeEscalationAttempt,
    RemoteAccessPattern,
    ResourceAccessPattern,
    SensitiveDataAccess,
    FileDownloadPattern,
    AdminPrivilegeUsage,
    ApplicationUsagePattern,
    DatabaseQueryPattern,
    EmailBehaviorPattern,
    SystemCommandExecution,
    SharedFolderAccess,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown metric: {0}")]
pub struct UnknownMetric(pub String);

impl Metric {
    pub const ALL: [Metric; 29] = [
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
        Metric::SensitiveDataAccess,
        Metric::FileDownloadPattern,
        Metric::AdminPrivilegeUsage,
        Metric::ApplicationUsagePattern,
        Metric::DatabaseQueryPattern,
        Metric::EmailBehaviorPattern,
        Metric::SystemCommandExecution,
        Metric::SharedFolderAccess,
    ];

    /// Canonical engine key.
    pub fn key(self) -> &'static str {
        match self {
            Metric::LoginTimePattern => "login_time_pattern",
            Metric::SessionDuration => "session_duration",
            Metric::AfterHoursActivity => "after_hours_activity",
            Metric::WeekendHolidayAccess => "weekend_holiday_access",
            Metric::LoginFrequencyChange => "login_frequency_change",
            Metric::ConcurrentSessionDetection => "concurrent_session_detection",
            Metric::TimezoneAnomalyAccess => "timezone_anomaly_access",
            Metric::IdleTimePattern => "idle_time_pattern",
            Metric::IpAddressPattern => "ip_address_pattern",
            Metric::GeoLocationAnalysis => "geo_location_analysis",
            Metric::DataVolumeTransfer => "data_volume_transfer",
            Metric::ImpossibleTravelDetection => "impossible_travel_detection",
            Metric::VpnUsagePattern => "vpn_usage_pattern",
            Metric::NetworkDeviceChange => "network_device_change",
            Metric::BandwidthUsageAnomaly => "bandwidth_usage_anomaly",
            Metric::ConnectionPatternAnalysis => "connection_pattern_analysis",
            Metric::ProxyBypassAttempt => "proxy_bypass_attempt",
            Metric::AuthenticationFailureCount => "authentication_failure_count",
            Metric::PrivilegeEscalationAttempt => "privilege_escalation_attempt",
            Metric::RemoteAccessPattern => "remote_access_pattern",
            Metric::ResourceAccessPattern => "resource_access_pattern",
            Metric::SensitiveDataAccess => "sensitive_data_access",
            Metric::FileDownloadPattern => "file_download_pattern",
            Metric::AdminPrivilegeUsage => "admin_privilege_usage",
            Metric::ApplicationUsagePattern => "application_usage_pattern",
            Metric::DatabaseQueryPattern => "database_query_pattern",
            Metric::EmailBehaviorPattern => "email_behavior_pattern",
            Metric::SystemCommandExecution => "system_command_execution",
            Metric::SharedFolderAccess => "shared_folder_access",
        }
    }

    /// Label the profile wizard submits for this metric.
    pub fn label(self) -> &'static str {
        match self {
            Metric::LoginTimePattern => "로그인 시간 패턴",
            Metric::SessionDuration => "세션 지속 시간",
            Metric::AfterHoursActivity => "업무시간 외 활동",
            Metric::WeekendHolidayAccess => "주말/휴일 접근",
            Metric::LoginFrequencyChange => "로그인 빈도 변화",
            Metric::ConcurrentSessionDetection => "동시 세션 탐지",
            Metric::TimezoneAnomalyAccess => "시간대 이상 접근",
            Metric::IdleTimePattern => "유휴 시간 패턴",
            Metric::IpAddressPattern => "IP 주소 패턴",
            Metric::GeoLocationAnalysis => "지리적 위치 분석",
            Metric::DataVolumeTransfer => "데이터 전송량",
            Metric::ImpossibleTravelDetection => "불가능한 이동 탐지",
            Metric::VpnUsagePattern => "VPN 사용 패턴",
            Metric::NetworkDeviceChange => "디바이스 변경 탐지",
            Metric::BandwidthUsageAnomaly => "대역폭 사용량 이상",
            Metric::ConnectionPatternAnalysis => "연결 패턴 분석",
            Metric::ProxyBypassAttempt => "프록시 우회 시도",
            Metric::AuthenticationFailureCount => "인증 실패 횟수",
            Metric::PrivilegeEscalationAttempt => "권한 상승 시도",
            Metric::RemoteAccessPattern => "원격 접근 패턴",
            Metric::ResourceAccessPattern => "리소스 접근 패턴",
            Metric::SensitiveDataAccess => "민감한 데이터 접근",
            Metric::FileDownloadPattern => "파일 다운로드 패턴",
            Metric::AdminPrivilegeUsage => "관리자 권한 사용",
            Metric::ApplicationUsagePattern => "애플리케이션 사용 패턴",
            Metric::DatabaseQueryPattern => "데이터베이스 쿼리 패턴",
            Metric::EmailBehaviorPattern => "이메일 행동 패턴",
            Metric::SystemCommandExecution => "시스템 명령어 실행",
            Metric::SharedFolderAccess => "공유 폴더 접근",
        }
    }

    /// Short name used on the individual-user dashboard, where it differs
    /// from the wizard label or exists at all.
    pub fn display_name(self) -> Option<&'static str> {
        match self {
            Metric::LoginTimePattern => Some("로그인 시간 패턴"),
            Metric::SessionDuration => Some("세션 지속시간"),
            Metric::AfterHoursActivity => Some("시간외 활동"),
            Metric::WeekendHolidayAccess => Some("주말/휴일 접근"),
            Metric::LoginFrequencyChange => Some("로그인 빈도 변화"),
            Metric::ConcurrentSessionDetection => Some("동시 세션 감지"),
            Metric::TimezoneAnomalyAccess => Some("시간대 이상 접근"),
            Metric::IpAddressPattern => Some("IP 주소 패턴"),
            Metric::GeoLocationAnalysis => Some("지리적 위치 분석"),
            Metric::DataVolumeTransfer => Some("데이터 전송량"),
            Metric::ImpossibleTravelDetection => Some("불가능한 이동 감지"),
            Metric::VpnUsagePattern => Some("VPN 사용 패턴"),
            Metric::NetworkDeviceChange => Some("네트워크 장치 변경"),
            Metric::BandwidthUsageAnomaly => Some("대역폭 사용 이상"),
            Metric::ConnectionPatternAnalysis => Some("연결 패턴 분석"),
            Metric::IdleTimePattern
            | Metric::ProxyBypassAttempt
            | Metric::AuthenticationFailureCount
            | Metric::PrivilegeEscalationAttempt
            | Metric::RemoteAccessPattern
            | Metric::ResourceAccessPattern
            | Metric::SensitiveDataAccess
            | Metric::FileDownloadPattern
            | Metric::AdminPrivilegeUsage
            | Metric::ApplicationUsagePattern
            | Metric::DatabaseQueryPattern
            | Metric::EmailBehaviorPattern
            | Metric::SystemCommandExecution
            | Metric::SharedFolderAccess => None,
        }
    }

    pub fn category(self) -> MetricCategory {
        match self {
            Metric::LoginTimePattern
            | Metric::SessionDuration
            | Metric::AfterHoursActivity
            | Metric::WeekendHolidayAccess
            | Metric::LoginFrequencyChange
            | Metric::ConcurrentSessionDetection
            | Metric::TimezoneAnomalyAccess
            | Metric::IdleTimePattern => MetricCategory::Time,
            Metric::IpAddressPattern
            | Metric::GeoLocationAnalysis
            | Metric::DataVolumeTransfer
            | Metric::ImpossibleTravelDetection
            | Metric::VpnUsagePattern
            | Metric::NetworkDeviceChange
            | Metric::BandwidthUsageAnomaly
            | Metric::ConnectionPatternAnalysis
            | Metric::ProxyBypassAttempt => MetricCategory::Network,
            Metric::AuthenticationFailureCount
            | Metric::PrivilegeEscalationAttempt
            | Metric::RemoteAccessPattern
            | Metric::ResourceAccessPattern
            | Metric::SensitiveDataAccess
            | Metric::FileDownloadPattern
            | Metric::AdminPrivilegeUsage
            | Metric::ApplicationUsagePattern
            | Metric::DatabaseQueryPattern
            | Metric::EmailBehaviorPattern
            | Metric::SystemCommandExecution
            | Metric::SharedFolderAccess => MetricCategory::Access,
        }
    }

    /// Exact match on the wizard label.
    pub fn from_label(label: &str) -> Option<Metric> {
        Metric::ALL.into_iter().find(|m| m.label() == label)
    }

    /// Exact match on the canonical key.
    pub fn from_key(key: &str) -> Option<Metric> {
        Metric::ALL.into_iter().find(|m| m.key() == key)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Metric {
    type Err = UnknownMetric;

    /// Accepts either a canonical key or a wizard label.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Metric::from_key(s)
            .or_else(|| Metric::from_label(s))
            .ok_or_else(|| UnknownMetric(s.to_string()))
    }
}

/// Dashboard name for an engine metric key; unknown keys are shown as-is.
pub fn metric_display_name(key: &str) -> String {
    Metric::from_key(key)
        .and_then(Metric::display_name)
        .map(str::to_string)
        .unwrap_or_else(|| key.to_string())
}

/// Outcome of translating wizard labels into engine keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricTranslation {
    /// Keys to send, in input order. Unrecognized entries are kept verbatim.
    pub metrics: Vec<String>,
    /// Entries that were neither a known label nor a canonical key.
    pub unrecognized: Vec<String>,
}

/// Translate wizard labels to canonical keys. Empty entries are dropped.
pub fn translate_metrics(labels: &[String]) -> MetricTranslation {
    let mut out = MetricTranslation::default();
    for label in labels.iter().filter(|l| !l.is_empty()) {
        match label.parse::<Metric>() {
            Ok(metric) => {
                tracing::debug!(label = %label, key = metric.key(), "translated metric");
                out.metrics.push(metric.key().to_string());
            }
            Err(UnknownMetric(raw)) => {
                tracing::warn!(label = %raw, "unknown metric label, passing through");
                out.metrics.push(raw.clone());
                out.unrecognized.push(raw);
            }
        }
    }
    out
}

/// Pull a list of metric labels out of a request field. Anything that is
/// not an array yields an empty list; non-string elements are skipped.
pub fn metric_labels(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

/// Anomaly sensitivity tiers offered by the wizard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sensitivity {
    Lenient,
    Medium,
    Sensitive,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Thresholds {
    pub alert_threshold: f64,
    pub warning_threshold: f64,
    pub minimum_deviation_score: f64,
}

impl Sensitivity {
    /// Keyword match on the wizard text. Lenient keywords win over
    /// sensitive ones; anything else is the medium tier.
    pub fn from_text(text: Option<&str>) -> Sensitivity {
        let text = text.unwrap_or_default();
        if text.contains("낮음") || text.contains("관대") {
            Sensitivity::Lenient
        } else if text.contains("높음") || text.contains("민감") {
            Sensitivity::Sensitive
        } else {
            Sensitivity::Medium
        }
    }

    pub fn thresholds(self) -> Thresholds {
        match self {
            Sensitivity::Lenient => Thresholds {
                alert_threshold: 0.9,
                warning_threshold: 0.7,
                minimum_deviation_score: 0.5,
            },
            Sensitivity::Medium => Thresholds {
                alert_threshold: 0.8,
                warning_threshold: 0.6,
                minimum_deviation_score: 0.3,
            },
            Sensitivity::Sensitive => Thresholds {
                alert_threshold: 0.6,
                warning_threshold: 0.4,
                minimum_deviation_score: 0.2,
            },
        }
    }
}

/// Map the wizard's analysis scope onto the engine's vocabulary.
pub fn map_analysis_scope(scope: Option<&str>) -> &'static str {
    match scope {
        Some("role") => "user_activity",
        Some("global") => "organizational",
        _ => "department",
    }
}

pub const ALERT_EMAIL: &str = "이메일 알림";
pub const ALERT_SLACK: &str = "Slack 알림";
pub const ALERT_SMS: &str = "SMS 알림";
pub const ALERT_DASHBOARD: &str = "대시보드 표시";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NotificationSettings {
    pub email_enabled: bool,
    pub slack_enabled: bool,
    pub sms_enabled: bool,
    pub dashboard_enabled: bool,
}

impl NotificationSettings {
    /// Channels selected in the wizard. `alerts` is normally an array of
    /// labels; a plain string is matched by substring.
    pub fn from_alerts(alerts: Option<&Value>) -> NotificationSettings {
        let has = |label: &str| match alerts {
            Some(Value::Array(items)) => items.iter().any(|v| v.as_str() == Some(label)),
            Some(Value::String(s)) => s.contains(label),
            _ => false,
        };
        NotificationSettings {
            email_enabled: has(ALERT_EMAIL),
            slack_enabled: has(ALERT_SLACK),
            sms_enabled: has(ALERT_SMS),
            dashboard_enabled: has(ALERT_DASHBOARD),
        }
    }
}

/// Leading-integer parse of a loosely typed form field: `"45점"` is 45,
/// `"abc"` is `None`, numbers are truncated.
pub fn leading_int(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => {
            let s = s.trim_start();
            let (sign, digits) = match s.strip_prefix('-') {
                Some(rest) => (-1, rest),
                None => (1, s.strip_prefix('+').unwrap_or(s)),
            };
            let end = digits
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(digits.len());
            digits[..end].parse::<i64>().ok().map(|n| sign * n)
        }
        _ => None,
    }
}
