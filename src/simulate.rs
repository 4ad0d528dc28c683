//! Deterministic stand-in data for views the baseline engine could not
//! serve. Every body carries `simulation_mode: true`.

use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};

use crate::engine::ProfileView;

pub const SIMULATION_MESSAGE: &str =
    "베이스라인 엔진에 연결할 수 없어 시뮬레이션 데이터를 제공합니다.";

const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];
const TREND_DAYS: i64 = 14;

/// FNV-1a over the key bytes.
pub fn seed_for(key: &str) -> u64 {
    key.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, b| {
        (hash ^ u64::from(b)).wrapping_mul(0x0100_0000_01b3)
    })
}

/// RNG seeded from `key`; the same key always yields the same sequence.
pub fn rng_for(key: &str) -> StdRng {
    StdRng::seed_from_u64(seed_for(key))
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

fn days_ending(today: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    (0..TREND_DAYS).rev().map(move |back| today - Duration::days(back))
}

/// Synthetic body for one of the per-profile analytics views.
pub fn profile_view(profile_id: &str, view: ProfileView, today: NaiveDate) -> Value {
    let mut rng = rng_for(&format!("{profile_id}/{}", view.name()));
    let (key, points): (&str, Vec<Value>) = match view {
        ProfileView::Timeline => (
            "timeline",
            days_ending(today)
                .map(|day| {
                    json!({
                        "date": day.to_string(),
                        "anomaly_count": rng.gen_range(0..12),
                        "average_deviation": round2(rng.gen_range(0.1..0.9)),
                    })
                })
                .collect(),
        ),
        ProfileView::HourlyPatterns => (
            "hourly_patterns",
            (0..24)
                .map(|hour| {
                    let base = if (9..18).contains(&hour) { 60.0 } else { 10.0 };
                    json!({
                        "hour": hour,
                        "activity": round2(base + rng.gen_range(0.0..30.0)),
                    })
                })
                .collect(),
        ),
        ProfileView::QualityTrends => (
            "quality_trends",
            days_ending(today)
                .map(|day| {
                    json!({
                        "date": day.to_string(),
                        "quality_score": round2(rng.gen_range(0.7..0.95)),
                    })
                })
                .collect(),
        ),
        ProfileView::AnomaliesTimeline => (
            "anomalies_timeline",
            days_ending(today)
                .map(|day| {
                    json!({
                        "date": day.to_string(),
                        "high": rng.gen_range(0..3),
                        "medium": rng.gen_range(0..6),
                        "low": rng.gen_range(0..10),
                    })
                })
                .collect(),
        ),
    };

    json!({
        "profile_id": profile_id,
        key: points,
        "simulation_mode": true,
        "message": SIMULATION_MESSAGE,
    })
}

/// Synthetic 24-hour and 7-day activity for one user.
pub fn user_temporal_patterns(user_id: &str) -> Value {
    let mut rng = rng_for(&format!("{user_id}/temporal"));
    let hourly: Vec<Value> = (0..24)
        .map(|hour| {
            json!({
                "hour": hour,
                "individual": round2(rng.gen_range(0.0..100.0)),
                "common": round2(rng.gen_range(0.0..100.0)),
            })
        })
        .collect();
    let weekly: Vec<Value> = WEEKDAYS
        .iter()
        .map(|day| {
            json!({
                "day": day,
                "individual": round2(rng.gen_range(0.0..100.0)),
                "common": round2(rng.gen_range(0.0..100.0)),
            })
        })
        .collect();

    json!({
        "userId": user_id,
        "hourlyActivity": hourly,
        "weeklyActivity": weekly,
        "simulation_mode": true,
        "message": SIMULATION_MESSAGE,
    })
}

/// Synthetic individual-vs-common comparison for one user and metric.
pub fn baseline_comparison(user_id: &str, metric_name: Option<&str>) -> Value {
    let mut rng = rng_for(&format!("{user_id}/{}", metric_name.unwrap_or_default()));
    let mut side = |confidence: Option<f64>| {
        let low = rng.gen_range(0..50);
        let high = rng.gen_range(50..100);
        json!({
            "mean": round2(rng.gen_range(0.0..100.0)),
            "std": round2(rng.gen_range(0.0..20.0)),
            "normalRange": format!("{low} - {high}"),
            "confidence": confidence.unwrap_or_else(|| round2(rng.gen_range(0.7..1.0))),
        })
    };
    let individual = side(None);
    let common = side(Some(0.85));

    json!({
        "userId": user_id,
        "metricName": metric_name,
        "individual": individual,
        "common": common,
        "currentValue": round2(rng.gen_range(0.0..150.0)),
        "deviation": rng.gen_range(0..200),
        "simulation_mode": true,
        "message": SIMULATION_MESSAGE,
    })
}
