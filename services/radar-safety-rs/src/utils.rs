use std::cmp::max;

use chrono::{DateTime, Duration, Utc};

use crate::constants::RADAR_STEP_SECONDS;

const WIRE_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

pub fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .without_time()
        .init();
}

pub fn floor_timestamp(timestamp: DateTime<Utc>, step_seconds: i64) -> DateTime<Utc> {
    let step_ms = max(step_seconds, 1) * 1000;
    let floored_ms = timestamp.timestamp_millis().div_euclid(step_ms) * step_ms;
    DateTime::<Utc>::from_timestamp_millis(floored_ms).unwrap_or(timestamp)
}

/// Newest radar time the upstream is expected to have published at `now`.
pub fn current_radar_time(now: DateTime<Utc>, offset_minutes: u64) -> DateTime<Utc> {
    let offset = Duration::try_minutes(offset_minutes as i64).unwrap_or(Duration::zero());
    floor_timestamp(now, RADAR_STEP_SECONDS) - offset
}

pub fn format_wire_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.format(WIRE_TIMESTAMP_FORMAT).to_string()
}

pub fn parse_wire_timestamp(timestamp: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(timestamp.trim())
        .ok()
        .map(|parsed| parsed.with_timezone(&Utc))
}
