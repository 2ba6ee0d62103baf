// SPDX-License-Identifier: MIT

//! Timestamp and elapsed-time formatting helpers shared across the pipeline.

use std::time::Duration;

/// RFC 3339 timestamp for the current instant, used for `first_seen`,
/// `last_seen`, and artifact `generation_timestamp` fields.
pub fn now_iso8601() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Render a duration as seconds with millisecond precision, the form used
/// in `generation_time_seconds` and log lines.
pub fn format_elapsed(d: Duration) -> String {
    format!("{:.3}", d.as_secs_f64())
}

/// `HHMM` prefix used when sanitizing LLM-derived scene names, taken from
/// the current local time.
pub fn hhmm_prefix() -> String {
    chrono::Local::now().format("%H%M").to_string()
}

#[cfg(test)]
#[path = "time_fmt_tests.rs"]
mod tests;
