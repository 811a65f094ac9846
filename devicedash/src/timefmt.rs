//! Relative "last seen" strings for Unix timestamps (seconds).

use chrono::{DateTime, Local, TimeZone, Utc};

/// Format `ts` relative to `now`.
///
/// Under a minute reads `"{s}s ago"`, under an hour `"{m}m ago"`, under a day
/// `"{h}h ago"`; older timestamps fall back to the local calendar date.
/// Timestamps ahead of `now` (clock skew) read `"just now"`.
pub fn format_relative(ts: i64, now: DateTime<Utc>) -> String {
    let diff = now.timestamp().saturating_sub(ts);
    if diff < 0 {
        return "just now".into();
    }
    if diff < 60 {
        return format!("{diff}s ago");
    }
    if diff < 3_600 {
        return format!("{}m ago", diff / 60);
    }
    if diff < 86_400 {
        return format!("{}h ago", diff / 3_600);
    }
    match Local.timestamp_opt(ts, 0).single() {
        Some(dt) => dt.format("%Y-%m-%d").to_string(),
        None => "unknown".into(),
    }
}

pub fn format_relative_now(ts: i64) -> String {
    format_relative(ts, Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).single().unwrap()
    }

    #[test]
    fn buckets_and_boundaries() {
        let now = 1_700_000_000;
        assert_eq!(format_relative(now, at(now)), "0s ago");
        assert_eq!(format_relative(now - 59, at(now)), "59s ago");
        assert_eq!(format_relative(now - 60, at(now)), "1m ago");
        assert_eq!(format_relative(now - 3_599, at(now)), "59m ago");
        assert_eq!(format_relative(now - 3_600, at(now)), "1h ago");
        assert_eq!(format_relative(now - 86_399, at(now)), "23h ago");
    }

    #[test]
    fn future_timestamps_clamp() {
        let now = 1_700_000_000;
        assert_eq!(format_relative(now + 5, at(now)), "just now");
    }

    #[test]
    fn old_timestamps_render_a_date() {
        let now = 1_700_000_000;
        let s = format_relative(now - 3 * 86_400, at(now));
        assert_eq!(s.len(), 10, "expected YYYY-MM-DD, got {s}");
        assert!(!s.ends_with("ago"));
    }
}
