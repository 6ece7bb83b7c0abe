//! Per-session clickstream features
//!
//! Click counts, session duration and unique item counts, one value per
//! session in order of first appearance.

use crate::types::{Clickstream, SessionColumn};
use std::collections::HashSet;
use tracing::warn;

pub const TOTAL_CLICKS: &str = "total_clicks";
pub const SECONDS_PER_SESSION: &str = "seconds_per_session";
pub const COUNT_UNIQUE_ITEMS: &str = "count_unique_items";

/// Count the clicks (non-null timestamps) per session
pub fn total_clicks(clickstream: &Clickstream) -> SessionColumn<u64> {
    let values = clickstream
        .groups()
        .into_iter()
        .map(|(session, rows)| {
            let clicks = rows.iter().filter(|r| r.timestamp.is_some()).count() as u64;
            (session.to_string(), clicks)
        })
        .collect();
    SessionColumn::new(TOTAL_CLICKS, values)
}

/// Seconds between the first and last timestamp of each session.
///
/// "First" and "last" are the first and last non-null timestamps in row
/// order, not the minimum and maximum. A session with no timestamp gets
/// `None`. Negative spans (rows out of chronological order) are clamped to 0.
pub fn total_seconds(clickstream: &Clickstream) -> SessionColumn<Option<f64>> {
    let values = clickstream
        .groups()
        .into_iter()
        .map(|(session, rows)| {
            let mut stamps = rows.iter().filter_map(|r| r.timestamp);
            let seconds = stamps.next().map(|first| {
                let last = stamps.last().unwrap_or(first);
                let delta = last - first;
                let span = match delta.num_microseconds() {
                    Some(micros) => micros as f64 / 1_000_000.0,
                    None => delta.num_milliseconds() as f64 / 1000.0,
                };
                if span < 0.0 {
                    warn!(session, span, "clickstream rows out of order; clamping duration to 0");
                    0.0
                } else {
                    span
                }
            });
            (session.to_string(), seconds)
        })
        .collect();
    SessionColumn::new(SECONDS_PER_SESSION, values)
}

/// Count distinct non-null item ids per session
pub fn count_unique_items(clickstream: &Clickstream) -> SessionColumn<u64> {
    let values = clickstream
        .groups()
        .into_iter()
        .map(|(session, rows)| {
            let unique: HashSet<&str> = rows.iter().filter_map(|r| r.item_id.as_deref()).collect();
            (session.to_string(), unique.len() as u64)
        })
        .collect();
    SessionColumn::new(COUNT_UNIQUE_ITEMS, values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::parse_timestamp;
    use crate::types::ClickRecord;

    fn click(session: &str, ts: Option<&str>, item: &str) -> ClickRecord {
        ClickRecord {
            session_id: session.to_string(),
            timestamp: ts.and_then(parse_timestamp),
            item_id: Some(item.to_string()),
            category: Some("0".to_string()),
        }
    }

    fn sample_clicks() -> Clickstream {
        Clickstream::new(vec![
            click("1", Some("2024-01-01T00:00:00"), "a"),
            click("1", Some("2024-01-01T00:05:00"), "b"),
            click("1", Some("2024-01-01T00:07:30"), "a"),
            click("2", Some("2024-01-01T01:00:00"), "c"),
            click("3", Some("2024-01-01T02:00:00.250"), "d"),
            click("3", Some("2024-01-01T02:00:01"), "d"),
        ])
    }

    #[test]
    fn test_total_clicks() {
        let clicks = total_clicks(&sample_clicks());
        assert_eq!(clicks.name, TOTAL_CLICKS);
        assert_eq!(
            clicks.values,
            vec![
                ("1".to_string(), 3),
                ("2".to_string(), 1),
                ("3".to_string(), 2)
            ]
        );
    }

    #[test]
    fn test_total_clicks_skips_null_timestamps() {
        let clicks = Clickstream::new(vec![click("1", Some("2024-01-01T00:00:00"), "a"), click("1", None, "b")]);
        assert_eq!(total_clicks(&clicks).get("1"), Some(&1));
    }

    #[test]
    fn test_total_seconds() {
        let seconds = total_seconds(&sample_clicks());
        assert_eq!(seconds.get("1"), Some(&Some(450.0)));
        assert_eq!(seconds.get("2"), Some(&Some(0.0)));
        let s3 = seconds.get("3").unwrap().unwrap();
        assert!((s3 - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_total_seconds_uses_row_order_not_extremes() {
        // Middle row is the latest; last row decides the span
        let clicks = Clickstream::new(vec![
            click("1", Some("2024-01-01T00:00:00"), "a"),
            click("1", Some("2024-01-01T00:10:00"), "b"),
            click("1", Some("2024-01-01T00:01:00"), "c"),
        ]);
        assert_eq!(total_seconds(&clicks).get("1"), Some(&Some(60.0)));
    }

    #[test]
    fn test_total_seconds_clamps_negative_span() {
        let clicks = Clickstream::new(vec![
            click("1", Some("2024-01-01T00:10:00"), "a"),
            click("1", Some("2024-01-01T00:00:00"), "b"),
        ]);
        assert_eq!(total_seconds(&clicks).get("1"), Some(&Some(0.0)));
    }

    #[test]
    fn test_total_seconds_keeps_sub_millisecond_precision() {
        let clicks = Clickstream::new(vec![
            click("1", Some("2024-01-01T00:00:00.000000"), "a"),
            click("1", Some("2024-01-01T00:00:00.000900"), "b"),
        ]);
        let span = total_seconds(&clicks).get("1").unwrap().unwrap();
        assert!((span - 0.0009).abs() < 1e-12);
    }

    #[test]
    fn test_unique_items_can_exceed_clicks_without_timestamps() {
        let clicks = Clickstream::new(vec![click("1", None, "a"), click("1", None, "b")]);
        assert_eq!(total_clicks(&clicks).get("1"), Some(&0));
        assert_eq!(count_unique_items(&clicks).get("1"), Some(&2));
    }

    #[test]
    fn test_total_seconds_without_timestamps() {
        let clicks = Clickstream::new(vec![click("1", None, "a"), click("1", None, "b")]);
        assert_eq!(total_seconds(&clicks).get("1"), Some(&None));
    }

    #[test]
    fn test_count_unique_items() {
        let clicks = sample_clicks();
        let unique = count_unique_items(&clicks);
        let totals = total_clicks(&clicks);

        assert_eq!(unique.get("1"), Some(&2));
        assert_eq!(unique.get("3"), Some(&1));
        for (session, count) in unique.iter() {
            assert!(count <= totals.get(session).unwrap());
        }
    }

    #[test]
    fn test_empty_clickstream() {
        let clicks = Clickstream::default();
        assert!(total_clicks(&clicks).is_empty());
        assert!(total_seconds(&clicks).is_empty());
        assert!(count_unique_items(&clicks).is_empty());
    }
}
