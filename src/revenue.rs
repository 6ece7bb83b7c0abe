//! Revenue response variables
//!
//! Joins per-session purchase revenue onto the clickstream rows and counts
//! purchasing rows per session.

use crate::types::{
    group_by_session, ClickRecord, Clickstream, FeatureRow, Purchases, SessionColumn,
};
use chrono::NaiveDateTime;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Label of the summed revenue column
pub const REVENUE: &str = "revenue";

/// Label of the purchase count column
pub const TOTAL_PURCHASES: &str = "total_purchases";

/// Sum price × quantity per session, in order of first appearance
pub fn total_revenue(purchases: &Purchases) -> SessionColumn<f64> {
    let values = purchases
        .groups()
        .into_iter()
        .map(|(session, rows)| {
            let revenue: f64 = rows.iter().map(|p| p.revenue()).sum();
            (session.to_string(), revenue)
        })
        .collect();
    SessionColumn::new(REVENUE, values)
}

/// Add total revenue and binary revenue to every clickstream row.
///
/// Sessions without purchases get revenue 0 and binary revenue 0. Exact
/// duplicate rows are dropped, keeping the first occurrence.
pub fn add_revenue(clickstream: &Clickstream, purchases: &Purchases) -> Vec<FeatureRow> {
    let revenue = total_revenue(purchases);
    let by_session: HashMap<&str, f64> = revenue.iter().map(|(id, v)| (id, *v)).collect();

    let mut seen: HashSet<RowKey<'_>> = HashSet::with_capacity(clickstream.len());
    let mut rows = Vec::with_capacity(clickstream.len());

    for click in &clickstream.records {
        let revenue = by_session
            .get(click.session_id.as_str())
            .copied()
            .unwrap_or(0.0);

        if !seen.insert(RowKey::new(click, revenue)) {
            continue;
        }

        rows.push(FeatureRow {
            click: click.clone(),
            revenue,
            binary_revenue: u8::from(revenue > 0.0),
            total_purchases: None,
        });
    }

    let dropped = clickstream.len() - rows.len();
    if dropped > 0 {
        warn!(dropped, "dropped duplicate clickstream rows after revenue join");
    }
    debug!(
        rows = rows.len(),
        purchasing_sessions = revenue.len(),
        "joined revenue onto clickstream"
    );

    rows
}

/// Count purchasing rows per session and attach it to every row as
/// `total_purchases`
pub fn total_number_purchases(rows: Vec<FeatureRow>) -> Vec<FeatureRow> {
    let totals: HashMap<String, u64> = purchases_per_session(&rows).values.into_iter().collect();

    rows.into_iter()
        .map(|mut row| {
            row.total_purchases = Some(totals.get(row.session_id()).copied().unwrap_or(0));
            row
        })
        .collect()
}

/// Same as `total_number_purchases`, returned as a session column
pub fn purchases_per_session(rows: &[FeatureRow]) -> SessionColumn<u64> {
    let values = group_by_session(rows, |r| r.session_id())
        .into_iter()
        .map(|(session, group)| {
            let total = group.iter().map(|r| u64::from(r.binary_revenue)).sum();
            (session.to_string(), total)
        })
        .collect();
    SessionColumn::new(TOTAL_PURCHASES, values)
}

/// Identity of a joined row for duplicate detection
#[derive(PartialEq, Eq, Hash)]
struct RowKey<'a> {
    session_id: &'a str,
    timestamp: Option<NaiveDateTime>,
    item_id: Option<&'a str>,
    category: Option<&'a str>,
    revenue_bits: u64,
}

impl<'a> RowKey<'a> {
    fn new(click: &'a ClickRecord, revenue: f64) -> Self {
        Self {
            session_id: &click.session_id,
            timestamp: click.timestamp,
            item_id: click.item_id.as_deref(),
            category: click.category.as_deref(),
            revenue_bits: revenue.to_bits(),
        }
    }
}
