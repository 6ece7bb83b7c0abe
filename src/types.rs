//! Core data types
//!
//! This module defines the record, table and feature types that flow through
//! the feature builder.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single clickstream event (one item view within a session)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClickRecord {
    /// Session identifier (non-unique across rows)
    pub session_id: String,
    /// When the click happened
    pub timestamp: Option<NaiveDateTime>,
    /// Clicked item
    pub item_id: Option<String>,
    /// Raw category code ("S", "1".."12", brand code, "0", ...)
    pub category: Option<String>,
}

/// A single purchase event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseRecord {
    /// Session identifier (non-unique across rows)
    pub session_id: String,
    /// When the purchase happened
    pub timestamp: Option<NaiveDateTime>,
    /// Purchased item
    pub item_id: Option<String>,
    /// Unit price
    pub price: f64,
    /// Units bought
    pub quantity: i64,
}

impl PurchaseRecord {
    /// Revenue of this purchase row (price × quantity)
    pub fn revenue(&self) -> f64 {
        self.price * self.quantity as f64
    }
}

/// Clickstream table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Clickstream {
    pub records: Vec<ClickRecord>,
}

impl Clickstream {
    pub fn new(records: Vec<ClickRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Group rows by session, in order of first appearance.
    ///
    /// Rows inside each group keep their table order.
    pub fn groups(&self) -> Vec<(&str, Vec<&ClickRecord>)> {
        group_by_session(&self.records, |r| r.session_id.as_str())
    }

    /// Distinct session ids in order of first appearance
    pub fn session_ids(&self) -> Vec<&str> {
        self.groups().into_iter().map(|(id, _)| id).collect()
    }
}

/// Purchase table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Purchases {
    pub records: Vec<PurchaseRecord>,
}

impl Purchases {
    pub fn new(records: Vec<PurchaseRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Group rows by session, in order of first appearance
    pub fn groups(&self) -> Vec<(&str, Vec<&PurchaseRecord>)> {
        group_by_session(&self.records, |r| r.session_id.as_str())
    }
}

/// Stable group-by on a session key
pub(crate) fn group_by_session<'a, T, F>(rows: &'a [T], key: F) -> Vec<(&'a str, Vec<&'a T>)>
where
    F: Fn(&'a T) -> &'a str,
{
    let mut index: HashMap<&'a str, usize> = HashMap::new();
    let mut groups: Vec<(&'a str, Vec<&'a T>)> = Vec::new();

    for row in rows {
        let session = key(row);
        match index.get(session) {
            Some(&pos) => groups[pos].1.push(row),
            None => {
                index.insert(session, groups.len());
                groups.push((session, vec![row]));
            }
        }
    }

    groups
}

/// Category label assigned to a raw category code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CategoryLabel {
    #[serde(rename = "special offer")]
    SpecialOffer,
    #[serde(rename = "regular")]
    Regular,
    #[serde(rename = "brand")]
    Brand,
    #[serde(rename = "missing")]
    Missing,
}

impl CategoryLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            CategoryLabel::SpecialOffer => "special offer",
            CategoryLabel::Regular => "regular",
            CategoryLabel::Brand => "brand",
            CategoryLabel::Missing => "missing",
        }
    }
}

impl std::fmt::Display for CategoryLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A clickstream row joined with session-level revenue aggregates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    #[serde(flatten)]
    pub click: ClickRecord,
    /// Total session revenue (0 when the session has no purchases)
    pub revenue: f64,
    /// 1 if the session's revenue is positive, else 0
    pub binary_revenue: u8,
    /// Sum of binary_revenue over the session's rows, once computed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_purchases: Option<u64>,
}

impl FeatureRow {
    pub fn session_id(&self) -> &str {
        &self.click.session_id
    }
}

/// A per-session aggregate column, ordered by first session appearance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionColumn<T> {
    /// Column label (e.g. "total_clicks")
    pub name: String,
    /// (session_id, value) pairs
    pub values: Vec<(String, T)>,
}

impl<T> SessionColumn<T> {
    pub fn new(name: impl Into<String>, values: Vec<(String, T)>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value for a session, if the session is present
    pub fn get(&self, session_id: &str) -> Option<&T> {
        self.values
            .iter()
            .find(|(id, _)| id == session_id)
            .map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.values.iter().map(|(id, v)| (id.as_str(), v))
    }
}

/// Features for one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionFeatures {
    pub session_id: String,
    pub revenue: f64,
    pub binary_revenue: u8,
    pub total_purchases: u64,
    pub total_clicks: u64,
    /// `None` when the session has no parseable timestamp
    pub seconds_per_session: Option<f64>,
    pub count_unique_items: u64,
}

impl SessionFeatures {
    /// Empty record for a session: every aggregate starts at zero
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            revenue: 0.0,
            binary_revenue: 0,
            total_purchases: 0,
            total_clicks: 0,
            seconds_per_session: None,
            count_unique_items: 0,
        }
    }
}

/// Session features after standardization of the behavioral columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaledFeatures {
    pub session_id: String,
    pub revenue: f64,
    pub binary_revenue: u8,
    pub total_purchases: u64,
    pub total_clicks: f64,
    pub seconds_per_session: f64,
    pub count_unique_items: f64,
}
