//! Session feature accumulator
//!
//! `FeatureTable` maps each session id to a `SessionFeatures` record. Every
//! clickstream session is seeded up front, then each aggregation's output is
//! merged into the matching records.

use crate::error::FeatureError;
use crate::features::{COUNT_UNIQUE_ITEMS, SECONDS_PER_SESSION, TOTAL_CLICKS};
use crate::revenue::{REVENUE, TOTAL_PURCHASES};
use crate::types::{Clickstream, SessionColumn, SessionFeatures};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use tracing::debug;

/// Numeric columns of the session feature table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureColumn {
    Revenue,
    BinaryRevenue,
    TotalPurchases,
    TotalClicks,
    SecondsPerSession,
    CountUniqueItems,
}

impl FeatureColumn {
    pub const ALL: [FeatureColumn; 6] = [
        FeatureColumn::Revenue,
        FeatureColumn::BinaryRevenue,
        FeatureColumn::TotalPurchases,
        FeatureColumn::TotalClicks,
        FeatureColumn::SecondsPerSession,
        FeatureColumn::CountUniqueItems,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            FeatureColumn::Revenue => REVENUE,
            FeatureColumn::BinaryRevenue => "binary_revenue",
            FeatureColumn::TotalPurchases => TOTAL_PURCHASES,
            FeatureColumn::TotalClicks => TOTAL_CLICKS,
            FeatureColumn::SecondsPerSession => SECONDS_PER_SESSION,
            FeatureColumn::CountUniqueItems => COUNT_UNIQUE_ITEMS,
        }
    }

    /// Read this column from a session record
    pub fn value(&self, features: &SessionFeatures) -> Option<f64> {
        match self {
            FeatureColumn::Revenue => Some(features.revenue),
            FeatureColumn::BinaryRevenue => Some(f64::from(features.binary_revenue)),
            FeatureColumn::TotalPurchases => Some(features.total_purchases as f64),
            FeatureColumn::TotalClicks => Some(features.total_clicks as f64),
            FeatureColumn::SecondsPerSession => features.seconds_per_session,
            FeatureColumn::CountUniqueItems => Some(features.count_unique_items as f64),
        }
    }
}

impl FromStr for FeatureColumn {
    type Err = FeatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FeatureColumn::ALL
            .iter()
            .copied()
            .find(|c| c.name() == s)
            .ok_or_else(|| FeatureError::missing_column("features", s))
    }
}

impl std::fmt::Display for FeatureColumn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Session id → feature record, in order of first clickstream appearance
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureTable {
    records: Vec<SessionFeatures>,
    index: HashMap<String, usize>,
}

impl FeatureTable {
    /// Seed one zeroed record per clickstream session
    pub fn from_clickstream(clickstream: &Clickstream) -> Self {
        let mut table = Self::default();
        for session in clickstream.session_ids() {
            table.insert(SessionFeatures::new(session));
        }
        table
    }

    /// Build a table from existing records (later duplicates replace earlier ones)
    pub fn from_records(records: Vec<SessionFeatures>) -> Self {
        let mut table = Self::default();
        for record in records {
            table.insert(record);
        }
        table
    }

    fn insert(&mut self, record: SessionFeatures) {
        match self.index.get(&record.session_id) {
            Some(&pos) => self.records[pos] = record,
            None => {
                self.index.insert(record.session_id.clone(), self.records.len());
                self.records.push(record);
            }
        }
    }

    /// Merge a session column into the table.
    ///
    /// Sessions not already in the table are skipped (left join on the
    /// clickstream sessions). Returns the number of skipped sessions.
    pub fn merge<T, F>(&mut self, column: &SessionColumn<T>, mut apply: F) -> usize
    where
        F: FnMut(&mut SessionFeatures, &T),
    {
        let mut skipped = 0;
        for (session, value) in column.iter() {
            match self.index.get(session) {
                Some(&pos) => apply(&mut self.records[pos], value),
                None => skipped += 1,
            }
        }
        debug!(column = %column.name, skipped, "merged session column");
        skipped
    }

    /// Merge summed revenue; binary revenue follows from it
    pub fn merge_revenue(&mut self, revenue: &SessionColumn<f64>) -> usize {
        self.merge(revenue, |record, value| {
            record.revenue = *value;
            record.binary_revenue = u8::from(*value > 0.0);
        })
    }

    pub fn merge_total_purchases(&mut self, purchases: &SessionColumn<u64>) -> usize {
        self.merge(purchases, |record, value| record.total_purchases = *value)
    }

    pub fn merge_total_clicks(&mut self, clicks: &SessionColumn<u64>) -> usize {
        self.merge(clicks, |record, value| record.total_clicks = *value)
    }

    pub fn merge_seconds(&mut self, seconds: &SessionColumn<Option<f64>>) -> usize {
        self.merge(seconds, |record, value| record.seconds_per_session = *value)
    }

    pub fn merge_unique_items(&mut self, unique: &SessionColumn<u64>) -> usize {
        self.merge(unique, |record, value| record.count_unique_items = *value)
    }

    pub fn get(&self, session_id: &str) -> Option<&SessionFeatures> {
        self.index.get(session_id).map(|&pos| &self.records[pos])
    }

    pub fn records(&self) -> &[SessionFeatures] {
        &self.records
    }

    pub fn into_records(self) -> Vec<SessionFeatures> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Values of one column, in row order
    pub fn column(&self, column: FeatureColumn) -> Vec<Option<f64>> {
        self.records.iter().map(|r| column.value(r)).collect()
    }
}
