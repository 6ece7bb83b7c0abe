//! Adapter for converting raw tables into typed clickstream and purchase tables
//!
//! This is where schema checks happen: a missing key or required column is a
//! schema error, a value that cannot be parsed is a type error.

use crate::error::FeatureError;
use crate::schema::table::RawTable;
use crate::types::{ClickRecord, Clickstream, PurchaseRecord, Purchases};
use chrono::{DateTime, NaiveDateTime};
use tracing::debug;

/// Key column shared by both tables
pub const SESSION_KEY: &str = "session_id";

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Adapter from `RawTable` to typed tables
pub struct TableAdapter;

impl TableAdapter {
    /// Convert a raw table into a clickstream table
    pub fn clickstream(table: &RawTable) -> Result<Clickstream, FeatureError> {
        let session = table.require("clickstream", SESSION_KEY)?;
        let timestamp = table.require("clickstream", "timestamp")?;
        let item = table.require("clickstream", "item_id")?;
        let category = table.require("clickstream", "category")?;

        let mut records = Vec::with_capacity(table.len());
        for row in 0..table.len() {
            records.push(ClickRecord {
                session_id: session_id(table, row, session)?,
                timestamp: optional_timestamp(table, row, timestamp)?,
                item_id: table.value(row, item).map(str::to_string),
                category: table.value(row, category).map(str::to_string),
            });
        }

        debug!(rows = records.len(), "parsed clickstream table");
        Ok(Clickstream::new(records))
    }

    /// Convert a raw table into a purchase table
    pub fn purchases(table: &RawTable) -> Result<Purchases, FeatureError> {
        let session = table.require("purchases", SESSION_KEY)?;
        let price = table.require("purchases", "price")?;
        let quantity = table.require("purchases", "quantity")?;
        let timestamp = table.column_index("timestamp");
        let item = table.column_index("item_id");

        let mut records = Vec::with_capacity(table.len());
        for row in 0..table.len() {
            let timestamp = match timestamp {
                Some(col) => optional_timestamp(table, row, col)?,
                None => None,
            };
            records.push(PurchaseRecord {
                session_id: session_id(table, row, session)?,
                timestamp,
                item_id: item.and_then(|col| table.value(row, col)).map(str::to_string),
                price: parse_price(table.value(row, price), row)?,
                quantity: parse_quantity(table.value(row, quantity), row)?,
            });
        }

        debug!(rows = records.len(), "parsed purchase table");
        Ok(Purchases::new(records))
    }
}

/// Parse a timestamp string.
///
/// Accepts RFC 3339 (converted to UTC, then made naive) and naive
/// `YYYY-MM-DD[T| ]HH:MM[:SS[.fff]]` forms.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_utc());
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
}

fn session_id(table: &RawTable, row: usize, col: usize) -> Result<String, FeatureError> {
    table
        .value(row, col)
        .map(|s| s.trim().to_string())
        .ok_or_else(|| FeatureError::bad_value(SESSION_KEY, row, "session_id is null"))
}

fn optional_timestamp(
    table: &RawTable,
    row: usize,
    col: usize,
) -> Result<Option<NaiveDateTime>, FeatureError> {
    match table.value(row, col) {
        None => Ok(None),
        Some(raw) => parse_timestamp(raw).map(Some).ok_or_else(|| {
            FeatureError::bad_value("timestamp", row, format!("'{}' is not a date-time", raw))
        }),
    }
}

fn parse_price(value: Option<&str>, row: usize) -> Result<f64, FeatureError> {
    let raw = value.ok_or_else(|| FeatureError::bad_value("price", row, "price is null"))?;
    match raw.trim().parse::<f64>() {
        Ok(price) if price.is_finite() => Ok(price),
        _ => Err(FeatureError::bad_value(
            "price",
            row,
            format!("'{}' is not a finite number", raw),
        )),
    }
}

fn parse_quantity(value: Option<&str>, row: usize) -> Result<i64, FeatureError> {
    let raw = value.ok_or_else(|| FeatureError::bad_value("quantity", row, "quantity is null"))?;
    let trimmed = raw.trim();
    if let Ok(q) = trimmed.parse::<i64>() {
        return Ok(q);
    }
    // Integer-valued floats ("2.0") come out of some exporters
    match trimmed.parse::<f64>() {
        // i64::MAX as f64 rounds up to 2^63, so the upper bound is exclusive
        Ok(q) if q.fract() == 0.0 && q >= i64::MIN as f64 && q < i64::MAX as f64 => Ok(q as i64),
        _ => Err(FeatureError::bad_value(
            "quantity",
            row,
            format!("'{}' is not an integer", raw),
        )),
    }
}
