//! Tabular input schema
//!
//! Readers produce untyped `RawTable`s (CSV, NDJSON, JSON arrays); the adapter
//! checks required columns and parses them into typed clickstream and purchase
//! tables.

mod adapter;
mod table;

pub use adapter::*;
pub use table::*;
