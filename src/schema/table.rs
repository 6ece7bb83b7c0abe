//! Untyped tabular input
//!
//! A `RawTable` is a list of named columns holding optional strings. It is
//! what the readers produce before the adapter checks the schema and parses
//! values into typed records.

use crate::error::FeatureError;
use serde_json::Value;
use std::collections::HashMap;
use std::io::Read;

/// Positional column names for a headerless clickstream file
pub const CLICKSTREAM_COLUMNS: [&str; 4] = ["session_id", "timestamp", "item_id", "category"];

/// Positional column names for a headerless purchase file
pub const PURCHASE_COLUMNS: [&str; 5] = ["session_id", "timestamp", "item_id", "price", "quantity"];

/// Untyped table of optional string cells
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    columns: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl RawTable {
    /// Build a table from column names and rows.
    ///
    /// Short rows are padded with nulls.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                if row.len() < width {
                    row.resize(width, None);
                }
                row
            })
            .collect();
        Self { columns, rows }
    }

    /// Read a CSV source.
    ///
    /// When `has_headers` is false the first columns are named after
    /// `positional`, and any extra ones `col_{index}`.
    pub fn from_csv_reader<R: Read>(
        reader: R,
        has_headers: bool,
        delimiter: u8,
        positional: &[&str],
    ) -> Result<Self, FeatureError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(has_headers)
            .flexible(true)
            .from_reader(reader);

        let mut columns: Vec<String> = if has_headers {
            csv_reader
                .headers()?
                .iter()
                .map(|h| h.trim().to_string())
                .collect()
        } else {
            positional.iter().map(|c| c.to_string()).collect()
        };

        let mut rows = Vec::new();
        for record in csv_reader.records() {
            let record = record?;
            while columns.len() < record.len() {
                columns.push(format!("col_{}", columns.len()));
            }
            let row: Vec<Option<String>> = record
                .iter()
                .map(|field| {
                    if field.is_empty() {
                        None
                    } else {
                        Some(field.to_string())
                    }
                })
                .collect();
            rows.push(row);
        }

        Ok(Self::new(columns, rows))
    }

    /// Read CSV from a string
    pub fn from_csv_str(
        data: &str,
        has_headers: bool,
        delimiter: u8,
        positional: &[&str],
    ) -> Result<Self, FeatureError> {
        Self::from_csv_reader(data.as_bytes(), has_headers, delimiter, positional)
    }

    /// Parse NDJSON (one JSON object per line)
    pub fn from_ndjson(ndjson: &str) -> Result<Self, FeatureError> {
        let mut objects = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<Value>(trimmed) {
                Ok(value) => objects.push(value),
                Err(e) => {
                    return Err(FeatureError::Parse(format!(
                        "Failed to parse line {}: {}",
                        line_num + 1,
                        e
                    )));
                }
            }
        }
        Self::from_json_values(objects)
    }

    /// Parse a JSON array of objects
    pub fn from_json_array(json: &str) -> Result<Self, FeatureError> {
        let objects: Vec<Value> = serde_json::from_str(json)?;
        Self::from_json_values(objects)
    }

    fn from_json_values(objects: Vec<Value>) -> Result<Self, FeatureError> {
        let mut columns: Vec<String> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut cells: Vec<Vec<(usize, Option<String>)>> = Vec::with_capacity(objects.len());

        for (row_num, object) in objects.into_iter().enumerate() {
            let Value::Object(map) = object else {
                return Err(FeatureError::Parse(format!(
                    "Row {} is not a JSON object",
                    row_num + 1
                )));
            };

            let mut row = Vec::with_capacity(map.len());
            for (key, value) in map {
                let col = *index.entry(key.clone()).or_insert_with(|| {
                    columns.push(key);
                    columns.len() - 1
                });
                row.push((col, json_cell(value)));
            }
            cells.push(row);
        }

        let width = columns.len();
        let rows = cells
            .into_iter()
            .map(|row| {
                let mut dense = vec![None; width];
                for (col, value) in row {
                    dense[col] = value;
                }
                dense
            })
            .collect();

        Ok(Self::new(columns, rows))
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column by name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Position of a required column, or a schema error naming the table
    pub fn require(&self, table: &str, name: &str) -> Result<usize, FeatureError> {
        self.column_index(name)
            .ok_or_else(|| FeatureError::missing_column(table, name))
    }

    /// Cell value at (row, column)
    pub fn value(&self, row: usize, col: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .and_then(|v| v.as_deref())
    }
}

fn json_cell(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}
