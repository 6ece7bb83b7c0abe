//! Pipeline configuration

use crate::charts::DEFAULT_HISTOGRAM_BINS;
use crate::error::FeatureError;
use serde::{Deserialize, Serialize};

/// Input table format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableFormat {
    Csv,
    Ndjson,
    Json,
}

/// Settings for a feature build
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Standardize the behavioral columns after aggregation
    pub standardize: bool,
    /// Histogram bins used by `describe`
    pub histogram_bins: usize,
    /// Input table format
    pub input_format: TableFormat,
    /// CSV files start with a header row
    pub has_headers: bool,
    /// CSV field delimiter
    pub delimiter: char,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            standardize: true,
            histogram_bins: DEFAULT_HISTOGRAM_BINS,
            input_format: TableFormat::Csv,
            has_headers: true,
            delimiter: ',',
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_standardize(mut self, standardize: bool) -> Self {
        self.standardize = standardize;
        self
    }

    pub fn with_histogram_bins(mut self, bins: usize) -> Self {
        self.histogram_bins = bins.max(1);
        self
    }

    pub fn with_input_format(mut self, format: TableFormat) -> Self {
        self.input_format = format;
        self
    }

    pub fn with_headers(mut self, has_headers: bool) -> Self {
        self.has_headers = has_headers;
        self
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Delimiter as the single byte the CSV reader expects
    pub fn delimiter_byte(&self) -> Result<u8, FeatureError> {
        if self.delimiter.is_ascii() {
            Ok(self.delimiter as u8)
        } else {
            Err(FeatureError::Parse(format!(
                "CSV delimiter '{}' is not a single ASCII character",
                self.delimiter
            )))
        }
    }

    /// Load configuration from JSON; absent fields keep their defaults
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
