//! Feature table encoder
//!
//! Wraps session features in a report envelope (producer, run id, timestamp)
//! and encodes tables as JSON, NDJSON or CSV.

use crate::error::FeatureError;
use crate::pipeline::FeatureOutput;
use crate::types::{ScaledFeatures, SessionFeatures};
use crate::{FEATURES_VERSION, PRODUCER_NAME};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Output encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// One session per line
    Ndjson,
    /// Report envelope as compact JSON
    Json,
    /// Report envelope as pretty-printed JSON
    JsonPretty,
    /// One session per row with a header
    Csv,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Producer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Feature report envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureReport {
    pub producer: Producer,
    pub run_id: String,
    pub computed_at: DateTime<Utc>,
    pub session_count: usize,
    pub purchasing_sessions: usize,
    pub sessions: Vec<SessionFeatures>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scaled: Option<Vec<ScaledFeatures>>,
}

/// Encoder for feature outputs
pub struct FeatureEncoder {
    instance_id: String,
}

impl Default for FeatureEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Build the report envelope for a pipeline output
    pub fn encode(&self, output: &FeatureOutput) -> FeatureReport {
        let sessions = output.sessions.records().to_vec();
        let purchasing_sessions = sessions.iter().filter(|s| s.binary_revenue == 1).count();

        FeatureReport {
            producer: Producer {
                name: PRODUCER_NAME.to_string(),
                version: FEATURES_VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            run_id: Uuid::new_v4().to_string(),
            computed_at: Utc::now(),
            session_count: sessions.len(),
            purchasing_sessions,
            sessions,
            scaled: output.scaled.clone(),
        }
    }

    /// Encode a pipeline output in the requested format.
    ///
    /// NDJSON and CSV emit the scaled table when present, else the raw one.
    pub fn encode_as(
        &self,
        output: &FeatureOutput,
        format: OutputFormat,
    ) -> Result<String, FeatureError> {
        match format {
            OutputFormat::Json => Ok(serde_json::to_string(&self.encode(output))?),
            OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(&self.encode(output))?),
            OutputFormat::Ndjson => match &output.scaled {
                Some(scaled) => to_ndjson(scaled),
                None => to_ndjson(output.sessions.records()),
            },
            OutputFormat::Csv => match &output.scaled {
                Some(scaled) => to_csv(scaled),
                None => to_csv(output.sessions.records()),
            },
        }
    }
}

/// One JSON object per line
pub fn to_ndjson<T: Serialize>(rows: &[T]) -> Result<String, FeatureError> {
    let mut out = String::new();
    for row in rows {
        out.push_str(&serde_json::to_string(row)?);
        out.push('\n');
    }
    Ok(out)
}

/// CSV with a header row derived from the record fields
pub fn to_csv<T: Serialize>(rows: &[T]) -> Result<String, FeatureError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer.serialize(row)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| FeatureError::Encoding(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| FeatureError::Encoding(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::build_features;
    use crate::schema::parse_timestamp;
    use crate::types::{ClickRecord, Clickstream, PurchaseRecord, Purchases};

    fn sample_output() -> FeatureOutput {
        let click = |session: &str, ts: &str, item: &str| ClickRecord {
            session_id: session.to_string(),
            timestamp: parse_timestamp(ts),
            item_id: Some(item.to_string()),
            category: Some("S".to_string()),
        };
        let clicks = Clickstream::new(vec![
            click("1", "2024-01-01T00:00:00", "a"),
            click("1", "2024-01-01T00:05:00", "b"),
            click("2", "2024-01-01T01:00:00", "c"),
        ]);
        let purchases = Purchases::new(vec![PurchaseRecord {
            session_id: "1".to_string(),
            timestamp: None,
            item_id: Some("a".to_string()),
            price: 10.0,
            quantity: 2,
        }]);
        build_features(&clicks, &purchases)
    }

    #[test]
    fn test_report_envelope() {
        let encoder = FeatureEncoder::with_instance_id("test-instance".to_string());
        let report = encoder.encode(&sample_output());

        assert_eq!(report.producer.name, PRODUCER_NAME);
        assert_eq!(report.producer.instance_id, "test-instance");
        assert_eq!(report.session_count, 2);
        assert_eq!(report.purchasing_sessions, 1);
        assert!(Uuid::parse_str(&report.run_id).is_ok());
        assert!(report.scaled.is_some());
    }

    #[test]
    fn test_json_output_is_valid() {
        let json = FeatureEncoder::new()
            .encode_as(&sample_output(), OutputFormat::Json)
            .unwrap();
        let payload: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(payload["sessions"][0]["session_id"], "1");
        assert_eq!(payload["sessions"][0]["revenue"], 20.0);
        assert_eq!(payload["sessions"][1]["binary_revenue"], 0);
    }

    #[test]
    fn test_ndjson_one_line_per_session() {
        let ndjson = FeatureEncoder::new()
            .encode_as(&sample_output(), OutputFormat::Ndjson)
            .unwrap();
        let lines: Vec<&str> = ndjson.lines().collect();
        assert_eq!(lines.len(), 2);
        for line in lines {
            let row: ScaledFeatures = serde_json::from_str(line).unwrap();
            assert!(row.total_clicks.is_finite());
        }
    }

    #[test]
    fn test_csv_header_and_rows() {
        let mut output = sample_output();
        output.scaled = None;
        let csv = FeatureEncoder::new()
            .encode_as(&output, OutputFormat::Csv)
            .unwrap();
        let mut lines = csv.lines();

        assert_eq!(
            lines.next(),
            Some("session_id,revenue,binary_revenue,total_purchases,total_clicks,seconds_per_session,count_unique_items")
        );
        assert_eq!(lines.next(), Some("1,20.0,1,2,2,300.0,2"));
        assert_eq!(lines.next(), Some("2,0.0,0,0,1,0.0,1"));
    }
}
