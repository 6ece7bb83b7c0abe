//! Feature pipeline orchestration
//!
//! This module provides the public API for building features. It runs the
//! aggregations in order and accumulates them into one session table:
//! revenue → purchase count → category map → clicks → duration → unique
//! items → standardization.

use crate::category::category_map;
use crate::config::{PipelineConfig, TableFormat};
use crate::error::FeatureError;
use crate::feature_table::FeatureTable;
use crate::features::{count_unique_items, total_clicks, total_seconds};
use crate::normalizer::StandardScaler;
use crate::revenue::{add_revenue, purchases_per_session, total_number_purchases, total_revenue};
use crate::schema::{RawTable, TableAdapter, CLICKSTREAM_COLUMNS, PURCHASE_COLUMNS};
use crate::types::{CategoryLabel, Clickstream, FeatureRow, Purchases, ScaledFeatures};
use tracing::{debug, info};

/// Everything a feature build produces
#[derive(Debug, Clone)]
pub struct FeatureOutput {
    /// Clickstream rows joined with revenue and total purchases (deduplicated)
    pub rows: Vec<FeatureRow>,
    /// Category label per clickstream input row
    pub category_map: Vec<Option<CategoryLabel>>,
    /// One record per clickstream session
    pub sessions: FeatureTable,
    /// Standardized session table, when standardization ran
    pub scaled: Option<Vec<ScaledFeatures>>,
    /// Scaler used for `scaled`
    pub scaler: Option<StandardScaler>,
}

/// Build features with standardization (stateless, one-shot)
pub fn build_features(clickstream: &Clickstream, purchases: &Purchases) -> FeatureOutput {
    let mut output = aggregate(clickstream, purchases);
    let (scaler, scaled) = StandardScaler::fit_transform(&output.sessions);
    output.scaled = Some(scaled);
    output.scaler = Some(scaler);
    output
}

/// Run every aggregation and accumulate the session table, without scaling
pub fn aggregate(clickstream: &Clickstream, purchases: &Purchases) -> FeatureOutput {
    // Stage 1: revenue join and purchase count
    let rows = total_number_purchases(add_revenue(clickstream, purchases));

    // Stage 2: category labels
    let categories = category_map(clickstream);

    // Stage 3: accumulate session aggregates
    let mut sessions = FeatureTable::from_clickstream(clickstream);
    sessions.merge_revenue(&total_revenue(purchases));
    sessions.merge_total_purchases(&purchases_per_session(&rows));
    sessions.merge_total_clicks(&total_clicks(clickstream));
    sessions.merge_seconds(&total_seconds(clickstream));
    sessions.merge_unique_items(&count_unique_items(clickstream));

    debug!(
        rows = rows.len(),
        sessions = sessions.len(),
        "aggregated session features"
    );

    FeatureOutput {
        rows,
        category_map: categories,
        sessions,
        scaled: None,
        scaler: None,
    }
}

/// Stateful processor that keeps its configuration and a fitted scaler.
///
/// The first processed batch fits the scaler; later batches reuse it so
/// every batch is scaled with the same parameters.
pub struct FeatureProcessor {
    config: PipelineConfig,
    scaler: Option<StandardScaler>,
}

impl Default for FeatureProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureProcessor {
    pub fn new() -> Self {
        Self::with_config(PipelineConfig::default())
    }

    pub fn with_config(config: PipelineConfig) -> Self {
        Self {
            config,
            scaler: None,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Parse clickstream and purchase tables using the configured format
    pub fn read_tables(
        &self,
        clickstream_data: &str,
        purchase_data: &str,
    ) -> Result<(Clickstream, Purchases), FeatureError> {
        let clicks = self.read_raw(clickstream_data, &CLICKSTREAM_COLUMNS)?;
        let purchases = self.read_raw(purchase_data, &PURCHASE_COLUMNS)?;
        Ok((
            TableAdapter::clickstream(&clicks)?,
            TableAdapter::purchases(&purchases)?,
        ))
    }

    /// Parse a clickstream table alone
    pub fn read_clickstream(&self, data: &str) -> Result<Clickstream, FeatureError> {
        let raw = self.read_raw(data, &CLICKSTREAM_COLUMNS)?;
        TableAdapter::clickstream(&raw)
    }

    fn read_raw(&self, data: &str, positional: &[&str]) -> Result<RawTable, FeatureError> {
        match self.config.input_format {
            TableFormat::Csv => RawTable::from_csv_str(
                data,
                self.config.has_headers,
                self.config.delimiter_byte()?,
                positional,
            ),
            TableFormat::Ndjson => RawTable::from_ndjson(data),
            TableFormat::Json => RawTable::from_json_array(data),
        }
    }

    /// Build features for typed tables
    pub fn process(&mut self, clickstream: &Clickstream, purchases: &Purchases) -> FeatureOutput {
        let mut output = aggregate(clickstream, purchases);

        if self.config.standardize {
            let scaler = match &self.scaler {
                Some(scaler) => scaler.clone(),
                None => {
                    let fitted = StandardScaler::fit(&output.sessions);
                    self.scaler = Some(fitted.clone());
                    fitted
                }
            };
            output.scaled = Some(scaler.transform(&output.sessions));
            output.scaler = Some(scaler);
        }

        info!(
            sessions = output.sessions.len(),
            rows = output.rows.len(),
            standardized = output.scaled.is_some(),
            "built session features"
        );
        output
    }

    /// Parse both tables and build features
    pub fn process_str(
        &mut self,
        clickstream_data: &str,
        purchase_data: &str,
    ) -> Result<FeatureOutput, FeatureError> {
        let (clicks, purchases) = self.read_tables(clickstream_data, purchase_data)?;
        Ok(self.process(&clicks, &purchases))
    }

    /// Save the fitted scaler to JSON
    pub fn save_scaler(&self) -> Result<Option<String>, FeatureError> {
        self.scaler
            .as_ref()
            .map(|s| s.to_json())
            .transpose()
            .map_err(|e| FeatureError::Encoding(e.to_string()))
    }

    /// Load a previously fitted scaler from JSON
    pub fn load_scaler(&mut self, json: &str) -> Result<(), FeatureError> {
        self.scaler = Some(
            StandardScaler::from_json(json).map_err(|e| FeatureError::Parse(e.to_string()))?,
        );
        Ok(())
    }

    pub fn has_scaler(&self) -> bool {
        self.scaler.is_some()
    }

    /// Forget the fitted scaler; the next batch refits
    pub fn clear_scaler(&mut self) {
        self.scaler = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const CLICKS_CSV: &str = "session_id,timestamp,item_id,category\n\
        1,2024-01-01T00:00:00,a,S\n\
        1,2024-01-01T00:05:00,b,2053013\n\
        2,2024-01-01T01:00:00,c,7\n\
        3,2024-01-01T02:00:00,d,0\n\
        3,2024-01-01T02:00:30,d,xyz\n";

    const PURCHASES_CSV: &str = "session_id,timestamp,item_id,price,quantity\n\
        1,2024-01-01T00:06:00,a,10,2\n";

    #[test]
    fn test_end_to_end_example() {
        let mut processor = FeatureProcessor::with_config(PipelineConfig::new().with_standardize(false));
        let output = processor
            .process_str(
                "session_id,timestamp,item_id,category\n\
                 1,2024-01-01T00:00:00,a,S\n\
                 1,2024-01-01T00:05:00,b,S\n",
                "session_id,price,quantity\n1,10,2\n",
            )
            .unwrap();

        let session = output.sessions.get("1").unwrap();
        assert_eq!(session.revenue, 20.0);
        assert_eq!(session.binary_revenue, 1);
        assert_eq!(session.total_clicks, 2);
        assert_eq!(session.count_unique_items, 2);
        assert_eq!(session.seconds_per_session, Some(300.0));
        assert!(output.scaled.is_none());
    }

    #[test]
    fn test_every_session_present() {
        let output = FeatureProcessor::new()
            .process_str(CLICKS_CSV, PURCHASES_CSV)
            .unwrap();

        let ids: Vec<&str> = output
            .sessions
            .records()
            .iter()
            .map(|s| s.session_id.as_str())
            .collect();
        assert_eq!(ids, vec!["1", "2", "3"]);

        let s2 = output.sessions.get("2").unwrap();
        assert_eq!(s2.revenue, 0.0);
        assert_eq!(s2.binary_revenue, 0);
        assert_eq!(s2.seconds_per_session, Some(0.0));
        assert_eq!(output.sessions.get("1").unwrap().total_purchases, 2);
        assert_eq!(output.sessions.get("3").unwrap().count_unique_items, 1);
    }

    #[test]
    fn test_category_map_parallel_to_input() {
        let output = FeatureProcessor::new()
            .process_str(CLICKS_CSV, PURCHASES_CSV)
            .unwrap();
        assert_eq!(
            output.category_map,
            vec![
                Some(CategoryLabel::SpecialOffer),
                Some(CategoryLabel::Brand),
                Some(CategoryLabel::Regular),
                Some(CategoryLabel::Missing),
                None,
            ]
        );
    }

    #[test]
    fn test_standardized_output() {
        let output = FeatureProcessor::new()
            .process_str(CLICKS_CSV, PURCHASES_CSV)
            .unwrap();
        let scaled = output.scaled.unwrap();

        assert_eq!(scaled.len(), 3);
        let mean: f64 = scaled.iter().map(|s| s.total_clicks).sum::<f64>() / 3.0;
        assert!(mean.abs() < 1e-9);
        assert_eq!(scaled[0].revenue, 20.0);
    }

    #[test]
    fn test_scaler_is_reused_across_batches() {
        let mut processor = FeatureProcessor::new();
        let first = processor.process_str(CLICKS_CSV, PURCHASES_CSV).unwrap();
        assert!(processor.has_scaler());

        let second = processor
            .process_str(
                "session_id,timestamp,item_id,category\n9,2024-01-02T00:00:00,z,S\n",
                "session_id,price,quantity\n",
            )
            .unwrap();

        assert_eq!(first.scaler, second.scaler);
        // A single-row batch is not zero after reuse: it is scaled by the first fit
        let clicks_scale = first
            .scaler
            .as_ref()
            .and_then(|s| s.column_scale(crate::feature_table::FeatureColumn::TotalClicks))
            .unwrap();
        let expected = (1.0 - clicks_scale.mean) / clicks_scale.std_dev;
        assert!((second.scaled.unwrap()[0].total_clicks - expected).abs() < 1e-9);
    }

    #[test]
    fn test_scaler_save_and_load() {
        let mut processor = FeatureProcessor::new();
        assert_eq!(processor.save_scaler().unwrap(), None);

        processor.process_str(CLICKS_CSV, PURCHASES_CSV).unwrap();
        let saved = processor.save_scaler().unwrap().unwrap();

        let mut restored = FeatureProcessor::new();
        restored.load_scaler(&saved).unwrap();
        assert!(restored.has_scaler());

        restored.clear_scaler();
        assert!(!restored.has_scaler());
    }

    #[test]
    fn test_missing_key_is_schema_error() {
        let err = FeatureProcessor::new()
            .process_str(CLICKS_CSV, "price,quantity\n1,2\n")
            .unwrap_err();
        assert!(matches!(err, FeatureError::Schema(_)));
    }

    #[test]
    fn test_nan_price_is_type_error() {
        let err = FeatureProcessor::new()
            .process_str(CLICKS_CSV, "session_id,price,quantity\n1,NaN,2\n")
            .unwrap_err();
        assert!(matches!(err, FeatureError::Type { ref column, .. } if column == "price"));
    }

    #[test]
    fn test_non_ascii_delimiter_is_an_error() {
        let mut processor =
            FeatureProcessor::with_config(PipelineConfig::new().with_delimiter('§'));
        let err = processor
            .process_str(
                "session_id§timestamp§item_id§category\n1§2024-01-01T00:00:00§a§S\n",
                "session_id§price§quantity\n1§10§2\n",
            )
            .unwrap_err();
        assert!(matches!(err, FeatureError::Parse(_)));
    }

    #[test]
    fn test_empty_inputs_give_empty_tables() {
        let output = FeatureProcessor::new()
            .process_str(
                "session_id,timestamp,item_id,category\n",
                "session_id,price,quantity\n",
            )
            .unwrap();
        assert!(output.sessions.is_empty());
        assert!(output.rows.is_empty());
        assert_eq!(output.scaled.map(|s| s.len()), Some(0));
    }

    #[test]
    fn test_ndjson_input() {
        let mut processor = FeatureProcessor::with_config(
            PipelineConfig::new().with_input_format(TableFormat::Ndjson),
        );
        let output = processor
            .process_str(
                r#"{"session_id": 5, "timestamp": "2024-01-01T00:00:00Z", "item_id": 1, "category": "S"}"#,
                r#"{"session_id": 5, "price": 2.5, "quantity": 4}"#,
            )
            .unwrap();
        assert_eq!(output.sessions.get("5").unwrap().revenue, 10.0);
    }

    #[test]
    fn test_build_features_one_shot() {
        let processor = FeatureProcessor::new();
        let (clicks, purchases) = processor.read_tables(CLICKS_CSV, PURCHASES_CSV).unwrap();
        let output = build_features(&clicks, &purchases);

        assert_eq!(output.sessions.len(), 3);
        assert!(output.scaled.is_some());
        assert!(output.scaler.is_some());
    }
}
