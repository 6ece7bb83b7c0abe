//! Feature standardization
//!
//! Z-score scaling of the behavioral session columns (total clicks, session
//! seconds, unique items) using the population standard deviation. Nulls are
//! ignored while fitting; anything null or undefined after scaling becomes 0.

use crate::feature_table::{FeatureColumn, FeatureTable};
use crate::types::{ScaledFeatures, SessionFeatures};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Columns replaced by their standardized values
pub const SCALED_COLUMNS: [FeatureColumn; 3] = [
    FeatureColumn::TotalClicks,
    FeatureColumn::SecondsPerSession,
    FeatureColumn::CountUniqueItems,
];

/// Fitted location and scale of one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnScale {
    pub column: FeatureColumn,
    /// Number of non-null values seen while fitting
    pub count: usize,
    pub mean: f64,
    /// Population standard deviation (divides by N)
    pub std_dev: f64,
    /// All fitted values were equal
    pub constant: bool,
}

impl ColumnScale {
    fn fit(column: FeatureColumn, values: &[Option<f64>]) -> Self {
        let finite: Vec<f64> = values
            .iter()
            .flatten()
            .copied()
            .filter(|v| v.is_finite())
            .collect();

        if finite.is_empty() {
            return Self {
                column,
                count: 0,
                mean: 0.0,
                std_dev: 0.0,
                constant: true,
            };
        }

        let n = finite.len() as f64;
        let mean = finite.iter().sum::<f64>() / n;
        let variance = finite.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
        let constant = finite.iter().all(|&x| x == finite[0]);

        Self {
            column,
            count: finite.len(),
            mean,
            std_dev: variance.sqrt(),
            constant,
        }
    }

    /// Standardize a single value; null and undefined results become 0
    pub fn scale(&self, value: Option<f64>) -> f64 {
        let Some(value) = value else {
            return 0.0;
        };
        if self.constant || self.std_dev == 0.0 {
            return 0.0;
        }
        let z = (value - self.mean) / self.std_dev;
        if z.is_finite() {
            z
        } else {
            0.0
        }
    }
}

/// Standard scaler for the behavioral session columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    columns: Vec<ColumnScale>,
}

impl StandardScaler {
    /// Fit means and standard deviations on a feature table
    pub fn fit(table: &FeatureTable) -> Self {
        let columns = SCALED_COLUMNS
            .iter()
            .map(|&column| ColumnScale::fit(column, &table.column(column)))
            .collect::<Vec<_>>();

        for scale in &columns {
            debug!(
                column = %scale.column,
                count = scale.count,
                mean = scale.mean,
                std_dev = scale.std_dev,
                "fitted column scale"
            );
        }

        Self { columns }
    }

    /// Fitted parameters for a column, if it is scaled
    pub fn column_scale(&self, column: FeatureColumn) -> Option<&ColumnScale> {
        self.columns.iter().find(|c| c.column == column)
    }

    fn scale(&self, column: FeatureColumn, record: &SessionFeatures) -> f64 {
        match self.column_scale(column) {
            Some(scale) => scale.scale(column.value(record)),
            None => column.value(record).unwrap_or(0.0),
        }
    }

    /// Replace the scaled columns with their standardized values.
    ///
    /// Row order is preserved and the other columns pass through unchanged.
    pub fn transform(&self, table: &FeatureTable) -> Vec<ScaledFeatures> {
        table
            .records()
            .iter()
            .map(|record| ScaledFeatures {
                session_id: record.session_id.clone(),
                revenue: record.revenue,
                binary_revenue: record.binary_revenue,
                total_purchases: record.total_purchases,
                total_clicks: self.scale(FeatureColumn::TotalClicks, record),
                seconds_per_session: self.scale(FeatureColumn::SecondsPerSession, record),
                count_unique_items: self.scale(FeatureColumn::CountUniqueItems, record),
            })
            .collect()
    }

    /// Fit on a table and transform it
    pub fn fit_transform(table: &FeatureTable) -> (Self, Vec<ScaledFeatures>) {
        let scaler = Self::fit(table);
        let scaled = scaler.transform(table);
        (scaler, scaled)
    }

    /// Load a fitted scaler from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize the fitted scaler to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Standardize the behavioral columns of a feature table
pub fn standardize(table: &FeatureTable) -> Vec<ScaledFeatures> {
    StandardScaler::fit_transform(table).1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(session: &str, clicks: u64, seconds: Option<f64>, unique: u64) -> SessionFeatures {
        SessionFeatures {
            session_id: session.to_string(),
            revenue: 0.0,
            binary_revenue: 0,
            total_purchases: 0,
            total_clicks: clicks,
            seconds_per_session: seconds,
            count_unique_items: unique,
        }
    }

    fn sample_table() -> FeatureTable {
        FeatureTable::from_records(vec![
            record("a", 1, Some(0.0), 1),
            record("b", 2, Some(60.0), 1),
            record("c", 3, Some(300.0), 1),
            record("d", 6, Some(120.0), 1),
        ])
    }

    fn mean_and_std(values: &[f64]) -> (f64, f64) {
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        (mean, var.sqrt())
    }

    #[test]
    fn test_zero_mean_unit_population_std() {
        let scaled = standardize(&sample_table());

        let clicks: Vec<f64> = scaled.iter().map(|r| r.total_clicks).collect();
        let (mean, std) = mean_and_std(&clicks);
        assert!(mean.abs() < 1e-9);
        assert!((std - 1.0).abs() < 1e-9);

        let seconds: Vec<f64> = scaled.iter().map(|r| r.seconds_per_session).collect();
        let (mean, std) = mean_and_std(&seconds);
        assert!(mean.abs() < 1e-9);
        assert!((std - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_known_values() {
        // clicks 1,2,3,6: mean 3, population std sqrt(3.5)
        let scaled = standardize(&sample_table());
        let expected = (1.0 - 3.0) / 3.5_f64.sqrt();
        assert!((scaled[0].total_clicks - expected).abs() < 1e-9);
    }

    #[test]
    fn test_constant_column_becomes_zero() {
        let scaled = standardize(&sample_table());
        assert!(scaled.iter().all(|r| r.count_unique_items == 0.0));
    }

    #[test]
    fn test_constant_fractional_column_becomes_zero() {
        let table = FeatureTable::from_records(vec![
            record("a", 1, Some(0.1), 1),
            record("b", 2, Some(0.1), 1),
            record("c", 3, Some(0.1), 1),
        ]);
        let scaled = standardize(&table);
        assert!(scaled.iter().all(|r| r.seconds_per_session == 0.0));
    }

    #[test]
    fn test_null_is_ignored_then_filled() {
        let table = FeatureTable::from_records(vec![
            record("a", 1, Some(10.0), 1),
            record("b", 2, None, 2),
            record("c", 3, Some(30.0), 3),
        ]);
        let (scaler, scaled) = StandardScaler::fit_transform(&table);

        let seconds = scaler.column_scale(FeatureColumn::SecondsPerSession).unwrap();
        assert_eq!(seconds.count, 2);
        assert!((seconds.mean - 20.0).abs() < 1e-9);
        assert_eq!(scaled[1].seconds_per_session, 0.0);
        assert!((scaled[0].seconds_per_session + 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_passthrough_and_order() {
        let mut records = vec![record("z", 1, Some(1.0), 1), record("y", 5, Some(2.0), 2)];
        records[1].revenue = 42.0;
        records[1].binary_revenue = 1;
        records[1].total_purchases = 3;
        let scaled = standardize(&FeatureTable::from_records(records));

        assert_eq!(scaled[0].session_id, "z");
        assert_eq!(scaled[1].session_id, "y");
        assert_eq!(scaled[1].revenue, 42.0);
        assert_eq!(scaled[1].binary_revenue, 1);
        assert_eq!(scaled[1].total_purchases, 3);
    }

    #[test]
    fn test_empty_table() {
        let scaled = standardize(&FeatureTable::default());
        assert!(scaled.is_empty());
    }

    #[test]
    fn test_scaler_roundtrip_applies_to_new_table() {
        let scaler = StandardScaler::fit(&sample_table());
        let restored = StandardScaler::from_json(&scaler.to_json().unwrap()).unwrap();

        let fresh = FeatureTable::from_records(vec![record("new", 3, Some(120.0), 1)]);
        let scaled = restored.transform(&fresh);
        // 3 clicks is the fitted mean
        assert!(scaled[0].total_clicks.abs() < 1e-9);
    }
}
