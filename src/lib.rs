//! Clickstream Features - per-session behavioral features from event logs
//!
//! Turns a clickstream table and a purchase table (both keyed by session id)
//! into model-ready session features through a deterministic pipeline:
//! schema adaptation → revenue join → category mapping → session aggregates
//! → accumulation → standardization.
//!
//! ## Modules
//!
//! - **Schema**: read CSV / NDJSON / JSON tables and check required columns
//! - **Aggregations**: revenue, purchase counts, clicks, duration, unique items
//! - **Normalizer**: z-score standardization with a persistable scaler
//! - **Charts**: summary statistics, histogram, box plot and bar chart figures

pub mod category;
pub mod charts;
pub mod config;
pub mod encoder;
pub mod error;
pub mod feature_table;
pub mod features;
pub mod normalizer;
pub mod pipeline;
pub mod revenue;
pub mod schema;
pub mod types;

pub use category::category_map;
pub use charts::{stacked_bar_chart, stat_plots};
pub use config::PipelineConfig;
pub use error::FeatureError;
pub use feature_table::{FeatureColumn, FeatureTable};
pub use features::{count_unique_items, total_clicks, total_seconds};
pub use normalizer::{standardize, StandardScaler};
pub use pipeline::{build_features, FeatureOutput, FeatureProcessor};
pub use revenue::{add_revenue, total_number_purchases};
pub use types::{
    CategoryLabel, ClickRecord, Clickstream, FeatureRow, PurchaseRecord, Purchases,
    ScaledFeatures, SessionColumn, SessionFeatures,
};

/// Crate version embedded in every feature report
pub const FEATURES_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for feature reports
pub const PRODUCER_NAME: &str = "clickstream-features";
