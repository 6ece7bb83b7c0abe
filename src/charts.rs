//! Exploratory charts
//!
//! Chart helpers build explicit figure values (summary statistics, histogram,
//! box plot, bar chart). Nothing is drawn to shared state: a figure is either
//! rendered to a writer as text or serialized for an external charting tool.

use crate::error::FeatureError;
use crate::feature_table::{FeatureColumn, FeatureTable};
use crate::types::{CategoryLabel, FeatureRow};
use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use tracing::info;

/// Default number of histogram bins
pub const DEFAULT_HISTOGRAM_BINS: usize = 10;

/// Width in characters of the longest rendered bar
const BAR_WIDTH: usize = 40;

/// Whisker reach in multiples of the interquartile range
const WHISKER_IQR: f64 = 1.5;

/// Describe-style summary of a numeric column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryStats {
    /// Non-null values
    pub count: usize,
    pub mean: Option<f64>,
    /// Sample standard deviation (divides by N - 1)
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub q25: Option<f64>,
    pub median: Option<f64>,
    pub q75: Option<f64>,
    pub max: Option<f64>,
}

impl SummaryStats {
    pub fn from_values(values: &[Option<f64>]) -> Self {
        let sorted = sorted_finite(values);
        let count = sorted.len();

        let mean = (count > 0).then(|| sorted.iter().sum::<f64>() / count as f64);
        let std = mean.filter(|_| count > 1).map(|m| {
            let ss: f64 = sorted.iter().map(|x| (x - m).powi(2)).sum();
            (ss / (count - 1) as f64).sqrt()
        });

        Self {
            count,
            mean,
            std,
            min: sorted.first().copied(),
            q25: quantile(&sorted, 0.25),
            median: quantile(&sorted, 0.5),
            q75: quantile(&sorted, 0.75),
            max: sorted.last().copied(),
        }
    }

    pub fn render<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "count  {}", self.count)?;
        for (label, value) in [
            ("mean", self.mean),
            ("std", self.std),
            ("min", self.min),
            ("25%", self.q25),
            ("50%", self.median),
            ("75%", self.q75),
            ("max", self.max),
        ] {
            match value {
                Some(v) => writeln!(out, "{:<6} {:.6}", label, v)?,
                None => writeln!(out, "{:<6} NaN", label)?,
            }
        }
        Ok(())
    }
}

/// One histogram bin, `[lower, upper)` except the last which is closed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub bins: Vec<HistogramBin>,
}

impl Histogram {
    /// Equal-width bins spanning the data range.
    ///
    /// A single-valued column spans `value ± 0.5`.
    pub fn from_values(values: &[Option<f64>], bins: usize, column: &str) -> Self {
        let sorted = sorted_finite(values);
        let bins = bins.max(1);

        let edges = match (sorted.first(), sorted.last()) {
            (Some(&lo), Some(&hi)) => {
                let (lo, hi) = if lo == hi { (lo - 0.5, hi + 0.5) } else { (lo, hi) };
                let width = (hi - lo) / bins as f64;
                (0..bins)
                    .map(|i| {
                        let lower = lo + width * i as f64;
                        let upper = if i + 1 == bins { hi } else { lo + width * (i + 1) as f64 };
                        (lower, upper)
                    })
                    .collect::<Vec<_>>()
            }
            _ => Vec::new(),
        };

        let mut counts = vec![0usize; edges.len()];
        for &v in &sorted {
            let pos = edges
                .iter()
                .position(|&(lower, upper)| v >= lower && v < upper)
                .unwrap_or(edges.len().saturating_sub(1));
            if let Some(count) = counts.get_mut(pos) {
                *count += 1;
            }
        }

        Self {
            title: format!("Distribution of {}", column),
            x_label: column.to_string(),
            y_label: "Count".to_string(),
            bins: edges
                .into_iter()
                .zip(counts)
                .map(|((lower, upper), count)| HistogramBin { lower, upper, count })
                .collect(),
        }
    }

    pub fn total(&self) -> usize {
        self.bins.iter().map(|b| b.count).sum()
    }

    pub fn render<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "{}", self.title)?;
        writeln!(out, "{} / {}", self.x_label, self.y_label)?;
        let max = self.bins.iter().map(|b| b.count).max().unwrap_or(0);
        for bin in &self.bins {
            writeln!(
                out,
                "[{:>12.3}, {:>12.3}) {:<width$} {}",
                bin.lower,
                bin.upper,
                bar(bin.count as f64, max as f64),
                bin.count,
                width = BAR_WIDTH
            )?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxPlot {
    pub title: String,
    pub y_label: String,
    pub q1: Option<f64>,
    pub median: Option<f64>,
    pub q3: Option<f64>,
    /// Lowest value within 1.5 × IQR below Q1
    pub lower_whisker: Option<f64>,
    /// Highest value within 1.5 × IQR above Q3
    pub upper_whisker: Option<f64>,
    pub outliers: Vec<f64>,
}

impl BoxPlot {
    pub fn from_values(values: &[Option<f64>], column: &str) -> Self {
        let sorted = sorted_finite(values);
        let q1 = quantile(&sorted, 0.25);
        let median = quantile(&sorted, 0.5);
        let q3 = quantile(&sorted, 0.75);

        let (lower_whisker, upper_whisker, outliers) = match (q1, q3) {
            (Some(q1), Some(q3)) => {
                let reach = WHISKER_IQR * (q3 - q1);
                let (lo_fence, hi_fence) = (q1 - reach, q3 + reach);
                let inside = sorted.iter().copied().filter(|&v| v >= lo_fence && v <= hi_fence);
                let lower = inside.clone().next();
                let upper = inside.last();
                let outliers = sorted
                    .iter()
                    .copied()
                    .filter(|&v| v < lo_fence || v > hi_fence)
                    .collect();
                (lower, upper, outliers)
            }
            _ => (None, None, Vec::new()),
        };

        Self {
            title: format!("Distribution of {}", column),
            y_label: "Count".to_string(),
            q1,
            median,
            q3,
            lower_whisker,
            upper_whisker,
            outliers,
        }
    }

    pub fn render<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "{}", self.title)?;
        let fmt = |v: Option<f64>| v.map_or_else(|| "NaN".to_string(), |v| format!("{:.3}", v));
        writeln!(
            out,
            "{} |-- [{} | {} | {}] --| {}",
            fmt(self.lower_whisker),
            fmt(self.q1),
            fmt(self.median),
            fmt(self.q3),
            fmt(self.upper_whisker)
        )?;
        if !self.outliers.is_empty() {
            writeln!(out, "outliers: {}", self.outliers.len())?;
        }
        Ok(())
    }
}

/// Summary statistics plus histogram and box plot of one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatFigure {
    pub column: String,
    pub summary: SummaryStats,
    pub histogram: Histogram,
    pub box_plot: BoxPlot,
}

impl StatFigure {
    pub fn render<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "{}", self.column)?;
        self.summary.render(out)?;
        writeln!(out)?;
        self.histogram.render(out)?;
        writeln!(out)?;
        self.box_plot.render(out)
    }
}

/// Describe a feature column and build its histogram and box plot
pub fn stat_plots(table: &FeatureTable, column_name: &str) -> Result<StatFigure, FeatureError> {
    stat_plots_with_bins(table, column_name, DEFAULT_HISTOGRAM_BINS)
}

pub fn stat_plots_with_bins(
    table: &FeatureTable,
    column_name: &str,
    bins: usize,
) -> Result<StatFigure, FeatureError> {
    let column: FeatureColumn = column_name.parse()?;
    let values = table.column(column);

    let summary = SummaryStats::from_values(&values);
    info!(
        column = column_name,
        count = summary.count,
        mean = ?summary.mean,
        std = ?summary.std,
        min = ?summary.min,
        max = ?summary.max,
        "column summary"
    );

    Ok(StatFigure {
        column: column_name.to_string(),
        summary,
        histogram: Histogram::from_values(&values, bins, column_name),
        box_plot: BoxPlot::from_values(&values, column_name),
    })
}

/// Labelled numeric table feeding a bar chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarTable {
    pub columns: Vec<String>,
    /// (row label, one value per column)
    pub rows: Vec<(String, Vec<f64>)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub label: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarChart {
    pub title: String,
    pub bars: Vec<Bar>,
}

impl BarChart {
    pub fn render<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "{}", self.title)?;
        let max = self.bars.iter().map(|b| b.value).fold(0.0, f64::max);
        let label_width = self.bars.iter().map(|b| b.label.len()).max().unwrap_or(0);
        for b in &self.bars {
            writeln!(
                out,
                "{:<lw$} {:<width$} {}",
                b.label,
                bar(b.value, max),
                b.value,
                lw = label_width,
                width = BAR_WIDTH
            )?;
        }
        Ok(())
    }
}

/// Bar chart of the second row (index 1) of a table, one bar per column
pub fn stacked_bar_chart(table: &BarTable, legend: &str) -> Result<BarChart, FeatureError> {
    let (_, values) = table.rows.get(1).ok_or(FeatureError::MissingRow(1))?;
    if values.len() != table.columns.len() {
        return Err(FeatureError::Schema(format!(
            "row 1 has {} values for {} columns",
            values.len(),
            table.columns.len()
        )));
    }

    Ok(BarChart {
        title: legend.to_string(),
        bars: table
            .columns
            .iter()
            .zip(values)
            .map(|(label, &value)| Bar {
                label: label.clone(),
                value,
            })
            .collect(),
    })
}

/// Cross-tabulate category labels against binary revenue.
///
/// Row 0 counts non-purchasing rows, row 1 purchasing rows; columns are the
/// four category labels followed by "unclassified".
pub fn category_purchase_table(rows: &[FeatureRow]) -> BarTable {
    const LABELS: [CategoryLabel; 4] = [
        CategoryLabel::SpecialOffer,
        CategoryLabel::Regular,
        CategoryLabel::Brand,
        CategoryLabel::Missing,
    ];

    let mut counts = [[0.0f64; 5]; 2];
    for row in rows {
        let col = match CategoryLabel::classify(row.click.category.as_deref()) {
            Some(label) => LABELS.iter().position(|l| *l == label).unwrap_or(4),
            None => 4,
        };
        counts[usize::from(row.binary_revenue.min(1))][col] += 1.0;
    }

    let mut columns: Vec<String> = LABELS.iter().map(|l| l.to_string()).collect();
    columns.push("unclassified".to_string());

    BarTable {
        columns,
        rows: vec![
            ("0".to_string(), counts[0].to_vec()),
            ("1".to_string(), counts[1].to_vec()),
        ],
    }
}

fn sorted_finite(values: &[Option<f64>]) -> Vec<f64> {
    let mut sorted: Vec<f64> = values
        .iter()
        .flatten()
        .copied()
        .filter(|v| v.is_finite())
        .collect();
    sorted.sort_by(f64::total_cmp);
    sorted
}

/// Linearly interpolated quantile of sorted data
fn quantile(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pos = p * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * frac)
}

fn bar(value: f64, max: f64) -> String {
    if max <= 0.0 || !value.is_finite() {
        return String::new();
    }
    let len = ((value / max) * BAR_WIDTH as f64).round().max(0.0) as usize;
    "#".repeat(len.min(BAR_WIDTH))
}
