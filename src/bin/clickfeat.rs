//! clickfeat - Command-line interface for clickstream features
//!
//! Commands:
//! - build: Build session features from clickstream and purchase files
//! - categories: Map every clickstream row's category code to its label
//! - describe: Summary statistics, histogram and box plot of one feature
//! - bars: Purchasing rows per category label as a bar chart
//! - schema: Print input/output column documentation

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use clickstream_features::charts::{category_purchase_table, stacked_bar_chart, stat_plots_with_bins};
use clickstream_features::config::{PipelineConfig, TableFormat};
use clickstream_features::encoder::{to_ndjson, FeatureEncoder, OutputFormat};
use clickstream_features::{FeatureError, FeatureProcessor, FEATURES_VERSION};

/// clickfeat - per-session behavioral features from clickstream logs
#[derive(Parser)]
#[command(name = "clickfeat")]
#[command(version = FEATURES_VERSION)]
#[command(about = "Build session features from clickstream and purchase logs", long_about = None)]
struct Cli {
    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build session features
    Build {
        /// Clickstream file (use - for stdin)
        #[arg(short, long)]
        clicks: PathBuf,

        /// Purchase file
        #[arg(short, long)]
        purchases: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormatArg,

        #[command(flatten)]
        input: InputArgs,

        /// Skip standardization
        #[arg(long)]
        no_standardize: bool,

        /// Reuse a fitted scaler from file
        #[arg(long)]
        load_scaler: Option<PathBuf>,

        /// Save the fitted scaler to file after processing
        #[arg(long)]
        save_scaler: Option<PathBuf>,
    },

    /// Map category codes to labels
    Categories {
        /// Clickstream file (use - for stdin)
        #[arg(short, long)]
        clicks: PathBuf,

        #[command(flatten)]
        input: InputArgs,
    },

    /// Describe one session feature
    Describe {
        #[arg(short, long)]
        clicks: PathBuf,

        #[arg(short, long)]
        purchases: PathBuf,

        /// Feature column (e.g. total_clicks, seconds_per_session)
        #[arg(long)]
        column: String,

        /// Output the figure as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        input: InputArgs,
    },

    /// Purchasing rows per category label
    Bars {
        #[arg(short, long)]
        clicks: PathBuf,

        #[arg(short, long)]
        purchases: PathBuf,

        /// Chart title
        #[arg(long, default_value = "Purchasing rows by category")]
        legend: String,

        /// Output the chart as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        input: InputArgs,
    },

    /// Print schema information
    Schema {
        #[arg(value_enum)]
        schema_type: SchemaType,
    },
}

#[derive(Args)]
struct InputArgs {
    /// Input format
    #[arg(long)]
    input_format: Option<InputFormat>,

    /// CSV files have no header row
    #[arg(long)]
    no_headers: bool,

    /// CSV delimiter
    #[arg(long)]
    delimiter: Option<char>,

    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum InputFormat {
    /// Comma-separated values
    Csv,
    /// Newline-delimited JSON (one row per line)
    Ndjson,
    /// JSON array of rows
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormatArg {
    /// Newline-delimited JSON (one session per line)
    Ndjson,
    /// JSON report
    Json,
    /// Pretty-printed JSON report
    JsonPretty,
    /// CSV, one session per row
    Csv,
}

#[derive(Clone, ValueEnum)]
enum SchemaType {
    /// Input tables
    Input,
    /// Output feature table
    Output,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr; stdout carries data
fn init_tracing(json: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_target(true).with_writer(io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false).with_writer(io::stderr))
            .init();
    }
}

fn run(cli: Cli) -> Result<(), ClickfeatError> {
    match cli.command {
        Commands::Build {
            clicks,
            purchases,
            output,
            output_format,
            input,
            no_standardize,
            load_scaler,
            save_scaler,
        } => cmd_build(
            &clicks,
            &purchases,
            &output,
            output_format,
            &input,
            no_standardize,
            load_scaler.as_deref(),
            save_scaler.as_deref(),
        ),

        Commands::Categories { clicks, input } => cmd_categories(&clicks, &input),

        Commands::Describe {
            clicks,
            purchases,
            column,
            json,
            input,
        } => cmd_describe(&clicks, &purchases, &column, json, &input),

        Commands::Bars {
            clicks,
            purchases,
            legend,
            json,
            input,
        } => cmd_bars(&clicks, &purchases, &legend, json, &input),

        Commands::Schema { schema_type } => {
            cmd_schema(schema_type);
            Ok(())
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_build(
    clicks: &Path,
    purchases: &Path,
    output: &Path,
    output_format: OutputFormatArg,
    input: &InputArgs,
    no_standardize: bool,
    load_scaler: Option<&Path>,
    save_scaler: Option<&Path>,
) -> Result<(), ClickfeatError> {
    let mut config = load_config(input)?;
    if no_standardize {
        config = config.with_standardize(false);
    }
    let mut processor = FeatureProcessor::with_config(config);

    if let Some(path) = load_scaler {
        processor.load_scaler(&fs::read_to_string(path)?)?;
        info!(path = %path.display(), "loaded scaler");
    }

    let clicks_data = read_input(clicks)?;
    let purchase_data = read_input(purchases)?;
    let features = processor.process_str(&clicks_data, &purchase_data)?;

    if features.sessions.is_empty() {
        return Err(FeatureError::EmptyInput("no sessions in clickstream input".to_string()).into());
    }

    if let Some(path) = save_scaler {
        match processor.save_scaler()? {
            Some(json) => fs::write(path, json)?,
            None => warn!("standardization disabled; no scaler to save"),
        }
    }

    let format = match output_format {
        OutputFormatArg::Ndjson => OutputFormat::Ndjson,
        OutputFormatArg::Json => OutputFormat::Json,
        OutputFormatArg::JsonPretty => OutputFormat::JsonPretty,
        OutputFormatArg::Csv => OutputFormat::Csv,
    };
    let data = FeatureEncoder::new().encode_as(&features, format)?;
    write_output(output, &data)
}

fn cmd_categories(clicks: &Path, input: &InputArgs) -> Result<(), ClickfeatError> {
    let processor = FeatureProcessor::with_config(load_config(input)?);
    let clickstream = processor.read_clickstream(&read_input(clicks)?)?;
    let labels = clickstream_features::category_map(&clickstream);

    #[derive(serde::Serialize)]
    struct CategoryRow<'a> {
        session_id: &'a str,
        category: Option<&'a str>,
        category_map: Option<&'static str>,
    }

    let rows: Vec<CategoryRow<'_>> = clickstream
        .records
        .iter()
        .zip(&labels)
        .map(|(record, label)| CategoryRow {
            session_id: &record.session_id,
            category: record.category.as_deref(),
            category_map: label.map(|l| l.as_str()),
        })
        .collect();

    write_output(Path::new("-"), &to_ndjson(&rows)?)
}

fn cmd_describe(
    clicks: &Path,
    purchases: &Path,
    column: &str,
    json: bool,
    input: &InputArgs,
) -> Result<(), ClickfeatError> {
    let config = load_config(input)?.with_standardize(false);
    let bins = config.histogram_bins;
    let mut processor = FeatureProcessor::with_config(config);
    let features = processor.process_str(&read_input(clicks)?, &read_input(purchases)?)?;

    let figure = stat_plots_with_bins(&features.sessions, column, bins)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&figure)?);
    } else {
        let mut stdout = io::stdout();
        figure.render(&mut stdout)?;
        stdout.flush()?;
    }
    Ok(())
}

fn cmd_bars(
    clicks: &Path,
    purchases: &Path,
    legend: &str,
    json: bool,
    input: &InputArgs,
) -> Result<(), ClickfeatError> {
    let config = load_config(input)?.with_standardize(false);
    let mut processor = FeatureProcessor::with_config(config);
    let features = processor.process_str(&read_input(clicks)?, &read_input(purchases)?)?;

    let chart = stacked_bar_chart(&category_purchase_table(&features.rows), legend)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&chart)?);
    } else {
        let mut stdout = io::stdout();
        chart.render(&mut stdout)?;
        stdout.flush()?;
    }
    Ok(())
}

fn cmd_schema(schema_type: SchemaType) {
    match schema_type {
        SchemaType::Input => {
            println!("Input tables");
            println!();
            println!("clickstream (csv / ndjson / json):");
            println!("  - session_id: session key (required)");
            println!("  - timestamp: RFC 3339 or YYYY-MM-DD[T ]HH:MM:SS[.fff]");
            println!("  - item_id: clicked item");
            println!("  - category: S | 1..12 | brand code | 0");
            println!();
            println!("purchases:");
            println!("  - session_id: session key (required)");
            println!("  - price: numeric (required)");
            println!("  - quantity: integer (required)");
            println!("  - timestamp, item_id: optional");
            println!();
            println!("Headerless CSV column order:");
            println!("  clickstream: session_id,timestamp,item_id,category");
            println!("  purchases:   session_id,timestamp,item_id,price,quantity");
        }
        SchemaType::Output => {
            println!("Session feature table");
            println!();
            println!("- session_id");
            println!("- revenue: sum of price x quantity (0 without purchases)");
            println!("- binary_revenue: 1 if revenue > 0 else 0");
            println!("- total_purchases: purchasing clickstream rows in the session");
            println!("- total_clicks: clicks with a timestamp (standardized by default)");
            println!("- seconds_per_session: last minus first timestamp (standardized by default)");
            println!("- count_unique_items: distinct items (standardized by default)");
        }
    }
}

// Helper functions

fn load_config(input: &InputArgs) -> Result<PipelineConfig, ClickfeatError> {
    let mut config = match &input.config {
        Some(path) => PipelineConfig::from_json(&fs::read_to_string(path)?)?,
        None => PipelineConfig::default(),
    };

    if let Some(format) = input.input_format {
        config = config.with_input_format(match format {
            InputFormat::Csv => TableFormat::Csv,
            InputFormat::Ndjson => TableFormat::Ndjson,
            InputFormat::Json => TableFormat::Json,
        });
    }
    if input.no_headers {
        config = config.with_headers(false);
    }
    if let Some(delimiter) = input.delimiter {
        config = config.with_delimiter(delimiter);
    }
    Ok(config)
}

fn read_input(path: &Path) -> Result<String, ClickfeatError> {
    if path.to_string_lossy() == "-" {
        if atty::is(atty::Stream::Stdin) {
            warn!("reading table from an interactive terminal; end input with Ctrl-D");
        }
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(path)?)
    }
}

fn write_output(path: &Path, data: &str) -> Result<(), ClickfeatError> {
    if path.to_string_lossy() == "-" {
        let mut stdout = io::stdout();
        stdout.write_all(data.as_bytes())?;
        stdout.flush()?;
    } else {
        fs::write(path, data)?;
    }
    Ok(())
}

// Error types

#[derive(Debug)]
enum ClickfeatError {
    Io(io::Error),
    Feature(FeatureError),
    Json(serde_json::Error),
}

impl From<io::Error> for ClickfeatError {
    fn from(e: io::Error) -> Self {
        ClickfeatError::Io(e)
    }
}

impl From<FeatureError> for ClickfeatError {
    fn from(e: FeatureError) -> Self {
        ClickfeatError::Feature(e)
    }
}

impl From<serde_json::Error> for ClickfeatError {
    fn from(e: serde_json::Error) -> Self {
        ClickfeatError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<ClickfeatError> for CliError {
    fn from(e: ClickfeatError) -> Self {
        match e {
            ClickfeatError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            ClickfeatError::Feature(e) => {
                let (code, hint) = match &e {
                    FeatureError::Schema(_) => ("SCHEMA_ERROR", "Run 'clickfeat schema input' for required columns"),
                    FeatureError::Type { .. } => ("TYPE_ERROR", "Check numeric and timestamp values"),
                    FeatureError::EmptyInput(_) => ("EMPTY_INPUT", "Ensure input files are not empty"),
                    FeatureError::MissingRow(_) => ("MISSING_ROW", "The chart table needs at least two rows"),
                    _ => ("PARSE_ERROR", "Check input format and --input-format"),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            ClickfeatError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
        }
    }
}
