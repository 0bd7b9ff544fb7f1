//! MALabel CLI: fetch a price history and write the feature/label table.
//!
//! Commands:
//! - `features`: fetch (Yahoo Finance or a CSV file), compute, export
//! - `config`: print the default configuration as TOML

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use malabel_core::config::RunConfig;
use malabel_core::data::{self, CsvProvider, DataProvider, YahooProvider};
use malabel_core::drawdown::PeakMode;
use malabel_core::export::{self, ExportFormat, RunManifest};
use malabel_core::labels::{ForwardEvent, LabelMode, LabelTarget};
use malabel_core::pipeline::{build_features, FeatureOutput};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(
    name = "malabel",
    version,
    about = "Moving-average features and correction/bear labels for one ticker"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the feature table for a ticker and write it to disk.
    Features(FeaturesArgs),
    /// Print the default configuration as TOML.
    Config,
}

#[derive(Args, Debug)]
struct FeaturesArgs {
    /// Ticker symbol (e.g. SPY).
    #[arg(long)]
    ticker: String,

    /// Read bars from this CSV file instead of Yahoo Finance.
    #[arg(long)]
    input: Option<PathBuf>,

    /// TOML configuration file; flags below override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Start date (YYYY-MM-DD). Defaults to end minus --years-back.
    #[arg(long)]
    start: Option<NaiveDate>,

    /// End date (YYYY-MM-DD). Defaults to today.
    #[arg(long)]
    end: Option<NaiveDate>,

    /// Keep raw Yahoo prices instead of split/dividend adjusted ones.
    #[arg(long, default_value_t = false)]
    unadjusted: bool,

    /// Years of history when --start is not given.
    #[arg(long)]
    years_back: Option<u32>,

    /// Slope look-back in trading days.
    #[arg(long)]
    slope_window: Option<usize>,

    /// Drawdown fraction that marks a correction (e.g. 0.10).
    #[arg(long)]
    correction_threshold: Option<f64>,

    /// Drawdown fraction that marks a bear market (e.g. 0.20).
    #[arg(long)]
    bear_threshold: Option<f64>,

    /// Forward label horizon K in trading days; 0 means coincident labels.
    #[arg(long, allow_hyphen_values = true)]
    forward_window: Option<i64>,

    /// binary or multiclass.
    #[arg(long)]
    label_mode: Option<LabelMode>,

    /// Flag tracked by binary labels: correction or bear.
    #[arg(long)]
    label_target: Option<LabelTarget>,

    /// Forward event: state (any flagged bar) or onset (episode start).
    #[arg(long)]
    forward_event: Option<ForwardEvent>,

    /// since_inception or reset_after_correction.
    #[arg(long)]
    peak_mode: Option<PeakMode>,

    /// Output format: csv or parquet.
    #[arg(long, default_value_t = ExportFormat::Csv)]
    format: ExportFormat,

    /// Output path. Defaults to <TICKER>_features.<format>.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Skip the JSON manifest written next to the table.
    #[arg(long, default_value_t = false)]
    no_manifest: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "malabel=info,malabel_core=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Features(args) => run_features(args),
        Commands::Config => {
            print!("{}", RunConfig::default().to_toml()?);
            Ok(())
        }
    }
}

/// Merge the config file (if any) with command-line overrides.
fn resolve_config(args: &FeaturesArgs) -> Result<RunConfig> {
    let mut config = match &args.config {
        Some(path) => RunConfig::from_file(path)?,
        None => RunConfig::default(),
    };

    let history = &mut config.history;
    if let Some(start) = args.start {
        history.start = Some(start);
    }
    if let Some(end) = args.end {
        history.end = Some(end);
    }
    if let Some(years) = args.years_back {
        history.years_back = years;
    }

    let features = &mut config.features;
    if let Some(n) = args.slope_window {
        features.slope_window = n;
    }
    if let Some(t) = args.correction_threshold {
        features.correction_threshold = t;
    }
    if let Some(t) = args.bear_threshold {
        features.bear_threshold = t;
    }
    if let Some(k) = args.forward_window {
        features.set_forward_window(k)?;
    }
    if let Some(mode) = args.label_mode {
        features.label_mode = mode;
    }
    if let Some(target) = args.label_target {
        features.label_target = target;
    }
    if let Some(event) = args.forward_event {
        features.forward_event = event;
    }
    if let Some(mode) = args.peak_mode {
        features.peak_mode = mode;
    }

    features.validate()?;
    Ok(config)
}

fn run_features(args: FeaturesArgs) -> Result<()> {
    let config = resolve_config(&args)?;
    let today = chrono::Local::now().date_naive();
    let (start, end) = config.history.resolve(today)?;
    let symbol = args.ticker.to_uppercase();

    let provider = provider_for(&args)?;
    info!(%symbol, %start, %end, provider = provider.name(), "fetching price history");

    let fetched = provider
        .fetch(&symbol, start, end)
        .with_context(|| format!("failed to fetch {symbol} from {}", provider.name()))?;
    let series = data::prepare(&symbol, &fetched.bars)
        .with_context(|| format!("price history for {symbol} is unusable"))?;

    let output = build_features(&series, &config.features)?;

    let path = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("{symbol}_features.{}", args.format.extension())));
    export::write_table(&output.table, &path, args.format)
        .with_context(|| format!("failed to write {}", path.display()))?;

    if !args.no_manifest {
        let manifest = RunManifest::new(&series, &config.features, &output, Some(fetched.source))?;
        let manifest_path = export::manifest_path(&path);
        manifest
            .write(&manifest_path)
            .with_context(|| format!("failed to write {}", manifest_path.display()))?;
    }

    print_summary(&symbol, &output, &path);
    Ok(())
}

/// CSV file when --input is given, Yahoo Finance otherwise.
fn provider_for(args: &FeaturesArgs) -> Result<Box<dyn DataProvider>> {
    Ok(match &args.input {
        Some(path) => Box::new(CsvProvider::new(path)),
        None => {
            let yahoo = YahooProvider::new()?;
            if args.unadjusted {
                Box::new(yahoo.unadjusted())
            } else {
                Box::new(yahoo)
            }
        }
    })
}

fn print_summary(symbol: &str, output: &FeatureOutput, path: &std::path::Path) {
    let table = &output.table;
    println!("=== {symbol} features ===");
    if let (Some(first), Some(last)) = (table.rows().first(), table.rows().last()) {
        println!("Period:        {} to {}", first.date, last.date);
    }
    println!("Rows:          {}", table.len());
    println!("Complete rows: {}", table.complete_rows().count());
    println!("Max drawdown:  {:.2}%", output.max_drawdown * 100.0);

    let counts = table.label_counts();
    let known: usize = counts.values().sum();
    let distribution: Vec<String> = counts
        .iter()
        .map(|(label, n)| format!("{label}={n}"))
        .collect();
    println!(
        "Labels:        {} (unknown={})",
        distribution.join(" "),
        table.len() - known
    );
    for w in &output.warnings {
        println!("Warning:       {w}");
    }
    println!("Written to:    {}", path.display());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> FeaturesArgs {
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Commands::Features(args) => args,
            Commands::Config => panic!("expected features command"),
        }
    }

    #[test]
    fn flags_override_defaults() {
        let args = parse(&[
            "malabel",
            "features",
            "--ticker",
            "spy",
            "--forward-window",
            "30",
            "--label-mode",
            "multiclass",
            "--peak-mode",
            "reset-after-correction",
            "--correction-threshold",
            "0.15",
            "--bear-threshold",
            "0.3",
        ]);
        let config = resolve_config(&args).unwrap();
        assert_eq!(config.features.forward_window, Some(30));
        assert_eq!(config.features.label_mode, LabelMode::Multiclass);
        assert_eq!(config.features.peak_mode, PeakMode::ResetAfterCorrection);
        assert_eq!(config.features.correction_threshold, 0.15);
        assert_eq!(args.format, ExportFormat::Csv);
    }

    #[test]
    fn negative_forward_window_is_rejected() {
        let args = parse(&[
            "malabel",
            "features",
            "--ticker",
            "SPY",
            "--forward-window",
            "-1",
        ]);
        let err = resolve_config(&args).unwrap_err();
        assert!(err.to_string().contains("-1"));
    }

    #[test]
    fn inverted_thresholds_are_rejected() {
        let args = parse(&[
            "malabel",
            "features",
            "--ticker",
            "SPY",
            "--correction-threshold",
            "0.3",
            "--bear-threshold",
            "0.2",
        ]);
        assert!(resolve_config(&args).is_err());
    }

    #[test]
    fn unknown_label_mode_fails_to_parse() {
        let result = Cli::try_parse_from([
            "malabel",
            "features",
            "--ticker",
            "SPY",
            "--label-mode",
            "ternary",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn provider_follows_input_flag() {
        let args = parse(&["malabel", "features", "--ticker", "SPY", "--input", "bars.csv"]);
        assert_eq!(provider_for(&args).unwrap().name(), "csv_import");

        let args = parse(&["malabel", "features", "--ticker", "SPY", "--unadjusted"]);
        assert!(args.unadjusted);
        assert_eq!(provider_for(&args).unwrap().name(), "yahoo_finance");
    }

    #[test]
    fn config_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.toml");
        std::fs::write(&path, "[features]\nslope_window = 5\nforward_window = 10\n").unwrap();

        let args = parse(&[
            "malabel",
            "features",
            "--ticker",
            "SPY",
            "--config",
            path.to_str().unwrap(),
        ]);
        let config = resolve_config(&args).unwrap();
        assert_eq!(config.features.slope_window, 5);
        assert_eq!(config.features.forward_window, Some(10));
    }
}
