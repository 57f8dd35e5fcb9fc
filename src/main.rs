//! Plantwatch - historian analytics command line
//!
//! Every command prints one JSON document on stdout; logs go to stderr.
//!
//! # Usage
//!
//! ```bash
//! # SPC on a vat weight tag over the last completed shift
//! plantwatch spc --tag "Enterprise B/Site1/liquidprocessing/mixroom01/vat01/processdata/process/weight"
//!
//! # OEE for a filling line over an explicit window
//! plantwatch oee --line "Enterprise B/Site1/fillerproduction/fillingline01" \
//!     --start 2024-03-01T06:00:00Z --end 2024-03-01T18:00:00Z
//!
//! # Every line and vat of a site, last 12 hours
//! plantwatch site --site "Enterprise B/Site1" --start -12h
//!
//! # Where does the data live?
//! plantwatch discover --site "Enterprise B/Site1"
//!
//! # What are the machines doing right now? (current shift by default)
//! plantwatch states --site "Enterprise B/Site1"
//!
//! # Offline, against a replay file
//! plantwatch --replay capture.json spc --tag ... --start ... --end ...
//! ```
//!
//! # Environment Variables
//!
//! - `PLANTWATCH_CONFIG`: Path to the TOML config (default: ./plantwatch.toml)
//! - `PLANTWATCH_HISTORIAN`: Historian base URL override
//! - `RUST_LOG`: Logging level (default: info)
//!
//! Pass `--log-json` for machine-readable logs.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use plantwatch::acquisition::{HistorianFetch, MemoryHistorian, TimebaseClient, WindowSpec};
use plantwatch::config::PlantConfig;
use plantwatch::types::{AnalysisEntry, AnalysisWindow};
use plantwatch::{Analyzer, LimitOverrides};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "plantwatch")]
#[command(about = "Historian analytics: OEE, batch phases and phase-aware SPC")]
#[command(version)]
struct CliArgs {
    /// Config file (overrides PLANTWATCH_CONFIG and ./plantwatch.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Historian base URL (overrides [historian].base_url)
    #[arg(long, env = "PLANTWATCH_HISTORIAN", global = true)]
    historian: Option<String>,

    /// Historian dataset (overrides [historian].dataset)
    #[arg(long, global = true)]
    dataset: Option<String>,

    /// Read samples from a JSON replay file instead of the historian
    #[arg(long, value_name = "FILE", global = true)]
    replay: Option<PathBuf>,

    /// Pretty-print the JSON output
    #[arg(long, global = true)]
    pretty: bool,

    /// Emit logs as JSON lines (stderr)
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

/// Analysis window. `--start` wins over `--shift`; without either the last
/// completed shift is used.
#[derive(Args, Debug)]
struct WindowArgs {
    /// RFC 3339 time, `now`, or an offset like -30m / -1h / -2d
    #[arg(long, allow_hyphen_values = true)]
    start: Option<String>,

    /// RFC 3339 time, `now`, or an offset (default: now)
    #[arg(long, allow_hyphen_values = true)]
    end: Option<String>,

    /// Named shift: last, current, day, night
    #[arg(long)]
    shift: Option<String>,
}

impl WindowArgs {
    fn resolve(&self, config: &PlantConfig) -> Result<AnalysisWindow> {
        self.resolve_or_shift(config, None)
    }

    /// Like `resolve`, with `default_shift` used when neither --start nor --shift is given.
    fn resolve_or_shift(&self, config: &PlantConfig, default_shift: Option<&str>) -> Result<AnalysisWindow> {
        let shift = match (&self.start, &self.shift) {
            (None, None) => default_shift,
            _ => self.shift.as_deref(),
        };
        let spec = WindowSpec::from_args(self.start.as_deref(), self.end.as_deref(), shift)?;
        Ok(spec.resolve(Utc::now(), &config.shifts)?)
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// SPC with Western Electric rules on one tag
    Spc {
        /// Full tag path
        #[arg(long)]
        tag: String,

        #[command(flatten)]
        window: WindowArgs,

        /// Upper control limit (used only together with --lcl)
        #[arg(long, allow_hyphen_values = true)]
        ucl: Option<f64>,

        /// Lower control limit (used only together with --ucl)
        #[arg(long, allow_hyphen_values = true)]
        lcl: Option<f64>,

        /// Center line (default: mean)
        #[arg(long, allow_hyphen_values = true)]
        target: Option<f64>,
    },

    /// OEE and production summary for a filling line
    Oee {
        /// Line path, e.g. "Enterprise B/Site1/fillerproduction/fillingline01"
        #[arg(long)]
        line: String,

        #[command(flatten)]
        window: WindowArgs,
    },

    /// Every configured line and vessel of a site
    Site {
        /// Site path, e.g. "Enterprise B/Site1"
        #[arg(long)]
        site: String,

        #[command(flatten)]
        window: WindowArgs,
    },

    /// Latest equipment states and published OEE metrics
    States {
        /// One line path
        #[arg(long, conflicts_with = "site", required_unless_present = "site")]
        line: Option<String>,

        /// Every line and vat of a site
        #[arg(long)]
        site: Option<String>,

        /// Window to search for the latest readings (default: current shift)
        #[command(flatten)]
        window: WindowArgs,
    },

    /// Find the time range that holds data for a site
    Discover {
        #[arg(long)]
        site: String,
    },

    /// Validate the configuration and print the effective TOML
    Config,
}

// ============================================================================
// Helpers
// ============================================================================

fn load_config(args: &CliArgs) -> Result<PlantConfig> {
    let mut config = match &args.config {
        Some(path) => PlantConfig::load_from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PlantConfig::load(),
    };
    if let Some(url) = &args.historian {
        config.historian.base_url = url.clone();
    }
    if let Some(dataset) = &args.dataset {
        config.historian.dataset = dataset.clone();
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn build_fetcher(args: &CliArgs, config: &PlantConfig) -> Result<Arc<dyn HistorianFetch>> {
    if let Some(path) = &args.replay {
        info!(path = %path.display(), "Using replay file");
        let replay = MemoryHistorian::from_json_file(path)
            .with_context(|| format!("loading replay file {}", path.display()))?;
        return Ok(Arc::new(replay));
    }

    info!(
        url = %config.historian.base_url,
        dataset = %config.historian.dataset,
        "Using Timebase historian"
    );
    let client = TimebaseClient::new(
        config.historian.clone(),
        config.quality.default_quality_code,
    )
    .context("building historian client")?;
    Ok(Arc::new(client))
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let out = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{out}");
    Ok(())
}

/// Print a single-target entry; failure sets a non-zero exit code.
fn finish_entry(entry: &AnalysisEntry, pretty: bool) -> Result<ExitCode> {
    print_json(entry, pretty)?;
    Ok(if entry.is_error() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

/// Logs go to stderr so stdout carries only the JSON result.
fn init_logging(json: bool) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = CliArgs::parse();
    init_logging(args.log_json);

    let config = load_config(&args)?;

    if matches!(args.command, Command::Config) {
        println!("{}", config.to_toml()?);
        return Ok(ExitCode::SUCCESS);
    }

    let fetcher = build_fetcher(&args, &config)?;
    let analyzer = Analyzer::new(fetcher, config);
    let config = analyzer.config();

    match &args.command {
        Command::Spc {
            tag,
            window,
            ucl,
            lcl,
            target,
        } => {
            let window = window.resolve(config)?;
            info!(tag = %tag, start = %window.start, end = %window.end, "Running SPC analysis");
            let overrides = LimitOverrides {
                ucl: *ucl,
                lcl: *lcl,
                target: *target,
            };
            let result = analyzer.analyze_tag(tag, &window, &overrides).await;
            finish_entry(&AnalysisEntry::from_result(tag, result), args.pretty)
        }
        Command::Oee { line, window } => {
            let window = window.resolve(config)?;
            info!(line = %line, start = %window.start, end = %window.end, "Running OEE analysis");
            let result = analyzer.analyze_line(line, &window).await;
            finish_entry(&AnalysisEntry::from_result(line, result), args.pretty)
        }
        Command::Site { site, window } => {
            let window = window.resolve(config)?;
            let report = analyzer.analyze_site(site, &window).await?;
            print_json(&report, args.pretty)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::States { line, site, window } => {
            let window = window.resolve_or_shift(config, Some("current"))?;
            match (line, site) {
                (Some(line), _) => {
                    let states = analyzer.equipment_states(line, &window).await?;
                    print_json(&states, args.pretty)?;
                }
                (None, Some(site)) => {
                    let states = analyzer.site_states(site, &window).await?;
                    print_json(&states, args.pretty)?;
                }
                (None, None) => anyhow::bail!("one of --line or --site is required"),
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Discover { site } => {
            let range = analyzer.discover(site, Utc::now()).await?;
            print_json(&range, args.pretty)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Config => Ok(ExitCode::SUCCESS),
    }
}
