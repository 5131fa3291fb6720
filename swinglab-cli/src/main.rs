//! SwingLab CLI — report generation and artifact inspection.
//!
//! Commands:
//! - `join-stats` — how many outcomes trace back to a snapshot item
//! - `outcome-analysis` — outcome KPIs by asset, playbook, decision, grade, alignment
//! - `performance-breakdown` — flagged KPI buckets plus winrate/open-heavy insights
//! - `show <report>` — print the headline of the latest published artifact

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use swinglab_runner::{
    generate, ArtifactManager, HttpStore, JoinStatsReport, JsonExportStore, OutcomeAnalysisReport,
    PerformanceBreakdownReport, RecordStore, Report, ReportFilter, RunContext, StoreConfig,
    StoreKind, SwingLabConfig,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_FILE: &str = "swinglab.toml";

#[derive(Parser)]
#[command(
    name = "swinglab",
    about = "SwingLab CLI — outcome aggregation and decision-classification reports"
)]
struct Cli {
    /// Path to a TOML config file. Defaults to ./swinglab.toml when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Artifact directory. Overrides output.dir from the config.
    #[arg(long, global = true)]
    out_dir: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG is set.
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Join matching between outcomes and snapshot items.
    JoinStats {
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Outcome KPIs grouped by resolved dimensions.
    OutcomeAnalysis {
        #[command(flatten)]
        filter: FilterArgs,

        /// Derive a missing playbook from the asset id.
        #[arg(
            long = "allowDerivedPlaybookFallback",
            default_value_t = false,
            action = ArgAction::Set,
            num_args = 0..=1,
            default_missing_value = "true"
        )]
        allow_derived_playbook_fallback: bool,
    },
    /// Flagged KPI buckets and insights.
    PerformanceBreakdown {
        #[command(flatten)]
        filter: FilterArgs,

        /// Closed outcomes a bucket needs before it loses the low-sample flag.
        #[arg(long = "minClosed")]
        min_closed: Option<u64>,

        /// Suppress the low-sample flag.
        #[arg(
            long = "includeOpenOnly",
            default_value_t = false,
            action = ArgAction::Set,
            num_args = 0..=1,
            default_missing_value = "true"
        )]
        include_open_only: bool,

        /// Derive a missing playbook from the asset id.
        #[arg(
            long = "allowDerivedPlaybookFallback",
            default_value_t = false,
            action = ArgAction::Set,
            num_args = 0..=1,
            default_missing_value = "true"
        )]
        allow_derived_playbook_fallback: bool,
    },
    /// Print the latest published artifact for a report.
    Show {
        #[arg(value_enum)]
        report: ReportKind,
    },
}

/// Window and dimension filters shared by every report.
#[derive(Args, Debug, Clone)]
struct FilterArgs {
    /// Lookback window in days.
    #[arg(long, default_value_t = 30)]
    days: i64,

    /// Restrict to an asset id. Repeatable; default is all assets.
    #[arg(long = "asset")]
    assets: Vec<String>,

    /// Comma-separated timeframes. Default: 1d,1w.
    #[arg(long, value_delimiter = ',')]
    timeframes: Option<Vec<String>>,

    /// Comma-separated snapshot labels; `(null)` selects unlabelled snapshots.
    /// Default: eod,us_open,morning,(null).
    #[arg(long, value_delimiter = ',')]
    labels: Option<Vec<String>>,
}

impl FilterArgs {
    fn into_filter(self) -> ReportFilter {
        let defaults = ReportFilter::default();
        ReportFilter {
            days: self.days,
            assets: self.assets,
            timeframes: self.timeframes.unwrap_or(defaults.timeframes),
            labels: self.labels.unwrap_or(defaults.labels),
            ..ReportFilter::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ReportKind {
    JoinStats,
    OutcomeAnalysis,
    PerformanceBreakdown,
}

impl ReportKind {
    fn stem(self) -> &'static str {
        match self {
            ReportKind::JoinStats => JoinStatsReport::STEM,
            ReportKind::OutcomeAnalysis => OutcomeAnalysisReport::STEM,
            ReportKind::PerformanceBreakdown => PerformanceBreakdownReport::STEM,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(cli.config.as_deref())?;
    let out_dir = cli.out_dir.unwrap_or_else(|| config.output.dir.clone());

    match cli.command {
        Commands::JoinStats { filter } => {
            run_report::<JoinStatsReport>(&config, filter.into_filter(), &out_dir)
        }
        Commands::OutcomeAnalysis {
            filter,
            allow_derived_playbook_fallback,
        } => {
            let filter = ReportFilter {
                allow_derived_playbook_fallback,
                ..filter.into_filter()
            };
            run_report::<OutcomeAnalysisReport>(&config, filter, &out_dir)
        }
        Commands::PerformanceBreakdown {
            filter,
            min_closed,
            include_open_only,
            allow_derived_playbook_fallback,
        } => {
            let base = filter.into_filter();
            let filter = ReportFilter {
                min_closed: min_closed.unwrap_or(base.min_closed),
                include_open_only,
                allow_derived_playbook_fallback,
                ..base
            };
            run_report::<PerformanceBreakdownReport>(&config, filter, &out_dir)
        }
        Commands::Show { report } => run_show(report, &out_dir),
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// An explicit `--config` must exist; the default file is optional.
fn load_config(path: Option<&Path>) -> Result<SwingLabConfig> {
    match path {
        Some(path) => SwingLabConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => {
            let default = Path::new(DEFAULT_CONFIG_FILE);
            if default.is_file() {
                SwingLabConfig::from_file(default).context("Failed to load swinglab.toml")
            } else {
                Ok(SwingLabConfig::default())
            }
        }
    }
}

fn open_store(config: &StoreConfig) -> Result<Box<dyn RecordStore>> {
    match config.kind {
        StoreKind::Json => {
            info!(path = %config.path.display(), "using JSON export store");
            Ok(Box::new(JsonExportStore::new(&config.path)))
        }
        StoreKind::Http => {
            let base_url = config
                .base_url
                .as_deref()
                .context("store.base_url is required for the http store")?;
            info!(%base_url, timeout_secs = config.timeout_secs, "using HTTP export store");
            Ok(Box::new(HttpStore::new(base_url, config.timeout_secs)?))
        }
    }
}

fn run_report<R: Report>(
    config: &SwingLabConfig,
    filter: ReportFilter,
    out_dir: &Path,
) -> Result<()> {
    let ctx = RunContext::new(Utc::now(), filter, config.policy.clone())
        .context("Invalid report parameters")?;
    let store = open_store(&config.store)?;
    let report: R = generate(store.as_ref(), &ctx)
        .with_context(|| format!("Failed to generate {}", R::STEM))?;

    let manager = ArtifactManager::new(out_dir)?;
    let paths = manager.publish(&report)?;

    println!("Wrote {}", paths.json.display());
    println!("Wrote {}", paths.markdown.display());
    println!("Updated {}", paths.latest_json.display());
    println!("Updated {}", paths.latest_markdown.display());
    Ok(())
}

fn run_show(report: ReportKind, out_dir: &Path) -> Result<()> {
    let stem = report.stem();
    if !out_dir.is_dir() {
        println!("{stem}: no data yet");
        return Ok(());
    }
    let manager = ArtifactManager::new(out_dir)?;
    match manager.read_latest(stem)? {
        None => println!("{stem}: no data yet"),
        Some(value) => {
            let generated_at = value
                .get("generatedAt")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown");
            println!("{stem} (generated {generated_at})");
            if let Some(params) = value.get("params") {
                println!("params: {}", serde_json::to_string(params)?);
            }
            let headline = value.get("overall").or_else(|| value.get("totals"));
            if let Some(headline) = headline {
                println!("{}", serde_json::to_string_pretty(headline)?);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn filter_defaults_match_report_defaults() {
        let cli = Cli::try_parse_from(["swinglab", "join-stats"]).unwrap();
        let Commands::JoinStats { filter } = cli.command else {
            panic!("expected join-stats");
        };
        assert_eq!(filter.into_filter(), ReportFilter::default());
    }

    #[test]
    fn parses_report_flags() {
        let cli = Cli::try_parse_from([
            "swinglab",
            "performance-breakdown",
            "--days=14",
            "--asset=gold",
            "--asset=WTI",
            "--timeframes=1d",
            "--labels=eod,(null)",
            "--minClosed=5",
            "--includeOpenOnly",
            "--allowDerivedPlaybookFallback=true",
            "--out-dir",
            "out",
        ])
        .unwrap();
        assert_eq!(cli.out_dir, Some(PathBuf::from("out")));
        let Commands::PerformanceBreakdown {
            filter,
            min_closed,
            include_open_only,
            allow_derived_playbook_fallback,
        } = cli.command
        else {
            panic!("expected performance-breakdown");
        };
        assert_eq!(min_closed, Some(5));
        assert!(include_open_only);
        assert!(allow_derived_playbook_fallback);
        let filter = filter.into_filter();
        assert_eq!(filter.days, 14);
        assert_eq!(filter.assets, vec!["gold", "WTI"]);
        assert_eq!(filter.timeframes, vec!["1d"]);
        assert_eq!(filter.labels, vec!["eod", "(null)"]);
    }

    #[test]
    fn fallback_flag_accepts_explicit_false() {
        let cli = Cli::try_parse_from([
            "swinglab",
            "outcome-analysis",
            "--allowDerivedPlaybookFallback=false",
        ])
        .unwrap();
        let Commands::OutcomeAnalysis {
            allow_derived_playbook_fallback,
            ..
        } = cli.command
        else {
            panic!("expected outcome-analysis");
        };
        assert!(!allow_derived_playbook_fallback);
    }

    #[test]
    fn show_takes_a_report_name() {
        let cli = Cli::try_parse_from(["swinglab", "show", "outcome-analysis"]).unwrap();
        let Commands::Show { report } = cli.command else {
            panic!("expected show");
        };
        assert_eq!(report.stem(), "swing-outcome-analysis");
    }

    #[test]
    fn missing_explicit_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(err.to_string().contains("Failed to load config"));
    }
}
