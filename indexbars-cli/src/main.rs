//! Indexbars CLI: fetch index constituent prices and the index series.
//!
//! Commands:
//! - `prices`: constituent daily bars, merged into `daily_prices_{stem}.csv`
//! - `index`: the index's own daily series as `index_daily_{stem}.json`
//! - `all`: both, written only if both succeed

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indexbars_core::data::{
    ConstituentSource, DataProvider, LogProgress, TushareOptions, TushareProvider,
};
use indexbars_runner::{
    require_token, CombinedSummary, Pipeline, RunConfig, RunError, RunSummary, TOKEN_ENV_VAR,
};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "indexbars",
    about = "Fetch daily bars for an index and its constituents"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch constituent daily bars and write them as CSV.
    Prices(RunArgs),
    /// Fetch the index's daily bars and write them as a JSON time series.
    Index(RunArgs),
    /// Run both pipelines; nothing is written unless both succeed.
    All(RunArgs),
}

/// Flags shared by every command. Each overrides the config file.
#[derive(Args)]
struct RunArgs {
    /// TOML run config
    #[arg(long)]
    config: Option<PathBuf>,

    /// Index code, e.g. 000016.SH
    #[arg(long)]
    index_code: Option<String>,

    /// Start date (YYYYMMDD)
    #[arg(long)]
    start: Option<String>,

    /// End date (YYYYMMDD), defaults to today
    #[arg(long)]
    end: Option<String>,

    /// Max rows per provider call
    #[arg(long)]
    row_budget: Option<usize>,

    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Constituent CSV to use when the live listing is empty
    #[arg(long)]
    fallback: Option<PathBuf>,
}

impl RunArgs {
    fn into_config(self) -> Result<RunConfig> {
        let mut cfg = match &self.config {
            Some(path) => RunConfig::from_file(path)?,
            None => RunConfig::default(),
        };

        if let Some(code) = self.index_code {
            cfg.index_code = code;
        }
        if let Some(start) = self.start {
            cfg.start_date = start;
        }
        if let Some(end) = self.end {
            cfg.end_date = Some(end);
        }
        if let Some(budget) = self.row_budget {
            cfg.row_budget = budget;
        }
        if let Some(dir) = self.output_dir {
            cfg.output_dir = dir;
        }
        if let Some(path) = self.fallback {
            cfg.fallback_snapshot = Some(path);
        }
        Ok(cfg)
    }
}

#[derive(Clone, Copy)]
enum Mode {
    Prices,
    Index,
    All,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Prices(args) => run(Mode::Prices, args),
        Commands::Index(args) => run(Mode::Index, args),
        Commands::All(args) => run(Mode::All, args),
    }
}

fn run(mode: Mode, args: RunArgs) -> Result<()> {
    let cfg = args.into_config()?;
    let today = chrono::Local::now().date_naive();

    // Reject bad input before building a client or reading the token.
    let range = cfg.validate(today)?;
    let token = require_token(std::env::var(TOKEN_ENV_VAR).ok())?;

    let provider = TushareProvider::new(
        token,
        TushareOptions {
            base_url: cfg.provider.base_url.clone(),
            timeout: cfg.provider.timeout(),
        },
    )
    .context("failed to set up the Tushare client")?;

    tracing::info!(
        index_code = %cfg.index_code,
        range = %range,
        provider = provider.name(),
        "starting run"
    );

    let pipeline = Pipeline::new(&provider, &cfg, &LogProgress, today);

    match mode {
        Mode::Prices => print_summary("prices", &pipeline.prices().map_err(report)?),
        Mode::Index => print_summary("index", &pipeline.index().map_err(report)?),
        Mode::All => {
            let CombinedSummary { prices, index } = pipeline.all().map_err(report)?;
            print_summary("prices", &prices);
            print_summary("index", &index);
        }
    }

    Ok(())
}

fn report(err: RunError) -> anyhow::Error {
    let context = match err.stage() {
        Some(stage) => format!("run stopped at the {stage} stage"),
        None => "run finished fetching but could not save its output".to_string(),
    };
    anyhow::Error::new(err).context(context)
}

fn print_summary(label: &str, summary: &RunSummary) {
    println!();
    println!("=== {label} ===");
    println!("Output:   {}", summary.path.display());
    println!("Rows:     {}", summary.rows);
    println!("Symbols:  {}", summary.symbols);
    println!("Windows:  {}", summary.windows);
    if let Some(source) = &summary.source {
        match source {
            ConstituentSource::Live => println!("Source:   live listing"),
            ConstituentSource::Snapshot(path) => {
                println!("Source:   snapshot {}", path.display())
            }
        }
    }
    println!("BLAKE3:   {}", summary.content_hash);
}
