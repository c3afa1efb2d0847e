//! quotegrid CLI - resample decoded quote partitions onto a cleaned calendar grid

use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use quotegrid_core::{BoundTable, PipelineConfig};
use quotegrid_ingestion::MemorySource;
use quotegrid_pipeline::{load_bounds, load_config, read_json, Pipeline, PipelineOutput};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "quotegrid")]
#[command(about = "Resample bid/ask quotes onto a regular, cleaned calendar grid")]
#[command(version)]
struct Cli {
    /// JSON file with the decoded partitions
    #[arg(short, long)]
    input: PathBuf,

    /// Pipeline configuration (JSON); defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bound table spec (JSON); the built-in country ETF table when omitted
    #[arg(short, long)]
    bounds: Option<PathBuf>,

    /// Years to process
    #[arg(long, value_delimiter = ',', default_value = "2007,2008,2009,2010,2011,2012")]
    years: Vec<i32>,

    /// Instruments to process; every instrument in the input when omitted
    #[arg(long, value_delimiter = ',')]
    instruments: Vec<String>,

    /// Write the cleaned series as JSON
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    let bounds = match &cli.bounds {
        Some(path) => load_bounds(path)
            .with_context(|| format!("loading bound table from {}", path.display()))?,
        None => BoundTable::country_etfs().context("building the built-in bound table")?,
    };
    let source: MemorySource = read_json(&cli.input)
        .with_context(|| format!("reading partitions from {}", cli.input.display()))?;
    info!(partitions = source.len(), input = %cli.input.display(), "loaded partitions");

    let instruments = if cli.instruments.is_empty() {
        source.instruments().into_iter().collect()
    } else {
        cli.instruments.clone()
    };

    let pipeline = Pipeline::new(config, bounds).context("invalid pipeline configuration")?;
    let output = pipeline
        .run(&source, &cli.years, &instruments)
        .context("pipeline run failed")?;

    print_summary(&output);

    if let Some(path) = &cli.output {
        let series: Vec<_> = output.series.values().collect();
        let json = serde_json::to_string(&series)?;
        fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        info!(output = %path.display(), "wrote cleaned series");
    }

    Ok(())
}

fn print_summary(output: &PipelineOutput) {
    println!(
        "{:<8} {:>10} {:>6} {:<26} {:<26} {:>12}",
        "symbol", "buckets", "days", "first", "last", "mean gap"
    );
    for (instrument, series) in &output.series {
        let dates: BTreeSet<_> = series.dates();
        let first = series
            .first()
            .map_or_else(|| "-".to_string(), |b| b.start.to_rfc3339());
        let last = series
            .last()
            .map_or_else(|| "-".to_string(), |b| b.start.to_rfc3339());
        let gap = output
            .mean_gaps
            .get(instrument)
            .map_or_else(|| "-".to_string(), |g| format!("{}ms", g.num_milliseconds()));
        println!(
            "{:<8} {:>10} {:>6} {:<26} {:<26} {:>12}",
            instrument,
            series.len(),
            dates.len(),
            first,
            last,
            gap
        );
    }
}
