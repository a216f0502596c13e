use anyhow::Result;
use clap::Parser;
use proxy_scout::proxy::{
    default_sources, Aggregator, AggregatorConfig, GeoConfig, GeoValidator, Pipeline, ProbeConfig,
    ResultStore, RunSummary, TargetProbe, DEFAULT_TARGET_URL,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Finds, geo-filters and probe-qualifies public proxies against a gated login page
#[derive(Parser)]
#[command(name = "proxy-scout")]
#[command(about = "Finds, geo-filters and probe-qualifies public proxies")]
struct Cli {
    /// Skip the login-page probe stage
    #[arg(short = 'n', long)]
    no_probe: bool,

    /// Number of concurrent validation requests
    #[arg(short = 'c', long, default_value = "20")]
    concurrency: usize,

    /// Per-request timeout in seconds
    #[arg(short = 't', long, default_value = "5")]
    timeout: u64,

    /// ISO country code the proxies must resolve to
    #[arg(long, default_value = "RU")]
    country: String,

    /// Gated page qualified proxies must be able to open
    #[arg(long, default_value = DEFAULT_TARGET_URL)]
    target_url: String,

    /// Directory the snapshot files are written to
    #[arg(short = 'o', long, default_value = "data")]
    output: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let timeout = Duration::from_secs(cli.timeout);

    let aggregator = Aggregator::with_config(AggregatorConfig::new())?;
    let geo = GeoValidator::new(
        GeoConfig::new()
            .with_country(cli.country.clone())
            .with_concurrency(cli.concurrency)
            .with_timeout(timeout),
    )?;
    let probe = (!cli.no_probe).then(|| {
        TargetProbe::with_config(
            ProbeConfig::new()
                .with_target_url(cli.target_url.clone())
                .with_concurrency(cli.concurrency)
                .with_timeout(timeout),
        )
    });
    let store = ResultStore::new(&cli.output);
    let pipeline = Pipeline::new(aggregator, geo, probe, store);
    let sources = default_sources();

    println!("Searching for {} proxies...", cli.country);

    tokio::select! {
        summary = pipeline.run(&sources) => report(&cli, summary?),
        _ = tokio::signal::ctrl_c() => {
            println!("\nInterrupted; snapshots of unfinished stages were not written.");
        }
    }

    Ok(())
}

fn report(cli: &Cli, summary: RunSummary) {
    println!(
        "Harvested {} unique candidates, {} confirmed in {}",
        summary.candidates, summary.confirmed, cli.country
    );

    match summary.qualified {
        None => {
            println!("Probe stage skipped; confirmed snapshot written to {:?}", cli.output);
        }
        Some(qualified) if qualified.is_empty() => {
            println!("No proxy could open the login page at {}", cli.target_url);
        }
        Some(qualified) => {
            println!("\nWorking proxies for {}:", cli.target_url);
            for (idx, proxy) in qualified.iter().enumerate() {
                println!(
                    "{:>3}. {} ({:.2}s)",
                    idx + 1,
                    proxy.proxy.url(),
                    proxy.latency_secs
                );
            }
            println!("\nSnapshots written to {:?}", cli.output);
        }
    }
}
