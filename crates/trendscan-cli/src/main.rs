use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use trendscan_core::Source;

#[derive(Debug, Parser)]
#[command(name = "trendscan")]
#[command(about = "Prediction-market trend scanner")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Scan the registered sources (or a single one) for new trends.
    Scan {
        #[arg(long)]
        source: Option<Source>,
    },
    /// Refresh the mirrored prediction-market list.
    ScanMarkets,
    /// Drop stale trends and reset daily API counters.
    Cleanup,
    /// Serve the dashboard.
    Serve,
    /// Run the cron scheduler until interrupted.
    Schedule,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Scan { source: None }) {
        Commands::Scan { source } => {
            let outcomes = trendscan_scan::run_scan_from_env(source).await?;
            for outcome in &outcomes {
                println!(
                    "{}: fetched={} inserted={} skipped(existing={}, keywords={}, engagement={}) status={}",
                    outcome.source,
                    outcome.fetched,
                    outcome.inserted,
                    outcome.skipped_existing,
                    outcome.skipped_keywords,
                    outcome.skipped_engagement,
                    outcome.status
                );
            }
        }
        Commands::ScanMarkets => {
            let upserted = trendscan_scan::run_market_scan_from_env().await?;
            println!("market mirror refreshed: {upserted} markets upserted");
        }
        Commands::Cleanup => {
            let deleted = trendscan_scan::run_cleanup_from_env().await?;
            println!("cleanup complete: {deleted} stale trends removed");
        }
        Commands::Serve => {
            trendscan_web::serve_from_env().await?;
        }
        Commands::Schedule => {
            let config = trendscan_scan::ScanConfig {
                scheduler_enabled: true,
                ..trendscan_scan::ScanConfig::from_env()
            };
            match trendscan_scan::maybe_build_scheduler(&config).await? {
                Some(mut scheduler) => {
                    scheduler.start().await?;
                    info!("scheduler running; press ctrl-c to stop");
                    tokio::signal::ctrl_c().await?;
                    scheduler.shutdown().await?;
                }
                None => println!("scheduler disabled"),
            }
        }
    }

    Ok(())
}
