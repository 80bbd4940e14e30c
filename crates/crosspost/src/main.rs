//! Crosspost: scheduled multi-destination post dispatch.
//!
//! Main binary with subcommands:
//! - `run`: Start the execution clock, rehydrate persisted jobs, and
//!   dispatch until interrupted

use clap::{Parser, Subcommand};
use miette::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crosspost_dispatch::RegistryConfig;

mod app;
mod rehydrate;

#[derive(Parser)]
#[command(name = "crosspost")]
#[command(about = "Scheduled multi-destination post dispatch", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the dispatch daemon (execution clock, rehydration)
    Run {
        /// Bluesky PDS URL
        #[arg(
            long,
            env = "CROSSPOST_BLUESKY_PDS_URL",
            default_value = "https://bsky.social"
        )]
        bluesky_pds_url: String,

        /// X API base URL
        #[arg(long, env = "CROSSPOST_X_API_URL", default_value = "https://api.x.com")]
        x_api_url: String,

        /// Instagram private API base URL
        #[arg(
            long,
            env = "CROSSPOST_INSTAGRAM_API_URL",
            default_value = "https://i.instagram.com/api/v1"
        )]
        instagram_api_url: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "crosspost=info".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            bluesky_pds_url,
            x_api_url,
            instagram_api_url,
        } => {
            run(RegistryConfig {
                bluesky_pds_url,
                x_api_url,
                instagram_api_url,
            })
            .await
        }
    }
}

async fn run(config: RegistryConfig) -> Result<()> {
    let app = app::App::with_memory_stores(config);

    let report = rehydrate::rehydrate(app.posts.as_ref(), &app.scheduler, &app.dispatcher).await;
    tracing::info!(
        armed = report.armed,
        skipped = report.skipped,
        failed = report.failed,
        "scheduler ready"
    );

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| miette::miette!("failed to listen for shutdown signal: {}", e))?;

    tracing::info!("shutting down, draining in-flight dispatches");
    app.shutdown(true).await;

    Ok(())
}
