use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt::SubscriberBuilder, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "cco-cli")]
#[command(about = "Cloud Cost Optimizer catalog importer")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Import every enabled provider (default).
    Import {
        /// Only import this provider.
        #[arg(long)]
        provider: Option<String>,
    },
    /// Apply catalog migrations.
    Migrate,
    /// Create the configured providers and regions if missing.
    Seed,
    /// Run imports on the configured cron schedule until interrupted.
    Schedule,
    /// Delete a provider and everything imported under it.
    RemoveProvider { name: String },
}

fn init_tracing(default_filter: &str) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    SubscriberBuilder::default()
        .with_env_filter(filter)
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {}", e))
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("info")?;
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Import { provider: None }) {
        Commands::Import { provider } => {
            let pipeline = cco_sync::pipeline_from_env().await?;
            let summaries = match provider {
                Some(name) => {
                    let Some(config) = pipeline.registry().find(&name) else {
                        bail!("provider {name} is not in {}", pipeline.config().providers_file.display());
                    };
                    vec![pipeline.import_provider(config).await?]
                }
                None => pipeline.import_all().await?,
            };
            for summary in &summaries {
                println!("{}", serde_json::to_string_pretty(summary)?);
            }
        }
        Commands::Migrate => {
            cco_sync::migrate_from_env().await?;
            println!("migrations applied");
        }
        Commands::Seed => {
            let pipeline = cco_sync::pipeline_from_env().await?;
            for (name, summary) in pipeline.seed().await? {
                println!(
                    "seeded {name}: provider_id={} regions_created={} regions_existing={}",
                    summary.provider_id, summary.regions_created, summary.regions_existing
                );
            }
        }
        Commands::Schedule => {
            let pipeline = Arc::new(cco_sync::pipeline_from_env().await?);
            let Some(sched) = cco_sync::maybe_build_scheduler(pipeline.clone()).await? else {
                bail!("scheduler disabled; set CCO_SCHEDULER_ENABLED=true");
            };
            sched.start().await?;
            info!(cron = %pipeline.config().import_cron, "scheduler started");
            tokio::signal::ctrl_c().await?;
            info!("shutting down scheduler");
        }
        Commands::RemoveProvider { name } => {
            let pipeline = cco_sync::pipeline_from_env().await?;
            if pipeline.remove_provider(&name).await? {
                println!("removed provider {name}");
            } else {
                println!("provider {name} not found");
            }
        }
    }

    Ok(())
}
