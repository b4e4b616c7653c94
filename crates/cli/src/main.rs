mod cli;
mod trigger;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;

use latency_core::config::load_dotenv;
use latency_core::Settings;
use latency_store::CosmosStore;
use latency_workload::{ShutdownOutcome, Workload, WorkloadConfig};

use crate::cli::CliArgs;

/// Extra filter directives enabled by transport level tracing.
const TRANSPORT_DIRECTIVES: &[&str] = &[
    "latency_store::transport=trace",
    "reqwest=trace",
    "hyper_util=debug",
];

#[tokio::main]
async fn main() -> Result<()> {
    load_dotenv();
    let args = CliArgs::parse_normalized();

    // Configuration errors surface before anything touches the network.
    let settings = Settings::from_env(args.overrides()).context("invalid configuration")?;

    let base = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(build_filter(base, settings.transport_tracing)?)
        .with_target(settings.transport_tracing)
        .init();

    settings.log_summary();

    let store = CosmosStore::connect(&settings)
        .await
        .context("failed to connect to the Cosmos DB account")?;
    let workload = Workload::new(WorkloadConfig::from_settings(&settings), Arc::new(store));

    workload
        .initialize()
        .await
        .context("failed to initialize the workload")?;
    let pool = workload.start().context("failed to start readers")?;

    println!("Press <ENTER> to quit.");
    let trigger = trigger::wait_for_stop(tokio::io::stdin()).await;

    info!(%trigger, "Closing...");
    workload.stop();
    if workload.shutdown(pool).await == ShutdownOutcome::Graceful {
        info!(readers = workload.readers_finished(), "All readers completed");
    }

    let stats = workload.stats();
    info!(%stats, "Final statistics");
    info!("Good bye...");
    Ok(())
}

fn build_filter(base: EnvFilter, transport_tracing: bool) -> Result<EnvFilter> {
    if !transport_tracing {
        return Ok(base);
    }
    let mut filter = base;
    for directive in TRANSPORT_DIRECTIVES {
        let directive: Directive = directive.parse()?;
        filter = filter.add_directive(directive);
    }
    Ok(filter)
}
