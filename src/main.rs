//! TVL Keeper - publishes farm TVL and yearly rewards
//!
//! Run with: cargo run -- [--once] [--dry-run] [--config keeper.toml]

use clap::Parser;
use color_eyre::eyre::{eyre, Result};
use console::style;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tvl_keeper::aggregator::TvlAggregator;
use tvl_keeper::chain::{self, MulticallReader};
use tvl_keeper::config::{Config, ExecutionMode};
use tvl_keeper::farms::{EventFarmSource, FarmSource, StaticFarmList};
use tvl_keeper::price_index::SubgraphPriceIndex;
use tvl_keeper::registry::{DryRunWriter, OnchainRegistryWriter, RegistryWriter, TxSigner};
use tvl_keeper::scheduler::Scheduler;

#[derive(Parser, Debug)]
#[command(name = "tvl-keeper", version, about)]
struct Args {
    /// Run a single cycle and exit
    #[arg(long)]
    once: bool,

    /// Log registry calls instead of sending them
    #[arg(long)]
    dry_run: bool,

    /// TOML config file (otherwise KEEPER_CONFIG, otherwise the environment)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,
}

fn print_banner() {
    println!();
    println!(
        "{}",
        style("═══════════════════════════════════════════════════════════════").cyan()
    );
    println!(
        "{}",
        style(" 🌾 TVL KEEPER - Farm TVL & Rewards Publisher").cyan().bold()
    );
    println!(
        "{}",
        style("    Reward chains | Subgraph prices | On-chain registry").cyan()
    );
    println!(
        "{}",
        style("═══════════════════════════════════════════════════════════════").cyan()
    );
    println!();
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = Config::load(args.config.clone())?;

    if args.once {
        config.run_once = true;
    }
    if args.dry_run {
        config.execution_mode = ExecutionMode::DryRun;
    }

    Ok(config)
}

fn build_writer(config: &Config, provider: alloy_provider::DynProvider) -> Result<Arc<dyn RegistryWriter>> {
    match config.execution_mode {
        ExecutionMode::DryRun => Ok(Arc::new(DryRunWriter::new(config.farm_registry_address))),
        ExecutionMode::Live => {
            let key = config
                .private_key
                .as_deref()
                .ok_or_else(|| eyre!("Live mode requires PRIVATE_KEY"))?;
            let signer = TxSigner::from_key(key, config.chain_id)?;
            info!("✓ Registry signer loaded: {:?}", signer.address());
            Ok(Arc::new(OnchainRegistryWriter::new(
                provider,
                config.farm_registry_address,
                signer,
                config.writer_settings(),
            )))
        }
    }
}

fn build_farm_source(config: &Config, provider: alloy_provider::DynProvider) -> Arc<dyn FarmSource> {
    match &config.farm_list_path {
        Some(path) => {
            info!("Farms from static list {}", path);
            Arc::new(StaticFarmList::new(path))
        }
        None => {
            info!(
                "Farms from FarmInfo events on {:?} since block {}",
                config.farm_registry_address, config.farm_events_from_block
            );
            Arc::new(EventFarmSource::new(
                provider,
                config.farm_registry_address,
                config.farm_events_from_block,
                config.log_block_range,
            ))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tvl_keeper=info".parse()?),
        )
        .init();

    let args = Args::parse();
    print_banner();

    let config = load_config(&args)?;

    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        error!("Please check your .env file");
        return Err(e);
    }

    config.print_summary();
    println!();

    if config.execution_mode == ExecutionMode::Live {
        warn!("{}", style("LIVE mode: registry updates will spend gas").red().bold());
    }

    let provider = chain::connect(&config.rpc_url)?;
    let reader = Arc::new(MulticallReader::with_provider(provider.clone(), config.multicall_address));
    let aggregator = TvlAggregator::new(reader, config.aggregation_policy(), config.max_chain_hops);
    let prices = Arc::new(SubgraphPriceIndex::new(config.subgraph_settings())?);
    let farms = build_farm_source(&config, provider.clone());
    let writer = build_writer(&config, provider)?;

    let mut scheduler = Scheduler::new(farms, prices, aggregator, writer, config.scheduler_settings())
        .with_pricing(config.substitutions()?, config.stable_reference());

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    scheduler.run(shutdown).await?;

    println!();
    println!(
        "{} Keeper stopped after {} cycle(s)",
        style("✓").green(),
        scheduler.cycles()
    );

    Ok(())
}
