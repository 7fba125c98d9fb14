//! Diagnostic tool - Check keeper dependencies
//!
//! Run with: cargo run --bin diagnose [-- --config keeper.toml]

use alloy_primitives::utils::format_ether;
use alloy_provider::Provider;
use clap::Parser;
use color_eyre::eyre::Result;
use console::style;
use std::path::PathBuf;
use std::time::Instant;

use tvl_keeper::chain;
use tvl_keeper::config::{Config, ExecutionMode};
use tvl_keeper::farms::{FarmSource, StaticFarmList};
use tvl_keeper::price_index::{PriceSource, SubgraphPriceIndex};
use tvl_keeper::registry::TxSigner;

#[derive(Parser, Debug)]
#[command(name = "diagnose", version, about)]
struct Args {
    /// TOML config file (otherwise KEEPER_CONFIG, otherwise the environment)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,
}

fn ok(label: &str, detail: impl std::fmt::Display) {
    println!("  {:<22} {} {}", label, style("✅").green(), detail);
}

fn fail(label: &str, detail: impl std::fmt::Display) {
    println!("  {:<22} {} {}", label, style("❌").red(), detail);
}

fn section(title: &str) {
    println!("\n═══════════════════════════════════════════════════");
    println!("  {}", title);
    println!("═══════════════════════════════════════════════════\n");
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();
    println!("🔍 TVL KEEPER DIAGNOSTIC CHECK");

    let config = Config::load(args.config)?;
    config.print_summary();

    section("CONFIGURATION");
    match config.validate() {
        Ok(()) => ok("validate", "configuration is usable"),
        Err(e) => fail("validate", e),
    }

    section("RPC");
    let provider = chain::connect(&config.rpc_url)?;
    let start = Instant::now();
    match provider.get_block_number().await {
        Ok(block) => ok("latest block", format!("#{} ({:?})", block, start.elapsed())),
        Err(e) => fail("latest block", e),
    }
    match provider.get_chain_id().await {
        Ok(id) if id == config.chain_id => ok("chain id", id),
        Ok(id) => fail("chain id", format!("node reports {}, CHAIN_ID is {}", id, config.chain_id)),
        Err(e) => fail("chain id", e),
    }
    match provider.get_code_at(config.farm_registry_address).await {
        Ok(code) if !code.is_empty() => ok("registry code", format!("{} bytes", code.len())),
        Ok(_) => fail("registry code", "no contract at FARM_REGISTRY_ADDRESS"),
        Err(e) => fail("registry code", e),
    }

    section("SIGNER");
    match config.private_key.as_deref() {
        Some(key) => match TxSigner::from_key(key, config.chain_id) {
            Ok(signer) => {
                ok("address", format!("{:?}", signer.address()));
                ok("signs for", format!("chain {}", signer.chain_id()));
                match provider.get_balance(signer.address()).await {
                    Ok(balance) => ok("balance", format!("{} native", format_ether(balance))),
                    Err(e) => fail("balance", e),
                }
            }
            Err(e) => fail("private key", e),
        },
        None if config.execution_mode == ExecutionMode::Live => fail("private key", "not set (required for LIVE)"),
        None => println!("  {:<22} ⏭️  not set (dry run)", "private key"),
    }

    section("PRICE INDEX");
    let start = Instant::now();
    match SubgraphPriceIndex::new(config.subgraph_settings()) {
        Ok(index) => match index.snapshot().await {
            Ok(snapshot) => {
                ok("tokens", format!("{} priced ({:?})", snapshot.len(), start.elapsed()));
                let stable = config.stable_reference().address;
                match snapshot.get(&stable) {
                    Some(info) => ok("stable reference", format!("{} ({} decimals)", info.symbol, info.decimals)),
                    None => println!("  {:<22} ⚠️  {} not in index, pricing at 1.0", "stable reference", stable),
                }
            }
            Err(e) => fail("tokens", e),
        },
        Err(e) => fail("client", e),
    }

    section("FARMS");
    match &config.farm_list_path {
        Some(path) => match StaticFarmList::new(path).farms().await {
            Ok(farms) => ok("static list", format!("{} farms in {}", farms.len(), path)),
            Err(e) => fail("static list", e),
        },
        None => println!(
            "  {:<22} ⏭️  event scan from #{} (run discover-farms to cache)",
            "source", config.farm_events_from_block
        ),
    }

    println!();
    Ok(())
}
