//! Farm Discovery - scan FarmInfo registrations into a static list
//!
//! Run with: cargo run --bin discover-farms -- --out farms.json
//!
//! The keeper reads the result through FARM_LIST_PATH, skipping the event
//! scan on every cycle.

use clap::Parser;
use color_eyre::eyre::Result;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;

use tvl_keeper::chain;
use tvl_keeper::config::Config;
use tvl_keeper::farms::{EventFarmSource, StaticFarmList};

#[derive(Parser, Debug)]
#[command(name = "discover-farms", version, about)]
struct Args {
    /// Output JSON file
    #[arg(long, short = 'o', default_value = "farms.json")]
    out: PathBuf,

    /// First block to scan (defaults to FARM_EVENTS_FROM_BLOCK)
    #[arg(long)]
    from_block: Option<u64>,

    /// Blocks per log request (defaults to LOG_BLOCK_RANGE)
    #[arg(long)]
    range: Option<u64>,

    /// TOML config file (otherwise KEEPER_CONFIG, otherwise the environment)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();
    let config = Config::load(args.config.clone())?;

    println!("{}", style("🔎 FARM DISCOVERY").cyan().bold());
    println!("   Registry: {:?}", config.farm_registry_address);
    println!("   RPC:      {}", config.rpc_url);
    println!();

    let provider = chain::connect(&config.rpc_url)?;
    let source = EventFarmSource::new(
        provider,
        config.farm_registry_address,
        args.from_block.unwrap_or(config.farm_events_from_block),
        args.range.unwrap_or(config.log_block_range),
    );

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("  Scanning [{bar:40}] {pos}/{len} blocks ({eta})")?
            .progress_chars("=> "),
    );

    let farms = source
        .scan_with_progress(|done, total| {
            pb.set_length(total);
            pb.set_position(done);
        })
        .await?;
    pb.finish_and_clear();

    for farm in &farms {
        println!("   {} {:<24} {:?}", style("•").green(), farm.name, farm.address);
    }

    StaticFarmList::save(&args.out, &farms)?;
    println!();
    println!(
        "{} Wrote {} farms to {}",
        style("✓").green(),
        farms.len(),
        args.out.display()
    );
    println!("   Set FARM_LIST_PATH={} to use it", args.out.display());

    Ok(())
}
