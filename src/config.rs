//! Keeper Configuration
//!
//! Loaded from the environment (with `.env` support) or a TOML file. Every
//! component is built from the pieces handed out here; nothing reads the
//! environment after startup.

use alloy_primitives::Address;
use eyre::{eyre, Result, WrapErr};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use crate::aggregator::{AggregationPolicy, MissingPriceAction, PublishPolicy, DEFAULT_MAX_HOPS};
use crate::chain::MULTICALL3;
use crate::farms::{DEFAULT_FROM_BLOCK, DEFAULT_LOG_BLOCK_RANGE};
use crate::price_index::{
    StableReference, SubgraphSettings, DEFAULT_API_TIMEOUT_SECS, DEFAULT_MAX_TOKENS, DEFAULT_PAGE_SIZE,
    DEFAULT_PRICE_FIELD, DEFAULT_PRICE_INDEX_URL,
};
use crate::registry::{
    gwei_to_wei, GasPriceSource, TxSigner, WriterSettings, DEFAULT_GAS_PRICE_GWEI, DEFAULT_MAX_GAS_GWEI,
    DEFAULT_REGISTRY_ADDRESS,
};
use crate::scheduler::{
    CycleFailurePolicy, SchedulerSettings, DEFAULT_FARM_TIMEOUT_SECS, DEFAULT_LOOP_INTERVAL_SECS,
};
use crate::tokens::{SubstitutionTable, TokenAddress, DEFAULT_STABLE_DECIMALS, DEFAULT_STABLE_REFERENCE};

/// Names a TOML config file when no path is given on the command line
pub const CONFIG_PATH_VAR: &str = "KEEPER_CONFIG";

pub const DEFAULT_RPC_URL: &str = "https://forno.celo.org";
pub const DEFAULT_CHAIN_ID: u64 = 42220;

/// How long a live write waits for its receipt
const RECEIPT_TIMEOUT_SECS: u64 = 60;

// ============================================
// EXECUTION MODE
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Compute everything, log the registry call, send nothing
    #[default]
    DryRun,
    /// Sign and broadcast `updateFarmData`
    /// CAUTION: spends gas from the configured key
    Live,
}

impl FromStr for ExecutionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "live" | "production" => Ok(ExecutionMode::Live),
            "dry_run" | "dryrun" | "dry-run" => Ok(ExecutionMode::DryRun),
            other => Err(format!("unknown execution mode '{}' (live|dry_run)", other)),
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::DryRun => write!(f, "DRY_RUN"),
            ExecutionMode::Live => write!(f, "LIVE"),
        }
    }
}

// ============================================
// CONFIG
// ============================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // ========== Network ==========
    pub rpc_url: String,
    pub chain_id: u64,
    pub multicall_address: Address,

    // ========== Execution ==========
    pub execution_mode: ExecutionMode,
    /// Registry writer key (KEEP SECRET!)
    #[serde(skip_serializing)]
    pub private_key: Option<String>,
    pub run_once: bool,
    pub loop_interval_secs: u64,
    pub farm_timeout_secs: u64,
    pub on_cycle_failure: CycleFailurePolicy,

    // ========== Farms ==========
    pub farm_registry_address: Address,
    /// Static farm list; when unset, farms come from registry events
    pub farm_list_path: Option<String>,
    pub farm_events_from_block: u64,
    pub log_block_range: u64,

    // ========== Price Index ==========
    pub price_index_url: String,
    pub price_index_price_field: String,
    pub price_index_page_size: usize,
    pub price_index_max_tokens: usize,
    pub price_index_timeout_secs: u64,
    pub stable_reference_address: Address,
    pub stable_reference_decimals: u8,
    /// `from:to,from:to`
    pub price_substitutions: String,

    // ========== Aggregation ==========
    pub durable_farms: Vec<Address>,
    pub max_chain_hops: usize,
    pub missing_reward_price: MissingPriceAction,
    pub missing_pool_price: MissingPriceAction,
    pub publish_policy: PublishPolicy,

    // ========== Gas ==========
    /// Fixed price; `None` follows the network (`GAS_PRICE_GWEI=auto`)
    pub gas_price_gwei: Option<f64>,
    pub max_gas_gwei: f64,
    /// Fixed gas limit; `None` estimates each call
    pub gas_limit: Option<u64>,
    pub wait_for_receipt: bool,
}

impl Config {
    /// Load from `explicit`, then the file named by `KEEPER_CONFIG`, then the environment
    pub fn load(explicit: Option<PathBuf>) -> Result<Self> {
        dotenvy::dotenv().ok();
        match Self::resolve_path(explicit, |key| env::var(key).ok()) {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                Self::from_file(path)
            }
            None => Self::from_env(),
        }
    }

    pub fn resolve_path<F>(explicit: Option<PathBuf>, lookup: F) -> Option<PathBuf>
    where
        F: Fn(&str) -> Option<String>,
    {
        explicit.or_else(|| {
            lookup(CONFIG_PATH_VAR)
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
        })
    }

    /// Load configuration from environment variables and .env file
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key/value source; unset or blank keys take defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Self::default();

        Ok(Self {
            // Network
            rpc_url: get("RPC_URL").unwrap_or(defaults.rpc_url),
            chain_id: parse_or(get("CHAIN_ID"), "CHAIN_ID", defaults.chain_id)?,
            multicall_address: parse_or(get("MULTICALL_ADDRESS"), "MULTICALL_ADDRESS", defaults.multicall_address)?,

            // Execution
            execution_mode: parse_or(get("EXECUTION_MODE"), "EXECUTION_MODE", defaults.execution_mode)?,
            private_key: get("PRIVATE_KEY"),
            run_once: get("RUN_ONCE").map(|v| parse_flag(&v)).unwrap_or(defaults.run_once),
            loop_interval_secs: parse_or(get("LOOP_INTERVAL_SECS"), "LOOP_INTERVAL_SECS", defaults.loop_interval_secs)?,
            farm_timeout_secs: parse_or(get("FARM_TIMEOUT_SECS"), "FARM_TIMEOUT_SECS", defaults.farm_timeout_secs)?,
            on_cycle_failure: parse_or(get("ON_CYCLE_FAILURE"), "ON_CYCLE_FAILURE", defaults.on_cycle_failure)?,

            // Farms
            farm_registry_address: parse_or(
                get("FARM_REGISTRY_ADDRESS"),
                "FARM_REGISTRY_ADDRESS",
                defaults.farm_registry_address,
            )?,
            farm_list_path: get("FARM_LIST_PATH"),
            farm_events_from_block: parse_or(
                get("FARM_EVENTS_FROM_BLOCK"),
                "FARM_EVENTS_FROM_BLOCK",
                defaults.farm_events_from_block,
            )?,
            log_block_range: parse_or(get("LOG_BLOCK_RANGE"), "LOG_BLOCK_RANGE", defaults.log_block_range)?,

            // Price index
            price_index_url: get("PRICE_INDEX_URL").unwrap_or(defaults.price_index_url),
            price_index_price_field: get("PRICE_INDEX_PRICE_FIELD").unwrap_or(defaults.price_index_price_field),
            price_index_page_size: parse_or(
                get("PRICE_INDEX_PAGE_SIZE"),
                "PRICE_INDEX_PAGE_SIZE",
                defaults.price_index_page_size,
            )?,
            price_index_max_tokens: parse_or(
                get("PRICE_INDEX_MAX_TOKENS"),
                "PRICE_INDEX_MAX_TOKENS",
                defaults.price_index_max_tokens,
            )?,
            price_index_timeout_secs: parse_or(
                get("PRICE_INDEX_TIMEOUT_SECS"),
                "PRICE_INDEX_TIMEOUT_SECS",
                defaults.price_index_timeout_secs,
            )?,
            stable_reference_address: parse_or(
                get("STABLE_REFERENCE_ADDRESS"),
                "STABLE_REFERENCE_ADDRESS",
                defaults.stable_reference_address,
            )?,
            stable_reference_decimals: parse_or(
                get("STABLE_REFERENCE_DECIMALS"),
                "STABLE_REFERENCE_DECIMALS",
                defaults.stable_reference_decimals,
            )?,
            price_substitutions: get("PRICE_SUBSTITUTIONS").unwrap_or_default(),

            // Aggregation
            durable_farms: match get("DURABLE_FARMS") {
                Some(list) => parse_address_list(&list).wrap_err("DURABLE_FARMS")?,
                None => defaults.durable_farms,
            },
            max_chain_hops: parse_or(get("MAX_CHAIN_HOPS"), "MAX_CHAIN_HOPS", defaults.max_chain_hops)?,
            missing_reward_price: parse_or(
                get("MISSING_REWARD_PRICE"),
                "MISSING_REWARD_PRICE",
                defaults.missing_reward_price,
            )?,
            missing_pool_price: parse_or(get("MISSING_POOL_PRICE"), "MISSING_POOL_PRICE", defaults.missing_pool_price)?,
            publish_policy: parse_or(get("PUBLISH_POLICY"), "PUBLISH_POLICY", defaults.publish_policy)?,

            // Gas
            gas_price_gwei: match get("GAS_PRICE_GWEI") {
                Some(v) if v.eq_ignore_ascii_case("auto") => None,
                Some(v) => Some(
                    v.parse()
                        .map_err(|_| eyre!("GAS_PRICE_GWEI must be a number or 'auto', got '{}'", v))?,
                ),
                None => defaults.gas_price_gwei,
            },
            max_gas_gwei: parse_or(get("MAX_GAS_GWEI"), "MAX_GAS_GWEI", defaults.max_gas_gwei)?,
            gas_limit: match get("GAS_LIMIT") {
                Some(v) => Some(v.parse().map_err(|_| eyre!("GAS_LIMIT must be an integer, got '{}'", v))?),
                None => defaults.gas_limit,
            },
            wait_for_receipt: get("WAIT_FOR_RECEIPT")
                .map(|v| parse_flag(&v))
                .unwrap_or(defaults.wait_for_receipt),
        })
    }

    /// Load configuration from a TOML file; `PRIVATE_KEY` still comes from the environment
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).wrap_err_with(|| format!("reading {}", path.display()))?;
        let mut config: Self = toml::from_str(&content).wrap_err_with(|| format!("parsing {}", path.display()))?;

        if config.private_key.is_none() {
            dotenvy::dotenv().ok();
            config.private_key = env::var("PRIVATE_KEY").ok().filter(|k| !k.trim().is_empty());
        }

        Ok(config)
    }

    /// Save configuration to a TOML file (the key is never written)
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Validate configuration before any component is built
    pub fn validate(&self) -> Result<()> {
        if self.rpc_url.is_empty() || self.rpc_url.contains("YOUR_API_KEY") {
            return Err(eyre!("Invalid RPC_URL"));
        }

        if self.execution_mode == ExecutionMode::Live {
            let key = self
                .private_key
                .as_deref()
                .ok_or_else(|| eyre!("Live mode requires PRIVATE_KEY"))?;
            TxSigner::from_key(key, self.chain_id).wrap_err("PRIVATE_KEY is not a valid secp256k1 key")?;
        }

        if self.loop_interval_secs == 0 {
            return Err(eyre!("LOOP_INTERVAL_SECS must be positive"));
        }
        if self.farm_timeout_secs == 0 {
            return Err(eyre!("FARM_TIMEOUT_SECS must be positive"));
        }
        if self.max_chain_hops == 0 {
            return Err(eyre!("MAX_CHAIN_HOPS must be positive"));
        }
        if self.price_index_page_size == 0 {
            return Err(eyre!("PRICE_INDEX_PAGE_SIZE must be positive"));
        }
        if self.max_gas_gwei <= 0.0 {
            return Err(eyre!("MAX_GAS_GWEI must be positive"));
        }
        if let Some(gwei) = self.gas_price_gwei {
            if gwei <= 0.0 || gwei > self.max_gas_gwei {
                return Err(eyre!(
                    "GAS_PRICE_GWEI must be within (0, {}] (currently {})",
                    self.max_gas_gwei,
                    gwei
                ));
            }
        }

        self.substitutions()?;
        Ok(())
    }

    // ========== Component settings ==========

    pub fn substitutions(&self) -> Result<SubstitutionTable> {
        SubstitutionTable::parse(&self.price_substitutions).wrap_err("PRICE_SUBSTITUTIONS")
    }

    pub fn stable_reference(&self) -> StableReference {
        StableReference {
            address: TokenAddress::from(self.stable_reference_address),
            fallback_decimals: self.stable_reference_decimals,
        }
    }

    pub fn subgraph_settings(&self) -> SubgraphSettings {
        SubgraphSettings {
            url: self.price_index_url.clone(),
            price_field: self.price_index_price_field.clone(),
            page_size: self.price_index_page_size,
            max_tokens: self.price_index_max_tokens,
            timeout: Duration::from_secs(self.price_index_timeout_secs),
        }
    }

    pub fn aggregation_policy(&self) -> AggregationPolicy {
        AggregationPolicy {
            on_missing_reward_price: self.missing_reward_price,
            on_missing_pool_price: self.missing_pool_price,
            publish: self.publish_policy,
            durable_farms: Default::default(),
        }
        .with_durable_farms(self.durable_farms.iter().copied())
    }

    pub fn scheduler_settings(&self) -> SchedulerSettings {
        SchedulerSettings {
            interval: Duration::from_secs(self.loop_interval_secs),
            farm_timeout: Duration::from_secs(self.farm_timeout_secs),
            run_once: self.run_once,
            on_cycle_failure: self.on_cycle_failure,
        }
    }

    pub fn gas_price_source(&self) -> GasPriceSource {
        match self.gas_price_gwei {
            Some(gwei) => GasPriceSource::Fixed(gwei_to_wei(gwei)),
            None => GasPriceSource::Network {
                ceiling: gwei_to_wei(self.max_gas_gwei),
                fallback: gwei_to_wei(DEFAULT_GAS_PRICE_GWEI.min(self.max_gas_gwei)),
            },
        }
    }

    pub fn writer_settings(&self) -> WriterSettings {
        WriterSettings {
            gas_price: self.gas_price_source(),
            gas_limit: self.gas_limit,
            receipt_timeout: self
                .wait_for_receipt
                .then(|| Duration::from_secs(RECEIPT_TIMEOUT_SECS)),
        }
    }

    /// Print configuration summary
    pub fn print_summary(&self) {
        let farms = match &self.farm_list_path {
            Some(path) => format!("list {}", path),
            None => format!("events from #{}", self.farm_events_from_block),
        };
        let key = if self.private_key.is_some() { "✓ Configured" } else { "✗ Not Set" };

        println!("╔════════════════════════════════════════════════════════════╗");
        println!("║              TVL KEEPER - CONFIGURATION                    ║");
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ Execution Mode:    {:^40} ║", self.execution_mode);
        println!("║ Chain ID:          {:^40} ║", self.chain_id);
        println!("║ Run Once:          {:^40} ║", self.run_once);
        println!("║ Interval:          {:^40} ║", format!("{}s", self.loop_interval_secs));
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ FARMS                                                      ║");
        println!("║ • Registry:        {:^40} ║", format!("{:?}", self.farm_registry_address));
        println!("║ • Source:          {:^40} ║", farms);
        println!("║ • Max Chain Hops:  {:^40} ║", self.max_chain_hops);
        println!("║ • Durable Farms:   {:^40} ║", self.durable_farms.len());
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ PRICING                                                    ║");
        println!("║ • Price Field:     {:^40} ║", self.price_index_price_field);
        println!("║ • Substitutions:   {:^40} ║", self.substitutions().map(|t| t.len()).unwrap_or(0));
        println!("║ • Missing Reward:  {:^40} ║", self.missing_reward_price);
        println!("║ • Missing Pool:    {:^40} ║", self.missing_pool_price);
        println!("║ • Publish:         {:^40} ║", self.publish_policy);
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ REGISTRY WRITES                                            ║");
        println!("║ • Gas Price:       {:^40} ║", self.gas_price_source());
        println!("║ • Signer Key:      {:^40} ║", key);
        println!("║ • On Cycle Fail:   {:^40} ║", self.on_cycle_failure);
        println!("╚════════════════════════════════════════════════════════════╝");
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.to_string(),
            chain_id: DEFAULT_CHAIN_ID,
            multicall_address: MULTICALL3,
            execution_mode: ExecutionMode::DryRun,
            private_key: None,
            run_once: false,
            loop_interval_secs: DEFAULT_LOOP_INTERVAL_SECS,
            farm_timeout_secs: DEFAULT_FARM_TIMEOUT_SECS,
            on_cycle_failure: CycleFailurePolicy::Exit,
            farm_registry_address: DEFAULT_REGISTRY_ADDRESS,
            farm_list_path: None,
            farm_events_from_block: DEFAULT_FROM_BLOCK,
            log_block_range: DEFAULT_LOG_BLOCK_RANGE,
            price_index_url: DEFAULT_PRICE_INDEX_URL.to_string(),
            price_index_price_field: DEFAULT_PRICE_FIELD.to_string(),
            price_index_page_size: DEFAULT_PAGE_SIZE,
            price_index_max_tokens: DEFAULT_MAX_TOKENS,
            price_index_timeout_secs: DEFAULT_API_TIMEOUT_SECS,
            stable_reference_address: DEFAULT_STABLE_REFERENCE,
            stable_reference_decimals: DEFAULT_STABLE_DECIMALS,
            price_substitutions: String::new(),
            durable_farms: Vec::new(),
            max_chain_hops: DEFAULT_MAX_HOPS,
            missing_reward_price: MissingPriceAction::Skip,
            missing_pool_price: MissingPriceAction::Skip,
            publish_policy: PublishPolicy::ActiveRewardsOrWhitelisted,
            gas_price_gwei: Some(DEFAULT_GAS_PRICE_GWEI),
            max_gas_gwei: DEFAULT_MAX_GAS_GWEI,
            gas_limit: None,
            wait_for_receipt: true,
        }
    }
}

fn parse_or<T>(raw: Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match raw {
        Some(v) => v.parse().map_err(|e| eyre!("{}='{}': {}", key, v, e)),
        None => Ok(default),
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(raw.to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

fn parse_address_list(raw: &str) -> Result<Vec<Address>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            TokenAddress::normalize(s)
                .map(|t| t.address())
                .map_err(|e| eyre!(e))
        })
        .collect()
}

// ============================================
// TESTS
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const TEST_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.execution_mode, ExecutionMode::DryRun);
        assert_eq!(config.loop_interval_secs, 900);
        assert_eq!(config.chain_id, 42220);
        assert_eq!(config.gas_price_source(), GasPriceSource::Fixed(200_000_000));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_lookup_is_default() {
        assert_eq!(from_pairs(&[]).unwrap(), Config::default());
    }

    #[test]
    fn test_env_overrides() {
        let config = from_pairs(&[
            ("EXECUTION_MODE", "live"),
            ("PRIVATE_KEY", TEST_KEY),
            ("RUN_ONCE", "true"),
            ("GAS_PRICE_GWEI", "auto"),
            ("MAX_GAS_GWEI", "5"),
            ("MISSING_REWARD_PRICE", "abort_farm"),
            ("PUBLISH_POLICY", "always"),
            ("ON_CYCLE_FAILURE", "retry"),
            ("DURABLE_FARMS", "0x1111111111111111111111111111111111111111, 0x2222222222222222222222222222222222222222"),
            ("FARM_LIST_PATH", "farms.json"),
        ])
        .unwrap();

        assert_eq!(config.execution_mode, ExecutionMode::Live);
        assert!(config.run_once);
        assert_eq!(
            config.gas_price_source(),
            GasPriceSource::Network { ceiling: 5_000_000_000, fallback: 200_000_000 }
        );
        assert_eq!(config.aggregation_policy().on_missing_reward_price, MissingPriceAction::AbortFarm);
        assert_eq!(config.aggregation_policy().durable_farms.len(), 2);
        assert_eq!(config.scheduler_settings().on_cycle_failure, CycleFailurePolicy::Retry);
        assert_eq!(config.farm_list_path.as_deref(), Some("farms.json"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bad_values_are_errors() {
        assert!(from_pairs(&[("EXECUTION_MODE", "yolo")]).is_err());
        assert!(from_pairs(&[("FARM_REGISTRY_ADDRESS", "0x1234")]).is_err());
        assert!(from_pairs(&[("GAS_PRICE_GWEI", "cheap")]).is_err());
        assert!(from_pairs(&[("DURABLE_FARMS", "nope")]).is_err());
    }

    #[test]
    fn test_validate_rejects_unsafe_settings() {
        let live_without_key = Config {
            execution_mode: ExecutionMode::Live,
            ..Config::default()
        };
        assert!(live_without_key.validate().is_err());

        assert!(Config { loop_interval_secs: 0, ..Config::default() }.validate().is_err());
        assert!(Config { max_chain_hops: 0, ..Config::default() }.validate().is_err());
        assert!(Config { price_index_page_size: 0, ..Config::default() }.validate().is_err());
        assert!(Config { gas_price_gwei: Some(500.0), ..Config::default() }.validate().is_err());
        assert!(Config {
            price_substitutions: "0x11:0x22".into(),
            ..Config::default()
        }
        .validate()
        .is_err());
    }

    #[test]
    fn test_toml_roundtrip_omits_key() {
        let dir = std::env::temp_dir().join(format!("tvl-keeper-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("keeper.toml");

        let config = Config {
            private_key: Some(TEST_KEY.into()),
            run_once: true,
            ..Config::default()
        };
        config.save_to_file(&path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(!written.contains("ac0974bec39a17e36ba4a6b4d238ff944bacb478"));

        let parsed: Config = toml::from_str(&written).unwrap();
        assert!(parsed.run_once);
        assert_eq!(parsed.farm_registry_address, DEFAULT_REGISTRY_ADDRESS);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_config_path_precedence() {
        let env: HashMap<&str, &str> = HashMap::from([(CONFIG_PATH_VAR, "/etc/keeper.toml")]);
        let lookup = |key: &str| env.get(key).map(|v| v.to_string());

        assert_eq!(
            Config::resolve_path(Some(PathBuf::from("cli.toml")), lookup),
            Some(PathBuf::from("cli.toml"))
        );
        assert_eq!(Config::resolve_path(None, lookup), Some(PathBuf::from("/etc/keeper.toml")));
        assert_eq!(Config::resolve_path(None, |_| Some("  ".to_string())), None);
        assert_eq!(Config::resolve_path(None, |_| None), None);
    }
}
