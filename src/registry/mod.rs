//! Registry Writes
//!
//! Responsible for:
//! - Submitting `updateFarmData(farm, tvl, rewards)` once per published farm
//! - Serializing submissions so nonces stay strictly increasing
//! - A dry-run writer that only logs
//!
//! Every failure maps to [`KeeperError::Submission`] so the scheduler can
//! isolate it to the farm.

mod gas;
mod signer;

pub use gas::{gwei_to_wei, GasPriceSource, DEFAULT_GAS_PRICE_GWEI, DEFAULT_MAX_GAS_GWEI};
pub use signer::{LegacyRequest, TxSigner};

use alloy_network::ReceiptResponse;
use alloy_primitives::{Address, Bytes, TxHash, U256};
use alloy_provider::{DynProvider, Provider};
use alloy_rpc_types::TransactionRequest;
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::chain::IFarmRegistry;
use crate::errors::{KeeperError, KeeperResult};

/// Reference registry on Celo mainnet
pub const DEFAULT_REGISTRY_ADDRESS: Address =
    alloy_primitives::address!("a2bf67e12EeEDA23C7cA1e5a34ae2441a17789Ec");

/// Headroom over `eth_estimateGas`, in percent
const GAS_ESTIMATE_HEADROOM_PCT: u64 = 120;

#[async_trait]
pub trait RegistryWriter: Send + Sync {
    /// Submit one farm's fixed-point figures; returns the transaction hash
    async fn update_farm_data(&self, farm: Address, tvl: U256, rewards: U256) -> KeeperResult<TxHash>;
}

pub fn encode_update(farm: Address, tvl: U256, rewards: U256) -> Vec<u8> {
    IFarmRegistry::updateFarmDataCall {
        stakingAddress: farm,
        tvlUSD: tvl,
        rewardsUSDPerYear: rewards,
    }
    .abi_encode()
}

// ============================================
// DRY RUN
// ============================================

/// Logs the call it would make; never touches the chain
pub struct DryRunWriter {
    registry: Address,
}

impl DryRunWriter {
    pub fn new(registry: Address) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl RegistryWriter for DryRunWriter {
    async fn update_farm_data(&self, farm: Address, tvl: U256, rewards: U256) -> KeeperResult<TxHash> {
        let calldata = encode_update(farm, tvl, rewards);
        info!(
            "🧪 [dry run] {:?}.updateFarmData({:?}, {}, {}) ({} bytes calldata)",
            self.registry,
            farm,
            tvl,
            rewards,
            calldata.len()
        );
        Ok(TxHash::ZERO)
    }
}

// ============================================
// ON-CHAIN
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriterSettings {
    pub gas_price: GasPriceSource,
    /// Fixed gas limit; `None` estimates per call
    pub gas_limit: Option<u64>,
    /// Wait this long for a receipt; `None` returns once broadcast
    pub receipt_timeout: Option<Duration>,
}

impl Default for WriterSettings {
    fn default() -> Self {
        Self {
            gas_price: GasPriceSource::default(),
            gas_limit: None,
            receipt_timeout: Some(Duration::from_secs(60)),
        }
    }
}

pub struct OnchainRegistryWriter {
    provider: DynProvider,
    registry: Address,
    signer: TxSigner,
    settings: WriterSettings,
    /// Next nonce to use; `None` forces a network resync. Held for the whole
    /// submission so writes never interleave, and empty while a write is in
    /// flight so a cancelled write also forces a resync.
    nonce: Mutex<Option<u64>>,
}

impl OnchainRegistryWriter {
    pub fn new(provider: DynProvider, registry: Address, signer: TxSigner, settings: WriterSettings) -> Self {
        Self {
            provider,
            registry,
            signer,
            settings,
            nonce: Mutex::new(None),
        }
    }

    pub fn sender(&self) -> Address {
        self.signer.address()
    }

    async fn gas_limit(&self, farm: Address, input: &[u8]) -> KeeperResult<u64> {
        if let Some(limit) = self.settings.gas_limit {
            return Ok(limit);
        }

        let tx = TransactionRequest::default()
            .from(self.sender())
            .to(self.registry)
            .input(Bytes::copy_from_slice(input).into());

        let estimate = self
            .provider
            .estimate_gas(tx)
            .await
            .map_err(|e| KeeperError::submission(farm, format!("gas estimation failed: {}", e)))?;

        Ok(estimate.saturating_mul(GAS_ESTIMATE_HEADROOM_PCT) / 100)
    }

    /// Next nonce including transactions still in the mempool
    async fn pending_nonce(&self, farm: Address) -> KeeperResult<u64> {
        let synced = self
            .provider
            .get_transaction_count(self.sender())
            .pending()
            .await
            .map_err(|e| KeeperError::submission(farm, format!("nonce lookup failed: {}", e)))?;
        debug!("Synced nonce for {:?}: {}", self.sender(), synced);
        Ok(synced)
    }

    async fn submit(&self, nonce_slot: &mut Option<u64>, farm: Address, input: Vec<u8>) -> KeeperResult<TxHash> {
        let nonce = match nonce_slot.take() {
            Some(nonce) => nonce,
            None => self.pending_nonce(farm).await?,
        };

        let gas_limit = self.gas_limit(farm, &input).await?;
        let gas_price = self.settings.gas_price.price(&self.provider).await;

        let raw = self
            .signer
            .sign_legacy(LegacyRequest {
                nonce,
                to: self.registry,
                input: input.into(),
                gas_limit,
                gas_price,
            })
            .await
            .map_err(|e| KeeperError::submission(farm, e))?;

        let pending = self
            .provider
            .send_raw_transaction(&raw)
            .await
            .map_err(|e| KeeperError::submission(farm, format!("broadcast failed: {}", e)))?;

        *nonce_slot = Some(nonce + 1);
        let tx_hash = *pending.tx_hash();
        debug!("Broadcast {:?} for farm {:?} (nonce {})", tx_hash, farm, nonce);

        let Some(timeout) = self.settings.receipt_timeout else {
            return Ok(tx_hash);
        };

        let receipt = pending
            .with_timeout(Some(timeout))
            .get_receipt()
            .await
            .map_err(|e| KeeperError::submission(farm, format!("no receipt for {:?}: {}", tx_hash, e)))?;

        if !receipt.status() {
            return Err(KeeperError::submission(farm, format!("transaction {:?} reverted", tx_hash)));
        }

        Ok(tx_hash)
    }
}

#[async_trait]
impl RegistryWriter for OnchainRegistryWriter {
    async fn update_farm_data(&self, farm: Address, tvl: U256, rewards: U256) -> KeeperResult<TxHash> {
        let start = Instant::now();
        let input = encode_update(farm, tvl, rewards);

        let mut nonce_slot = self.nonce.lock().await;
        let result = self.submit(&mut nonce_slot, farm, input).await;

        match &result {
            Ok(hash) => info!("📝 updateFarmData {:?} -> {:?} ({:?})", farm, hash, start.elapsed()),
            Err(e) => {
                // Broadcast state is unknown after a failure; refetch next time
                *nonce_slot = None;
                warn!("Registry write for {:?} failed: {}", farm, e);
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{B256, U64};
    use alloy_provider::ProviderBuilder;
    use alloy_transport::mock::Asserter;
    use tokio_test::{assert_err, assert_ok};

    const TEST_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn fixed_settings() -> WriterSettings {
        WriterSettings {
            gas_price: GasPriceSource::Fixed(gwei_to_wei(DEFAULT_GAS_PRICE_GWEI)),
            gas_limit: Some(100_000),
            receipt_timeout: None,
        }
    }

    fn writer_with(provider: DynProvider) -> OnchainRegistryWriter {
        let signer = TxSigner::from_key(TEST_KEY, 42220).unwrap();
        OnchainRegistryWriter::new(provider, DEFAULT_REGISTRY_ADDRESS, signer, fixed_settings())
    }

    fn mocked_writer(asserter: &Asserter) -> OnchainRegistryWriter {
        writer_with(ProviderBuilder::new().connect_mocked_client(asserter.clone()).erased())
    }

    #[tokio::test]
    async fn test_nonce_advances_locally_after_broadcast() {
        let asserter = Asserter::new();
        asserter.push_success(&U64::from(7u64));
        asserter.push_success(&B256::repeat_byte(0xaa));
        asserter.push_success(&B256::repeat_byte(0xbb));
        let writer = mocked_writer(&asserter);

        let first = assert_ok!(writer.update_farm_data(Address::repeat_byte(0x01), U256::from(1u64), U256::ZERO).await);
        let second = assert_ok!(writer.update_farm_data(Address::repeat_byte(0x02), U256::from(1u64), U256::ZERO).await);

        assert_eq!(first, B256::repeat_byte(0xaa));
        assert_eq!(second, B256::repeat_byte(0xbb));
        // one nonce lookup for both writes
        assert_eq!(*writer.nonce.lock().await, Some(9));
    }

    #[tokio::test]
    async fn test_failed_broadcast_resyncs_for_next_farm() {
        let asserter = Asserter::new();
        asserter.push_success(&U64::from(7u64));
        asserter.push_failure_msg("replacement transaction underpriced");
        // the pending count now includes the earlier transaction
        asserter.push_success(&U64::from(8u64));
        asserter.push_success(&B256::repeat_byte(0xcc));
        let writer = mocked_writer(&asserter);

        let err = assert_err!(writer.update_farm_data(Address::repeat_byte(0x01), U256::from(1u64), U256::ZERO).await);
        assert!(matches!(err, KeeperError::Submission { .. }));
        assert_eq!(*writer.nonce.lock().await, None);

        let hash = assert_ok!(writer.update_farm_data(Address::repeat_byte(0x02), U256::from(1u64), U256::ZERO).await);
        assert_eq!(hash, B256::repeat_byte(0xcc));
        assert_eq!(*writer.nonce.lock().await, Some(9));
    }

    #[tokio::test]
    async fn test_cancelled_write_forces_resync() {
        // Accepts connections but never answers, so the broadcast hangs
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let writer = writer_with(crate::chain::connect(&url).unwrap());
        *writer.nonce.lock().await = Some(5);

        let write = writer.update_farm_data(Address::repeat_byte(0x01), U256::from(1u64), U256::ZERO);
        assert!(tokio::time::timeout(Duration::from_millis(200), write).await.is_err());

        assert_eq!(*writer.nonce.lock().await, None);
        drop(listener);
    }

    #[test]
    fn test_update_calldata_layout() {
        let farm = Address::repeat_byte(0x11);
        let calldata = encode_update(farm, U256::from(2_500u64), U256::from(3u64));

        assert_eq!(calldata.len(), 4 + 3 * 32);
        assert_eq!(&calldata[..4], &IFarmRegistry::updateFarmDataCall::SELECTOR[..]);
        assert_eq!(&calldata[16..36], farm.as_slice());
        assert_eq!(U256::from_be_slice(&calldata[36..68]), U256::from(2_500u64));
        assert_eq!(U256::from_be_slice(&calldata[68..100]), U256::from(3u64));
    }

    #[tokio::test]
    async fn test_dry_run_returns_zero_hash() {
        let writer = DryRunWriter::new(DEFAULT_REGISTRY_ADDRESS);
        let hash = assert_ok!(
            writer
                .update_farm_data(Address::repeat_byte(0x01), U256::from(1u64), U256::ZERO)
                .await
        );
        assert_eq!(hash, TxHash::ZERO);
    }
}
