//! Farm discovery from the registry's `FarmInfo` events

use alloy_primitives::Address;
use alloy_provider::{DynProvider, Provider};
use alloy_rpc_types::{Filter, Log};
use alloy_sol_types::SolEvent;
use async_trait::async_trait;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::{dedupe_farms, parse_bytes32_name, Farm, FarmSource};
use crate::chain::IFarmRegistry;
use crate::errors::{KeeperError, KeeperResult};

/// First block scanned by the reference deployment
pub const DEFAULT_FROM_BLOCK: u64 = 9_700_000;

/// Blocks per `eth_getLogs` request; 0 scans the whole range at once
pub const DEFAULT_LOG_BLOCK_RANGE: u64 = 1_000_000;

/// Limit for each `eth_blockNumber` / `eth_getLogs` request
pub const DEFAULT_LOG_REQUEST_TIMEOUT_SECS: u64 = 60;

pub struct EventFarmSource {
    provider: DynProvider,
    registry: Address,
    from_block: u64,
    block_range: u64,
    request_timeout: Duration,
}

impl EventFarmSource {
    pub fn new(provider: DynProvider, registry: Address, from_block: u64, block_range: u64) -> Self {
        Self {
            provider,
            registry,
            from_block,
            block_range,
            request_timeout: Duration::from_secs(DEFAULT_LOG_REQUEST_TIMEOUT_SECS),
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Run one RPC request under the request timeout
    async fn request<T, E, Fut>(&self, what: String, call: Fut) -> KeeperResult<T>
    where
        E: std::fmt::Display,
        Fut: Future<Output = Result<T, E>>,
    {
        match tokio::time::timeout(self.request_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(KeeperError::cycle_dependency("farm events", format!("{}: {}", what, e))),
            Err(_) => Err(KeeperError::cycle_dependency(
                "farm events",
                format!("{}: timed out after {:?}", what, self.request_timeout),
            )),
        }
    }

    /// Scan all registrations, reporting `(blocks_done, blocks_total)` per chunk
    pub async fn scan_with_progress<F>(&self, mut progress: F) -> KeeperResult<Vec<Farm>>
    where
        F: FnMut(u64, u64) + Send,
    {
        let start = Instant::now();
        let latest = self
            .request("latest block".to_string(), self.provider.get_block_number())
            .await?;

        if latest < self.from_block {
            warn!("Latest block {} is before scan start {}", latest, self.from_block);
            return Ok(Vec::new());
        }

        let total = latest - self.from_block + 1;
        let mut farms = Vec::new();
        let mut chunk_start = self.from_block;

        while chunk_start <= latest {
            let end = chunk_end(chunk_start, latest, self.block_range);

            let filter = Filter::new()
                .address(self.registry)
                .event_signature(IFarmRegistry::FarmInfo::SIGNATURE_HASH)
                .from_block(chunk_start)
                .to_block(end);

            let logs = self
                .request(format!("blocks {}..={}", chunk_start, end), self.provider.get_logs(&filter))
                .await?;

            debug!("FarmInfo logs in {}..={}: {}", chunk_start, end, logs.len());
            farms.extend(logs.iter().filter_map(decode_farm_info));

            progress(end - self.from_block + 1, total);
            chunk_start = match end.checked_add(1) {
                Some(next) => next,
                None => break,
            };
        }

        let farms = dedupe_farms(farms);
        info!(
            "📜 Found {} registered farms in {} blocks ({:?})",
            farms.len(),
            total,
            start.elapsed()
        );
        Ok(farms)
    }
}

fn chunk_end(chunk_start: u64, latest: u64, block_range: u64) -> u64 {
    if block_range == 0 {
        latest
    } else {
        chunk_start.saturating_add(block_range - 1).min(latest)
    }
}

fn decode_farm_info(log: &Log) -> Option<Farm> {
    match log.log_decode::<IFarmRegistry::FarmInfo>() {
        Ok(decoded) => {
            let event = decoded.inner.data;
            Some(Farm {
                name: parse_bytes32_name(&event.farmName),
                address: event.stakingAddress,
            })
        }
        Err(e) => {
            warn!("Undecodable FarmInfo log {:?}: {}", log.transaction_hash, e);
            None
        }
    }
}

#[async_trait]
impl FarmSource for EventFarmSource {
    async fn farms(&self) -> KeeperResult<Vec<Farm>> {
        self.scan_with_progress(|_, _| {}).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, Bytes, LogData, B256};

    #[test]
    fn test_chunk_end_bounds() {
        assert_eq!(chunk_end(100, 1_000, 0), 1_000);
        assert_eq!(chunk_end(100, 1_000, 50), 149);
        assert_eq!(chunk_end(990, 1_000, 50), 1_000);
        assert_eq!(chunk_end(u64::MAX - 1, u64::MAX, 50), u64::MAX);
    }

    #[tokio::test]
    async fn test_hung_rpc_fails_scan_with_timeout() {
        // Accepts connections but never answers
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let source = EventFarmSource::new(
            crate::chain::connect(&url).unwrap(),
            Address::repeat_byte(0xa2),
            DEFAULT_FROM_BLOCK,
            DEFAULT_LOG_BLOCK_RANGE,
        )
        .with_request_timeout(Duration::from_millis(100));

        let scan = tokio::time::timeout(Duration::from_secs(5), source.farms()).await;
        let err = scan.expect("scan should give up on its own").unwrap_err();

        assert!(err.is_cycle_level());
        assert!(err.to_string().contains("timed out"));
        drop(listener);
    }

    #[test]
    fn test_decode_farm_info_log() {
        let staking = Address::repeat_byte(0x11);
        let lp = Address::repeat_byte(0x22);
        let mut name = [0u8; 32];
        name[..8].copy_from_slice(b"UBE-CELO");

        let data = LogData::new_unchecked(
            vec![
                IFarmRegistry::FarmInfo::SIGNATURE_HASH,
                staking.into_word(),
                B256::from(name),
                lp.into_word(),
            ],
            Bytes::new(),
        );
        let log = Log {
            inner: alloy_primitives::Log {
                address: Address::repeat_byte(0xa2),
                data,
            },
            ..Default::default()
        };

        let farm = decode_farm_info(&log).unwrap();
        assert_eq!(farm.address, staking);
        assert_eq!(farm.name, "UBE-CELO");
    }
}
