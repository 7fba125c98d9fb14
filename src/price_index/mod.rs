//! Price Index
//!
//! Responsible for:
//! - Fetching a point-in-time token price snapshot once per cycle
//! - Resolving raw on-chain token addresses to decimals + USD price

mod client;
mod resolver;

pub use client::{
    SubgraphPriceIndex, SubgraphSettings, DEFAULT_API_TIMEOUT_SECS, DEFAULT_MAX_TOKENS, DEFAULT_PAGE_SIZE,
    DEFAULT_PRICE_FIELD, DEFAULT_PRICE_INDEX_URL,
};
pub use resolver::{PriceResolver, ResolvedPrice, StableReference};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::errors::KeeperResult;
use crate::tokens::{TokenAddress, TokenInfo};

/// Anything that can produce a fresh price snapshot
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn snapshot(&self) -> KeeperResult<PriceSnapshot>;
}

/// Read-only token table for one cycle
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSnapshot {
    tokens: HashMap<TokenAddress, TokenInfo>,
    pub fetched_at: DateTime<Utc>,
}

impl PriceSnapshot {
    pub fn new(records: impl IntoIterator<Item = TokenInfo>, fetched_at: DateTime<Utc>) -> Self {
        let tokens = records
            .into_iter()
            .map(|info| (info.address, info))
            .collect();
        Self { tokens, fetched_at }
    }

    pub fn get(&self, token: &TokenAddress) -> Option<&TokenInfo> {
        self.tokens.get(token)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}
