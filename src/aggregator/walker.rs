//! Farm chain walker
//!
//! Follows `externalStakingRewards` from a farm's entry contract. Each hop is
//! one `read_link` round trip, pulled lazily by the consumer.

use alloy_primitives::Address;
use futures::stream::{self, Stream};
use std::sync::Arc;
use tracing::trace;

use crate::chain::{ChainReader, FarmLinkNode, FarmLinkRead};
use crate::errors::{KeeperError, KeeperResult};

/// Hop cap guarding against cyclic or malformed chains
pub const DEFAULT_MAX_HOPS: usize = 50;

#[derive(Clone)]
pub struct FarmChainWalker {
    reader: Arc<dyn ChainReader>,
    max_hops: usize,
}

impl FarmChainWalker {
    pub fn new(reader: Arc<dyn ChainReader>, max_hops: usize) -> Self {
        Self { reader, max_hops }
    }

    /// Lazy, finite sequence of hops rooted at `entry`.
    ///
    /// Ends after the first hop without a next pointer. A read error is
    /// yielded once and ends the stream; so does [`KeeperError::ChainTooLong`]
    /// when a next hop exists past `max_hops` nodes.
    pub fn walk(&self, entry: Address) -> impl Stream<Item = KeeperResult<FarmLinkNode>> + Send + '_ {
        let reader = self.reader.as_ref();
        let limit = self.max_hops;

        stream::unfold(Some((entry, 0usize)), move |state| async move {
            let (current, visited) = state?;

            if visited >= limit {
                return Some((Err(KeeperError::ChainTooLong { entry, limit }), None));
            }

            match reader.read_link(current).await {
                Ok(FarmLinkRead { node, next_hop }) => {
                    trace!("hop {} of {:?}: {:?} -> {:?}", visited, entry, current, next_hop);
                    Some((Ok(node), next_hop.map(|next| (next, visited + 1))))
                }
                Err(e) => Some((Err(e), None)),
            }
        })
    }
}
