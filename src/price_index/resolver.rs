//! Token price resolution against a cycle's snapshot
//!
//! Order of operations: normalize → substitute → stable shortcut → lookup.

use std::sync::Arc;

use super::PriceSnapshot;
use crate::errors::{KeeperError, KeeperResult};
use crate::tokens::{SubstitutionTable, TokenAddress, DEFAULT_STABLE_DECIMALS, DEFAULT_STABLE_REFERENCE};

/// The USD-pegged asset that always prices at exactly 1.0
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StableReference {
    pub address: TokenAddress,
    /// Used only when the snapshot has no record for the reference
    pub fallback_decimals: u8,
}

impl Default for StableReference {
    fn default() -> Self {
        Self {
            address: TokenAddress::from(DEFAULT_STABLE_REFERENCE),
            fallback_decimals: DEFAULT_STABLE_DECIMALS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedPrice {
    /// Address the price was taken from (after substitution)
    pub priced_as: TokenAddress,
    pub decimals: u8,
    pub price_usd: f64,
}

#[derive(Debug, Clone)]
pub struct PriceResolver {
    snapshot: Arc<PriceSnapshot>,
    substitutions: Arc<SubstitutionTable>,
    stable: StableReference,
}

impl PriceResolver {
    pub fn new(
        snapshot: Arc<PriceSnapshot>,
        substitutions: Arc<SubstitutionTable>,
        stable: StableReference,
    ) -> Self {
        Self {
            snapshot,
            substitutions,
            stable,
        }
    }

    pub fn resolve(&self, token: impl Into<TokenAddress>) -> KeeperResult<ResolvedPrice> {
        let requested = token.into();
        let priced_as = self.substitutions.resolve(requested);

        if priced_as == self.stable.address {
            let decimals = self
                .snapshot
                .get(&priced_as)
                .map(|info| info.decimals)
                .unwrap_or(self.stable.fallback_decimals);
            return Ok(ResolvedPrice {
                priced_as,
                decimals,
                price_usd: 1.0,
            });
        }

        self.snapshot
            .get(&priced_as)
            .map(|info| ResolvedPrice {
                priced_as,
                decimals: info.decimals,
                price_usd: info.derived_price_usd,
            })
            .ok_or(KeeperError::MissingPriceData(requested))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokens::TokenInfo;
    use chrono::Utc;

    const UBE: &str = "0x00be915b9dcf56a3cbe739d9b9c202ca692409ec";
    const MCUSD: &str = "0x64defa3544c695db8c535d289d843a189aa26b98";

    fn info(addr: &str, decimals: u8, price: f64) -> TokenInfo {
        TokenInfo {
            address: TokenAddress::normalize(addr).unwrap(),
            symbol: String::new(),
            name: String::new(),
            decimals,
            derived_price_usd: price,
        }
    }

    fn resolver(records: Vec<TokenInfo>, substitutions: SubstitutionTable) -> PriceResolver {
        PriceResolver::new(
            Arc::new(PriceSnapshot::new(records, Utc::now())),
            Arc::new(substitutions),
            StableReference::default(),
        )
    }

    #[test]
    fn test_case_variants_resolve_identically() {
        let r = resolver(vec![info(UBE, 18, 0.42)], SubstitutionTable::new());

        let lower = r.resolve(TokenAddress::normalize(UBE).unwrap()).unwrap();
        let upper = r
            .resolve(TokenAddress::normalize(&UBE.to_uppercase().replace("0X", "0x")).unwrap())
            .unwrap();

        assert_eq!(lower, upper);
        assert_eq!(lower.price_usd, 0.42);
    }

    #[test]
    fn test_stable_reference_is_always_one() {
        let stable = StableReference::default();

        // Index claims a depeg; ignored
        let with_record = resolver(
            vec![info(&stable.address.to_string(), 18, 0.97)],
            SubstitutionTable::new(),
        );
        assert_eq!(with_record.resolve(stable.address).unwrap().price_usd, 1.0);

        // No record at all
        let empty = resolver(vec![], SubstitutionTable::new());
        let resolved = empty.resolve(stable.address).unwrap();
        assert_eq!(resolved.price_usd, 1.0);
        assert_eq!(resolved.decimals, DEFAULT_STABLE_DECIMALS);
    }

    #[test]
    fn test_substitution_applies_before_lookup() {
        let mut table = SubstitutionTable::new();
        table.insert(
            TokenAddress::normalize(MCUSD).unwrap(),
            StableReference::default().address,
        );
        let wrapped_ube = TokenAddress::normalize("0x1111111111111111111111111111111111111111").unwrap();
        table.insert(wrapped_ube, TokenAddress::normalize(UBE).unwrap());

        let r = resolver(vec![info(UBE, 18, 0.42)], table);

        assert_eq!(r.resolve(TokenAddress::normalize(MCUSD).unwrap()).unwrap().price_usd, 1.0);
        let sub = r.resolve(wrapped_ube).unwrap();
        assert_eq!(sub.price_usd, 0.42);
        assert_eq!(sub.priced_as, TokenAddress::normalize(UBE).unwrap());
    }

    #[test]
    fn test_missing_token_is_missing_price_data() {
        let r = resolver(vec![], SubstitutionTable::new());
        let token = TokenAddress::normalize(UBE).unwrap();
        assert_eq!(r.resolve(token), Err(KeeperError::MissingPriceData(token)));
    }
}
