//! Subgraph price index client
//!
//! Pulls `{id, symbol, name, decimals, price}` records from a Graph-style
//! GraphQL endpoint. The price field is aliased to `derivedPriceUSD` in the
//! query so the response shape is fixed regardless of which field is priced.

use async_trait::async_trait;
use chrono::Utc;
use eyre::Result;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::{PriceSnapshot, PriceSource};
use crate::errors::{KeeperError, KeeperResult};
use crate::tokens::{TokenAddress, TokenInfo};

// ============================================
// CONSTANTS
// ============================================

/// Ubeswap subgraph used by the reference deployment
pub const DEFAULT_PRICE_INDEX_URL: &str = "https://api.thegraph.com/subgraphs/name/ubeswap/ubeswap";

/// Price field queried from the subgraph `Token` entity
pub const DEFAULT_PRICE_FIELD: &str = "derivedCUSD";

/// Records per page (`first:` argument)
pub const DEFAULT_PAGE_SIZE: usize = 200;

/// Hard stop on pagination
pub const DEFAULT_MAX_TOKENS: usize = 1000;

/// Timeout for API calls
pub const DEFAULT_API_TIMEOUT_SECS: u64 = 30;

// ============================================
// API RESPONSE TYPES
// ============================================

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<TokensData>,
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Deserialize)]
struct TokensData {
    tokens: Vec<TokenRecord>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct TokenRecord {
    id: String,
    #[serde(default)]
    symbol: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    decimals: Value,
    #[serde(rename = "derivedPriceUSD", default)]
    derived_price_usd: Value,
}

impl TokenRecord {
    /// Convert into a typed record; `None` when the id, decimals or price is unusable
    fn into_token_info(self) -> Option<TokenInfo> {
        let address = match TokenAddress::normalize(&self.id) {
            Ok(a) => a,
            Err(e) => {
                debug!("Dropping price record: {}", e);
                return None;
            }
        };

        let decimals = value_as_f64(&self.decimals)
            .filter(|d| d.fract() == 0.0 && (0.0..=77.0).contains(d))
            .map(|d| d as u8);
        let price = value_as_f64(&self.derived_price_usd)
            .filter(|p| p.is_finite() && *p >= 0.0);

        match (decimals, price) {
            (Some(decimals), Some(derived_price_usd)) => Some(TokenInfo {
                address,
                symbol: self.symbol.unwrap_or_default(),
                name: self.name.unwrap_or_default(),
                decimals,
                derived_price_usd,
            }),
            _ => {
                debug!(
                    "Dropping price record for {}: decimals={} price={}",
                    address, self.decimals, self.derived_price_usd
                );
                None
            }
        }
    }
}

/// Subgraphs serialize BigInt/BigDecimal as strings; accept either form
fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

// ============================================
// CLIENT
// ============================================

#[derive(Debug, Clone)]
pub struct SubgraphSettings {
    pub url: String,
    pub price_field: String,
    pub page_size: usize,
    pub max_tokens: usize,
    pub timeout: Duration,
}

impl Default for SubgraphSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_PRICE_INDEX_URL.to_string(),
            price_field: DEFAULT_PRICE_FIELD.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout: Duration::from_secs(DEFAULT_API_TIMEOUT_SECS),
        }
    }
}

pub struct SubgraphPriceIndex {
    http_client: Client,
    settings: SubgraphSettings,
}

impl SubgraphPriceIndex {
    pub fn new(settings: SubgraphSettings) -> Result<Self> {
        let http_client = Client::builder().timeout(settings.timeout).build()?;
        Ok(Self {
            http_client,
            settings,
        })
    }

    fn page_query(&self, skip: usize) -> String {
        format!(
            "{{ tokens(first: {}, skip: {}, subgraphError: allow) {{ id symbol name decimals derivedPriceUSD: {} }} }}",
            self.settings.page_size, skip, self.settings.price_field
        )
    }

    async fn fetch_page(&self, skip: usize) -> KeeperResult<Vec<TokenRecord>> {
        let body = json!({ "query": self.page_query(skip) });

        let response: GraphQlResponse = self
            .http_client
            .post(&self.settings.url)
            .json(&body)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| KeeperError::cycle_dependency("price index", e))?
            .json()
            .await
            .map_err(|e| KeeperError::cycle_dependency("price index", e))?;

        let messages: Vec<String> = response
            .errors
            .unwrap_or_default()
            .into_iter()
            .map(|e| e.message)
            .collect();

        match response.data {
            Some(data) => {
                if !messages.is_empty() {
                    warn!(
                        "Price index returned partial data ({} errors): {}",
                        messages.len(),
                        messages.join("; ")
                    );
                }
                Ok(data.tokens)
            }
            None => Err(KeeperError::cycle_dependency(
                "price index",
                if messages.is_empty() {
                    "response carried no data".to_string()
                } else {
                    messages.join("; ")
                },
            )),
        }
    }
}

#[async_trait]
impl PriceSource for SubgraphPriceIndex {
    async fn snapshot(&self) -> KeeperResult<PriceSnapshot> {
        let start = Instant::now();
        let mut infos = Vec::new();
        let mut skip = 0;
        let mut dropped = 0;

        loop {
            let page = self.fetch_page(skip).await?;
            let page_len = page.len();

            for record in page {
                match record.into_token_info() {
                    Some(info) => infos.push(info),
                    None => dropped += 1,
                }
            }

            skip += page_len;
            if page_len < self.settings.page_size || skip >= self.settings.max_tokens {
                break;
            }
        }

        info!(
            "💲 Price snapshot: {} tokens in {:?} ({} records dropped)",
            infos.len(),
            start.elapsed(),
            dropped
        );

        Ok(PriceSnapshot::new(infos, Utc::now()))
    }
}

// ============================================
// TESTS
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    fn record(json: Value) -> TokenRecord {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_record_accepts_string_numbers() {
        let info = record(json!({
            "id": "0x765DE816845861E75A25FCA122BB6898B8B1282A",
            "symbol": "cUSD",
            "name": "Celo Dollar",
            "decimals": "18",
            "derivedPriceUSD": "1.0012"
        }))
        .into_token_info()
        .unwrap();

        assert_eq!(info.decimals, 18);
        assert_eq!(info.derived_price_usd, 1.0012);
        assert_eq!(
            info.address.to_string(),
            "0x765de816845861e75a25fca122bb6898b8b1282a"
        );
    }

    #[test]
    fn test_record_accepts_json_numbers() {
        let info = record(json!({
            "id": "0x00be915b9dcf56a3cbe739d9b9c202ca692409ec",
            "decimals": 18,
            "derivedPriceUSD": 0.25
        }))
        .into_token_info()
        .unwrap();

        assert_eq!(info.symbol, "");
        assert_eq!(info.derived_price_usd, 0.25);
    }

    #[test]
    fn test_record_rejects_unusable_fields() {
        let bad_id = record(json!({ "id": "ubeswap", "decimals": "18", "derivedPriceUSD": "1" }));
        assert!(bad_id.into_token_info().is_none());

        let bad_decimals = record(json!({
            "id": "0x00be915b9dcf56a3cbe739d9b9c202ca692409ec",
            "decimals": "eighteen",
            "derivedPriceUSD": "1"
        }));
        assert!(bad_decimals.into_token_info().is_none());

        let missing_price = record(json!({
            "id": "0x00be915b9dcf56a3cbe739d9b9c202ca692409ec",
            "decimals": "18"
        }));
        assert!(missing_price.into_token_info().is_none());
    }

    #[test]
    fn test_partial_response_parses() {
        let response: GraphQlResponse = serde_json::from_value(json!({
            "data": { "tokens": [
                { "id": "0x00be915b9dcf56a3cbe739d9b9c202ca692409ec", "decimals": "18", "derivedPriceUSD": "0.3" }
            ]},
            "errors": [{ "message": "indexing_error" }]
        }))
        .unwrap();

        assert_eq!(response.data.unwrap().tokens.len(), 1);
        assert_eq!(response.errors.unwrap()[0].message, "indexing_error");
    }

    #[test]
    fn test_query_aliases_price_field() {
        let index = SubgraphPriceIndex::new(SubgraphSettings::default()).unwrap();
        let query = index.page_query(400);
        assert!(query.contains("first: 200"));
        assert!(query.contains("skip: 400"));
        assert!(query.contains("derivedPriceUSD: derivedCUSD"));
        assert!(query.contains("subgraphError: allow"));
    }
}
