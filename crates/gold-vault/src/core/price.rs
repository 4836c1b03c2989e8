//! Collateral price feed and short-TTL quote cache.

use std::str::FromStr;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::Utc;
use serde::Deserialize;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::errors::VaultError;
use crate::types::amount::is_positive;
use crate::types::PriceQuote;

/// Anything that can quote the collateral in debt-token terms.
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn get_price(&self, symbol: &str) -> Result<PriceQuote, VaultError>;
}

/// Ticker endpoint in the Binance `ticker/price` shape.
pub struct HttpPriceSource {
    client: reqwest::Client,
    url: String,
}

#[derive(Debug, Deserialize)]
struct TickerResponse {
    symbol: String,
    price: String,
}

impl HttpPriceSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, VaultError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VaultError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl PriceSource for HttpPriceSource {
    async fn get_price(&self, symbol: &str) -> Result<PriceQuote, VaultError> {
        let unavailable = |reason: String| VaultError::PriceUnavailable { reason };

        let ticker: TickerResponse = self
            .client
            .get(&self.url)
            .query(&[("symbol", symbol)])
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| unavailable(format!("{symbol}: {e}")))?
            .json()
            .await
            .map_err(|e| unavailable(format!("{symbol}: invalid ticker body: {e}")))?;

        let price = BigDecimal::from_str(&ticker.price)
            .map_err(|e| unavailable(format!("{symbol}: invalid price {:?}: {e}", ticker.price)))?;
        if !is_positive(&price) {
            return Err(unavailable(format!("{symbol}: non-positive price {price}")));
        }

        debug!(symbol = %ticker.symbol, %price, "price fetched");
        Ok(PriceQuote {
            symbol: ticker.symbol,
            price,
            as_of: Utc::now(),
        })
    }
}

struct CachedQuote {
    quote: Arc<PriceQuote>,
    fetched_at: Instant,
}

/// Serves one symbol's quote until `ttl` elapses, then fetches a new one
/// and swaps it in whole. Readers holding the old `Arc` keep a consistent
/// snapshot.
pub struct PriceCache {
    source: Arc<dyn PriceSource>,
    symbol: String,
    ttl: Duration,
    slot: RwLock<Option<CachedQuote>>,
}

impl PriceCache {
    pub fn new(source: Arc<dyn PriceSource>, symbol: impl Into<String>, ttl: Duration) -> Self {
        Self {
            source,
            symbol: symbol.into(),
            ttl,
            slot: RwLock::new(None),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Fresh quote, fetching through the source when the cached one is stale.
    pub async fn current(&self) -> Result<Arc<PriceQuote>, VaultError> {
        if let Some(quote) = self.fresh() {
            return Ok(quote);
        }

        let quote = match self.source.get_price(&self.symbol).await {
            Ok(q) => Arc::new(q),
            Err(e) => {
                warn!(symbol = %self.symbol, error = %e, "price refresh failed");
                return Err(e);
            }
        };

        if let Ok(mut slot) = self.slot.write() {
            *slot = Some(CachedQuote {
                quote: quote.clone(),
                fetched_at: Instant::now(),
            });
        }
        Ok(quote)
    }

    /// Last quote regardless of age.
    pub fn peek(&self) -> Option<Arc<PriceQuote>> {
        let slot = self.slot.read().ok()?;
        slot.as_ref().map(|c| c.quote.clone())
    }

    pub fn invalidate(&self) {
        if let Ok(mut slot) = self.slot.write() {
            *slot = None;
        }
    }

    fn fresh(&self) -> Option<Arc<PriceQuote>> {
        let slot = self.slot.read().ok()?;
        slot.as_ref()
            .filter(|c| c.fetched_at.elapsed() < self.ttl)
            .map(|c| c.quote.clone())
    }
}
