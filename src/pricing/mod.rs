// Pricing module - quote sources and concurrent fetching

pub mod google;
pub mod yahoo;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::error::FetchError;
use crate::portfolio::Quote;

/// Default per-symbol fetch timeout
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum concurrent quote requests to avoid rate limiting
pub const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 5;

/// A provider able to quote a single symbol.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Short provider identifier used in logs and on quotes ("YAHOO", "GOOGLE", ...)
    fn id(&self) -> &'static str;

    /// Fetch the latest quote for `symbol` (`TICKER:EXCHANGE` form)
    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, FetchError>;
}

/// Bounds applied to the fan-out of one pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    pub timeout: Duration,
    pub max_concurrent: usize,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_FETCH_TIMEOUT,
            max_concurrent: DEFAULT_MAX_CONCURRENT_FETCHES,
        }
    }
}

/// Fetch one quote, treating an elapsed `timeout` as a fetch failure
pub async fn fetch_with_timeout(
    source: &dyn QuoteSource,
    symbol: &str,
    timeout: Duration,
) -> Result<Quote, FetchError> {
    match tokio::time::timeout(timeout, source.fetch_quote(symbol)).await {
        Ok(result) => result,
        Err(_) => Err(FetchError::Timeout(timeout.as_millis() as u64)),
    }
}

/// Fetch quotes for all `symbols` concurrently and wait for every one.
///
/// Results come back in the order of `symbols`. A task that dies without
/// reporting counts as a failed fetch for its symbol.
pub async fn fetch_all(
    source: Arc<dyn QuoteSource>,
    symbols: &[String],
    options: FetchOptions,
) -> Vec<Result<Quote, FetchError>> {
    let semaphore = Arc::new(Semaphore::new(options.max_concurrent.max(1)));
    let mut results: Vec<Result<Quote, FetchError>> = symbols
        .iter()
        .map(|symbol| {
            Err(FetchError::Provider {
                provider: source.id().to_string(),
                message: format!("fetch task for {} did not complete", symbol),
            })
        })
        .collect();

    // Use JoinSet to get results as they complete (not in spawn order)
    let mut join_set = JoinSet::new();

    for (index, symbol) in symbols.iter().enumerate() {
        let sem = semaphore.clone();
        let source = source.clone();
        let symbol = symbol.clone();

        join_set.spawn(async move {
            let result = match sem.acquire_owned().await {
                Ok(_permit) => fetch_with_timeout(source.as_ref(), &symbol, options.timeout).await,
                Err(_) => Err(FetchError::Provider {
                    provider: source.id().to_string(),
                    message: "fetch limiter closed".to_string(),
                }),
            };
            (index, symbol, result)
        });
    }

    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok((index, symbol, result)) => {
                match &result {
                    Ok(quote) => debug!("Fetched {} → {} ({})", symbol, quote.price, quote.source),
                    Err(e) => warn!("Failed to fetch quote for {}: {}", symbol, e),
                }
                results[index] = result;
            }
            Err(e) => warn!("Quote fetch task failed: {}", e),
        }
    }

    results
}

/// Tries each source in order; the first successful quote wins
pub struct FallbackSource {
    sources: Vec<Arc<dyn QuoteSource>>,
}

impl FallbackSource {
    pub fn new(sources: Vec<Arc<dyn QuoteSource>>) -> Self {
        Self { sources }
    }
}

#[async_trait]
impl QuoteSource for FallbackSource {
    fn id(&self) -> &'static str {
        "FALLBACK"
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, FetchError> {
        let mut last_error = FetchError::Provider {
            provider: self.id().to_string(),
            message: "no quote sources configured".to_string(),
        };

        for source in &self.sources {
            match source.fetch_quote(symbol).await {
                Ok(quote) => return Ok(quote),
                Err(e) => {
                    debug!("{} could not quote {}: {}", source.id(), symbol, e);
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }
}

/// Price from one source, P/E and earnings preferably from another.
///
/// The fundamentals lookup only gets what is left of `budget` once the price
/// has arrived, and a slow or failing fundamentals source never fails the
/// quote. When the price itself came from the fundamentals provider its
/// fields are used as-is instead of asking again.
pub struct EnrichedSource {
    price: Arc<dyn QuoteSource>,
    fundamentals: Arc<dyn QuoteSource>,
    budget: Duration,
}

impl EnrichedSource {
    pub fn new(
        price: Arc<dyn QuoteSource>,
        fundamentals: Arc<dyn QuoteSource>,
        budget: Duration,
    ) -> Self {
        Self {
            price,
            fundamentals,
            budget,
        }
    }
}

#[async_trait]
impl QuoteSource for EnrichedSource {
    fn id(&self) -> &'static str {
        "ENRICHED"
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, FetchError> {
        let started = Instant::now();
        let mut quote = self.price.fetch_quote(symbol).await?;

        if quote.source == self.fundamentals.id() {
            return Ok(quote);
        }

        let remaining = self.budget.saturating_sub(started.elapsed());
        if remaining.is_zero() {
            debug!("No time left for fundamentals of {}", symbol);
            return Ok(quote);
        }

        match tokio::time::timeout(remaining, self.fundamentals.fetch_quote(symbol)).await {
            Ok(Ok(extra)) => {
                quote.pe_ratio = extra.pe_ratio.or(quote.pe_ratio);
                quote.earnings = extra.earnings.or(quote.earnings);
            }
            Ok(Err(e)) => debug!(
                "No fundamentals for {} from {}: {}",
                symbol,
                self.fundamentals.id(),
                e
            ),
            Err(_) => debug!(
                "Fundamentals for {} from {} timed out after {} ms",
                symbol,
                self.fundamentals.id(),
                remaining.as_millis()
            ),
        }

        Ok(quote)
    }
}

/// Yahoo for prices (Google as fallback), Google for P/E and earnings.
///
/// Enrichment stops at 80% of `options.timeout` so a slow fundamentals page
/// can't push a priced symbol past its fetch timeout.
pub fn default_source(options: &FetchOptions) -> Result<Arc<dyn QuoteSource>, FetchError> {
    let yahoo: Arc<dyn QuoteSource> = Arc::new(yahoo::YahooSource::new()?);
    let google: Arc<dyn QuoteSource> = Arc::new(google::GoogleFinanceSource::new()?);

    Ok(Arc::new(EnrichedSource::new(
        Arc::new(FallbackSource::new(vec![yahoo, google.clone()])),
        google,
        options.timeout * 4 / 5,
    )))
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use rust_decimal::Decimal;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Scripted in-memory source for tests
    pub struct StaticSource {
        pub id: &'static str,
        pub prices: Mutex<HashMap<String, Result<Decimal, FetchError>>>,
        pub delay: Duration,
        pub calls: AtomicUsize,
    }

    impl StaticSource {
        pub fn new(id: &'static str, prices: &[(&str, Result<Decimal, FetchError>)]) -> Self {
            Self {
                id,
                prices: Mutex::new(
                    prices
                        .iter()
                        .map(|(s, p)| (s.to_string(), p.clone()))
                        .collect(),
                ),
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl QuoteSource for StaticSource {
        fn id(&self) -> &'static str {
            self.id
        }

        async fn fetch_quote(&self, symbol: &str) -> Result<Quote, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let entry = self.prices.lock().unwrap().get(symbol).cloned();
            match entry {
                Some(Ok(price)) => Ok(Quote::new(price, self.id)),
                Some(Err(e)) => Err(e),
                None => Err(FetchError::NotFound(symbol.to_string())),
            }
        }
    }
}
