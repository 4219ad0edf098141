use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;

use super::QuoteSource;
use crate::error::FetchError;
use crate::portfolio::Quote;

const PROVIDER: &str = "YAHOO";
const CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

/// Yahoo Finance chart response
#[derive(Debug, Deserialize)]
struct YahooChartResponse {
    chart: ChartData,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    result: Option<Vec<ChartResult>>,
    error: Option<YahooError>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: Meta,
}

#[derive(Debug, Deserialize)]
struct Meta {
    #[serde(rename = "regularMarketPrice")]
    regular_market_price: Option<f64>,
    currency: Option<String>,
}

#[derive(Debug, Deserialize)]
struct YahooError {
    code: String,
    description: String,
}

/// Convert a `TICKER:EXCHANGE` symbol to Yahoo's suffix form
///
/// `INFY:NSE` → `INFY.NS`, `500325:BOM` → `500325.BO`; other exchanges keep
/// the bare ticker.
pub fn to_yahoo_symbol(symbol: &str) -> String {
    match symbol.split_once(':') {
        Some((ticker, "NSE")) => format!("{}.NS", ticker),
        Some((ticker, "BOM" | "BSE")) => format!("{}.BO", ticker),
        Some((ticker, _)) => ticker.to_string(),
        None => symbol.to_string(),
    }
}

/// Quote source backed by the Yahoo Finance chart endpoint
pub struct YahooSource {
    client: Client,
    base_url: String,
}

impl YahooSource {
    pub fn new() -> Result<Self, FetchError> {
        Self::with_base_url(CHART_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent("Mozilla/5.0 (compatible; QuotefolioBot/1.0)")
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl QuoteSource for YahooSource {
    fn id(&self) -> &'static str {
        PROVIDER
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, FetchError> {
        let yahoo_symbol = to_yahoo_symbol(symbol);
        info!("Fetching current price for {} from Yahoo Finance", yahoo_symbol);

        let url = format!("{}/{}", self.base_url, yahoo_symbol);
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().as_u16()));
        }

        let body = response.text().await?;
        parse_chart(symbol, &body)
    }
}

fn parse_chart(symbol: &str, body: &str) -> Result<Quote, FetchError> {
    let data: YahooChartResponse = serde_json::from_str(body)
        .map_err(|e| FetchError::Parse(format!("Yahoo Finance response: {}", e)))?;

    if let Some(error) = data.chart.error {
        return Err(FetchError::Provider {
            provider: PROVIDER.to_string(),
            message: format!("{} - {}", error.code, error.description),
        });
    }

    let result = data
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| FetchError::NotFound(symbol.to_string()))?;

    let price = result
        .meta
        .regular_market_price
        .ok_or_else(|| FetchError::Parse("no price data available".to_string()))?;

    let price = Decimal::from_f64(price)
        .ok_or_else(|| FetchError::Parse(format!("invalid price value {}", price)))?
        .normalize();

    Ok(Quote {
        price,
        pe_ratio: None,
        earnings: None,
        currency: result.meta.currency,
        source: PROVIDER.to_string(),
        fetched_at: Utc::now(),
    })
}
