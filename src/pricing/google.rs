// Google Finance quote page scraper
//
// Reads the last price, P/E ratio and EPS from the server-rendered quote
// page (https://www.google.com/finance/quote/INFY:NSE). Symbols are already
// in Google's TICKER:EXCHANGE form.

use async_trait::async_trait;
use chrono::Utc;
use once_cell::sync::Lazy;
use reqwest::Client;
use rust_decimal::Decimal;
use scraper::{Html, Selector};
use std::str::FromStr;
use tracing::info;

use super::QuoteSource;
use crate::error::FetchError;
use crate::portfolio::Quote;

const PROVIDER: &str = "GOOGLE";
const QUOTE_URL: &str = "https://www.google.com/finance/quote";

static PRICE_SEL: Lazy<Option<Selector>> = Lazy::new(|| Selector::parse("div.YMlKec.fxKbKc").ok());
static ROW_SEL: Lazy<Option<Selector>> = Lazy::new(|| Selector::parse("div.gyFHrc").ok());
static ROW_LABEL_SEL: Lazy<Option<Selector>> = Lazy::new(|| Selector::parse("div.mfs7Fc").ok());
static ROW_VALUE_SEL: Lazy<Option<Selector>> = Lazy::new(|| Selector::parse("div.P6K39c").ok());
static TABLE_ROW_SEL: Lazy<Option<Selector>> = Lazy::new(|| Selector::parse("tr.roXhBd").ok());
static TABLE_LABEL_SEL: Lazy<Option<Selector>> = Lazy::new(|| Selector::parse("div.rsPbEe").ok());
static TABLE_VALUE_SEL: Lazy<Option<Selector>> = Lazy::new(|| Selector::parse("td.QXDnM").ok());

/// Quote source scraping the Google Finance quote page
pub struct GoogleFinanceSource {
    client: Client,
    base_url: String,
}

impl GoogleFinanceSource {
    pub fn new() -> Result<Self, FetchError> {
        Self::with_base_url(QUOTE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent("Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36")
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl QuoteSource for GoogleFinanceSource {
    fn id(&self) -> &'static str {
        PROVIDER
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, FetchError> {
        info!("Fetching quote page for {} from Google Finance", symbol);

        let url = format!("{}/{}", self.base_url, symbol);
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().as_u16()));
        }

        let html = response.text().await?;
        parse_quote_page(symbol, &html)
    }
}

/// Parse a numeric cell such as "₹1,580.50", "24.53" or "-" (absent)
fn parse_number(text: &str) -> Option<Decimal> {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    if cleaned.is_empty() || cleaned == "-" {
        return None;
    }
    Decimal::from_str(&cleaned).ok()
}

fn text_of(element: scraper::ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Collect (label, value) pairs from the "About" panel and financials table
fn collect_pairs(document: &Html) -> Vec<(String, String)> {
    let mut pairs = Vec::new();

    let layouts = [
        (&*ROW_SEL, &*ROW_LABEL_SEL, &*ROW_VALUE_SEL),
        (&*TABLE_ROW_SEL, &*TABLE_LABEL_SEL, &*TABLE_VALUE_SEL),
    ];

    for (row, label, value) in layouts {
        let (Some(row), Some(label), Some(value)) = (row, label, value) else {
            continue;
        };
        for item in document.select(row) {
            let label_text = item.select(label).next().map(text_of);
            let value_text = item.select(value).next().map(text_of);
            if let (Some(l), Some(v)) = (label_text, value_text) {
                pairs.push((l, v));
            }
        }
    }

    pairs
}

fn find_value<'a>(pairs: &'a [(String, String)], keys: &[&str]) -> Option<&'a str> {
    pairs.iter().find_map(|(label, value)| {
        let label = label.to_ascii_lowercase();
        keys.iter()
            .any(|key| label.starts_with(key))
            .then_some(value.as_str())
    })
}

fn parse_quote_page(symbol: &str, html: &str) -> Result<Quote, FetchError> {
    let document = Html::parse_document(html);

    let price = PRICE_SEL
        .as_ref()
        .and_then(|sel| document.select(sel).next())
        .map(text_of)
        .ok_or_else(|| FetchError::NotFound(symbol.to_string()))?;
    let price = parse_number(&price)
        .ok_or_else(|| FetchError::Parse(format!("unreadable price '{}'", price)))?;

    let pairs = collect_pairs(&document);

    let pe_ratio = find_value(&pairs, &["p/e ratio"])
        .and_then(parse_number)
        .filter(|pe| !pe.is_zero());

    let earnings = find_value(&pairs, &["earnings per share", "eps"])
        .filter(|v| parse_number(v).is_some())
        .map(str::to_string);

    Ok(Quote {
        price,
        pe_ratio,
        earnings,
        currency: None,
        source: PROVIDER.to_string(),
        fetched_at: Utc::now(),
    })
}
