//! Portfolio configuration
//!
//! Holdings and refresh settings are read from a TOML file. Every holding is
//! validated at load time so malformed definitions fail fast instead of
//! flowing into valuations.

use chrono::format::{Item, StrftimeItems};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::error::PortfolioError;
use crate::portfolio::snapshot::{DEFAULT_SERIES_LABEL_FORMAT, DEFAULT_SERIES_MAX_LEN};
use crate::portfolio::{HoldingStatic, SeriesOptions};
use crate::pricing::{FetchOptions, DEFAULT_MAX_CONCURRENT_FETCHES};
use crate::scheduler::SchedulerConfig;

/// Environment variable overriding the config file location
pub const CONFIG_ENV: &str = "QUOTEFOLIO_CONFIG";

/// Default refresh cadence in seconds
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 15;

/// Default per-symbol fetch timeout in milliseconds
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 10_000;

/// One `[[holdings]]` table as written in the file
#[derive(Debug, Clone, Deserialize)]
pub struct HoldingConfig {
    pub symbol: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub exchange: Option<String>,
    pub sector: String,
    pub purchase_price: Decimal,
    pub quantity: i64,
    #[serde(default)]
    pub purchase_date: Option<NaiveDate>,
}

impl HoldingConfig {
    fn to_holding(&self) -> Result<HoldingStatic, PortfolioError> {
        let quantity = u32::try_from(self.quantity).ok().filter(|q| *q > 0).ok_or_else(|| {
            PortfolioError::MalformedHoldingFailure {
                symbol: self.symbol.clone(),
                reason: format!("quantity must be a positive integer, got {}", self.quantity),
            }
        })?;

        let exchange = self.exchange.clone().unwrap_or_else(|| {
            self.symbol
                .split_once(':')
                .map(|(_, exchange)| exchange.to_string())
                .unwrap_or_default()
        });

        let holding = HoldingStatic::new(
            self.symbol.trim(),
            self.name.clone().unwrap_or_else(|| self.symbol.clone()),
            exchange,
            self.sector.trim(),
            self.purchase_price,
            quantity,
        )?;

        Ok(match self.purchase_date {
            Some(date) => holding.with_purchase_date(date),
            None => holding,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub refresh_interval_secs: u64,
    pub fetch_timeout_ms: u64,
    pub max_concurrent_fetches: usize,
    pub series_max_len: usize,
    pub series_label_format: String,
    /// Display order of sectors; declared sectors always appear in totals
    pub sectors: Vec<String>,
    pub holdings: Vec<HoldingConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            refresh_interval_secs: DEFAULT_REFRESH_INTERVAL_SECS,
            fetch_timeout_ms: DEFAULT_FETCH_TIMEOUT_MS,
            max_concurrent_fetches: DEFAULT_MAX_CONCURRENT_FETCHES,
            series_max_len: DEFAULT_SERIES_MAX_LEN,
            series_label_format: DEFAULT_SERIES_LABEL_FORMAT.to_string(),
            sectors: Vec::new(),
            holdings: Vec::new(),
        }
    }
}

impl Config {
    /// Parse and validate a TOML document
    pub fn parse(content: &str) -> Result<Self, PortfolioError> {
        let config: Config =
            toml::from_str(content).map_err(|e| PortfolioError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, PortfolioError> {
        debug!("Loading config from {}", path.display());
        let content = std::fs::read_to_string(path).map_err(|e| {
            PortfolioError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    pub fn validate(&self) -> Result<(), PortfolioError> {
        if self.refresh_interval_secs == 0 {
            return Err(PortfolioError::Config(
                "refresh_interval_secs must be positive".into(),
            ));
        }
        if self.fetch_timeout_ms == 0 {
            return Err(PortfolioError::Config("fetch_timeout_ms must be positive".into()));
        }
        if self.max_concurrent_fetches == 0 {
            return Err(PortfolioError::Config(
                "max_concurrent_fetches must be positive".into(),
            ));
        }
        if self.series_max_len == 0 {
            return Err(PortfolioError::Config("series_max_len must be positive".into()));
        }
        if StrftimeItems::new(&self.series_label_format).any(|item| matches!(item, Item::Error)) {
            return Err(PortfolioError::Config(format!(
                "invalid series_label_format '{}'",
                self.series_label_format
            )));
        }

        let mut seen = HashSet::new();
        for holding in &self.holdings {
            holding.to_holding()?;
            if !seen.insert(holding.symbol.trim()) {
                return Err(PortfolioError::MalformedHoldingFailure {
                    symbol: holding.symbol.clone(),
                    reason: "duplicate symbol".to_string(),
                });
            }
        }

        Ok(())
    }

    pub fn holdings(&self) -> Result<Vec<HoldingStatic>, PortfolioError> {
        self.holdings.iter().map(HoldingConfig::to_holding).collect()
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            interval: Duration::from_secs(self.refresh_interval_secs),
            fetch: FetchOptions {
                timeout: Duration::from_millis(self.fetch_timeout_ms),
                max_concurrent: self.max_concurrent_fetches,
            },
            series: SeriesOptions {
                max_len: self.series_max_len,
                label_format: self.series_label_format.clone(),
            },
            declared_sectors: self.sectors.clone(),
        }
    }
}

/// Config location: `QUOTEFOLIO_CONFIG`, else `<config dir>/quotefolio/portfolio.toml`
pub fn default_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }
    dir_spec::config_home().map(|dir| dir.join("quotefolio").join("portfolio.toml"))
}

/// Starter portfolio written by `quotefolio init`
pub const SAMPLE_CONFIG: &str = r#"# Quotefolio portfolio definition
refresh_interval_secs = 15
fetch_timeout_ms = 10000
max_concurrent_fetches = 5
series_max_len = 12
sectors = ["Technology", "Financials", "Energy", "Consumer", "Healthcare"]

[[holdings]]
symbol = "INFY:NSE"
name = "Infosys Ltd"
sector = "Technology"
purchase_price = 1400
quantity = 10
purchase_date = "2023-11-15"

[[holdings]]
symbol = "TCS:NSE"
name = "TCS Ltd"
sector = "Technology"
purchase_price = 3200
quantity = 5
purchase_date = "2023-09-22"

[[holdings]]
symbol = "TECHM:NSE"
name = "Tech Mahindra"
sector = "Technology"
purchase_price = 1200
quantity = 8
purchase_date = "2024-01-10"

[[holdings]]
symbol = "WIPRO:NSE"
name = "Wipro Ltd"
sector = "Technology"
purchase_price = 450
quantity = 20
purchase_date = "2023-12-05"

[[holdings]]
symbol = "HDFCBANK:NSE"
name = "HDFC Bank"
sector = "Financials"
purchase_price = 1500
quantity = 5
purchase_date = "2023-10-18"

[[holdings]]
symbol = "ICICIBANK:NSE"
name = "ICICI Bank"
sector = "Financials"
purchase_price = 950
quantity = 12
purchase_date = "2024-02-20"

[[holdings]]
symbol = "SBIN:NSE"
name = "SBI"
sector = "Financials"
purchase_price = 620
quantity = 15
purchase_date = "2023-08-30"

[[holdings]]
symbol = "RELIANCE:NSE"
name = "Reliance Industries"
sector = "Energy"
purchase_price = 2500
quantity = 8
purchase_date = "2023-07-12"

[[holdings]]
symbol = "ONGC:NSE"
name = "ONGC"
sector = "Energy"
purchase_price = 180
quantity = 40
purchase_date = "2024-03-05"

[[holdings]]
symbol = "ITC:NSE"
name = "ITC Ltd"
sector = "Consumer"
purchase_price = 420
quantity = 30
purchase_date = "2023-11-28"

[[holdings]]
symbol = "HINDUNILVR:NSE"
name = "Hindustan Unilever"
sector = "Consumer"
purchase_price = 2600
quantity = 4
purchase_date = "2024-01-15"

[[holdings]]
symbol = "DRREDDY:NSE"
name = "Dr Reddy's Labs"
sector = "Healthcare"
purchase_price = 5800
quantity = 2
purchase_date = "2023-12-22"

[[holdings]]
symbol = "SUNPHARMA:NSE"
name = "Sun Pharma"
sector = "Healthcare"
purchase_price = 1150
quantity = 10
purchase_date = "2024-02-08"
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_sample_config_is_valid() {
        let config = Config::parse(SAMPLE_CONFIG).unwrap();
        let holdings = config.holdings().unwrap();

        assert_eq!(holdings.len(), 13);
        assert_eq!(holdings[0].symbol, "INFY:NSE");
        assert_eq!(holdings[0].exchange, "NSE");
        assert_eq!(holdings[0].purchase_price, dec!(1400));
        assert_eq!(holdings[0].purchase_date, NaiveDate::from_ymd_opt(2023, 11, 15));
        assert_eq!(config.sectors.len(), 5);
    }

    #[test]
    fn test_defaults_apply() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.refresh_interval_secs, 15);
        assert_eq!(config.series_max_len, DEFAULT_SERIES_MAX_LEN);
        assert!(config.holdings.is_empty());

        let scheduler = config.scheduler_config();
        assert_eq!(scheduler.interval, Duration::from_secs(15));
        assert_eq!(scheduler.fetch.timeout, Duration::from_millis(10_000));
    }

    #[test]
    fn test_negative_quantity_is_malformed() {
        let toml = r#"
            [[holdings]]
            symbol = "ITC:NSE"
            sector = "Consumer"
            purchase_price = 420
            quantity = -3
        "#;
        let err = Config::parse(toml).unwrap_err();
        assert!(matches!(err, PortfolioError::MalformedHoldingFailure { .. }));
    }

    #[test]
    fn test_zero_price_is_malformed() {
        let toml = r#"
            [[holdings]]
            symbol = "ITC:NSE"
            sector = "Consumer"
            purchase_price = 0
            quantity = 3
        "#;
        let err = Config::parse(toml).unwrap_err();
        assert!(err.to_string().contains("purchase price must be positive"));
    }

    #[test]
    fn test_duplicate_symbol_rejected() {
        let toml = r#"
            [[holdings]]
            symbol = "ITC:NSE"
            sector = "Consumer"
            purchase_price = 420
            quantity = 3

            [[holdings]]
            symbol = "ITC:NSE"
            sector = "Consumer"
            purchase_price = 410
            quantity = 1
        "#;
        let err = Config::parse(toml).unwrap_err();
        assert!(err.to_string().contains("duplicate symbol"));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let err = Config::parse("refresh_interval_secs = 0").unwrap_err();
        assert!(matches!(err, PortfolioError::Config(_)));
    }

    #[test]
    fn test_bad_label_format_rejected() {
        let err = Config::parse(r#"series_label_format = "%Q""#).unwrap_err();
        assert!(err.to_string().contains("series_label_format"));
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(Config::parse("refresh_every = 3").is_err());
    }

    #[test]
    fn test_fractional_purchase_price() {
        let toml = r#"
            [[holdings]]
            symbol = "SBIN:NSE"
            sector = "Financials"
            purchase_price = "620.35"
            quantity = 15
        "#;
        let config = Config::parse(toml).unwrap();
        assert_eq!(config.holdings().unwrap()[0].purchase_price, dec!(620.35));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", SAMPLE_CONFIG).unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.holdings.len(), 13);
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load(Path::new("/nonexistent/quotefolio.toml")).unwrap_err();
        assert!(matches!(err, PortfolioError::Config(_)));
    }
}
