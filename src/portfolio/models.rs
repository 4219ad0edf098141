use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

use crate::error::{FetchError, PortfolioError};

/// Immutable facts about one position, fixed when the portfolio is defined
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoldingStatic {
    /// Quote symbol in `TICKER:EXCHANGE` form, e.g. `INFY:NSE`
    pub symbol: String,
    pub name: String,
    pub exchange: String,
    pub sector: String,
    pub purchase_price: Decimal,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purchase_date: Option<NaiveDate>,
}

impl HoldingStatic {
    /// Build a holding, rejecting definitions that can't be valued.
    pub fn new(
        symbol: impl Into<String>,
        name: impl Into<String>,
        exchange: impl Into<String>,
        sector: impl Into<String>,
        purchase_price: Decimal,
        quantity: u32,
    ) -> Result<Self, PortfolioError> {
        let holding = Self {
            symbol: symbol.into(),
            name: name.into(),
            exchange: exchange.into(),
            sector: sector.into(),
            purchase_price,
            quantity,
            purchase_date: None,
        };
        holding.validate()?;
        Ok(holding)
    }

    pub fn with_purchase_date(mut self, date: NaiveDate) -> Self {
        self.purchase_date = Some(date);
        self
    }

    pub fn validate(&self) -> Result<(), PortfolioError> {
        let malformed = |reason: &str| PortfolioError::MalformedHoldingFailure {
            symbol: self.symbol.clone(),
            reason: reason.to_string(),
        };

        if self.symbol.trim().is_empty() {
            return Err(malformed("symbol must not be empty"));
        }
        if self.sector.trim().is_empty() {
            return Err(malformed("sector must not be empty"));
        }
        if self.purchase_price <= Decimal::ZERO {
            return Err(malformed("purchase price must be positive"));
        }
        if self.quantity == 0 {
            return Err(malformed("quantity must be positive"));
        }
        Ok(())
    }

    /// Amount paid for the position: purchase price × quantity
    pub fn investment(&self) -> Decimal {
        self.purchase_price * Decimal::from(self.quantity)
    }
}

/// Market reading for one symbol, valid for a single refresh pass
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quote {
    pub price: Decimal,
    pub pe_ratio: Option<Decimal>,
    pub earnings: Option<String>,
    pub currency: Option<String>,
    /// Provider id that supplied the price
    pub source: String,
    pub fetched_at: DateTime<Utc>,
}

impl Quote {
    pub fn new(price: Decimal, source: impl Into<String>) -> Self {
        Self {
            price,
            pe_ratio: None,
            earnings: None,
            currency: None,
            source: source.into(),
            fetched_at: Utc::now(),
        }
    }
}

/// A holding valued against a fresh quote
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValuedHolding {
    #[serde(flatten)]
    pub holding: HoldingStatic,
    pub current_price: Decimal,
    pub pe_ratio: Option<Decimal>,
    pub earnings: Option<String>,
    pub investment: Decimal,
    pub present_value: Decimal,
    pub gain_loss: Decimal,
    /// Return in percent units (5.13 means 5.13%)
    pub percentage: Decimal,
    pub quoted_at: DateTime<Utc>,
}

/// A holding left out of a pass because no usable quote arrived
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedHolding {
    pub symbol: String,
    pub sector: String,
    #[serde(serialize_with = "serialize_display")]
    pub reason: FetchError,
}

fn serialize_display<S: serde::Serializer>(
    value: &FetchError,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

/// Summed figures for every valued holding sharing a sector label
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SectorTotals {
    pub investment: Decimal,
    pub present_value: Decimal,
    pub gain_loss: Decimal,
    pub holdings: usize,
    /// Share of portfolio present value, in percent
    pub allocation_pct: Decimal,
}

/// One entry of the trailing performance series
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PerformancePoint {
    pub label: String,
    pub value: Decimal,
    pub at: DateTime<Utc>,
}

/// Complete valuation of the portfolio produced by one successful pass
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioSnapshot {
    pub total_investment: Decimal,
    pub present_value: Decimal,
    pub total_gain: Decimal,
    pub gain_percentage: Decimal,
    pub updated_at: DateTime<Utc>,
    pub holdings: Vec<ValuedHolding>,
    pub sectors: BTreeMap<String, SectorTotals>,
    pub performance: VecDeque<PerformancePoint>,
    pub skipped: Vec<SkippedHolding>,
}

impl PortfolioSnapshot {
    pub fn holding(&self, symbol: &str) -> Option<&ValuedHolding> {
        self.holdings.iter().find(|h| h.holding.symbol == symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_holding_investment() {
        let h = HoldingStatic::new("INFY:NSE", "Infosys Ltd", "NSE", "Technology", dec!(1400), 10)
            .unwrap();
        assert_eq!(h.investment(), dec!(14000));
    }

    #[test]
    fn test_holding_rejects_non_positive_price() {
        let err = HoldingStatic::new("TCS:NSE", "TCS Ltd", "NSE", "Technology", dec!(0), 5)
            .unwrap_err();
        assert!(matches!(err, PortfolioError::MalformedHoldingFailure { .. }));

        let err = HoldingStatic::new("TCS:NSE", "TCS Ltd", "NSE", "Technology", dec!(-1), 5)
            .unwrap_err();
        assert!(err.to_string().contains("purchase price"));
    }

    #[test]
    fn test_holding_rejects_zero_quantity() {
        let err = HoldingStatic::new("SBIN:NSE", "SBI", "NSE", "Financials", dec!(620), 0)
            .unwrap_err();
        assert!(err.to_string().contains("quantity"));
    }

    #[test]
    fn test_holding_rejects_blank_symbol() {
        let result = HoldingStatic::new("  ", "Nameless", "NSE", "Energy", dec!(10), 1);
        assert!(result.is_err());
    }

    #[test]
    fn test_skipped_holding_serializes_reason_as_text() {
        let skipped = SkippedHolding {
            symbol: "ONGC:NSE".to_string(),
            sector: "Energy".to_string(),
            reason: FetchError::Timeout(250),
        };
        let json = serde_json::to_value(&skipped).unwrap();
        assert_eq!(json["reason"], "timed out after 250 ms");
    }
}
