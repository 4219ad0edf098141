//! Per-holding valuation
//!
//! Turns a holding definition plus the outcome of its quote fetch into either
//! a fully valued holding or a skip marker. A failed fetch never produces a
//! zero or stale valuation.

use rust_decimal::Decimal;

use super::models::{HoldingStatic, Quote, SkippedHolding, ValuedHolding};
use crate::error::FetchError;

/// Outcome of valuing one holding for a pass
#[derive(Debug, Clone, PartialEq)]
pub enum Valuation {
    Valued(ValuedHolding),
    Skipped(SkippedHolding),
}

impl Valuation {
    pub fn is_valued(&self) -> bool {
        matches!(self, Valuation::Valued(_))
    }
}

/// `part / whole × 100`, or zero when `whole` is zero
pub fn percent_of(part: Decimal, whole: Decimal) -> Decimal {
    if whole.is_zero() {
        return Decimal::ZERO;
    }
    part.checked_div(whole)
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .unwrap_or(Decimal::ZERO)
}

/// Value a holding against its quote, or skip it if the quote is unusable.
pub fn value(holding: &HoldingStatic, quote: Result<Quote, FetchError>) -> Valuation {
    let skip = |reason: FetchError| {
        Valuation::Skipped(SkippedHolding {
            symbol: holding.symbol.clone(),
            sector: holding.sector.clone(),
            reason,
        })
    };

    let quote = match quote {
        Ok(quote) => quote,
        Err(reason) => return skip(reason),
    };

    if quote.price <= Decimal::ZERO {
        return skip(FetchError::Parse(format!(
            "non-positive price {} from {}",
            quote.price, quote.source
        )));
    }

    let quantity = Decimal::from(holding.quantity);
    let (investment, present_value) = match (
        holding.purchase_price.checked_mul(quantity),
        quote.price.checked_mul(quantity),
    ) {
        (Some(investment), Some(present_value)) => (investment, present_value),
        _ => return skip(FetchError::Parse("valuation overflow".to_string())),
    };
    let gain_loss = present_value - investment;

    Valuation::Valued(ValuedHolding {
        holding: holding.clone(),
        current_price: quote.price,
        pe_ratio: quote.pe_ratio,
        earnings: quote.earnings,
        investment,
        present_value,
        gain_loss,
        percentage: percent_of(gain_loss, investment),
        quoted_at: quote.fetched_at,
    })
}
