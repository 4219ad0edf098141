use rust_decimal::Decimal;
use std::collections::BTreeMap;

use super::models::{SectorTotals, ValuedHolding};
use super::valuation::percent_of;
use crate::error::PortfolioError;

/// Group valued holdings by sector label and sum their figures.
///
/// Labels match exactly (case-sensitive). `declared` sectors are always
/// present in the result, with zero totals when no holding carries them.
///
/// Fails with [`PortfolioError::AggregationOverflow`] when a sector sum
/// leaves the `Decimal` range.
pub fn aggregate(
    valued: &[ValuedHolding],
    declared: &[String],
) -> Result<BTreeMap<String, SectorTotals>, PortfolioError> {
    let mut totals: BTreeMap<String, SectorTotals> = declared
        .iter()
        .map(|name| (name.clone(), SectorTotals::default()))
        .collect();

    for v in valued {
        let sector = &v.holding.sector;
        let entry = totals.entry(sector.clone()).or_default();
        entry.investment = add(entry.investment, v.investment, sector)?;
        entry.present_value = add(entry.present_value, v.present_value, sector)?;
        entry.gain_loss = add(entry.gain_loss, v.gain_loss, sector)?;
        entry.holdings += 1;
    }

    Ok(totals)
}

fn add(total: Decimal, amount: Decimal, sector: &str) -> Result<Decimal, PortfolioError> {
    total
        .checked_add(amount)
        .ok_or_else(|| PortfolioError::AggregationOverflow(format!("sector {}", sector)))
}

/// Fill in each sector's share of the portfolio present value
pub fn allocate(totals: &mut BTreeMap<String, SectorTotals>, portfolio_value: Decimal) {
    for sector in totals.values_mut() {
        sector.allocation_pct = percent_of(sector.present_value, portfolio_value);
    }
}
