//! Portfolio-wide aggregation
//!
//! Reduces the valued holdings of a pass to portfolio totals and extends the
//! trailing performance series. The result is built wholesale; nothing here
//! mutates a published snapshot.

use chrono::{DateTime, Local, Utc};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, VecDeque};

use super::models::{PerformancePoint, PortfolioSnapshot, SectorTotals, SkippedHolding, ValuedHolding};
use super::sectors;
use super::valuation::percent_of;
use crate::error::PortfolioError;

/// Default number of points kept in the performance series
pub const DEFAULT_SERIES_MAX_LEN: usize = 12;

/// Default chrono format for performance point labels
pub const DEFAULT_SERIES_LABEL_FORMAT: &str = "%d %b %H:%M:%S";

/// How the trailing performance series is labelled and bounded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesOptions {
    pub max_len: usize,
    pub label_format: String,
}

impl Default for SeriesOptions {
    fn default() -> Self {
        Self {
            max_len: DEFAULT_SERIES_MAX_LEN,
            label_format: DEFAULT_SERIES_LABEL_FORMAT.to_string(),
        }
    }
}

/// Append `point`, evicting the oldest entries beyond `max_len`
pub fn push_bounded(series: &mut VecDeque<PerformancePoint>, point: PerformancePoint, max_len: usize) {
    series.push_back(point);
    while series.len() > max_len {
        series.pop_front();
    }
}

/// Label a point with `format`, falling back to RFC 3339 on a bad format string
fn point_label(now: DateTime<Utc>, format: &str) -> String {
    use std::fmt::Write;

    let mut label = String::new();
    if write!(label, "{}", now.with_timezone(&Local).format(format)).is_err() {
        return now.to_rfc3339();
    }
    label
}

fn checked_sum(
    mut amounts: impl Iterator<Item = Decimal>,
    what: &str,
) -> Result<Decimal, PortfolioError> {
    amounts
        .try_fold(Decimal::ZERO, |total, amount| total.checked_add(amount))
        .ok_or_else(|| PortfolioError::AggregationOverflow(what.to_string()))
}

/// Build the snapshot for a pass.
///
/// Fails with `DegenerateAggregationFailure` when every holding of a
/// non-empty definition was skipped; an empty definition yields a valid
/// all-zero snapshot.
pub fn aggregate(
    valued: Vec<ValuedHolding>,
    skipped: Vec<SkippedHolding>,
    mut sector_totals: BTreeMap<String, SectorTotals>,
    previous_series: &VecDeque<PerformancePoint>,
    series: &SeriesOptions,
    now: DateTime<Utc>,
) -> Result<PortfolioSnapshot, PortfolioError> {
    if valued.is_empty() && !skipped.is_empty() {
        return Err(PortfolioError::DegenerateAggregationFailure {
            expected: skipped.len(),
        });
    }

    let total_investment = checked_sum(valued.iter().map(|v| v.investment), "total investment")?;
    let present_value = checked_sum(valued.iter().map(|v| v.present_value), "present value")?;
    // Both sums are non-negative and in range, so the difference is too
    let total_gain = present_value - total_investment;
    let gain_percentage = percent_of(total_gain, total_investment);

    sectors::allocate(&mut sector_totals, present_value);

    let mut performance = previous_series.clone();
    push_bounded(
        &mut performance,
        PerformancePoint {
            label: point_label(now, &series.label_format),
            value: present_value,
            at: now,
        },
        series.max_len,
    );

    Ok(PortfolioSnapshot {
        total_investment,
        present_value,
        total_gain,
        gain_percentage,
        updated_at: now,
        holdings: valued,
        sectors: sector_totals,
        performance,
        skipped,
    })
}
