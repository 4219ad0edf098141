use chrono::Utc;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{info, warn};

use super::SchedulerConfig;
use crate::error::{FetchError, PortfolioError};
use crate::portfolio::{sectors, snapshot, valuation, HoldingStatic, PerformancePoint};
use crate::portfolio::{PortfolioSnapshot, Valuation};
use crate::pricing::{self, QuoteSource};

/// Stage of a refresh pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PassState {
    Idle,
    Fetching,
    /// Some symbols failed; aggregation continues with the rest
    PartialFailure,
    /// Nothing usable; the pass is abandoned and the old snapshot kept
    TotalFailure,
    Aggregating,
    Committed,
}

impl PassState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PassState::Idle => "idle",
            PassState::Fetching => "fetching",
            PassState::PartialFailure => "partial failure",
            PassState::TotalFailure => "total failure",
            PassState::Aggregating => "aggregating",
            PassState::Committed => "committed",
        }
    }
}

/// Fetch, value and aggregate once, reporting each state reached.
///
/// Stops short of publication: the caller commits the returned snapshot.
pub async fn run_pass<F>(
    source: Arc<dyn QuoteSource>,
    holdings: &[HoldingStatic],
    config: &SchedulerConfig,
    previous_series: &VecDeque<PerformancePoint>,
    mut transition: F,
) -> Result<PortfolioSnapshot, PortfolioError>
where
    F: FnMut(PassState),
{
    transition(PassState::Fetching);
    info!("Refreshing quotes for {} holdings", holdings.len());

    let symbols: Vec<String> = holdings.iter().map(|h| h.symbol.clone()).collect();
    let quotes = pricing::fetch_all(source, &symbols, config.fetch).await;

    let mut valued = Vec::with_capacity(holdings.len());
    let mut skipped = Vec::new();
    for (holding, quote) in holdings.iter().zip(quotes) {
        match valuation::value(holding, quote) {
            Valuation::Valued(v) => valued.push(v),
            Valuation::Skipped(s) => skipped.push(s),
        }
    }

    if !holdings.is_empty() && valued.is_empty() {
        transition(PassState::TotalFailure);
        let last = skipped
            .last()
            .map(|s| s.reason.clone())
            .unwrap_or(FetchError::NotFound(String::new()));
        warn!("All {} quote fetches failed", holdings.len());
        return Err(PortfolioError::TotalFetchFailure {
            attempted: holdings.len(),
            last,
        });
    }

    if !skipped.is_empty() {
        transition(PassState::PartialFailure);
        for s in &skipped {
            let err = PortfolioError::SymbolFetchFailure {
                symbol: s.symbol.clone(),
                source: s.reason.clone(),
            };
            warn!("Skipping holding: {}", err);
        }
    }

    transition(PassState::Aggregating);
    sectors::aggregate(&valued, &config.declared_sectors)
        .and_then(|sector_totals| {
            snapshot::aggregate(
                valued,
                skipped,
                sector_totals,
                previous_series,
                &config.series,
                Utc::now(),
            )
        })
        .inspect_err(|e| {
            warn!("Aggregation failed: {}", e);
            transition(PassState::TotalFailure);
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::testing::StaticSource;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn holdings() -> Vec<HoldingStatic> {
        vec![
            HoldingStatic::new("INFY:NSE", "Infosys", "NSE", "Technology", dec!(1400), 10).unwrap(),
            HoldingStatic::new("TCS:NSE", "TCS", "NSE", "Technology", dec!(3200), 5).unwrap(),
            HoldingStatic::new("SBIN:NSE", "SBI", "NSE", "Financials", dec!(620), 15).unwrap(),
        ]
    }

    #[tokio::test]
    async fn test_full_pass_states() {
        let source = Arc::new(StaticSource::new(
            "TEST",
            &[
                ("INFY:NSE", Ok(dec!(1580.50))),
                ("TCS:NSE", Ok(dec!(3339))),
                ("SBIN:NSE", Ok(dec!(600))),
            ],
        ));
        let mut states = Vec::new();

        let snapshot = run_pass(
            source,
            &holdings(),
            &SchedulerConfig::default(),
            &VecDeque::new(),
            |s| states.push(s),
        )
        .await
        .unwrap();

        assert_eq!(states, vec![PassState::Fetching, PassState::Aggregating]);
        assert_eq!(snapshot.holdings.len(), 3);
        assert_eq!(snapshot.total_investment, dec!(39300));
    }

    #[tokio::test]
    async fn test_partial_pass_skips_failed_symbol() {
        let source = Arc::new(StaticSource::new(
            "TEST",
            &[("INFY:NSE", Ok(dec!(1580.50))), ("SBIN:NSE", Ok(dec!(600)))],
        ));
        let mut states = Vec::new();

        let snapshot = run_pass(
            source,
            &holdings(),
            &SchedulerConfig::default(),
            &VecDeque::new(),
            |s| states.push(s),
        )
        .await
        .unwrap();

        assert_eq!(
            states,
            vec![
                PassState::Fetching,
                PassState::PartialFailure,
                PassState::Aggregating
            ]
        );
        assert_eq!(snapshot.skipped.len(), 1);
        assert_eq!(snapshot.skipped[0].symbol, "TCS:NSE");
        assert!(snapshot.holding("TCS:NSE").is_none());
        assert_eq!(snapshot.total_investment, dec!(23300));
    }

    #[tokio::test]
    async fn test_total_failure() {
        let source = Arc::new(StaticSource::new("TEST", &[]));
        let mut states = Vec::new();

        let err = run_pass(
            source,
            &holdings(),
            &SchedulerConfig::default(),
            &VecDeque::new(),
            |s| states.push(s),
        )
        .await
        .unwrap_err();

        assert_eq!(states, vec![PassState::Fetching, PassState::TotalFailure]);
        assert!(matches!(
            err,
            PortfolioError::TotalFetchFailure { attempted: 3, .. }
        ));
    }

    #[tokio::test]
    async fn test_empty_definition_commits_zero_snapshot() {
        let source = Arc::new(StaticSource::new("TEST", &[]));

        let snapshot = run_pass(
            source,
            &[],
            &SchedulerConfig::default(),
            &VecDeque::new(),
            |_| {},
        )
        .await
        .unwrap();

        assert_eq!(snapshot.present_value, Decimal::ZERO);
        assert!(snapshot.holdings.is_empty());
    }

    #[tokio::test]
    async fn test_overflowing_totals_fail_the_pass() {
        let huge = dec!(40000000000000000000000000000);
        let holdings = vec![
            HoldingStatic::new("A:NSE", "A", "NSE", "Energy", huge, 1).unwrap(),
            HoldingStatic::new("B:NSE", "B", "NSE", "Energy", huge, 1).unwrap(),
        ];
        let source = Arc::new(StaticSource::new("TEST", &[("A:NSE", Ok(huge)), ("B:NSE", Ok(huge))]));
        let mut states = Vec::new();

        let err = run_pass(
            source,
            &holdings,
            &SchedulerConfig::default(),
            &VecDeque::new(),
            |s| states.push(s),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, PortfolioError::AggregationOverflow(_)));
        assert_eq!(
            states,
            vec![
                PassState::Fetching,
                PassState::Aggregating,
                PassState::TotalFailure
            ]
        );
    }
}
