// Portfolio module - valuation and aggregation engine (no I/O)

pub mod models;
pub mod sectors;
pub mod snapshot;
pub mod valuation;

pub use models::{
    HoldingStatic, PerformancePoint, PortfolioSnapshot, Quote, SectorTotals, SkippedHolding,
    ValuedHolding,
};
pub use snapshot::SeriesOptions;
pub use valuation::{value, Valuation};
