//! Quotefolio - live stock portfolio valuation
//!
//! This library values a fixed set of holdings against live quotes, rolls
//! them up by sector and into portfolio totals, and keeps the result fresh
//! with a refresh scheduler that publishes immutable snapshots.

pub mod cli;
pub mod config;
pub mod error;
pub mod portfolio;
pub mod pricing;
pub mod scheduler;
pub mod utils;
