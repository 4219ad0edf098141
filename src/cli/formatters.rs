//! Output formatting module for CLI display
//!
//! This module handles all terminal output formatting, separating
//! the concerns of valuation from presentation.

use colored::{ColoredString, Colorize};
use rust_decimal::Decimal;
use serde::Serialize;
use tabled::{
    settings::{object::Columns, Alignment, Style},
    Table, Tabled,
};

use crate::portfolio::{PortfolioSnapshot, SectorTotals};
use crate::scheduler::SchedulerStatus;
use crate::utils::{format_currency, format_percent};

fn signed(text: String, value: Decimal) -> ColoredString {
    if value >= Decimal::ZERO {
        text.green()
    } else {
        text.red()
    }
}

/// Sectors in declared order first, then any others alphabetically
fn ordered_sectors<'a>(
    snapshot: &'a PortfolioSnapshot,
    declared: &[String],
) -> Vec<(&'a str, &'a SectorTotals)> {
    let mut ordered: Vec<(&str, &SectorTotals)> = declared
        .iter()
        .filter_map(|name| snapshot.sectors.get_key_value(name))
        .map(|(name, totals)| (name.as_str(), totals))
        .collect();

    for (name, totals) in &snapshot.sectors {
        if !declared.contains(name) {
            ordered.push((name.as_str(), totals));
        }
    }

    ordered
}

/// Format a snapshot (and optionally scheduler status) as JSON
pub fn format_snapshot_json(snapshot: &PortfolioSnapshot, status: Option<&SchedulerStatus>) -> String {
    #[derive(Serialize)]
    struct JsonOutput<'a> {
        snapshot: &'a PortfolioSnapshot,
        #[serde(skip_serializing_if = "Option::is_none")]
        status: Option<&'a SchedulerStatus>,
    }

    serde_json::to_string_pretty(&JsonOutput { snapshot, status })
        .unwrap_or_else(|e| format!(r#"{{"error": "JSON serialization failed: {}"}}"#, e))
}

/// Format a snapshot for terminal table output
pub fn format_snapshot_table(snapshot: &PortfolioSnapshot, declared_sectors: &[String]) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "\n{} Portfolio as of {}\n\n",
        "📊".cyan().bold(),
        snapshot
            .updated_at
            .with_timezone(&chrono::Local)
            .format("%d %b %Y, %H:%M:%S")
    ));

    #[derive(Tabled)]
    struct HoldingRow {
        #[tabled(rename = "Particulars")]
        name: String,
        #[tabled(rename = "Exchange")]
        exchange: String,
        #[tabled(rename = "Purchase")]
        purchase_price: String,
        #[tabled(rename = "Qty")]
        quantity: String,
        #[tabled(rename = "Investment")]
        investment: String,
        #[tabled(rename = "Portfolio %")]
        weight: String,
        #[tabled(rename = "CMP")]
        price: String,
        #[tabled(rename = "Present Value")]
        value: String,
        #[tabled(rename = "Gain/Loss")]
        gain_loss: String,
        #[tabled(rename = "Return %")]
        percentage: String,
        #[tabled(rename = "P/E")]
        pe_ratio: String,
        #[tabled(rename = "EPS")]
        earnings: String,
    }

    let mut rows: Vec<HoldingRow> = Vec::new();
    for (sector, totals) in ordered_sectors(snapshot, declared_sectors) {
        rows.push(HoldingRow {
            name: sector.bold().to_string(),
            exchange: String::new(),
            purchase_price: String::new(),
            quantity: format!("{}", totals.holdings),
            investment: format_currency(totals.investment),
            weight: format!("{:.2}%", totals.allocation_pct),
            price: String::new(),
            value: format_currency(totals.present_value),
            gain_loss: signed(format_currency(totals.gain_loss), totals.gain_loss).to_string(),
            percentage: String::new(),
            pe_ratio: String::new(),
            earnings: String::new(),
        });

        for v in snapshot.holdings.iter().filter(|v| v.holding.sector == sector) {
            rows.push(HoldingRow {
                name: format!("  {}", v.holding.name),
                exchange: v.holding.exchange.clone(),
                purchase_price: format_currency(v.holding.purchase_price),
                quantity: v.holding.quantity.to_string(),
                investment: format_currency(v.investment),
                weight: format!(
                    "{:.2}%",
                    crate::portfolio::valuation::percent_of(v.investment, snapshot.total_investment)
                ),
                price: format_currency(v.current_price),
                value: format_currency(v.present_value),
                gain_loss: signed(format_currency(v.gain_loss), v.gain_loss).to_string(),
                percentage: signed(format_percent(v.percentage), v.percentage).to_string(),
                pe_ratio: v
                    .pe_ratio
                    .map(|pe| format!("{:.2}", pe))
                    .unwrap_or_else(|| "N/A".to_string()),
                earnings: v.earnings.clone().unwrap_or_else(|| "N/A".to_string()),
            });
        }
    }

    let mut table = Table::new(&rows);
    table.with(Style::modern());
    // Right-align all columns except Particulars (0) and Exchange (1)
    table.modify(Columns::new(2..), Alignment::right());
    output.push_str(&table.to_string());

    if !snapshot.skipped.is_empty() {
        output.push_str(&format!(
            "\n\n{} {} holding(s) skipped this pass:",
            "⚠".yellow().bold(),
            snapshot.skipped.len()
        ));
        for s in &snapshot.skipped {
            output.push_str(&format!("\n  {} ({}): {}", s.symbol, s.sector, s.reason));
        }
    }

    output.push_str(&format!("\n\n{} Summary", "━".repeat(80).bright_black()));
    output.push_str(&format!(
        "\n{:<20} {}",
        "Total Investment:".bold(),
        format_currency(snapshot.total_investment)
    ));
    output.push_str(&format!(
        "\n{:<20} {}",
        "Present Value:".bold(),
        format_currency(snapshot.present_value)
    ));
    output.push_str(&format!(
        "\n{:<20} {}",
        "Total Gain:".bold(),
        signed(format_currency(snapshot.total_gain), snapshot.total_gain)
    ));
    output.push_str(&format!(
        "\n{:<20} {}\n",
        "Total Return:".bold(),
        signed(format_percent(snapshot.gain_percentage), snapshot.gain_percentage)
    ));

    if snapshot.performance.len() > 1 {
        output.push_str(&format!("\n{}", "Recent values:".bold()));
        for point in &snapshot.performance {
            output.push_str(&format!(
                "\n  {:<20} {}",
                point.label,
                format_currency(point.value)
            ));
        }
        output.push('\n');
    }

    output
}

/// Banner shown while a failed refresh leaves older data on screen
pub fn format_stale_notice(status: &SchedulerStatus) -> String {
    let reason = status
        .last_error
        .as_ref()
        .map(|e| e.to_string())
        .unwrap_or_else(|| "unknown error".to_string());

    let since = match status.last_success_at {
        Some(at) => format!(
            "stale since {}",
            at.with_timezone(&chrono::Local).format("%H:%M:%S")
        ),
        None => "no data yet".to_string(),
    };

    format!(
        "{} Refresh failed, showing previous data ({}): {}\n",
        "⚠".yellow().bold(),
        since,
        reason
    )
}

/// Format empty portfolio message
pub fn format_empty_portfolio() -> String {
    format!(
        "{} No holdings defined\nAdd [[holdings]] to your config or run: {} init\n",
        "ℹ".blue().bold(),
        "quotefolio".bold()
    )
}
