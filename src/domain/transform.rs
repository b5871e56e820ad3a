//! Row transformer: applies a field mapping to raw rows, coercing types and
//! computing derived financial metrics.
//!
//! Transformation is a pure function of (row, mapping) — apart from the
//! current-time default for missing timestamps — and never fails for a single
//! malformed row. Bad cells degrade to documented defaults so the trade stays
//! structurally valid and can be corrected during review. Dropping a row is
//! only ever an explicit user action, never automatic.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, SecondsFormat, Timelike, Utc};
use std::collections::HashMap;

use super::table::RawTable;
use super::trade::{ExtractedTrade, FieldMapping, PeriodOfDay, Side, TradeField};

/// Tolerant numeric parse for real-world broker exports.
///
/// Strips currency symbols, currency codes, and thousands separators; reads
/// parenthesized values as negatives (accounting style); accepts both
/// `1,234.56` and European `1.234,56`. Returns `None` for anything that still
/// does not read as a number.
pub fn parse_numeric(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let parenthesized = trimmed.starts_with('(') && trimmed.ends_with(')');
    let inner = if parenthesized {
        &trimmed[1..trimmed.len() - 1]
    } else {
        trimmed
    };

    let cleaned: String = inner
        .chars()
        .filter(|c| !matches!(c, '$' | '€' | '£' | '¥' | '₹' | '%' | ' ' | '\u{a0}'))
        .collect();
    let cleaned = cleaned
        .trim_start_matches(|c: char| c.is_ascii_alphabetic())
        .trim_end_matches(|c: char| c.is_ascii_alphabetic())
        .trim_start_matches('+');

    // One separator kind present: a comma within two digits of the end is a
    // decimal comma, otherwise a thousands separator. Both kinds present: the
    // rightmost one is the decimal point.
    let normalized = if cleaned.contains('.') && cleaned.contains(',') {
        if cleaned.rfind(',') > cleaned.rfind('.') {
            cleaned.replace('.', "").replace(',', ".")
        } else {
            cleaned.replace(',', "")
        }
    } else if let Some(pos) = cleaned.rfind(',') {
        if cleaned.len() - pos - 1 <= 2 && cleaned.matches(',').count() == 1 {
            cleaned.replace(',', ".")
        } else {
            cleaned.replace(',', "")
        }
    } else {
        cleaned.to_string()
    };

    normalized
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .map(|n| if parenthesized { -n } else { n })
}

/// Integer coercion: tolerant numeric parse, truncated. Defaults to 0.
pub fn parse_integer(raw: &str) -> i64 {
    parse_numeric(raw).map(|n| n as i64).unwrap_or(0)
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d", "%d.%m.%Y", "%m/%d/%Y", "%d/%m/%Y", "%Y/%m/%d", "%Y%m%d",
];

/// Parse a timestamp in any of the formats brokers actually emit.
///
/// Offset-bearing timestamps are converted to local wall-clock time; naive
/// ones are taken as-is. Date-only values read as midnight.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Local).naive_local());
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }

    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return date.and_hms_opt(0, 0, 0);
        }
    }

    None
}

/// Current time as an ISO 8601 string, the default for absent timestamps.
fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Transform every row of a parsed table with the same mapping.
pub fn transform_table(table: &RawTable, mapping: &FieldMapping) -> Vec<ExtractedTrade> {
    table
        .rows
        .iter()
        .map(|row| transform_row(row, mapping))
        .collect()
}

/// Transform one raw row into a normalized trade.
pub fn transform_row(row: &HashMap<String, String>, mapping: &FieldMapping) -> ExtractedTrade {
    let cell = |field: TradeField| -> Option<&str> {
        mapping
            .get(&field)
            .and_then(|column| row.get(column))
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    };
    let numeric =
        |field: TradeField| cell(field).and_then(parse_numeric).unwrap_or(0.0);
    let integer = |field: TradeField| cell(field).map(parse_integer).unwrap_or(0);

    let mut trade = ExtractedTrade {
        symbol: cell(TradeField::Symbol).unwrap_or_default().to_string(),
        side: Side::normalize(cell(TradeField::Side).unwrap_or_default()),
        entry_price: numeric(TradeField::EntryPrice),
        exit_price: numeric(TradeField::ExitPrice),
        position_size: numeric(TradeField::PositionSize),
        leverage: numeric(TradeField::Leverage),
        funding_fee: numeric(TradeField::FundingFee),
        trading_fee: numeric(TradeField::TradingFee),
        margin: numeric(TradeField::Margin),
        opened_at: cell(TradeField::OpenedAt)
            .map(str::to_string)
            .unwrap_or_else(now_iso),
        closed_at: cell(TradeField::ClosedAt)
            .map(str::to_string)
            .unwrap_or_else(now_iso),
        profit_loss: numeric(TradeField::ProfitLoss),
        roi: numeric(TradeField::Roi),
        duration_days: integer(TradeField::DurationDays),
        duration_hours: integer(TradeField::DurationHours),
        duration_minutes: integer(TradeField::DurationMinutes),
        period_of_day: cell(TradeField::PeriodOfDay).and_then(|v| v.parse().ok()),
        broker: cell(TradeField::Broker).unwrap_or_default().to_string(),
    };

    derive_financials(&mut trade);
    derive_timing(&mut trade);
    trade
}

/// Signed P&L, margin inference, and ROI.
///
/// Computed only when entry price, exit price, and position size are all
/// non-zero. Margin is inferred only when not already supplied: a position
/// size larger than ten times the entry price is taken as quote-currency
/// notional rather than contract units.
fn derive_financials(trade: &mut ExtractedTrade) {
    if trade.entry_price == 0.0 || trade.exit_price == 0.0 || trade.position_size == 0.0 {
        return;
    }

    let raw_pnl = match trade.side {
        Side::Long => (trade.exit_price - trade.entry_price) * trade.position_size,
        Side::Short => (trade.entry_price - trade.exit_price) * trade.position_size,
    };
    trade.profit_loss = raw_pnl - trade.funding_fee - trade.trading_fee;

    if trade.margin == 0.0 {
        let leverage = if trade.leverage > 0.0 {
            trade.leverage
        } else {
            1.0
        };
        trade.margin = if trade.position_size > trade.entry_price * 10.0 {
            trade.position_size / leverage
        } else {
            trade.entry_price * trade.position_size / leverage
        };
    }

    trade.roi = if trade.margin > 0.0 {
        trade.profit_loss / trade.margin * 100.0
    } else {
        0.0
    };
}

/// Duration decomposition and period-of-day bucketing.
///
/// Duration requires both timestamps to parse with `closed_at >= opened_at`;
/// the delta decomposes into whole days, remaining hours, remaining minutes.
fn derive_timing(trade: &mut ExtractedTrade) {
    let opened = parse_timestamp(&trade.opened_at);

    if let (Some(opened), Some(closed)) = (opened, parse_timestamp(&trade.closed_at)) {
        if closed >= opened {
            let minutes = (closed - opened).num_minutes();
            trade.duration_days = minutes / 1440;
            trade.duration_hours = (minutes % 1440) / 60;
            trade.duration_minutes = minutes % 60;
        }
    }

    if let Some(opened) = opened {
        trade.period_of_day = Some(PeriodOfDay::from_hour(opened.hour()));
    }
}
