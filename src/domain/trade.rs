//! Normalized trade record and its enumerated fields.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Direction of a trade.
///
/// Anything that does not read as a buy/long normalizes to `Short`; that
/// mirrors the observed behavior of the broker exports this pipeline was
/// built against, typo'd tokens included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Long,
    #[default]
    Short,
}

impl Side {
    /// Case-insensitive normalization: `"buy"` or `"long"` → `Long`,
    /// everything else → `Short`.
    pub fn normalize(raw: &str) -> Side {
        match raw.trim().to_lowercase().as_str() {
            "buy" | "long" => Side::Long,
            _ => Side::Short,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Long => "long",
            Side::Short => "short",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse bucket derived from a trade's open hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodOfDay {
    Morning,
    Afternoon,
    Night,
}

impl PeriodOfDay {
    /// hour < 12 → morning, 12..18 → afternoon, otherwise night.
    pub fn from_hour(hour: u32) -> PeriodOfDay {
        if hour < 12 {
            PeriodOfDay::Morning
        } else if hour < 18 {
            PeriodOfDay::Afternoon
        } else {
            PeriodOfDay::Night
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodOfDay::Morning => "morning",
            PeriodOfDay::Afternoon => "afternoon",
            PeriodOfDay::Night => "night",
        }
    }
}

impl FromStr for PeriodOfDay {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "morning" => Ok(PeriodOfDay::Morning),
            "afternoon" => Ok(PeriodOfDay::Afternoon),
            "night" => Ok(PeriodOfDay::Night),
            _ => Err(()),
        }
    }
}

impl fmt::Display for PeriodOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The normalized trade fields a source column can map onto.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum TradeField {
    Symbol,
    Side,
    EntryPrice,
    ExitPrice,
    PositionSize,
    Leverage,
    FundingFee,
    TradingFee,
    Margin,
    OpenedAt,
    ClosedAt,
    ProfitLoss,
    Roi,
    DurationDays,
    DurationHours,
    DurationMinutes,
    PeriodOfDay,
    Broker,
}

impl TradeField {
    pub const ALL: [TradeField; 18] = [
        TradeField::Symbol,
        TradeField::Side,
        TradeField::EntryPrice,
        TradeField::ExitPrice,
        TradeField::PositionSize,
        TradeField::Leverage,
        TradeField::FundingFee,
        TradeField::TradingFee,
        TradeField::Margin,
        TradeField::OpenedAt,
        TradeField::ClosedAt,
        TradeField::ProfitLoss,
        TradeField::Roi,
        TradeField::DurationDays,
        TradeField::DurationHours,
        TradeField::DurationMinutes,
        TradeField::PeriodOfDay,
        TradeField::Broker,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TradeField::Symbol => "symbol",
            TradeField::Side => "side",
            TradeField::EntryPrice => "entry_price",
            TradeField::ExitPrice => "exit_price",
            TradeField::PositionSize => "position_size",
            TradeField::Leverage => "leverage",
            TradeField::FundingFee => "funding_fee",
            TradeField::TradingFee => "trading_fee",
            TradeField::Margin => "margin",
            TradeField::OpenedAt => "opened_at",
            TradeField::ClosedAt => "closed_at",
            TradeField::ProfitLoss => "profit_loss",
            TradeField::Roi => "roi",
            TradeField::DurationDays => "duration_days",
            TradeField::DurationHours => "duration_hours",
            TradeField::DurationMinutes => "duration_minutes",
            TradeField::PeriodOfDay => "period_of_day",
            TradeField::Broker => "broker",
        }
    }
}

impl FromStr for TradeField {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TradeField::ALL
            .iter()
            .copied()
            .find(|f| f.name() == s.trim().to_lowercase())
            .ok_or(())
    }
}

impl fmt::Display for TradeField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Assignment of normalized trade fields to source column names. A mapping
/// covers only the fields the user or template specifies.
pub type FieldMapping = BTreeMap<TradeField, String>;

/// The normalized, typed trade record produced by the import pipeline.
///
/// Replaced wholesale (never patched) whenever the mapping changes; discarded
/// on reset or consumed by commit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedTrade {
    pub symbol: String,
    pub side: Side,
    pub entry_price: f64,
    pub exit_price: f64,
    pub position_size: f64,
    pub leverage: f64,
    pub funding_fee: f64,
    pub trading_fee: f64,
    pub margin: f64,
    pub opened_at: String,
    pub closed_at: String,
    pub profit_loss: f64,
    pub roi: f64,
    pub duration_days: i64,
    pub duration_hours: i64,
    pub duration_minutes: i64,
    pub period_of_day: Option<PeriodOfDay>,
    pub broker: String,
}
