//! Core domain types: trades, indicator bundles, violations and strategy scores.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Buy,
    Sell,
}

impl FromStr for Direction {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buy" | "long" => Ok(Direction::Buy),
            "sell" | "short" => Ok(Direction::Sell),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TradeStatus {
    #[default]
    Open,
    Closed,
}

/// Declared trading strategy. Each variant owns one scoring rubric.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StrategyType {
    Trend,
    Breakout,
    CounterTrend,
}

impl StrategyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyType::Trend => "trend",
            StrategyType::Breakout => "breakout",
            StrategyType::CounterTrend => "counter_trend",
        }
    }
}

impl FromStr for StrategyType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "trend" => Ok(StrategyType::Trend),
            "breakout" => Ok(StrategyType::Breakout),
            "counter_trend" => Ok(StrategyType::CounterTrend),
            _ => Err(()),
        }
    }
}

impl fmt::Display for StrategyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Higher-timeframe trend direction as reported by the caller.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Up,
    Down,
    Sideways,
}

/// Optional market context attached at submission time. Every field may be
/// missing; a missing field makes the criterion that reads it fail.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TradeIndicators {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_volume: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev_range_high: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_loss_within_limit: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub htf_trend: Option<TrendDirection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pullback_ok: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trail_stop_correct: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zscore: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reversal_signal: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_reward: Option<f64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// The six fixed forbidden rules.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RuleCode {
    NoStoploss,
    OversizedPosition,
    RevengeTrade,
    Chasing,
    Overtrading,
    AvgDownNoPlan,
}

impl RuleCode {
    pub const ALL: [RuleCode; 6] = [
        RuleCode::NoStoploss,
        RuleCode::OversizedPosition,
        RuleCode::RevengeTrade,
        RuleCode::Chasing,
        RuleCode::Overtrading,
        RuleCode::AvgDownNoPlan,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RuleCode::NoStoploss => "no_stoploss",
            RuleCode::OversizedPosition => "oversized_position",
            RuleCode::RevengeTrade => "revenge_trade",
            RuleCode::Chasing => "chasing",
            RuleCode::Overtrading => "overtrading",
            RuleCode::AvgDownNoPlan => "avg_down_no_plan",
        }
    }
}

impl fmt::Display for RuleCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ForbiddenRuleViolation {
    pub rule_code: RuleCode,
    pub description: String,
    pub severity: Severity,
    pub score_penalty: u32,
    pub detected_at: DateTime<Utc>,
    /// Values that triggered the rule (ratios, referenced trade ids, ...).
    pub details: serde_json::Value,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ViolationStats {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub total: usize,
    pub total_penalty: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StrategyCriterionScore {
    pub code: String,
    pub description: String,
    pub weight: f64,
    pub passed: bool,
    pub score: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StrategyScoreResult {
    pub strategy: StrategyType,
    pub total_score: u32,
    pub criteria: Vec<StrategyCriterionScore>,
}

/// A journal entry. Derived fields are written by the evaluation pipeline only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Trade {
    pub id: String,
    pub symbol: String,
    pub direction: Direction,
    pub quantity: f64,
    pub entry_price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<f64>,
    pub entry_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trading_type: Option<StrategyType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indicators: Option<TradeIndicators>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    // derived
    /// Mirror of `status()` for readers of the JSON record.
    #[serde(default)]
    pub status: TradeStatus,
    #[serde(default)]
    pub pnl: f64,
    #[serde(default)]
    pub forbidden_violations: Vec<ForbiddenRuleViolation>,
    #[serde(default)]
    pub forbidden_penalty: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy_score: Option<StrategyScoreResult>,
    #[serde(default)]
    pub final_score: u32,
}

impl Trade {
    /// Status follows the exit price. The stored `status` field is refreshed
    /// from this on evaluation and load.
    pub fn status(&self) -> TradeStatus {
        if self.exit_price.is_some() {
            TradeStatus::Closed
        } else {
            TradeStatus::Open
        }
    }

    pub fn is_closed(&self) -> bool {
        self.status() == TradeStatus::Closed
    }

    /// Notional value at entry.
    pub fn position_size(&self) -> f64 {
        self.quantity * self.entry_price
    }
}

/// Caller-supplied submission. Validated by the journal before evaluation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateTradeRequest {
    pub symbol: String,
    #[serde(alias = "type")]
    pub direction: Direction,
    pub quantity: f64,
    pub entry_price: f64,
    #[serde(default)]
    pub exit_price: Option<f64>,
    #[serde(default)]
    pub stop_loss: Option<f64>,
    pub entry_time: DateTime<Utc>,
    #[serde(default)]
    pub exit_time: Option<DateTime<Utc>>,
    /// Free text; unknown strategies are kept as "no strategy".
    #[serde(default)]
    pub trading_type: Option<String>,
    #[serde(default)]
    pub memo: Option<String>,
    #[serde(default)]
    pub indicators: Option<TradeIndicators>,
}
