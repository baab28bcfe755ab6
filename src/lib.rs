//! Crypto trading journal: realized PnL, forbidden-rule violations and
//! strategy conformance scores for every submitted trade.

pub mod composite;
pub mod config;
pub mod engine;
pub mod error;
pub mod journal;
pub mod parser;
pub mod pnl;
pub mod rules;
pub mod scoring;
pub mod types;
pub mod utils;

#[cfg(test)]
mod testutil;

pub use config::{AppConfig, JournalCfg, RulesCfg};
pub use engine::{Evaluation, TradeEvaluator};
pub use error::SubmissionError;
pub use journal::{Journal, JournalStats, TradeFilter, TradePage};
pub use types::{
    CreateTradeRequest, Direction, ForbiddenRuleViolation, RuleCode, Severity,
    StrategyScoreResult, StrategyType, Trade, TradeIndicators, TradeStatus,
};
