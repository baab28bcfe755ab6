//! Persisted trade journal and the submission workflow around the engine.

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::TradeEvaluator;
use crate::error::SubmissionError;
use crate::rules::violation_stats;
use crate::types::{
    CreateTradeRequest, Direction, StrategyType, Trade, TradeStatus, ViolationStats,
};
use crate::utils::sanitize_symbol;

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Journal {
    /// Newest submission first.
    pub trades: Vec<Trade>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradeFilter {
    /// Case-insensitive substring.
    pub symbol: Option<String>,
    pub direction: Option<Direction>,
    pub status: Option<TradeStatus>,
    pub limit: usize,
    pub offset: usize,
}

impl Default for TradeFilter {
    fn default() -> Self {
        Self {
            symbol: None,
            direction: None,
            status: None,
            limit: 10,
            offset: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TradePage {
    pub trades: Vec<Trade>,
    pub total: usize,
    pub page: usize,
    pub limit: usize,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct JournalStats {
    pub total_trades: usize,
    pub open: usize,
    pub closed: usize,
    pub wins: usize,
    pub losses: usize,
    pub total_pnl: f64,
    pub avg_final_score: f64,
    pub violations: ViolationStats,
}

impl Journal {
    /// Missing or unreadable files yield an empty journal.
    pub fn load(path: &Path) -> Self {
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(s) => match serde_json::from_str::<Self>(&s) {
                    Ok(mut me) => {
                        for t in &mut me.trades {
                            t.status = t.status();
                        }
                        return me;
                    }
                    Err(e) => warn!("Journal {} unreadable, starting empty: {}", path.display(), e),
                },
                Err(e) => warn!("Journal {} unreadable, starting empty: {}", path.display(), e),
            }
        }
        Self::default()
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create journal dir {}", parent.display()))?;
        }
        let s = serde_json::to_string_pretty(self).context("serialize journal")?;
        fs::write(path, s).with_context(|| format!("write journal {}", path.display()))?;
        Ok(())
    }

    /// Validate, build and evaluate a trade against the current history, then
    /// store it. The history seen by the engine excludes the new trade.
    pub fn submit(
        &mut self,
        evaluator: &TradeEvaluator,
        req: CreateTradeRequest,
        account_equity: Option<f64>,
        now: DateTime<Utc>,
    ) -> Result<&Trade, SubmissionError> {
        validate_request(&req)?;
        let mut trade = build_trade(req, now);

        let evaluation = evaluator.evaluate(&trade, &self.trades, account_equity);
        evaluation.apply_to(&mut trade);

        if !trade.forbidden_violations.is_empty() {
            let summary: Vec<String> = trade
                .forbidden_violations
                .iter()
                .map(|v| format!("{}/{:?}/-{}", v.rule_code, v.severity, v.score_penalty))
                .collect();
            warn!(
                "Forbidden rules violated by trade {} ({}): {}",
                trade.id,
                trade.symbol,
                summary.join(", ")
            );
        }
        info!(
            "Journaled {} {:?} {} @ {} -> pnl={:.2} penalty={} final={}",
            trade.id,
            trade.direction,
            trade.symbol,
            trade.entry_price,
            trade.pnl,
            trade.forbidden_penalty,
            trade.final_score
        );

        self.trades.insert(0, trade);
        Ok(&self.trades[0])
    }

    pub fn list(&self, filter: &TradeFilter) -> TradePage {
        let needle = filter.symbol.as_ref().map(|s| s.to_lowercase());
        let mut matched: Vec<&Trade> = self
            .trades
            .iter()
            .filter(|t| {
                needle
                    .as_ref()
                    .map_or(true, |n| t.symbol.to_lowercase().contains(n))
            })
            .filter(|t| filter.direction.map_or(true, |d| t.direction == d))
            .filter(|t| filter.status.map_or(true, |s| t.status() == s))
            .collect();
        matched.sort_by(|a, b| b.entry_time.cmp(&a.entry_time));

        let limit = filter.limit.max(1);
        TradePage {
            total: matched.len(),
            trades: matched
                .into_iter()
                .skip(filter.offset)
                .take(limit)
                .cloned()
                .collect(),
            page: filter.offset / limit + 1,
            limit,
        }
    }

    pub fn stats(&self) -> JournalStats {
        let closed: Vec<&Trade> = self.trades.iter().filter(|t| t.is_closed()).collect();
        let total = self.trades.len();
        let avg_final_score = if total == 0 {
            0.0
        } else {
            self.trades.iter().map(|t| t.final_score as f64).sum::<f64>() / total as f64
        };
        JournalStats {
            total_trades: total,
            open: total - closed.len(),
            closed: closed.len(),
            wins: closed.iter().filter(|t| t.pnl > 0.0).count(),
            losses: closed.iter().filter(|t| t.pnl < 0.0).count(),
            total_pnl: closed.iter().map(|t| t.pnl).sum(),
            avg_final_score,
            violations: violation_stats(self.trades.iter().flat_map(|t| &t.forbidden_violations)),
        }
    }
}

pub fn validate_request(req: &CreateTradeRequest) -> Result<(), SubmissionError> {
    if req.symbol.trim().is_empty() {
        return Err(SubmissionError::EmptySymbol);
    }
    if !(req.quantity > 0.0) {
        return Err(SubmissionError::NonPositiveQuantity(req.quantity));
    }
    if !(req.entry_price > 0.0) {
        return Err(SubmissionError::NonPositiveEntryPrice(req.entry_price));
    }
    if let Some(p) = req.exit_price.filter(|p| !(*p > 0.0)) {
        return Err(SubmissionError::NonPositiveExitPrice(p));
    }
    if let Some(p) = req.stop_loss.filter(|p| !(*p > 0.0)) {
        return Err(SubmissionError::NonPositiveStopLoss(p));
    }
    if let Some(exit) = req.exit_time {
        if req.exit_price.is_none() {
            return Err(SubmissionError::ExitTimeWithoutPrice);
        }
        if exit < req.entry_time {
            return Err(SubmissionError::ExitBeforeEntry {
                entry: req.entry_time.to_rfc3339(),
                exit: exit.to_rfc3339(),
            });
        }
    }
    Ok(())
}

fn build_trade(req: CreateTradeRequest, now: DateTime<Utc>) -> Trade {
    let trading_type = req
        .trading_type
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| match s.parse::<StrategyType>() {
            Ok(st) => Some(st),
            Err(()) => {
                warn!("Unknown trading strategy '{}', scoring skipped", s);
                None
            }
        });
    let status = if req.exit_price.is_some() {
        TradeStatus::Closed
    } else {
        TradeStatus::Open
    };
    let memo = req
        .memo
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty());

    Trade {
        id: Uuid::new_v4().to_string(),
        symbol: sanitize_symbol(&req.symbol),
        direction: req.direction,
        quantity: req.quantity,
        entry_price: req.entry_price,
        exit_price: req.exit_price,
        stop_loss: req.stop_loss,
        entry_time: req.entry_time,
        exit_time: req.exit_time,
        trading_type,
        memo,
        indicators: req.indicators,
        created_at: now,
        updated_at: now,
        status,
        pnl: 0.0,
        forbidden_violations: Vec::new(),
        forbidden_penalty: 0,
        strategy_score: None,
        final_score: 0,
    }
}
