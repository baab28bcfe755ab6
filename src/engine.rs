//! Evaluation pipeline: PnL -> forbidden rules -> strategy score -> final score.

use serde::Serialize;
use tracing::debug;

use crate::composite::{composite_score, CompositeScore};
use crate::config::RulesCfg;
use crate::pnl::calculate_pnl;
use crate::rules::ForbiddenRuleChecker;
use crate::scoring::compute_strategy_score;
use crate::types::{ForbiddenRuleViolation, StrategyScoreResult, Trade};

/// Everything the pipeline derives for one trade.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub pnl: f64,
    pub violations: Vec<ForbiddenRuleViolation>,
    pub strategy_score: Option<StrategyScoreResult>,
    pub composite: CompositeScore,
}

impl Evaluation {
    /// Write the derived fields onto the trade record.
    pub fn apply_to(self, trade: &mut Trade) {
        trade.status = trade.status();
        trade.pnl = self.pnl;
        trade.forbidden_violations = self.violations;
        trade.forbidden_penalty = self.composite.penalty;
        trade.strategy_score = self.strategy_score;
        trade.final_score = self.composite.final_score;
    }
}

pub struct TradeEvaluator {
    rules: ForbiddenRuleChecker,
}

impl TradeEvaluator {
    pub fn new(cfg: RulesCfg) -> Self {
        Self {
            rules: ForbiddenRuleChecker::new(cfg),
        }
    }

    /// Pure over its inputs; `history` is a read-only snapshot that excludes
    /// the candidate. The trade's own derived fields are ignored.
    pub fn evaluate(
        &self,
        trade: &Trade,
        history: &[Trade],
        account_equity: Option<f64>,
    ) -> Evaluation {
        let pnl = calculate_pnl(trade);
        let violations = self.rules.check_trade(trade, history, account_equity);
        let strategy_score = compute_strategy_score(trade, trade.indicators.as_ref());
        let composite = composite_score(strategy_score.as_ref(), &violations);
        debug!(
            "evaluated trade {}: pnl={:.4} violations={} base={} final={}",
            trade.id,
            pnl,
            violations.len(),
            composite.base_score,
            composite.final_score
        );
        Evaluation {
            pnl,
            violations,
            strategy_score,
            composite,
        }
    }
}
