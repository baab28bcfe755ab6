//! Strategy conformance scoring.
//!
//! Each declared strategy owns a fixed rubric: a list of boolean criteria with
//! weights summing to 1.0. A passed criterion earns `round(100 * weight)`.

use tracing::debug;

use crate::types::{
    Direction, StrategyCriterionScore, StrategyScoreResult, StrategyType, Trade,
    TradeIndicators, TrendDirection,
};
use crate::utils::clamp_score;

/// Breakout bar volume must exceed this multiple of average volume.
pub const VOLUME_SPIKE_RATIO: f64 = 1.5;
/// Largest stop distance, as a fraction of entry, that still limits a failed breakout.
pub const MAX_STOP_DISTANCE: f64 = 0.02;
pub const EXTREME_ZSCORE: f64 = 2.0;
pub const MIN_RISK_REWARD: f64 = 1.5;

type Predicate = fn(&Trade, &TradeIndicators) -> bool;

pub struct Criterion {
    pub code: &'static str,
    pub description: &'static str,
    pub weight: f64,
    check: Predicate,
}

pub struct Rubric {
    pub strategy: StrategyType,
    pub criteria: &'static [Criterion],
}

static BREAKOUT: Rubric = Rubric {
    strategy: StrategyType::Breakout,
    criteria: &[
        Criterion {
            code: "volume_confirmed",
            description: "Volume expanded on the breakout bar",
            weight: 0.4,
            check: volume_confirmed,
        },
        Criterion {
            code: "breakout_validity",
            description: "Entry cleared the prior range high",
            weight: 0.3,
            check: breakout_validity,
        },
        Criterion {
            code: "pullback_control",
            description: "Loss is capped if the breakout fails",
            weight: 0.3,
            check: pullback_control,
        },
    ],
};

static TREND: Rubric = Rubric {
    strategy: StrategyType::Trend,
    criteria: &[
        Criterion {
            code: "htf_alignment",
            description: "Trade agrees with the higher-timeframe trend",
            weight: 0.4,
            check: htf_alignment,
        },
        Criterion {
            code: "pullback_entry",
            description: "Entered on a pullback",
            weight: 0.3,
            check: |_, ind| ind.pullback_ok == Some(true),
        },
        Criterion {
            code: "trail_stop_quality",
            description: "Trailing stop managed correctly",
            weight: 0.3,
            check: |_, ind| ind.trail_stop_correct == Some(true),
        },
    ],
};

static COUNTER_TREND: Rubric = Rubric {
    strategy: StrategyType::CounterTrend,
    criteria: &[
        Criterion {
            code: "extreme_deviation",
            description: "Entered at an extreme statistical deviation",
            weight: 0.4,
            check: |_, ind| ind.zscore.is_some_and(|z| z > EXTREME_ZSCORE),
        },
        Criterion {
            code: "reversion_confirmation",
            description: "Reversal signal confirmed",
            weight: 0.3,
            check: |_, ind| ind.reversal_signal == Some(true),
        },
        Criterion {
            code: "tight_rr",
            description: "Tight stop secures the risk/reward",
            weight: 0.3,
            check: |_, ind| ind.risk_reward.is_some_and(|rr| rr >= MIN_RISK_REWARD),
        },
    ],
};

fn volume_confirmed(_: &Trade, ind: &TradeIndicators) -> bool {
    match (ind.volume, ind.average_volume) {
        (Some(v), Some(avg)) => v > avg * VOLUME_SPIKE_RATIO,
        _ => false,
    }
}

fn breakout_validity(trade: &Trade, ind: &TradeIndicators) -> bool {
    ind.prev_range_high.is_some_and(|high| trade.entry_price > high)
}

fn pullback_control(trade: &Trade, ind: &TradeIndicators) -> bool {
    ind.stop_loss_within_limit == Some(true)
        || trade.stop_loss.is_some_and(|sl| {
            (trade.entry_price - sl).abs() / trade.entry_price <= MAX_STOP_DISTANCE
        })
}

fn htf_alignment(trade: &Trade, ind: &TradeIndicators) -> bool {
    let expected = match trade.direction {
        Direction::Buy => TrendDirection::Up,
        Direction::Sell => TrendDirection::Down,
    };
    ind.htf_trend == Some(expected)
}

pub fn rubric(strategy: StrategyType) -> &'static Rubric {
    match strategy {
        StrategyType::Breakout => &BREAKOUT,
        StrategyType::Trend => &TREND,
        StrategyType::CounterTrend => &COUNTER_TREND,
    }
}

fn weighted_score(passed: bool, weight: f64) -> u32 {
    if passed {
        (100.0 * weight).round() as u32
    } else {
        0
    }
}

impl Rubric {
    pub fn score(&self, trade: &Trade, indicators: &TradeIndicators) -> StrategyScoreResult {
        let criteria: Vec<StrategyCriterionScore> = self
            .criteria
            .iter()
            .map(|c| {
                let passed = (c.check)(trade, indicators);
                StrategyCriterionScore {
                    code: c.code.to_string(),
                    description: c.description.to_string(),
                    weight: c.weight,
                    passed,
                    score: weighted_score(passed, c.weight),
                }
            })
            .collect();

        let total_score = clamp_score(criteria.iter().map(|c| c.score as i64).sum());
        debug!(
            "strategy {} scored {} for trade {}",
            self.strategy, total_score, trade.id
        );
        StrategyScoreResult {
            strategy: self.strategy,
            total_score,
            criteria,
        }
    }
}

/// Score a trade against its declared strategy. `None` when no indicators
/// were supplied or the trade declares no known strategy.
pub fn compute_strategy_score(
    trade: &Trade,
    indicators: Option<&TradeIndicators>,
) -> Option<StrategyScoreResult> {
    let indicators = indicators?;
    let strategy = trade.trading_type?;
    Some(rubric(strategy).score(trade, indicators))
}
