//! Final score: strategy score minus rule penalties, clamped to [0, 100].

use serde::{Deserialize, Serialize};

use crate::rules::calculate_total_penalty;
use crate::types::{ForbiddenRuleViolation, StrategyScoreResult};
use crate::utils::clamp_score;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositeScore {
    pub penalty: u32,
    pub base_score: u32,
    pub final_score: u32,
}

pub fn composite_score(
    strategy: Option<&StrategyScoreResult>,
    violations: &[ForbiddenRuleViolation],
) -> CompositeScore {
    let penalty = calculate_total_penalty(violations);
    let base_score = strategy.map_or(0, |s| s.total_score);
    CompositeScore {
        penalty,
        base_score,
        final_score: clamp_score(base_score as i64 - penalty as i64),
    }
}
