//! Forbidden-rule checks run against a candidate trade before it is journaled.
//!
//! Every check reads only the candidate and the history snapshot it is given.
//! Checks are independent: any subset may fire and none suppresses another.

use chrono::{Duration, NaiveDate};
use serde_json::{json, Value};
use tracing::debug;

use crate::config::RulesCfg;
use crate::pnl::calculate_pnl;
use crate::types::{
    Direction, ForbiddenRuleViolation, RuleCode, Severity, Trade, ViolationStats,
};
use crate::utils::contains_any_marker;

/// Static description, severity and penalty of one rule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuleMeta {
    pub code: RuleCode,
    pub description: &'static str,
    pub severity: Severity,
    pub score_penalty: u32,
}

/// Indexed by `RuleCode` discriminant.
pub static FORBIDDEN_RULES: [RuleMeta; 6] = [
    RuleMeta {
        code: RuleCode::NoStoploss,
        description: "Entered a long position without a stop-loss",
        severity: Severity::High,
        score_penalty: 20,
    },
    RuleMeta {
        code: RuleCode::OversizedPosition,
        description: "Position size exceeds the allowed share of account equity",
        severity: Severity::High,
        score_penalty: 15,
    },
    RuleMeta {
        code: RuleCode::RevengeTrade,
        description: "Re-entered shortly after a losing trade",
        severity: Severity::High,
        score_penalty: 20,
    },
    RuleMeta {
        code: RuleCode::Chasing,
        description: "Bought well above the recent average entry price",
        severity: Severity::Medium,
        score_penalty: 10,
    },
    RuleMeta {
        code: RuleCode::Overtrading,
        description: "Exceeded the daily trade limit",
        severity: Severity::Medium,
        score_penalty: 10,
    },
    RuleMeta {
        code: RuleCode::AvgDownNoPlan,
        description: "Averaged down into a losing position without a plan",
        severity: Severity::High,
        score_penalty: 15,
    },
];

pub fn rule_meta(code: RuleCode) -> &'static RuleMeta {
    &FORBIDDEN_RULES[code as usize]
}

pub struct ForbiddenRuleChecker {
    cfg: RulesCfg,
}

impl ForbiddenRuleChecker {
    pub fn new(cfg: RulesCfg) -> Self {
        Self { cfg }
    }

    /// Run all six checks in fixed order. `history` must not contain the
    /// candidate. Violations are stamped with the candidate's `created_at`.
    pub fn check_trade(
        &self,
        new_trade: &Trade,
        history: &[Trade],
        account_equity: Option<f64>,
    ) -> Vec<ForbiddenRuleViolation> {
        let hits = [
            (RuleCode::NoStoploss, self.no_stoploss(new_trade)),
            (
                RuleCode::OversizedPosition,
                account_equity
                    .filter(|eq| *eq > 0.0)
                    .and_then(|eq| self.oversized_position(new_trade, eq)),
            ),
            (RuleCode::RevengeTrade, self.revenge_trade(new_trade, history)),
            (RuleCode::Chasing, self.chasing(new_trade, history)),
            (RuleCode::Overtrading, self.overtrading(new_trade, history)),
            (RuleCode::AvgDownNoPlan, self.avg_down_no_plan(new_trade, history)),
        ];

        hits.into_iter()
            .filter_map(|(code, details)| {
                details.map(|d| {
                    debug!("rule {} fired for trade {}", code, new_trade.id);
                    create_violation(code, new_trade, d)
                })
            })
            .collect()
    }

    fn no_stoploss(&self, trade: &Trade) -> Option<Value> {
        if trade.direction == Direction::Buy && trade.stop_loss.is_none() {
            return Some(json!({ "trade_id": trade.id, "stop_loss": null }));
        }
        None
    }

    fn oversized_position(&self, trade: &Trade, account_equity: f64) -> Option<Value> {
        let size = trade.position_size();
        if size > account_equity * self.cfg.max_position_ratio {
            return Some(json!({
                "trade_id": trade.id,
                "position_size": size,
                "account_equity": account_equity,
                "ratio": size / account_equity,
            }));
        }
        None
    }

    fn revenge_trade(&self, trade: &Trade, history: &[Trade]) -> Option<Value> {
        let last_loss = latest_matching(
            history,
            |t| {
                t.exit_price.is_some()
                    && calculate_pnl(t) < 0.0
                    && t.exit_time.is_some_and(|x| x < trade.entry_time)
            },
            |t| t.exit_time,
        )
        .into_iter()
        .next()?;
        let exit_time = last_loss.exit_time?;

        let minutes = (trade.entry_time - exit_time).num_milliseconds() as f64 / 60_000.0;
        if minutes < self.cfg.revenge_trade_window_min as f64 {
            return Some(json!({
                "trade_id": trade.id,
                "last_loss_trade": last_loss.id,
                "minutes_since_loss": minutes,
            }));
        }
        None
    }

    fn chasing(&self, trade: &Trade, history: &[Trade]) -> Option<Value> {
        if trade.direction != Direction::Buy {
            return None;
        }
        let recent = latest_matching(
            history,
            |t| same_symbol(t, trade) && t.entry_time < trade.entry_time,
            |t| t.entry_time,
        );
        let recent = &recent[..recent.len().min(self.cfg.chasing_lookback)];
        let avg = average_entry(recent)?;

        let increase = (trade.entry_price - avg) / avg;
        if increase > self.cfg.chasing_threshold {
            return Some(json!({
                "trade_id": trade.id,
                "entry_price": trade.entry_price,
                "recent_avg_price": avg,
                "increase": increase,
            }));
        }
        None
    }

    fn overtrading(&self, trade: &Trade, history: &[Trade]) -> Option<Value> {
        let count = self.daily_trade_count(trade, history);
        if count > self.cfg.max_daily_trades {
            return Some(json!({
                "trade_id": trade.id,
                "daily_trade_count": count,
            }));
        }
        None
    }

    fn avg_down_no_plan(&self, trade: &Trade, history: &[Trade]) -> Option<Value> {
        if trade.direction != Direction::Buy {
            return None;
        }
        let open = latest_matching(
            history,
            |t| {
                same_symbol(t, trade)
                    && t.direction == Direction::Buy
                    && t.exit_price.is_none()
                    && t.entry_time < trade.entry_time
            },
            |t| t.entry_time,
        );
        let avg = average_entry(&open)?;

        let averaging_down = trade.entry_price < avg;
        let planned = trade
            .memo
            .as_deref()
            .is_some_and(|m| contains_any_marker(m, &self.cfg.avg_down_markers));
        if averaging_down && !planned {
            return Some(json!({
                "trade_id": trade.id,
                "symbol": trade.symbol,
                "avg_entry_price": avg,
                "open_positions": open.len(),
            }));
        }
        None
    }

    /// Trades entered on the candidate's calendar day, the candidate included.
    pub fn daily_trade_count(&self, trade: &Trade, history: &[Trade]) -> usize {
        let day = self.trading_day(trade);
        history
            .iter()
            .filter(|t| self.trading_day(t) == day)
            .count()
            + 1
    }

    /// Entry date shifted by the configured offset. Timestamps at the edge of
    /// the representable range keep their unshifted date.
    fn trading_day(&self, trade: &Trade) -> NaiveDate {
        trade
            .entry_time
            .checked_add_signed(Duration::minutes(self.cfg.day_offset_min as i64))
            .unwrap_or(trade.entry_time)
            .date_naive()
    }
}

/// Trades matching `pred`, newest first by `key`. Ties keep history order.
pub fn latest_matching<'a, K, P, F>(history: &'a [Trade], pred: P, key: F) -> Vec<&'a Trade>
where
    K: Ord,
    P: Fn(&Trade) -> bool,
    F: Fn(&Trade) -> K,
{
    let mut hits: Vec<&Trade> = history.iter().filter(|t| pred(t)).collect();
    hits.sort_by(|a, b| key(b).cmp(&key(a)));
    hits
}

fn same_symbol(a: &Trade, b: &Trade) -> bool {
    a.symbol.eq_ignore_ascii_case(&b.symbol)
}

fn average_entry(trades: &[&Trade]) -> Option<f64> {
    if trades.is_empty() {
        return None;
    }
    Some(trades.iter().map(|t| t.entry_price).sum::<f64>() / trades.len() as f64)
}

fn create_violation(code: RuleCode, trade: &Trade, details: Value) -> ForbiddenRuleViolation {
    let meta = rule_meta(code);
    ForbiddenRuleViolation {
        rule_code: code,
        description: meta.description.to_string(),
        severity: meta.severity,
        score_penalty: meta.score_penalty,
        detected_at: trade.created_at,
        details,
    }
}

pub fn calculate_total_penalty<'a>(
    violations: impl IntoIterator<Item = &'a ForbiddenRuleViolation>,
) -> u32 {
    violations.into_iter().map(|v| v.score_penalty).sum()
}

pub fn violation_stats<'a>(
    violations: impl IntoIterator<Item = &'a ForbiddenRuleViolation>,
) -> ViolationStats {
    violations
        .into_iter()
        .fold(ViolationStats::default(), |mut acc, v| {
            match v.severity {
                Severity::High => acc.high += 1,
                Severity::Medium => acc.medium += 1,
                Severity::Low => acc.low += 1,
            }
            acc.total += 1;
            acc.total_penalty += v.score_penalty;
            acc
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{buy, sell, t, TradeExt};
    use chrono::{DateTime, Utc};

    fn checker() -> ForbiddenRuleChecker {
        ForbiddenRuleChecker::new(RulesCfg::default())
    }

    fn codes(v: &[ForbiddenRuleViolation]) -> Vec<RuleCode> {
        v.iter().map(|x| x.rule_code).collect()
    }

    fn fires(v: &[ForbiddenRuleViolation], code: RuleCode) -> bool {
        v.iter().any(|x| x.rule_code == code)
    }

    // ---------- Rule table ----------

    #[test]
    fn table_is_indexed_by_code() {
        for (i, code) in RuleCode::ALL.iter().enumerate() {
            assert_eq!(FORBIDDEN_RULES[i].code, *code);
            assert_eq!(rule_meta(*code).code, *code);
        }
    }

    // ---------- No stop-loss ----------

    #[test]
    fn buy_without_stop_fires() {
        let v = checker().check_trade(&buy("n", "BTC", 0.01, 100.0), &[], None);
        assert_eq!(codes(&v), vec![RuleCode::NoStoploss]);
        assert_eq!(v[0].severity, Severity::High);
        assert_eq!(v[0].details["trade_id"], "n");
    }

    #[test]
    fn buy_with_stop_and_sells_are_clean() {
        let v = checker().check_trade(&buy("n", "BTC", 0.01, 100.0).stop(95.0), &[], None);
        assert!(v.is_empty());
        let v = checker().check_trade(&sell("s", "BTC", 0.01, 100.0), &[], None);
        assert!(v.is_empty());
    }

    // ---------- Oversized position ----------

    #[test]
    fn oversized_position_against_equity() {
        let big = buy("big", "ETH", 10.0, 2000.0).stop(1900.0);
        let v = checker().check_trade(&big, &[], Some(100_000.0));
        assert_eq!(codes(&v), vec![RuleCode::OversizedPosition]);
        assert_eq!(v[0].details["ratio"], 0.2);

        let small = buy("small", "ETH", 1.0, 2000.0).stop(1900.0);
        assert!(checker().check_trade(&small, &[], Some(100_000.0)).is_empty());
    }

    #[test]
    fn oversized_at_exact_limit_is_allowed() {
        let at_limit = buy("edge", "ETH", 5.0, 2000.0).stop(1900.0);
        assert!(checker().check_trade(&at_limit, &[], Some(100_000.0)).is_empty());
    }

    #[test]
    fn oversized_skipped_without_equity() {
        let big = buy("big", "ETH", 10.0, 2000.0).stop(1900.0);
        assert!(checker().check_trade(&big, &[], None).is_empty());
        assert!(checker().check_trade(&big, &[], Some(0.0)).is_empty());
    }

    // ---------- Revenge trade ----------

    #[test]
    fn revenge_inside_and_outside_window() {
        let loss = buy("loss", "SOL", 10.0, 120.0)
            .stop(110.0)
            .entered(t(-60))
            .exited(115.0, t(0));

        let soon = sell("soon", "BTC", 0.1, 100.0).entered(t(10));
        let v = checker().check_trade(&soon, &[loss.clone()], None);
        assert!(fires(&v, RuleCode::RevengeTrade));
        assert_eq!(v[0].details["last_loss_trade"], "loss");

        let later = sell("later", "BTC", 0.1, 100.0).entered(t(40));
        assert!(!fires(&checker().check_trade(&later, &[loss], None), RuleCode::RevengeTrade));
    }

    #[test]
    fn revenge_window_is_strict() {
        let loss = buy("loss", "SOL", 10.0, 120.0)
            .stop(110.0)
            .entered(t(-60))
            .exited(115.0, t(0));
        let check = |minutes| {
            let new = sell("n", "BTC", 0.1, 100.0).entered(t(minutes));
            fires(&checker().check_trade(&new, &[loss.clone()], None), RuleCode::RevengeTrade)
        };

        assert!(check(29));
        assert!(!check(30));
        // Loss closed at the same instant the new trade opened.
        assert!(!check(0));
    }

    #[test]
    fn revenge_ignores_wins_and_future_exits() {
        let win = buy("win", "SOL", 1.0, 100.0).entered(t(-60)).exited(110.0, t(0));
        let future_loss = sell("fl", "SOL", 1.0, 100.0).entered(t(-60)).exited(120.0, t(20));
        let new = sell("n", "SOL", 1.0, 100.0).entered(t(10));
        let v = checker().check_trade(&new, &[win, future_loss], None);
        assert!(!fires(&v, RuleCode::RevengeTrade));
    }

    #[test]
    fn revenge_uses_latest_loss() {
        let old = buy("old", "A", 1.0, 100.0).entered(t(-300)).exited(90.0, t(-200));
        let recent = sell("recent", "B", 1.0, 100.0).entered(t(-30)).exited(105.0, t(-5));
        let new = sell("n", "C", 1.0, 100.0).entered(t(0));
        let v = checker().check_trade(&new, &[old, recent], None);
        let revenge = v.iter().find(|x| x.rule_code == RuleCode::RevengeTrade).unwrap();
        assert_eq!(revenge.details["last_loss_trade"], "recent");
    }

    // ---------- Chasing ----------

    #[test]
    fn chasing_above_recent_average() {
        let hist = vec![
            buy("a", "ETH", 1.0, 100.0).stop(90.0).entered(t(-30)),
            buy("b", "ETH", 1.0, 100.0).stop(90.0).entered(t(-20)).exited(101.0, t(-10)),
        ];
        let new = buy("n", "ETH", 1.0, 106.0).stop(100.0).entered(t(300));
        let v = checker().check_trade(&new, &hist, None);
        assert_eq!(codes(&v), vec![RuleCode::Chasing]);

        let modest = buy("m", "ETH", 1.0, 104.0).stop(100.0).entered(t(300));
        assert!(checker().check_trade(&modest, &hist, None).is_empty());
    }

    #[test]
    fn chasing_at_exact_threshold_is_allowed() {
        let hist = vec![
            buy("a", "ETH", 1.0, 100.0).stop(90.0).entered(t(-30)),
            buy("b", "ETH", 1.0, 100.0).stop(90.0).entered(t(-20)).exited(101.0, t(-10)),
        ];
        let edge = buy("e", "ETH", 1.0, 105.0).stop(100.0).entered(t(300));
        assert!(!fires(&checker().check_trade(&edge, &hist, None), RuleCode::Chasing));
    }

    #[test]
    fn chasing_looks_at_latest_five_only() {
        let mut hist: Vec<Trade> = (0..5)
            .map(|i| buy(&format!("r{i}"), "ETH", 1.0, 200.0).stop(1.0).entered(t(-10 - i)))
            .collect();
        // Older cheap trades would drag the average below the threshold.
        hist.extend(
            (0..5).map(|i| buy(&format!("o{i}"), "ETH", 1.0, 10.0).stop(1.0).entered(t(-500 - i))),
        );
        let new = buy("n", "ETH", 1.0, 205.0).stop(190.0).entered(t(600));
        assert!(!fires(&checker().check_trade(&new, &hist, None), RuleCode::Chasing));
    }

    #[test]
    fn chasing_needs_same_symbol_history_and_buy() {
        let hist = vec![buy("a", "BTC", 1.0, 100.0).stop(90.0).entered(t(-300))];
        let new = buy("n", "ETH", 1.0, 500.0).stop(450.0);
        assert!(checker().check_trade(&new, &hist, None).is_empty());

        let short = sell("s", "BTC", 1.0, 500.0);
        assert!(!fires(&checker().check_trade(&short, &hist, None), RuleCode::Chasing));
    }

    // ---------- Overtrading ----------

    #[test]
    fn overtrading_counts_same_day_plus_candidate() {
        let hist: Vec<Trade> = (0..5)
            .map(|i| sell(&format!("h{i}"), "X", 1.0, 1.0).entered(t(i * 60)))
            .collect();
        let new = sell("n", "Y", 1.0, 1.0).entered(t(400));
        let v = checker().check_trade(&new, &hist, None);
        assert_eq!(codes(&v), vec![RuleCode::Overtrading]);
        assert_eq!(v[0].details["daily_trade_count"], 6);

        assert!(checker().check_trade(&new, &hist[..4], None).is_empty());
    }

    #[test]
    fn overtrading_respects_day_offset() {
        // 23:30 UTC on the 15th and 01:00 UTC on the 16th share a +09:00 day.
        let c = ForbiddenRuleChecker::new(RulesCfg {
            max_daily_trades: 1,
            day_offset_min: 9 * 60,
            ..RulesCfg::default()
        });
        let hist = vec![sell("h", "X", 1.0, 1.0).entered(t(14 * 60 + 30))];
        let new = sell("n", "X", 1.0, 1.0).entered(t(16 * 60));
        assert_eq!(c.daily_trade_count(&new, &hist), 2);

        let utc = ForbiddenRuleChecker::new(RulesCfg {
            max_daily_trades: 1,
            ..RulesCfg::default()
        });
        assert_eq!(utc.daily_trade_count(&new, &hist), 1);
    }

    #[test]
    fn trading_day_survives_timestamp_at_range_end() {
        let c = ForbiddenRuleChecker::new(RulesCfg {
            day_offset_min: 9 * 60,
            ..RulesCfg::default()
        });
        let last = sell("last", "X", 1.0, 1.0).entered(DateTime::<Utc>::MAX_UTC);
        assert_eq!(c.daily_trade_count(&last, &[]), 1);
        assert_eq!(c.daily_trade_count(&last, &[last.clone()]), 2);
        assert!(c.check_trade(&last, &[], None).is_empty());
    }

    // ---------- Averaging down ----------

    #[test]
    fn avg_down_without_plan_fires() {
        let hist = vec![buy("open", "BTC", 1.0, 50000.0).stop(45000.0).entered(t(-120))];
        let new = buy("n", "BTC", 1.0, 48000.0).stop(45000.0).memo("dip looks cheap");
        let v = checker().check_trade(&new, &hist, None);
        assert_eq!(codes(&v), vec![RuleCode::AvgDownNoPlan]);
        assert_eq!(v[0].details["open_positions"], 1);
    }

    #[test]
    fn avg_down_with_marker_is_planned() {
        let hist = vec![buy("open", "BTC", 1.0, 50000.0).stop(45000.0).entered(t(-120))];
        let new = buy("n", "BTC", 1.0, 48000.0).stop(45000.0).memo("계획된 추가매수");
        assert!(checker().check_trade(&new, &hist, None).is_empty());
    }

    #[test]
    fn avg_down_ignores_closed_and_sell_positions() {
        let hist = vec![
            buy("closed", "BTC", 1.0, 50000.0).entered(t(-300)).exited(49000.0, t(-200)),
            sell("short", "BTC", 1.0, 50000.0).entered(t(-120)),
        ];
        let new = buy("n", "BTC", 1.0, 48000.0).stop(45000.0);
        assert!(!fires(&checker().check_trade(&new, &hist, None), RuleCode::AvgDownNoPlan));
    }

    // ---------- Combined ----------

    #[test]
    fn several_rules_fire_in_fixed_order() {
        let hist = vec![
            buy("open", "ETH", 1.0, 3000.0).stop(2900.0).entered(t(-120)),
            sell("loss", "SOL", 1.0, 100.0).entered(t(-60)).exited(110.0, t(-5)),
        ];
        let new = buy("n", "ETH", 20.0, 2500.0);
        let v = checker().check_trade(&new, &hist, Some(100_000.0));
        assert_eq!(
            codes(&v),
            vec![
                RuleCode::NoStoploss,
                RuleCode::OversizedPosition,
                RuleCode::RevengeTrade,
                RuleCode::AvgDownNoPlan,
            ]
        );
        assert!(v.iter().all(|x| x.detected_at == new.created_at));
    }

    #[test]
    fn penalty_and_stats() {
        let hist = vec![sell("loss", "SOL", 1.0, 100.0).entered(t(-60)).exited(110.0, t(-5))];
        let v = checker().check_trade(&buy("n", "ETH", 1.0, 10.0), &hist, None);
        assert_eq!(calculate_total_penalty(&v), 40);

        let stats = violation_stats(&v);
        assert_eq!(stats.high, 2);
        assert_eq!(stats.medium, 0);
        assert_eq!(stats.total, 2);
        assert_eq!(stats.total_penalty, 40);

        assert_eq!(calculate_total_penalty(&[]), 0);
        assert_eq!(violation_stats(&[]), ViolationStats::default());
    }

    #[test]
    fn latest_matching_orders_newest_first() {
        let hist = vec![
            sell("a", "X", 1.0, 1.0).entered(t(5)),
            sell("b", "X", 1.0, 1.0).entered(t(50)),
            sell("c", "Y", 1.0, 1.0).entered(t(20)),
        ];
        let ids: Vec<&str> = latest_matching(&hist, |t| t.symbol == "X", |t| t.entry_time)
            .iter()
            .map(|t| t.id.as_str())
            .collect();
        assert_eq!(ids, vec!["b", "a"]);
    }
}
