//! Trade builders shared by the unit tests.

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::types::{Direction, StrategyType, Trade, TradeIndicators, TradeStatus};

/// 2024-01-15 09:00 UTC plus `minutes`.
pub fn t(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap() + Duration::minutes(minutes)
}

pub fn trade(id: &str, direction: Direction, symbol: &str, qty: f64, entry: f64) -> Trade {
    Trade {
        id: id.to_string(),
        symbol: symbol.to_string(),
        direction,
        quantity: qty,
        entry_price: entry,
        exit_price: None,
        stop_loss: None,
        entry_time: t(0),
        exit_time: None,
        trading_type: None,
        memo: None,
        indicators: None,
        created_at: t(0),
        updated_at: t(0),
        status: TradeStatus::Open,
        pnl: 0.0,
        forbidden_violations: Vec::new(),
        forbidden_penalty: 0,
        strategy_score: None,
        final_score: 0,
    }
}

pub fn buy(id: &str, symbol: &str, qty: f64, entry: f64) -> Trade {
    trade(id, Direction::Buy, symbol, qty, entry)
}

pub fn sell(id: &str, symbol: &str, qty: f64, entry: f64) -> Trade {
    trade(id, Direction::Sell, symbol, qty, entry)
}

pub trait TradeExt {
    fn entered(self, at: DateTime<Utc>) -> Self;
    fn exited(self, price: f64, at: DateTime<Utc>) -> Self;
    fn stop(self, price: f64) -> Self;
    fn memo(self, memo: &str) -> Self;
    fn strategy(self, s: StrategyType) -> Self;
    fn indicators(self, ind: TradeIndicators) -> Self;
}

impl TradeExt for Trade {
    fn entered(mut self, at: DateTime<Utc>) -> Self {
        self.entry_time = at;
        self.created_at = at;
        self.updated_at = at;
        self
    }

    fn exited(mut self, price: f64, at: DateTime<Utc>) -> Self {
        self.exit_price = Some(price);
        self.exit_time = Some(at);
        self.status = TradeStatus::Closed;
        self
    }

    fn stop(mut self, price: f64) -> Self {
        self.stop_loss = Some(price);
        self
    }

    fn memo(mut self, memo: &str) -> Self {
        self.memo = Some(memo.to_string());
        self
    }

    fn strategy(mut self, s: StrategyType) -> Self {
        self.trading_type = Some(s);
        self
    }

    fn indicators(mut self, ind: TradeIndicators) -> Self {
        self.indicators = Some(ind);
        self
    }
}
