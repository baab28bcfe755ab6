//! Realized profit/loss.

use crate::types::{Direction, Trade};

/// Realized P/L of a trade; an open trade (no exit price) has none.
pub fn calculate_pnl(trade: &Trade) -> f64 {
    realized_pnl(
        trade.direction,
        trade.quantity,
        trade.entry_price,
        trade.exit_price,
    )
}

pub fn realized_pnl(direction: Direction, quantity: f64, entry: f64, exit: Option<f64>) -> f64 {
    let Some(exit) = exit else {
        return 0.0;
    };
    match direction {
        Direction::Buy => (exit - entry) * quantity,
        Direction::Sell => (entry - exit) * quantity,
    }
}
