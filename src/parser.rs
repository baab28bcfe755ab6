//! Parse journal submissions typed on one line.
//!
//! Quick entry: `BUY 0.5 BTC/USDT @ 45000 SL 44000 EXIT 47000 AS trend # memo`.
//! Lines starting with `{` are a JSON `CreateTradeRequest`.

use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::OnceLock;

use crate::error::SubmissionError;
use crate::types::{CreateTradeRequest, Direction};

fn entry_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)^(buy|sell|long|short)\s+(\d+(?:\.\d+)?)\s+([a-z0-9][a-z0-9/._-]*)\s+@\s*(\d+(?:\.\d+)?)((?:\s+(?:sl|exit|as)\s+[^\s#]+)*)\s*(?:#\s*(.*))?$",
        )
        .expect("entry pattern")
    })
}

fn option_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(sl|exit|as)\s+([^\s#]+)").expect("option pattern"))
}

/// Parse one submission line. Entry time (and exit time when `EXIT` is
/// given) is `now`.
pub fn parse_line(line: &str, now: DateTime<Utc>) -> Result<CreateTradeRequest, SubmissionError> {
    let t = line.trim();
    if t.starts_with('{') {
        return serde_json::from_str(t).map_err(|e| SubmissionError::MalformedJson(e.to_string()));
    }
    parse_entry(t, now).ok_or_else(|| SubmissionError::UnrecognizedEntry(t.to_string()))
}

pub fn parse_entry(text: &str, now: DateTime<Utc>) -> Option<CreateTradeRequest> {
    let c = entry_re().captures(text.trim())?;

    let direction: Direction = c[1].parse().ok()?;
    let quantity: f64 = c[2].parse().ok()?;
    let symbol = c[3].to_uppercase();
    let entry_price: f64 = c[4].parse().ok()?;

    let mut req = CreateTradeRequest {
        symbol,
        direction,
        quantity,
        entry_price,
        exit_price: None,
        stop_loss: None,
        entry_time: now,
        exit_time: None,
        trading_type: None,
        memo: c.get(6).map(|m| m.as_str().trim().to_string()).filter(|m| !m.is_empty()),
        indicators: None,
    };

    let opts = c.get(5).map_or("", |m| m.as_str());
    for o in option_re().captures_iter(opts) {
        let value = &o[2];
        match o[1].to_ascii_lowercase().as_str() {
            "sl" => req.stop_loss = Some(value.parse().ok()?),
            "exit" => {
                req.exit_price = Some(value.parse().ok()?);
                req.exit_time = Some(now);
            }
            "as" => req.trading_type = Some(value.to_ascii_lowercase()),
            _ => return None,
        }
    }
    Some(req)
}
