//! Entry point. Wires stdin -> parser -> evaluation engine -> journal file.

use anyhow::Context;
use chrono::Utc;
use dotenvy::dotenv;
use serde::Serialize;
use std::{io::BufRead, path::Path, time::Duration};
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

use trade_journal::parser::parse_line;
use trade_journal::{AppConfig, Journal, TradeEvaluator, TradeFilter};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with_writer(std::io::stderr)
        .init();

    // Load config
    let cfg_path =
        std::env::var("TRADE_JOURNAL_CONFIG").unwrap_or_else(|_| "config.yaml".to_string());
    let cfg = if Path::new(&cfg_path).exists() {
        AppConfig::load(&cfg_path)?
    } else {
        info!("No config at {}, using defaults", cfg_path);
        AppConfig::default()
    };

    let journal_path = cfg.journal.resolved_path()?;
    let mut journal = Journal::load(&journal_path);
    let evaluator = TradeEvaluator::new(cfg.rules.clone());
    let equity = cfg.journal.account_equity;

    info!(
        "Journal started. File={}, Trades={}, Equity={:?}, FlushEvery={}s",
        journal_path.display(),
        journal.trades.len(),
        equity,
        cfg.journal.flush_interval_sec
    );

    // stdin -> internal MPSC (detached thread, never joined)
    let (tx, mut rx) = tokio::sync::mpsc::channel::<String>(1024);
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(l) => {
                    if tx.blocking_send(l).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    error!("stdin read failed: {:#}", e);
                    break;
                }
            }
        }
    });

    let mut flush_ticker =
        tokio::time::interval(Duration::from_secs(cfg.journal.flush_interval_sec));
    let mut dirty = false;

    loop {
        tokio::select! {
            maybe = rx.recv() => {
                let Some(line) = maybe else { break; };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let mut words = line.split_whitespace();
                match words.next().map(|w| w.to_ascii_lowercase()).as_deref() {
                    Some("quit") => break,
                    Some("list") => {
                        let limit = words.next().and_then(|n| n.parse().ok()).unwrap_or(10);
                        print_json(&journal.list(&TradeFilter { limit, ..Default::default() }));
                    }
                    Some("stats") => print_json(&journal.stats()),
                    _ => {
                        let now = Utc::now();
                        let req = match parse_line(line, now) {
                            Ok(r) => r,
                            Err(e) => { error!("{}", e); continue; }
                        };
                        match journal.submit(&evaluator, req, equity, now) {
                            Ok(trade) => {
                                print_json(trade);
                                dirty = true;
                            }
                            Err(e) => error!("submission rejected: {}", e),
                        }
                    }
                }
            }

            _ = flush_ticker.tick() => {
                if dirty {
                    match journal.save(&journal_path) {
                        Ok(()) => {
                            dirty = false;
                            info!("Journal flushed to {}", journal_path.display());
                        }
                        Err(e) => error!("journal save failed: {:#}", e),
                    }
                }
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    if dirty {
        journal
            .save(&journal_path)
            .with_context(|| format!("save journal {}", journal_path.display()))?;
    }
    info!("Journal closed with {} trades", journal.trades.len());
    Ok(())
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{}", s),
        Err(e) => error!("render output failed: {:#}", e),
    }
}
