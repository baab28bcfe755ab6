//! Load and validate runtime configuration.

use anyhow::Context;
use directories::ProjectDirs;
use serde::Deserialize;
use std::{fs, path::Path, path::PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct JournalCfg {
    /// Journal file; defaults to the platform data directory.
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default = "default_flush_interval_sec")]
    pub flush_interval_sec: u64,
    /// Feeds the oversized-position rule; the rule is skipped when absent.
    #[serde(default)]
    pub account_equity: Option<f64>,
}

impl Default for JournalCfg {
    fn default() -> Self {
        Self {
            path: None,
            flush_interval_sec: default_flush_interval_sec(),
            account_equity: None,
        }
    }
}

impl JournalCfg {
    pub fn resolved_path(&self) -> anyhow::Result<PathBuf> {
        if let Some(p) = &self.path {
            return Ok(PathBuf::from(p));
        }
        let dirs = ProjectDirs::from("", "", "trade-journal")
            .context("no home directory to place the journal in")?;
        Ok(dirs.data_dir().join("journal.json"))
    }
}

/// Tunable risk parameters of the forbidden-rule checks.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct RulesCfg {
    /// Max position notional as a fraction of account equity.
    #[serde(default = "default_max_position_ratio")]
    pub max_position_ratio: f64,
    #[serde(default = "default_revenge_trade_window_min")]
    pub revenge_trade_window_min: i64,
    /// Fractional rise over the recent average entry that counts as chasing.
    #[serde(default = "default_chasing_threshold")]
    pub chasing_threshold: f64,
    #[serde(default = "default_chasing_lookback")]
    pub chasing_lookback: usize,
    #[serde(default = "default_max_daily_trades")]
    pub max_daily_trades: usize,
    /// Minutes east of UTC where the trader's calendar day starts.
    #[serde(default)]
    pub day_offset_min: i32,
    /// Memo phrases that mark an averaging-down buy as planned.
    #[serde(default = "default_avg_down_markers")]
    pub avg_down_markers: Vec<String>,
}

impl Default for RulesCfg {
    fn default() -> Self {
        Self {
            max_position_ratio: default_max_position_ratio(),
            revenge_trade_window_min: default_revenge_trade_window_min(),
            chasing_threshold: default_chasing_threshold(),
            chasing_lookback: default_chasing_lookback(),
            max_daily_trades: default_max_daily_trades(),
            day_offset_min: 0,
            avg_down_markers: default_avg_down_markers(),
        }
    }
}

fn default_flush_interval_sec() -> u64 {
    30
}

fn default_max_position_ratio() -> f64 {
    0.1
}

fn default_revenge_trade_window_min() -> i64 {
    30
}

fn default_chasing_threshold() -> f64 {
    0.05
}

fn default_chasing_lookback() -> usize {
    5
}

fn default_max_daily_trades() -> usize {
    5
}

fn default_avg_down_markers() -> Vec<String> {
    vec!["물타기".into(), "평균단가".into(), "추가매수".into()]
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub journal: JournalCfg,
    #[serde(default)]
    pub rules: RulesCfg,
}

impl AppConfig {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let s = fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        Self::from_yaml(&s)
    }

    pub fn from_yaml(s: &str) -> anyhow::Result<Self> {
        let cfg: Self = serde_yaml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> anyhow::Result<()> {
        let r = &self.rules;
        if !(r.max_position_ratio > 0.0) {
            anyhow::bail!("rules.max_position_ratio must be positive");
        }
        if r.revenge_trade_window_min < 0 {
            anyhow::bail!("rules.revenge_trade_window_min must not be negative");
        }
        if r.chasing_lookback == 0 {
            anyhow::bail!("rules.chasing_lookback must be at least 1");
        }
        if r.day_offset_min.abs() >= 24 * 60 {
            anyhow::bail!("rules.day_offset_min must be within one day");
        }
        if self.journal.flush_interval_sec == 0 {
            anyhow::bail!("journal.flush_interval_sec must be at least 1");
        }
        Ok(())
    }
}
