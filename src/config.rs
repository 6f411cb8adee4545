use chrono::NaiveTime;
use chrono_tz::Tz;
use log::info;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::{Result, SnapshotError};
use crate::models::ranking::RankingLimits;
use crate::models::ticker::SuffixPolicy;

pub const DEFAULT_TICKERS: [&str; 20] = [
    "JPM", "BAC", "WFC", "C", "GS", "MS", "USB", "PNC", "TFC", "BK",
    "STT", "COF", "AXP", "DFS", "ALLY", "KEY", "FITB", "HBAN", "RF", "CMA",
];

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub work_dir: PathBuf,
    pub initial_tickers: Vec<String>,
    pub suffix_policy: SuffixPolicy,
    pub ranking_limits: RankingLimits,
    pub returns_range: String,
    pub history_range: String,
    pub interval: String,
    pub fetch_timeout_secs: u64,
    pub close_time: NaiveTime,
    pub timezone: Tz,
    pub weekdays_only: bool,
    pub poll_interval_secs: u64,
    pub telegram_token: Option<String>,
    pub chat_id: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            work_dir: std::env::temp_dir().join("market_snapshot"),
            initial_tickers: DEFAULT_TICKERS.iter().map(|t| t.to_string()).collect(),
            suffix_policy: SuffixPolicy::default(),
            ranking_limits: RankingLimits::default(),
            returns_range: "2d".to_string(),
            history_range: "1mo".to_string(),
            interval: "1d".to_string(),
            fetch_timeout_secs: 30,
            close_time: NaiveTime::from_hms_opt(16, 0, 0).unwrap_or_default(),
            timezone: chrono_tz::America::New_York,
            weekdays_only: true,
            poll_interval_secs: 60,
            telegram_token: None,
            chat_id: None,
        }
    }

    /// Loads a JSON config file. Missing fields take their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|e| SnapshotError::ConfigError(format!("{}: {}", path.display(), e)))?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn with_work_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.work_dir = dir.into();
        self
    }

    pub fn with_initial_tickers(mut self, tickers: Vec<String>) -> Self {
        self.initial_tickers = tickers;
        self
    }

    pub fn with_suffix_policy(mut self, policy: SuffixPolicy) -> Self {
        self.suffix_policy = policy;
        self
    }

    pub fn with_ranking_limits(mut self, limits: RankingLimits) -> Self {
        self.ranking_limits = limits;
        self
    }

    pub fn with_fetch_timeout_secs(mut self, secs: u64) -> Self {
        self.fetch_timeout_secs = secs;
        self
    }

    pub fn with_telegram_token(mut self, token: Option<String>) -> Self {
        if token.is_some() {
            self.telegram_token = token;
        }
        self
    }

    pub fn with_chat_id(mut self, chat_id: Option<String>) -> Self {
        if chat_id.is_some() {
            self.chat_id = chat_id;
        }
        self
    }
}
