use serde::{Deserialize, Serialize};

use super::ticker::Ticker;

/// Percent change between the two most recent closes of one ticker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReturnSample {
    pub ticker: Ticker,
    pub percent: f64,
}

pub type RankedList = Vec<ReturnSample>;

/// The three ranked views derived from one set of returns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rankings {
    pub gainers: RankedList,
    pub losers: RankedList,
    pub top_performers: RankedList,
}

/// Ranking sizes used when truncating the ranked lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingLimits {
    pub gainers: usize,
    pub losers: usize,
    pub top_performers: usize,
}

impl Default for RankingLimits {
    fn default() -> Self {
        Self {
            gainers: 10,
            losers: 10,
            top_performers: 15,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeMode {
    /// Final observation of the window.
    Latest,
    /// Arithmetic mean over the window.
    Mean,
}

/// Per-ticker volume figure, in fetch order.
pub type VolumeSummary = Vec<(Ticker, f64)>;
