use chrono::NaiveDate;
use serde::Serialize;

use super::ticker::Ticker;

/// One adjusted-close observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
}

/// One traded-volume observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VolumePoint {
    pub date: NaiveDate,
    pub volume: f64,
}

/// Price and volume history of one ticker over the lookback window.
///
/// Both series are ordered by strictly increasing date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickerHistory {
    pub ticker: Ticker,
    pub prices: Vec<PricePoint>,
    pub volumes: Vec<VolumePoint>,
}

impl TickerHistory {
    pub fn is_empty(&self) -> bool {
        self.prices.is_empty() && self.volumes.is_empty()
    }
}

/// Normalized market data for one request, in the order the tickers were requested.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MarketSnapshot {
    histories: Vec<TickerHistory>,
}

impl MarketSnapshot {
    pub fn new(histories: Vec<TickerHistory>) -> Self {
        Self { histories }
    }

    pub fn histories(&self) -> &[TickerHistory] {
        &self.histories
    }

    pub fn get(&self, ticker: &Ticker) -> Option<&TickerHistory> {
        self.histories.iter().find(|h| &h.ticker == ticker)
    }

    pub fn tickers(&self) -> impl Iterator<Item = &Ticker> {
        self.histories.iter().map(|h| &h.ticker)
    }

    pub fn len(&self) -> usize {
        self.histories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.histories.is_empty()
    }
}
