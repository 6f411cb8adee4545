use chrono::NaiveDate;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::errors::{Result, SnapshotError};
use crate::models::series::{MarketSnapshot, PricePoint, TickerHistory, VolumePoint};
use crate::models::ticker::Ticker;
use crate::providers::base::{Lookback, QuoteSource, RawChart};
use crate::util;

/// Fetches watch-list history and hides the provider's response shape.
///
/// Whatever the source returns (one chart per request, several charts per
/// response, charts without an echoed symbol), callers only ever see a
/// [`MarketSnapshot`] holding one [`TickerHistory`] per resolved ticker.
pub struct MarketDataClient {
    source: Arc<dyn QuoteSource + Send + Sync>,
    timeout: Duration,
}

impl MarketDataClient {
    pub fn new(source: Arc<dyn QuoteSource + Send + Sync>, timeout: Duration) -> Self {
        Self { source, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Fetches `tickers` over `lookback`.
    ///
    /// Tickers the provider does not return are left out. Fails with
    /// [`SnapshotError::NoData`] only when no ticker resolved at all, and with
    /// [`SnapshotError::Timeout`] when the source exceeds the configured bound.
    pub async fn fetch(&self, tickers: &[Ticker], lookback: &Lookback) -> Result<MarketSnapshot> {
        if tickers.is_empty() {
            return Err(SnapshotError::NoData);
        }

        let symbols: Vec<String> = tickers.iter().map(|t| t.to_string()).collect();
        info!(
            "Fetching {} tickers from {} ({} / {})",
            symbols.len(),
            self.source.source_name(),
            lookback.range,
            lookback.interval
        );

        let charts = tokio::time::timeout(self.timeout, self.source.fetch_history(&symbols, lookback))
            .await
            .map_err(|_| SnapshotError::Timeout(self.timeout))??;

        let snapshot = normalize_charts(tickers, charts);
        if snapshot.is_empty() {
            warn!("Provider returned no usable data for {} tickers", tickers.len());
            return Err(SnapshotError::NoData);
        }

        info!("Resolved {} of {} tickers", snapshot.len(), tickers.len());
        Ok(snapshot)
    }
}

/// Folds raw provider charts into per-ticker histories, in `requested` order.
///
/// Charts for symbols that were not requested are ignored. A chart without a
/// symbol is attributed to the request only when exactly one ticker was asked
/// for. Tickers left with no observations are dropped.
pub fn normalize_charts(requested: &[Ticker], charts: Vec<RawChart>) -> MarketSnapshot {
    let mut by_ticker: HashMap<Ticker, TickerHistory> = HashMap::new();

    for chart in charts {
        let ticker = match (&chart.symbol, requested) {
            (Some(symbol), _) => Ticker::from_normalized(symbol.as_str()),
            (None, [only]) => only.clone(),
            (None, _) => {
                warn!("Dropping a chart without a symbol from a multi-ticker response");
                continue;
            }
        };
        if !requested.contains(&ticker) {
            debug!("Ignoring unrequested symbol {}", ticker);
            continue;
        }
        if by_ticker.contains_key(&ticker) {
            debug!("Ignoring duplicate chart for {}", ticker);
            continue;
        }

        let history = history_from_chart(ticker.clone(), &chart);
        if history.is_empty() {
            debug!("No observations for {}", ticker);
            continue;
        }
        by_ticker.insert(ticker, history);
    }

    let histories = requested
        .iter()
        .filter_map(|ticker| by_ticker.remove(ticker))
        .collect();

    MarketSnapshot::new(histories)
}

fn history_from_chart(ticker: Ticker, chart: &RawChart) -> TickerHistory {
    let closes = chart.adj_closes.as_ref().unwrap_or(&chart.closes);

    let mut prices = Vec::new();
    let mut volumes = Vec::new();

    for (i, &timestamp) in chart.timestamps.iter().enumerate() {
        let Some(date) = util::timestamp_to_date(timestamp, chart.utc_offset_secs) else {
            continue;
        };
        if let Some(close) = usable(closes.get(i)) {
            prices.push(PricePoint { date, close });
        }
        if let Some(volume) = usable(chart.volumes.get(i)) {
            volumes.push(VolumePoint { date, volume });
        }
    }

    TickerHistory {
        ticker,
        prices: strictly_increasing(prices, |p| p.date),
        volumes: strictly_increasing(volumes, |v| v.date),
    }
}

fn usable(value: Option<&Option<f64>>) -> Option<f64> {
    value.copied().flatten().filter(|v| v.is_finite())
}

/// Sorts by date and keeps the last observation for any repeated date.
fn strictly_increasing<T, F>(mut points: Vec<T>, date_of: F) -> Vec<T>
where
    F: Fn(&T) -> NaiveDate,
{
    points.sort_by_key(|p| date_of(p));
    let mut out: Vec<T> = Vec::with_capacity(points.len());
    for point in points {
        match out.last_mut() {
            Some(last) if date_of(last) == date_of(&point) => *last = point,
            _ => out.push(point),
        }
    }
    out
}
