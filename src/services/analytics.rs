use log::{debug, info};

use crate::errors::{Result, SnapshotError};
use crate::models::ranking::{RankedList, RankingLimits, Rankings, ReturnSample, VolumeMode, VolumeSummary};
use crate::models::series::{MarketSnapshot, TickerHistory};

/// Percent change between the last two closes of `history`.
pub fn return_sample(history: &TickerHistory) -> Result<ReturnSample> {
    let [.., prev, last] = history.prices.as_slice() else {
        return Err(SnapshotError::InsufficientHistory(history.ticker.to_string()));
    };
    if prev.close == 0.0 {
        return Err(SnapshotError::InsufficientHistory(history.ticker.to_string()));
    }

    Ok(ReturnSample {
        ticker: history.ticker.clone(),
        percent: (last.close - prev.close) / prev.close * 100.0,
    })
}

/// Ranks the latest returns of every ticker in `snapshot`.
///
/// Gainers are the non-negative samples sorted descending, losers the negative
/// ones sorted ascending, top performers every sample sorted descending. Ties
/// keep fetch order. Tickers without two usable closes are skipped; if none
/// remain the result is [`SnapshotError::NoData`], never an empty ranking.
pub fn compute_returns(snapshot: &MarketSnapshot, limits: &RankingLimits) -> Result<Rankings> {
    let samples: Vec<ReturnSample> = snapshot
        .histories()
        .iter()
        .filter_map(|history| match return_sample(history) {
            Ok(sample) => Some(sample),
            Err(e) => {
                debug!("Skipping return for {}: {}", history.ticker, e);
                None
            }
        })
        .collect();

    if samples.is_empty() {
        return Err(SnapshotError::NoData);
    }

    let mut descending = samples.clone();
    descending.sort_by(|a, b| b.percent.total_cmp(&a.percent));
    let mut ascending = samples;
    ascending.sort_by(|a, b| a.percent.total_cmp(&b.percent));

    let gainers: RankedList = descending
        .iter()
        .filter(|s| s.percent >= 0.0)
        .take(limits.gainers)
        .cloned()
        .collect();
    let losers: RankedList = ascending
        .into_iter()
        .filter(|s| s.percent < 0.0)
        .take(limits.losers)
        .collect();
    descending.truncate(limits.top_performers);

    info!(
        "Ranked returns: {} gainers, {} losers, {} top performers",
        gainers.len(),
        losers.len(),
        descending.len()
    );

    Ok(Rankings {
        gainers,
        losers,
        top_performers: descending,
    })
}

/// Latest or mean traded volume per ticker, in fetch order.
///
/// Tickers without volume observations are left out rather than zero-filled.
pub fn compute_volume_summary(snapshot: &MarketSnapshot, mode: VolumeMode) -> VolumeSummary {
    snapshot
        .histories()
        .iter()
        .filter_map(|history| {
            let volumes = &history.volumes;
            let value = match mode {
                VolumeMode::Latest => volumes.last()?.volume,
                VolumeMode::Mean => {
                    if volumes.is_empty() {
                        return None;
                    }
                    volumes.iter().map(|v| v.volume).sum::<f64>() / volumes.len() as f64
                }
            };
            Some((history.ticker.clone(), value))
        })
        .collect()
}
