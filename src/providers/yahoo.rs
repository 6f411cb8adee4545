use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use log::{debug, info, warn};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

use crate::errors::{Result, SnapshotError};
use crate::providers::base::{Lookback, QuoteSource, RawChart};

const CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko)";
const MAX_CONCURRENT_REQUESTS: usize = 4;

/// Yahoo Finance v8 chart endpoint
pub struct YahooChartSource {
    client: Client,
}

impl YahooChartSource {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(SnapshotError::RequestError)?;

        Ok(Self { client })
    }

    async fn fetch_symbol(&self, symbol: &str, lookback: &Lookback) -> Result<Vec<RawChart>> {
        debug!("Fetching {} ({} / {}) from Yahoo", symbol, lookback.range, lookback.interval);

        let response = self
            .client
            .get(format!("{}/{}", CHART_URL, symbol))
            .query(&[
                ("range", lookback.range.as_str()),
                ("interval", lookback.interval.as_str()),
                ("includeAdjustedClose", "true"),
            ])
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(SnapshotError::ProviderError(format!("rate limited while fetching {}", symbol)));
        }

        let text = response.text().await?;
        // Unknown symbols come back as 404 with a well-formed error body.
        if !status.is_success() && status != StatusCode::NOT_FOUND {
            return Err(SnapshotError::ProviderError(format!("HTTP {} for {}", status, symbol)));
        }

        parse_chart_response(&text)
    }
}

#[async_trait]
impl QuoteSource for YahooChartSource {
    fn source_name(&self) -> &'static str {
        "yahoo"
    }

    async fn fetch_history(&self, symbols: &[String], lookback: &Lookback) -> Result<Vec<RawChart>> {
        let results: Vec<(String, Result<Vec<RawChart>>)> = stream::iter(symbols.iter().cloned())
            .map(|symbol| async move {
                let result = self.fetch_symbol(&symbol, lookback).await;
                (symbol, result)
            })
            .buffered(MAX_CONCURRENT_REQUESTS)
            .collect()
            .await;

        let charts = merge_symbol_results(results)?;
        info!("Yahoo returned {} charts for {} symbols", charts.len(), symbols.len());
        Ok(charts)
    }
}

/// Combines per-symbol answers into one list.
///
/// Each request was for exactly one symbol, so its charts are attributed to the
/// requested symbol even when Yahoo echoes a different spelling (`BRK.B` comes
/// back as `BRK-B`). Failed symbols are dropped; only when every symbol failed
/// is the last error returned.
pub fn merge_symbol_results(results: Vec<(String, Result<Vec<RawChart>>)>) -> Result<Vec<RawChart>> {
    let requested = results.len();
    let mut charts = Vec::new();
    let mut last_error = None;
    let mut failures = 0;

    for (symbol, result) in results {
        match result {
            Ok(found) => charts.extend(found.into_iter().map(|chart| RawChart {
                symbol: Some(symbol.clone()),
                ..chart
            })),
            Err(e) => {
                warn!("Yahoo fetch failed for {}: {}", symbol, e);
                failures += 1;
                last_error = Some(e);
            }
        }
    }

    if charts.is_empty() && failures == requested {
        if let Some(e) = last_error {
            return Err(e);
        }
    }
    Ok(charts)
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: Option<ChartMeta>,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    symbol: Option<String>,
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<Quote>,
    adjclose: Option<Vec<AdjClose>>,
}

#[derive(Debug, Deserialize)]
struct Quote {
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct AdjClose {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

/// Parses a v8 chart payload into raw charts, one per `chart.result` entry.
///
/// An error body for an unknown symbol yields an empty list, not an error.
pub fn parse_chart_response(body: &str) -> Result<Vec<RawChart>> {
    let response: ChartResponse = serde_json::from_str(body)?;

    if let Some(error) = &response.chart.error {
        debug!(
            "Yahoo reported {}: {}",
            error.code.as_deref().unwrap_or("error"),
            error.description.as_deref().unwrap_or("")
        );
    }

    let charts = response
        .chart
        .result
        .unwrap_or_default()
        .into_iter()
        .map(|result| {
            let quote = result.indicators.quote.into_iter().next();
            let (closes, volumes) = match quote {
                Some(q) => (q.close, q.volume),
                None => (Vec::new(), Vec::new()),
            };
            let adj_closes = result
                .indicators
                .adjclose
                .and_then(|a| a.into_iter().next())
                .map(|a| a.adjclose);
            let (symbol, utc_offset_secs) = match result.meta {
                Some(meta) => (meta.symbol, meta.gmtoffset),
                None => (None, 0),
            };

            RawChart {
                symbol,
                utc_offset_secs,
                timestamps: result.timestamp,
                closes,
                adj_closes,
                volumes,
            }
        })
        .collect();

    Ok(charts)
}

#[cfg(test)]
mod tests {
    use super::*;

    const JPM_PAYLOAD: &str = r#"{
        "chart": {
            "result": [{
                "meta": { "symbol": "JPM", "currency": "USD", "gmtoffset": -14400 },
                "timestamp": [1729085400, 1729171800],
                "indicators": {
                    "quote": [{ "close": [224.1, 226.5], "volume": [8123400, null], "open": [223.0, 224.5] }],
                    "adjclose": [{ "adjclose": [223.2, 225.6] }]
                }
            }],
            "error": null
        }
    }"#;

    const NOT_FOUND_PAYLOAD: &str = r#"{
        "chart": { "result": null, "error": { "code": "Not Found", "description": "No data found, symbol may be delisted" } }
    }"#;

    #[test]
    fn parses_single_result_with_adjusted_close() {
        let charts = parse_chart_response(JPM_PAYLOAD).unwrap();
        assert_eq!(charts.len(), 1);
        let chart = &charts[0];
        assert_eq!(chart.symbol.as_deref(), Some("JPM"));
        assert_eq!(chart.utc_offset_secs, -14400);
        assert_eq!(chart.timestamps.len(), 2);
        assert_eq!(chart.adj_closes.as_ref().unwrap()[1], Some(225.6));
        assert_eq!(chart.volumes, vec![Some(8123400.0), None]);
    }

    #[test]
    fn not_found_body_is_empty_not_error() {
        let charts = parse_chart_response(NOT_FOUND_PAYLOAD).unwrap();
        assert!(charts.is_empty());
    }

    #[test]
    fn missing_meta_and_adjclose_are_tolerated() {
        let body = r#"{ "chart": { "result": [{ "timestamp": [1], "indicators": { "quote": [{ "close": [1.5] }] } }] } }"#;
        let charts = parse_chart_response(body).unwrap();
        assert_eq!(charts[0].symbol, None);
        assert!(charts[0].adj_closes.is_none());
        assert!(charts[0].volumes.is_empty());
    }

    #[test]
    fn charts_take_the_requested_symbol() {
        let mut answered = parse_chart_response(JPM_PAYLOAD).unwrap();
        answered[0].symbol = Some("BRK-B".to_string());
        let charts = merge_symbol_results(vec![
            ("BRK.B".to_string(), Ok(answered)),
            ("ZZZZ".to_string(), Ok(Vec::new())),
        ])
        .unwrap();
        assert_eq!(charts.len(), 1);
        assert_eq!(charts[0].symbol.as_deref(), Some("BRK.B"));
    }

    #[test]
    fn partial_failures_are_dropped() {
        let charts = merge_symbol_results(vec![
            ("JPM".to_string(), parse_chart_response(JPM_PAYLOAD)),
            ("BAC".to_string(), Err(SnapshotError::ProviderError("HTTP 500".to_string()))),
        ])
        .unwrap();
        assert_eq!(charts.len(), 1);
    }

    #[test]
    fn total_failure_is_an_error() {
        let result = merge_symbol_results(vec![
            ("JPM".to_string(), Err(SnapshotError::ProviderError("rate limited".to_string()))),
            ("BAC".to_string(), Err(SnapshotError::ProviderError("HTTP 500".to_string()))),
        ]);
        assert!(matches!(result, Err(SnapshotError::ProviderError(_))));
    }

    #[test]
    fn garbage_is_a_json_error() {
        assert!(matches!(parse_chart_response("<html>"), Err(SnapshotError::JsonError(_))));
    }
}
