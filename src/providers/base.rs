use async_trait::async_trait;

use crate::errors::Result;

/// Historical window requested from a provider, in the provider's own range/interval vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lookback {
    pub range: String,
    pub interval: String,
}

impl Lookback {
    pub fn new(range: impl Into<String>, interval: impl Into<String>) -> Self {
        Self {
            range: range.into(),
            interval: interval.into(),
        }
    }
}

/// Columnar history of one symbol exactly as a provider returned it.
///
/// Columns are aligned by index with `timestamps`; gaps are `None`.
/// `symbol` is absent when the provider answered a single-symbol request
/// without echoing the symbol back.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawChart {
    pub symbol: Option<String>,
    pub utc_offset_secs: i64,
    pub timestamps: Vec<i64>,
    pub closes: Vec<Option<f64>>,
    pub adj_closes: Option<Vec<Option<f64>>>,
    pub volumes: Vec<Option<f64>>,
}

/// A source of historical quotes
#[async_trait]
pub trait QuoteSource {
    /// Name used in logs
    fn source_name(&self) -> &'static str;

    /// Fetch history for every symbol in `symbols`.
    /// Symbols the provider does not know are simply absent from the result;
    /// an error means the provider as a whole could not be reached.
    async fn fetch_history(&self, symbols: &[String], lookback: &Lookback) -> Result<Vec<RawChart>>;
}
