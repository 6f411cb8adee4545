use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::{Result, SnapshotError};

/// Exchange-suffix heuristic applied when a symbol is normalized.
///
/// A symbol of exactly `symbol_len` ASCII letters with no suffix gets `suffix`
/// appended. The default targets B3 (São Paulo) four-letter-plus-class codes
/// such as `PETRA` and will misclassify legitimate five-letter symbols from
/// other markets; set `suffix` to `None` to disable it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuffixPolicy {
    #[serde(default)]
    pub suffix: Option<String>,
    #[serde(default = "default_symbol_len")]
    pub symbol_len: usize,
}

fn default_symbol_len() -> usize {
    5
}

impl Default for SuffixPolicy {
    fn default() -> Self {
        Self {
            suffix: Some(".SA".to_string()),
            symbol_len: default_symbol_len(),
        }
    }
}

impl SuffixPolicy {
    pub fn disabled() -> Self {
        Self {
            suffix: None,
            symbol_len: default_symbol_len(),
        }
    }

    fn apply(&self, symbol: String) -> String {
        match &self.suffix {
            Some(suffix)
                if symbol.len() == self.symbol_len
                    && symbol.chars().all(|c| c.is_ascii_alphabetic())
                    && !symbol.ends_with(suffix.as_str()) =>
            {
                format!("{}{}", symbol, suffix.to_uppercase())
            }
            _ => symbol,
        }
    }
}

/// A normalized, uppercase ticker symbol.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Ticker(String);

impl Ticker {
    /// Normalizes a raw user-supplied symbol: trims, uppercases, then applies the suffix policy.
    pub fn normalize(raw: &str, policy: &SuffixPolicy) -> Result<Self> {
        let symbol = raw.trim().to_uppercase();
        if symbol.is_empty() || symbol.chars().any(char::is_whitespace) {
            return Err(SnapshotError::InvalidTicker(raw.to_string()));
        }
        Ok(Self(policy.apply(symbol)))
    }

    /// Wraps a symbol that is already in normalized form, e.g. one echoed back by the provider.
    pub fn from_normalized(symbol: impl Into<String>) -> Self {
        Self(symbol.into().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
