use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("No usable market data for the requested symbols")]
    NoData,

    #[error("Insufficient history for {0}: at least 2 points are required")]
    InsufficientHistory(String),

    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("Market data fetch exceeded {0:?}")]
    Timeout(Duration),

    #[error("Chart rendering failed: {0}")]
    RenderError(String),

    #[error("Nothing to render")]
    NothingToRender,

    #[error("Report composition failed: {0}")]
    ComposeError(String),

    #[error("Delivery failed: {0}")]
    DeliveryError(String),

    #[error("Invalid ticker symbol: {0:?}")]
    InvalidTicker(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

pub type Result<T> = std::result::Result<T, SnapshotError>;

impl SnapshotError {
    /// Short text shown to the requester. Diagnostic detail stays in the logs.
    pub fn user_message(&self) -> &'static str {
        match self {
            SnapshotError::NoData | SnapshotError::ProviderError(_) | SnapshotError::RequestError(_) => {
                "Could not retrieve market data."
            }
            SnapshotError::InsufficientHistory(_) => "Not enough price history to compute returns.",
            SnapshotError::Timeout(_) => "The market data provider took too long to respond.",
            SnapshotError::RenderError(_) | SnapshotError::NothingToRender => "A chart could not be generated.",
            SnapshotError::ComposeError(_) => "The report document could not be assembled.",
            SnapshotError::DeliveryError(_) => "The report could not be sent.",
            SnapshotError::InvalidTicker(_) => "Please provide a valid ticker symbol.",
            _ => "Something went wrong while generating the snapshot.",
        }
    }
}

impl From<String> for SnapshotError {
    fn from(s: String) -> Self {
        SnapshotError::Unknown(s)
    }
}

impl From<&str> for SnapshotError {
    fn from(s: &str) -> Self {
        SnapshotError::Unknown(s.to_string())
    }
}
