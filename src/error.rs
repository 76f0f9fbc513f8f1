use datafusion::{arrow::error::ArrowError, error::DataFusionError};
use reqwest::header::InvalidHeaderValue;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("DataFusion: {0}")]
    DataFusion(#[from] DataFusionError),

    #[error("Arrow: {0}")]
    Arrow(#[from] ArrowError),

    #[error("Authentication failed: {reason}")]
    Authentication { reason: String },

    #[error("No data from {endpoint}: {reason}")]
    UpstreamEmpty { endpoint: String, reason: String },

    #[error("Metric record field '{field}' is missing or has an unexpected type")]
    MalformedRecord { field: &'static str },

    #[error("API responded with error: {0}")]
    ApiFailure(#[from] reqwest::Error),

    #[error("Failed to parse URL: {0}")]
    UrlParsingFailed(#[from] url::ParseError),

    #[error("Invalid header value: {0}")]
    InvalidHeader(#[from] InvalidHeaderValue),

    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("Logger already initialised: {0}")]
    Logger(#[from] log::SetLoggerError),
}
