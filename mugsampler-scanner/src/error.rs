use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },

    #[error("Invalid selector '{0}'")]
    Selector(String),
}

pub type Result<T> = std::result::Result<T, ScanError>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Blob store request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Blob store answered with status {status} for '{key}'")]
    Status { key: String, status: u16 },

    #[error("Invalid blob store endpoint '{0}'")]
    InvalidEndpoint(String),

    #[error("Invalid object key '{0}'")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
