use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImgFetchError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Failed to fetch page {url}: {source}")]
    PageFetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Invalid page URL {url}: {reason}")]
    InvalidPageUrl { url: String, reason: String },

    #[error("Output directory creation failed at {path}: {reason}")]
    OutputDirectoryCreation { path: PathBuf, reason: String },

    #[error("CLI argument validation failed: {details}")]
    CliArgumentValidation { details: String },

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected error: {0}")]
    Unexpected(#[from] eyre::Report),
}
