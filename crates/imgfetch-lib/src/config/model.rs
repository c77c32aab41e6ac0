use crate::fetch::DEFAULT_CHUNK_SIZE;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub download: DownloadConfig,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct DownloadConfig {
    /// Number of images fetched at the same time.
    pub workers: usize,
    /// Only check that every image is reachable.
    pub check: bool,
    /// Where images are written. Defaults to the working directory.
    pub output_dir: Option<PathBuf>,
    /// Write buffer size in bytes.
    pub chunk_size: usize,
    /// Per-request timeout applied by the HTTP client.
    pub timeout_secs: Option<u64>,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            check: false,
            output_dir: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            timeout_secs: None,
        }
    }
}
