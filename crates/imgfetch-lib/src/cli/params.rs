use crate::dispatch::DispatchOptions;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct FetchParams {
    pub url: String,
    pub output_dir: PathBuf,
    pub options: DispatchOptions,
    pub chunk_size: usize,
    pub timeout: Option<Duration>,
}
