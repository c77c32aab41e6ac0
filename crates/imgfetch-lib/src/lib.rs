pub mod cli;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod filename;
pub mod page;
pub mod reference;
pub mod resolve;

pub use config::Config;
pub use dispatch::{AggregateResult, DispatchOptions, DownloadDispatcher, DownloadOutcome};
pub use error::ImgFetchError;
pub use reference::ImageReference;
pub use resolve::ResolvedAddress;
