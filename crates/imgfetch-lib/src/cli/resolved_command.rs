use crate::cli::args::Command;
use crate::cli::params::FetchParams;
use crate::config::{Config, load_config};
use crate::dispatch::DispatchOptions;
use crate::error::ImgFetchError;
use std::path::PathBuf;
use std::time::Duration;

/// Merges CLI flags over the optional config file and validates the result.
/// CLI values win over file values, file values win over defaults.
pub fn resolve_command(command: Command) -> Result<FetchParams, ImgFetchError> {
    let Command {
        url,
        check,
        workers,
        config_path,
        output_dir,
    } = command;

    let app_config = match config_path {
        Some(config_path) => load_config(&config_path)?,
        None => Config::default(),
    };
    let download = app_config.download;

    let parsed = url::Url::parse(&url).map_err(|e| ImgFetchError::InvalidPageUrl {
        url: url.clone(),
        reason: e.to_string(),
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ImgFetchError::InvalidPageUrl {
            reason: format!("unsupported scheme '{}'", parsed.scheme()),
            url,
        });
    }

    let workers = workers.unwrap_or(download.workers);
    for (name, value) in [("workers", workers), ("chunk-size", download.chunk_size)] {
        if value == 0 {
            return Err(ImgFetchError::CliArgumentValidation {
                details: format!("{name} must be greater than 0."),
            });
        }
    }

    let check_only = check || download.check;
    let output_dir = output_dir
        .map(PathBuf::from)
        .or(download.output_dir)
        .unwrap_or_else(|| PathBuf::from("."));
    if !check_only {
        std::fs::create_dir_all(&output_dir).map_err(|e| {
            ImgFetchError::OutputDirectoryCreation {
                path: output_dir.clone(),
                reason: e.to_string(),
            }
        })?;
    }

    Ok(FetchParams {
        url,
        output_dir,
        options: DispatchOptions {
            parallelism: workers,
            check_only,
        },
        chunk_size: download.chunk_size,
        timeout: download.timeout_secs.map(Duration::from_secs),
    })
}
