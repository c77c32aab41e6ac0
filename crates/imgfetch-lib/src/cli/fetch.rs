use crate::cli::params::FetchParams;
use crate::dispatch::{AggregateResult, DownloadDispatcher};
use crate::error::ImgFetchError;
use crate::extract::{dedup_references, extract_image_references};
use crate::fetch::ImageFetcher;
use crate::filename::FilenameRegistry;
use crate::page::fetch_page;
use itertools::Itertools;
use std::time::Instant;

pub async fn run_fetch(params: FetchParams) -> Result<AggregateResult, ImgFetchError> {
    let FetchParams {
        url,
        output_dir,
        options,
        chunk_size,
        timeout,
    } = params;

    tracing::info!(
        "Downloading images from {} using {} workers",
        url,
        options.parallelism
    );
    if options.check_only {
        tracing::info!("Running in check mode, files will not be saved.");
    }
    let start_time = Instant::now();

    let mut client_builder = reqwest::Client::builder();
    if let Some(timeout) = timeout {
        client_builder = client_builder.timeout(timeout);
    }
    let client = client_builder.build()?;

    let page = fetch_page(&client, &url).await?;
    let references = dedup_references(extract_image_references(&page));

    let dispatcher = DownloadDispatcher::new(
        ImageFetcher::new(client, chunk_size),
        FilenameRegistry::new(output_dir),
        options,
    );
    let result = dispatcher.run(&url, references).await;

    let elapsed = start_time.elapsed().as_secs_f64();
    if options.check_only {
        tracing::info!(
            "Checked {} images in {:.3} seconds",
            result.outcomes.len(),
            elapsed
        );
    } else {
        tracing::info!(
            "Downloaded {} images in {:.3} seconds",
            result.paths.len(),
            elapsed
        );
    }

    if result.failed {
        let failed = result.failures().collect::<Vec<_>>();
        tracing::error!(
            "{} of {} images failed: {}",
            failed.len(),
            result.outcomes.len(),
            failed
                .iter()
                .map(|outcome| outcome.remote_address.as_str())
                .join(", ")
        );
    }

    Ok(result)
}
