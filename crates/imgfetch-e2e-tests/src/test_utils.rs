use eyre::Result;
use imgfetch_lib::cli::{Command, FetchParams, resolve_command};
use imgfetch_lib::config::Config;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const SIMPLE_PAGE: &str = include_str!("../fixtures/simple.html");
pub const GALLERY_PAGE: &str = include_str!("../fixtures/gallery.html");

const IMAGE_PATH_PATTERN: &str = r"\.(png|jpe?g|gif|svg|webp)$";

pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter("imgfetch_lib=debug,imgfetch_e2e_tests=debug")
        .with_test_writer()
        .try_init()
        .ok();
}

pub fn setup_test_environment() -> Result<TempDir> {
    Ok(tempfile::tempdir()?)
}

/// Starts a mock server that serves `page` at `/`.
pub async fn start_site(page: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page))
        .mount(&server)
        .await;
    server
}

/// Answers every image path with its own path as the body. Give more specific
/// mocks a higher priority to override it.
pub async fn serve_all_images(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path_regex(IMAGE_PATH_PATTERN))
        .respond_with(|request: &wiremock::Request| {
            ResponseTemplate::new(200)
                .set_body_raw(request.url.path().as_bytes().to_vec(), "image/png")
        })
        .mount(server)
        .await;
}

pub fn fetch_params(url: &str, output_dir: &Path, workers: usize, check: bool) -> FetchParams {
    resolve_command(Command {
        url: url.to_string(),
        check,
        workers: Some(workers),
        config_path: None,
        output_dir: Some(output_dir.to_string_lossy().into_owned()),
    })
    .expect("Failed to resolve fetch command")
}

pub fn file_count(dir: &Path) -> usize {
    std::fs::read_dir(dir)
        .map(|entries| entries.count())
        .unwrap_or(0)
}

pub fn write_config(dir: &Path, config: &Config) -> Result<PathBuf> {
    let config_path = dir.join("imgfetch.json");
    std::fs::write(&config_path, serde_json::to_string_pretty(config)?)?;
    tracing::debug!(path = %config_path.display(), "Wrote test config");
    Ok(config_path)
}
