use crate::resolve::ResolvedAddress;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::{AsyncWriteExt, BufWriter};

/// Size of the write buffer between the response body and the local file.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Request to {address} failed: {source}")]
    Transport {
        address: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{address} responded with {status}")]
    Status {
        address: String,
        status: reqwest::StatusCode,
    },

    #[error("Failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Download task for {address} did not complete: {reason}")]
    Aborted { address: String, reason: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FetchTarget {
    /// Issue the request and check the status, but store nothing.
    CheckOnly,
    /// Stream the body into this file, creating or truncating it.
    Persist(PathBuf),
}

#[derive(Clone, Debug)]
pub struct ImageFetcher {
    client: reqwest::Client,
    chunk_size: usize,
}

impl ImageFetcher {
    pub fn new(client: reqwest::Client, chunk_size: usize) -> Self {
        Self {
            client,
            chunk_size: chunk_size.max(1),
        }
    }

    /// Fetches one image. Returns the written path, or `None` in check mode.
    ///
    /// A file that was created but not completely written is removed before
    /// the error is returned.
    pub async fn fetch(
        &self,
        address: &ResolvedAddress,
        target: FetchTarget,
    ) -> Result<Option<PathBuf>, FetchError> {
        let response = self
            .client
            .get(address.as_str())
            .send()
            .await
            .map_err(|source| FetchError::Transport {
                address: address.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                address: address.to_string(),
                status,
            });
        }

        let path = match target {
            FetchTarget::CheckOnly => {
                tracing::debug!(address = %address, %status, "Reachable");
                return Ok(None);
            }
            FetchTarget::Persist(path) => path,
        };

        let file = tokio::fs::File::create(&path)
            .await
            .map_err(|source| FetchError::Io {
                path: path.clone(),
                source,
            })?;
        tracing::debug!(address = %address, path = %path.display(), "Downloading");

        match self.stream_body(address, response, file, &path).await {
            Ok(written) => {
                tracing::debug!(address = %address, path = %path.display(), bytes = written, "Downloaded");
                Ok(Some(path))
            }
            Err(err) => {
                remove_partial_file(&path).await;
                Err(err)
            }
        }
    }

    async fn stream_body(
        &self,
        address: &ResolvedAddress,
        response: reqwest::Response,
        file: tokio::fs::File,
        path: &Path,
    ) -> Result<u64, FetchError> {
        let io_error = |source| FetchError::Io {
            path: path.to_path_buf(),
            source,
        };

        let mut writer = BufWriter::with_capacity(self.chunk_size, file);
        let mut body = response.bytes_stream();
        let mut written = 0u64;

        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|source| FetchError::Transport {
                address: address.to_string(),
                source,
            })?;
            writer.write_all(&chunk).await.map_err(io_error)?;
            written += chunk.len() as u64;
        }

        writer.flush().await.map_err(io_error)?;
        Ok(written)
    }
}

async fn remove_partial_file(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "Removed partially written file");
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => {
            tracing::warn!(path = %path.display(), "Failed to remove partially written file: {}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn address(raw: String) -> ResolvedAddress {
        ResolvedAddress::from(raw)
    }

    async fn serve(server: &MockServer, route: &str, status: u16, body: Vec<u8>) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(status).set_body_bytes(body))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_persist_writes_whole_body_in_small_chunks() {
        let server = MockServer::start().await;
        let body: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        serve(&server, "/big.png", 200, body.clone()).await;
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("big.png");

        let fetcher = ImageFetcher::new(reqwest::Client::new(), 128);
        let written = fetcher
            .fetch(
                &address(format!("{}/big.png", server.uri())),
                FetchTarget::Persist(target.clone()),
            )
            .await
            .unwrap();

        assert_eq!(written, Some(target.clone()));
        assert_eq!(std::fs::read(&target).unwrap(), body);
    }

    #[tokio::test]
    async fn test_check_only_issues_request_and_returns_no_path() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/cat.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"meow".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = ImageFetcher::new(reqwest::Client::new(), DEFAULT_CHUNK_SIZE);
        let written = fetcher
            .fetch(
                &address(format!("{}/cat.png", server.uri())),
                FetchTarget::CheckOnly,
            )
            .await
            .unwrap();

        assert_eq!(written, None);
        server.verify().await;
    }

    #[tokio::test]
    async fn test_truncated_body_removes_partial_file() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    return;
                }
                request.extend_from_slice(&buf[..n]);
            }
            socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 100000\r\n\r\n")
                .await
                .unwrap();
            socket.write_all(&[7u8; 5000]).await.unwrap();
            socket.flush().await.unwrap();
        });
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("short.png");

        let fetcher = ImageFetcher::new(reqwest::Client::new(), 1024);
        let err = fetcher
            .fetch(
                &address(format!("{base}/short.png")),
                FetchTarget::Persist(target.clone()),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Transport { .. }));
        assert!(!target.exists());
    }

    #[tokio::test]
    async fn test_non_success_status_fails_without_creating_file() {
        let server = MockServer::start().await;
        serve(&server, "/missing.png", 404, Vec::new()).await;
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("missing.png");

        let fetcher = ImageFetcher::new(reqwest::Client::new(), DEFAULT_CHUNK_SIZE);
        let err = fetcher
            .fetch(
                &address(format!("{}/missing.png", server.uri())),
                FetchTarget::Persist(target.clone()),
            )
            .await
            .unwrap_err();

        assert!(
            matches!(err, FetchError::Status { status, .. } if status == reqwest::StatusCode::NOT_FOUND)
        );
        assert!(!target.exists());
    }

    #[tokio::test]
    async fn test_unwritable_target_is_an_io_failure() {
        let server = MockServer::start().await;
        serve(&server, "/cat.png", 200, b"meow".to_vec()).await;
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("no-such-dir").join("cat.png");

        let fetcher = ImageFetcher::new(reqwest::Client::new(), DEFAULT_CHUNK_SIZE);
        let err = fetcher
            .fetch(
                &address(format!("{}/cat.png", server.uri())),
                FetchTarget::Persist(target),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Io { .. }));
    }

    #[tokio::test]
    async fn test_connection_failure_is_a_transport_failure() {
        let fetcher = ImageFetcher::new(reqwest::Client::new(), DEFAULT_CHUNK_SIZE);
        let err = fetcher
            .fetch(
                &address("http://127.0.0.1:1/cat.png".to_string()),
                FetchTarget::CheckOnly,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Transport { .. }));
    }
}
