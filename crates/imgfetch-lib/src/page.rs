use crate::error::ImgFetchError;

/// Fetches the page whose images are to be downloaded. Any failure here is
/// fatal for the run.
pub async fn fetch_page(client: &reqwest::Client, url: &str) -> Result<String, ImgFetchError> {
    let page_fetch_error = |source| ImgFetchError::PageFetch {
        url: url.to_string(),
        source,
    };

    tracing::debug!(url, "Fetching page");
    let response = client
        .get(url)
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(page_fetch_error)?;
    let text = response.text().await.map_err(page_fetch_error)?;
    tracing::debug!(url, bytes = text.len(), "Fetched page");
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_fetch_page_returns_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<img src=\"cat.png\">"))
            .mount(&server)
            .await;

        let text = fetch_page(&reqwest::Client::new(), &server.uri()).await.unwrap();
        assert_eq!(text, "<img src=\"cat.png\">");
    }

    #[tokio::test]
    async fn test_fetch_page_fails_on_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = fetch_page(&reqwest::Client::new(), &server.uri())
            .await
            .unwrap_err();
        assert!(matches!(err, ImgFetchError::PageFetch { .. }));
    }
}
