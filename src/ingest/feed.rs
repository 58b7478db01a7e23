//! Propagation feed HTTP client.
//!
//! The scheduler only needs "give me the body at this URL", so fetching
//! sits behind the `FeedFetcher` trait. `HttpFetcher` is the production
//! implementation on top of a blocking reqwest client; tests substitute
//! canned bodies.

use std::time::Duration;

use reqwest::Url;

use crate::model::FeedError;

/// Source of raw feed bodies.
pub trait FeedFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FeedError>;
}

/// Validates a configured feed URL.
///
/// Only `http` and `https` endpoints are accepted.
pub fn validate_feed_url(url: &str) -> Result<Url, FeedError> {
    let parsed = Url::parse(url).map_err(|e| FeedError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(FeedError::InvalidUrl {
            url: url.to_string(),
            reason: format!("unsupported scheme '{}'", other),
        }),
    }
}

/// Blocking HTTP fetcher for the XML feed.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    /// Builds a fetcher whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, FeedError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("propmon_service/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FeedError::Transport(e.to_string()))?;
        Ok(Self { client })
    }
}

impl FeedFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FeedError> {
        let url = validate_feed_url(url)?;

        log::debug!("Fetching: {}", url);

        let response = self
            .client
            .get(url)
            .header("Accept", "application/xml, text/xml")
            .send()
            .map_err(|e| FeedError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(FeedError::HttpStatus(response.status().as_u16()));
        }

        let body = response
            .bytes()
            .map_err(|e| FeedError::Transport(e.to_string()))?;

        if body.is_empty() {
            return Err(FeedError::EmptyResponse);
        }

        Ok(body.to_vec())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_default_feed() {
        let url = validate_feed_url(crate::model::DEFAULT_FEED_URL).expect("default URL is valid");
        assert_eq!(url.host_str(), Some("www.hamqsl.com"));
    }

    #[test]
    fn test_validate_rejects_garbage() {
        let result = validate_feed_url("not a url");
        assert!(matches!(result, Err(FeedError::InvalidUrl { .. })));
    }

    #[test]
    fn test_validate_rejects_non_http_scheme() {
        match validate_feed_url("ftp://www.hamqsl.com/solarxml.php") {
            Err(FeedError::InvalidUrl { reason, .. }) => assert!(reason.contains("ftp")),
            other => panic!("expected InvalidUrl, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_url_fails_before_any_request() {
        let fetcher = HttpFetcher::new(Duration::from_secs(1)).expect("client should build");
        let result = fetcher.fetch("::::");
        assert!(matches!(result, Err(FeedError::InvalidUrl { .. })));
    }
}
