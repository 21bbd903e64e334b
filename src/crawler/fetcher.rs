//! HTTP fetcher with a shared rate limit
//!
//! One [`PageFetcher`] is shared by every Fetcher worker, so the governor
//! quota bounds the whole pool rather than each worker. Redirects follow the
//! reqwest default policy; the final URL is kept on the [`FetchedPage`].

use std::num::NonZeroU32;
use std::time::Duration;

use bytes::Bytes;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::{header::CONTENT_TYPE, Client};
use url::Url;

use crate::models::FetchedPage;
use crate::utils::error::FetchError;

/// Rate-limited GET client
pub struct PageFetcher {
    /// HTTP client with configured timeout and compression
    client: Client,

    /// Limiter shared by all concurrent fetches
    rate_limiter: DefaultDirectRateLimiter,
}

impl PageFetcher {
    /// Create a fetcher
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Http` if the HTTP client cannot be created
    pub fn new(
        requests_per_second: u32,
        timeout: Duration,
        user_agent: &str,
    ) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .gzip(true)
            .user_agent(user_agent)
            .build()?;

        let rate = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = RateLimiter::direct(Quota::per_second(rate));

        Ok(Self {
            client,
            rate_limiter,
        })
    }

    /// Fetch a URL, waiting for the rate limiter first
    pub async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        self.until_ready().await;
        self.get(url).await
    }

    /// Wait until the shared rate limit admits one more request
    pub async fn until_ready(&self) {
        self.rate_limiter.until_ready().await;
    }

    /// Issue the GET without consulting the rate limiter
    ///
    /// Any HTTP status is a successful fetch; only transport failures and
    /// timeouts are errors.
    pub async fn get(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let target =
            Url::parse(url).map_err(|e| FetchError::InvalidUrl(format!("{url}: {e}")))?;

        let response = self
            .client
            .get(target)
            .send()
            .await
            .map_err(classify)?;

        let status_code = response.status().as_u16();
        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body: Bytes = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else {
                FetchError::Body(e.to_string())
            }
        })?;

        tracing::trace!(url, status = status_code, bytes = body.len(), "Fetched");

        Ok(FetchedPage {
            request_url: url.to_string(),
            final_url,
            status_code,
            content_type,
            body,
        })
    }
}

fn classify(error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Http(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetcher_creation() {
        assert!(PageFetcher::new(5, Duration::from_secs(5), "unarxiv-test").is_ok());
        // A zero rate is clamped rather than rejected
        assert!(PageFetcher::new(0, Duration::from_secs(5), "unarxiv-test").is_ok());
    }

    #[tokio::test]
    async fn test_invalid_url() {
        let fetcher = PageFetcher::new(5, Duration::from_secs(5), "unarxiv-test").unwrap();
        let result = fetcher.fetch("not a url").await;
        assert!(matches!(result, Err(FetchError::InvalidUrl(_))));
    }
}
