//! Bounded-retry HTTP GET shared by the API client and the media resolver.
//!
//! Every request goes through the same attempt loop: an optional fixed delay
//! before each attempt, `404` ends the loop immediately, a success status
//! ends it with the body, and anything else consumes one attempt.

use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use reqwest::{Client, Response, StatusCode};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::Config;
use crate::constants::ARCHIVER_USER_AGENT;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("not found: {url}")]
    NotFound { url: String },
    #[error("giving up on {url} after {attempts} attempts")]
    Exhausted { url: String, attempts: u32 },
    #[error("failed to build HTTP client")]
    Client(#[source] reqwest::Error),
}

impl TransportError {
    /// Whether the remote answered "not found" rather than failing repeatedly.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// HTTP GET with a fixed attempt budget.
#[derive(Debug, Clone)]
pub struct Transport {
    client: Client,
    max_attempts: u32,
    interval: Duration,
}

impl Transport {
    /// Build the shared client from the run configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialised.
    pub fn new(config: &Config) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(ARCHIVER_USER_AGENT)
            .build()
            .map_err(TransportError::Client)?;
        Ok(Self::with_client(
            client,
            config.max_attempts,
            config.retry_interval,
        ))
    }

    /// Wrap an existing client. `max_attempts == 0` retries forever.
    #[must_use]
    pub fn with_client(client: Client, max_attempts: u32, interval: Duration) -> Self {
        Self {
            client,
            max_attempts,
            interval,
        }
    }

    /// Fetch a whole body.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::NotFound`] on the first `404`, or
    /// [`TransportError::Exhausted`] once the attempt budget is spent.
    pub async fn fetch(&self, url: &str, params: &[(&str, String)]) -> Result<Bytes, TransportError> {
        self.execute(url, params, Response::bytes).await
    }

    /// Open a body for chunked consumption.
    ///
    /// Only the request itself is retried; a failure while reading chunks is
    /// left to the caller.
    ///
    /// # Errors
    ///
    /// Same as [`Transport::fetch`].
    pub async fn fetch_stream(&self, url: &str) -> Result<ByteStream, TransportError> {
        self.execute(url, &[], |response| async move {
            Ok(ByteStream::new(response))
        })
        .await
    }

    /// Issue a single GET and report its status, without retrying.
    ///
    /// # Errors
    ///
    /// Returns the underlying error if no response was received.
    pub async fn probe(&self, url: &str) -> Result<StatusCode, reqwest::Error> {
        let response = self.client.get(url).send().await?;
        Ok(response.status())
    }

    async fn execute<T, F, Fut>(
        &self,
        url: &str,
        params: &[(&str, String)],
        mut on_success: F,
    ) -> Result<T, TransportError>
    where
        F: FnMut(Response) -> Fut,
        Fut: Future<Output = Result<T, reqwest::Error>>,
    {
        let mut attempt = 0u32;
        loop {
            attempt = attempt.saturating_add(1);
            if !self.interval.is_zero() {
                tokio::time::sleep(self.interval).await;
            }

            debug!(url = %url, attempt, "GET");
            match self.client.get(url).query(params).send().await {
                Ok(response) if response.status() == StatusCode::NOT_FOUND => {
                    debug!(url = %url, "Remote reported not found");
                    return Err(TransportError::NotFound {
                        url: url.to_string(),
                    });
                }
                Ok(response) if response.status().is_success() => {
                    match on_success(response).await {
                        Ok(value) => return Ok(value),
                        Err(e) => warn!(url = %url, attempt, "Failed to read body: {e}"),
                    }
                }
                Ok(response) => {
                    warn!(url = %url, attempt, status = %response.status(), "Unexpected status");
                }
                Err(e) => warn!(url = %url, attempt, "Request failed: {e}"),
            }

            if self.max_attempts != 0 && attempt >= self.max_attempts {
                return Err(TransportError::Exhausted {
                    url: url.to_string(),
                    attempts: attempt,
                });
            }
        }
    }
}

/// A response body read chunk by chunk.
#[derive(Debug)]
pub struct ByteStream {
    response: Response,
    size_hint: Option<u64>,
}

impl ByteStream {
    fn new(response: Response) -> Self {
        let size_hint = response.content_length();
        Self {
            response,
            size_hint,
        }
    }

    /// Total size from `Content-Length`, if the server sent one.
    #[must_use]
    pub fn size_hint(&self) -> Option<u64> {
        self.size_hint
    }

    /// Next chunk of the body, or `None` at the end.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection drops mid-body.
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>, reqwest::Error> {
        self.response.chunk().await
    }
}

/// Give scheme-relative (`//host/path`) URIs an explicit `http:` scheme.
#[must_use]
pub fn normalize_scheme(uri: &str) -> String {
    if uri.starts_with("//") {
        format!("http:{uri}")
    } else {
        uri.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_scheme() {
        assert_eq!(
            normalize_scheme("//imgsa.baidu.com/a.jpg"),
            "http://imgsa.baidu.com/a.jpg"
        );
        assert_eq!(
            normalize_scheme("https://imgsa.baidu.com/a.jpg"),
            "https://imgsa.baidu.com/a.jpg"
        );
        assert_eq!(normalize_scheme(""), "");
    }

    #[test]
    fn test_not_found_classification() {
        let not_found = TransportError::NotFound {
            url: "http://x/".to_string(),
        };
        let exhausted = TransportError::Exhausted {
            url: "http://x/".to_string(),
            attempts: 3,
        };
        assert!(not_found.is_not_found());
        assert!(!exhausted.is_not_found());
        assert_eq!(exhausted.to_string(), "giving up on http://x/ after 3 attempts");
    }
}
