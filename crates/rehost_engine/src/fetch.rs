use std::io::Write;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::CONTENT_TYPE;
use tempfile::NamedTempFile;

use crate::types::{FailureKind, FetchError};

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub redirect_limit: usize,
    pub max_bytes: u64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(15),
            redirect_limit: 5,
            max_bytes: 4 * 1024 * 1024,
        }
    }
}

/// A downloaded resource parked in a temp file, not yet an asset.
///
/// `byte_len` can exceed the configured cap: the transfer is aborted once the
/// cap is crossed but the partial resource is still handed back, so callers
/// can tell an oversized download apart from a network failure.
#[derive(Debug)]
pub struct TempDownload {
    pub file: NamedTempFile,
    pub byte_len: u64,
    pub content_type: Option<String>,
    pub final_url: String,
}

#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<TempDownload, FetchError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    settings: FetchSettings,
}

impl ReqwestFetcher {
    pub fn new(settings: FetchSettings) -> Self {
        Self { settings }
    }

    fn build_client(&self) -> Result<reqwest::Client, FetchError> {
        let redirect_limit = self.settings.redirect_limit;
        let policy = reqwest::redirect::Policy::custom(move |attempt| {
            if attempt.previous().len() >= redirect_limit {
                attempt.error("redirect limit exceeded")
            } else {
                attempt.follow()
            }
        });

        reqwest::Client::builder()
            .connect_timeout(self.settings.connect_timeout)
            .timeout(self.settings.request_timeout)
            .redirect(policy)
            .build()
            .map_err(|err| FetchError::new(FailureKind::Network, err.to_string()))
    }
}

#[async_trait::async_trait]
impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, url: &str) -> Result<TempDownload, FetchError> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))?;
        let client = self.build_client()?;

        let response = client
            .get(parsed)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let mut file = NamedTempFile::new()
            .map_err(|err| FetchError::new(FailureKind::Io, err.to_string()))?;

        // Announced length already over the cap: skip the body entirely and
        // report the announced size so the caller can reject it.
        if let Some(content_len) = response.content_length() {
            if content_len > self.settings.max_bytes {
                return Ok(TempDownload {
                    file,
                    byte_len: content_len,
                    content_type,
                    final_url,
                });
            }
        }

        let mut byte_len: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            file.write_all(&chunk)
                .map_err(|err| FetchError::new(FailureKind::Io, err.to_string()))?;
            byte_len += chunk.len() as u64;
            if byte_len > self.settings.max_bytes {
                // Abort the transfer; the partial file is still returned.
                break;
            }
        }
        file.flush()
            .map_err(|err| FetchError::new(FailureKind::Io, err.to_string()))?;

        Ok(TempDownload {
            file,
            byte_len,
            content_type,
            final_url,
        })
    }
}

/// Bounded-retry wrapper around a [`Fetcher`]: up to `attempts` tries with a
/// fixed `backoff` between them. Fails soft; the final failure is logged at
/// warning level and `None` lets the run continue with other candidates.
pub async fn fetch_with_retries(
    fetcher: &dyn Fetcher,
    url: &str,
    attempts: usize,
    backoff: Duration,
) -> Option<TempDownload> {
    let attempts = attempts.max(1);
    for attempt in 1..=attempts {
        match fetcher.fetch(url).await {
            Ok(download) => return Some(download),
            Err(err) if attempt < attempts => {
                log::debug!("fetch attempt {attempt}/{attempts} for {url} failed: {err}");
                tokio::time::sleep(backoff).await;
            }
            Err(err) => {
                log::warn!("giving up on {url} after {attempts} attempts: {err}");
            }
        }
    }
    None
}

fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_redirect() {
        return FetchError::new(FailureKind::RedirectLimitExceeded, err.to_string());
    }
    FetchError::new(FailureKind::Network, err.to_string())
}
