//! Content provider: external data behind the query phase.
//!
//! DESIGN
//! ======
//! The dispatcher only needs two capabilities: image-of-the-day bytes for a
//! date, and one weather sample as text. `NasaProvider` satisfies both with
//! outbound HTTPS calls; the extraction steps are pure functions so they can
//! be tested without a network.
//!
//! ERROR HANDLING
//! ==============
//! Every failure maps to `ProviderError` and is reported to the client as a
//! per-request failure. There is no retry: a failed request costs the client
//! one more query, never the session.

use std::time::Duration;

use rand::Rng;

use crate::config::ProviderConfig;
use crate::frame::ErrorCode;

/// Marker preceding each pressure record in the weather feed.
const WEATHER_MARKER: &str = "\"PRE\": {";

/// Weather records are separated by the close of the previous object.
const WEATHER_RECORD_SEPARATOR: &str = "},";

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
    #[error("upstream request failed: {0}")]
    Request(String),
    #[error("upstream returned status {status}")]
    Status { status: u16 },
    #[error("no image URL in upstream response")]
    NoImageUrl,
    #[error("no weather sample in upstream response")]
    NoWeatherSample,
    #[error("upstream timed out after {0:?}")]
    Timeout(Duration),
    #[error("image of {len} bytes exceeds the {limit} byte frame limit")]
    TooLarge { len: usize, limit: usize },
}

impl ErrorCode for ProviderError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::HttpClientBuild(_) => "E_HTTP_CLIENT_BUILD",
            Self::Request(_) => "E_PROVIDER_REQUEST",
            Self::Status { .. } => "E_PROVIDER_STATUS",
            Self::NoImageUrl => "E_NO_IMAGE_URL",
            Self::NoWeatherSample => "E_NO_WEATHER_SAMPLE",
            Self::Timeout(_) => "E_PROVIDER_TIMEOUT",
            Self::TooLarge { .. } => "E_IMAGE_TOO_LARGE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Request(_) | Self::Timeout(_) | Self::Status { status: 429 | 500..=599 })
    }
}

// =============================================================================
// TRAIT
// =============================================================================

#[async_trait::async_trait]
pub trait ContentProvider: Send + Sync {
    /// Raw bytes of the image of the day for `date` (`YYYY-MM-DD`).
    async fn fetch_image(&self, date: &str) -> Result<Vec<u8>, ProviderError>;

    /// One weather sample, already reduced to plain text.
    async fn fetch_weather_sample(&self) -> Result<String, ProviderError>;
}

// =============================================================================
// NASA CLIENT
// =============================================================================

pub struct NasaProvider {
    http: reqwest::Client,
    config: ProviderConfig,
}

impl NasaProvider {
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| ProviderError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, config })
    }

    async fn get_text(&self, url: &str, query: &[(&str, &str)]) -> Result<String, ProviderError> {
        let response = self
            .http
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| ProviderError::Request(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status { status: status.as_u16() });
        }
        response
            .text()
            .await
            .map_err(|e| ProviderError::Request(e.to_string()))
    }
}

#[async_trait::async_trait]
impl ContentProvider for NasaProvider {
    async fn fetch_image(&self, date: &str) -> Result<Vec<u8>, ProviderError> {
        let listing = self
            .get_text(&self.config.apod_base_url, &[("api_key", self.config.api_key.as_str()), ("date", date)])
            .await?;
        let asset_url = extract_image_url(&listing).ok_or(ProviderError::NoImageUrl)?;
        tracing::debug!(%date, %asset_url, "provider: downloading image");

        let response = self
            .http
            .get(asset_url)
            .send()
            .await
            .map_err(|e| ProviderError::Request(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status { status: status.as_u16() });
        }
        if let Some(declared) = response.content_length() {
            check_image_size(usize::try_from(declared).unwrap_or(usize::MAX))?;
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ProviderError::Request(e.to_string()))?;
        check_image_size(bytes.len())?;
        Ok(bytes.to_vec())
    }

    async fn fetch_weather_sample(&self) -> Result<String, ProviderError> {
        let feed = self
            .get_text(
                &self.config.insight_url,
                &[("api_key", self.config.api_key.as_str()), ("feedtype", "json"), ("ver", "1.0")],
            )
            .await?;
        pick_weather_sample(&feed, &mut rand::rng()).ok_or(ProviderError::NoWeatherSample)
    }
}

// =============================================================================
// EXTRACTION
// =============================================================================

/// Reject images that cannot be carried in a single frame.
pub fn check_image_size(len: usize) -> Result<(), ProviderError> {
    if len > frames::MAX_PAYLOAD_LEN {
        return Err(ProviderError::TooLarge { len, limit: frames::MAX_PAYLOAD_LEN });
    }
    Ok(())
}

/// First double-quoted substring of `text` that looks like an HTTP(S) URL.
#[must_use]
pub fn extract_image_url(text: &str) -> Option<&str> {
    text.split('"').find(|part| is_url(part))
}

fn is_url(candidate: &str) -> bool {
    let Some(rest) = candidate
        .strip_prefix("https://")
        .or_else(|| candidate.strip_prefix("http://"))
    else {
        return false;
    };
    let host = rest.split('/').next().unwrap_or_default();
    !host.is_empty() && host.contains('.') && !candidate.chars().any(char::is_whitespace)
}

/// Every pressure record in the feed, stripped of marker and quoting.
#[must_use]
pub fn weather_samples(feed: &str) -> Vec<String> {
    feed.split(WEATHER_RECORD_SEPARATOR)
        .filter(|record| record.contains(WEATHER_MARKER) && !record.contains('['))
        .filter_map(|record| {
            let start = record.find(WEATHER_MARKER)?;
            let body = record[start + WEATHER_MARKER.len()..].replace('"', "");
            let body = body.trim();
            (!body.is_empty()).then(|| body.to_string())
        })
        .collect()
}

/// One uniformly chosen record from [`weather_samples`].
pub fn pick_weather_sample<R: Rng + ?Sized>(feed: &str, rng: &mut R) -> Option<String> {
    let mut samples = weather_samples(feed);
    if samples.is_empty() {
        return None;
    }
    let index = rng.random_range(0..samples.len());
    Some(samples.swap_remove(index))
}

#[cfg(test)]
#[path = "provider_test.rs"]
mod tests;
