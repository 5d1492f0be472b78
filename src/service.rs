//! Transport seam to the remote image service.

use std::future::Future;
use thiserror::Error;
use tracing::debug;
use url::Url;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Request to '{url}' failed: {message}")]
    Network { url: String, message: String },
    #[error("Request to '{url}' returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("Could not read response body from '{url}': {message}")]
    Body { url: String, message: String },
}

/// The two requests the engine makes against the image service.
///
/// Futures are not required to be `Send`: the engine runs on a single
/// cooperative event loop.
pub trait ImageService {
    /// Existence check without a body transfer (`HEAD`).
    fn probe(&self, url: &Url) -> impl Future<Output = Result<bool, TransportError>>;

    /// Full content (`GET`).
    fn fetch(&self, url: &Url) -> impl Future<Output = Result<Vec<u8>, TransportError>>;
}

#[derive(Debug, Clone, Default)]
pub struct HttpImageService {
    client: reqwest::Client,
}

impl HttpImageService {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ImageService for HttpImageService {
    async fn probe(&self, url: &Url) -> Result<bool, TransportError> {
        let response = self
            .client
            .head(url.clone())
            .send()
            .await
            .map_err(|e| TransportError::Network {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        debug!(%url, status = response.status().as_u16(), "probe response");
        Ok(response.status().is_success())
    }

    async fn fetch(&self, url: &Url) -> Result<Vec<u8>, TransportError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| TransportError::Network {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        if !response.status().is_success() {
            return Err(TransportError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        let bytes = response.bytes().await.map_err(|e| TransportError::Body {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        Ok(bytes.to_vec())
    }
}
