//! Resource fetching over HTTP.

use std::path::Path;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::errors::LoadError;

/// Fetches engine resources from a distribution source.
#[allow(async_fn_in_trait)]
pub trait ResourceFetcher {
    /// Availability pre-check; returns the HTTP status code.
    async fn check(&self, url: &str) -> Result<u16, LoadError>;

    /// Download `url` into `dest`, reporting percent complete.
    ///
    /// Returns the number of bytes written. A non-success status is a
    /// `ResourceUnavailable` error.
    async fn fetch(
        &self,
        resource: &str,
        url: &str,
        dest: &Path,
        progress: &(dyn Fn(u8) + Send + Sync),
    ) -> Result<u64, LoadError>;
}

/// `reqwest`-backed fetcher.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

/// Upper bound on establishing a connection to a source.
///
/// Whole requests are bounded by the loader's per-resource timeouts.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

fn client_builder() -> reqwest::ClientBuilder {
    reqwest::Client::builder()
        .user_agent(concat!("spritegen/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(CONNECT_TIMEOUT)
}

impl HttpFetcher {
    pub fn new() -> Result<Self, LoadError> {
        let client = client_builder().build()?;
        Ok(Self { client })
    }
}

impl ResourceFetcher for HttpFetcher {
    async fn check(&self, url: &str) -> Result<u16, LoadError> {
        let response = self.client.head(url).send().await?;
        debug!("HEAD {} -> {}", url, response.status());
        Ok(response.status().as_u16())
    }

    async fn fetch(
        &self,
        resource: &str,
        url: &str,
        dest: &Path,
        progress: &(dyn Fn(u8) + Send + Sync),
    ) -> Result<u64, LoadError> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(LoadError::ResourceUnavailable {
                resource: resource.to_string(),
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let total_size = response.content_length().unwrap_or(0);
        let mut file = fs::File::create(dest)
            .await
            .map_err(|e| LoadError::io(format!("create {}", dest.display()), e))?;
        let mut downloaded: u64 = 0;
        let mut last_percent = None;

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk)
                .await
                .map_err(|e| LoadError::io(format!("write {}", dest.display()), e))?;
            downloaded += chunk.len() as u64;

            if total_size > 0 {
                let percent = ((downloaded as f64 / total_size as f64) * 100.0).min(100.0) as u8;
                if last_percent != Some(percent) {
                    last_percent = Some(percent);
                    progress(percent);
                }
            }
        }

        file.flush()
            .await
            .map_err(|e| LoadError::io(format!("flush {}", dest.display()), e))?;

        debug!("Fetched {} ({} bytes) to {}", url, downloaded, dest.display());
        Ok(downloaded)
    }
}
