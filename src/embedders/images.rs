use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future;
use tokio::sync::Semaphore;
use url::Url;

use crate::embedders::{EmbeddingError, EmbeddingResult, ImageSource};
use crate::models::config::ImageSourceConfig;

/// Downloads product images over HTTP, limiting concurrent requests
/// with a [`Semaphore`].
pub struct HttpImageSource {
    client: reqwest::Client,
    semaphore: Arc<Semaphore>,
}

impl HttpImageSource {
    pub fn new(config: &ImageSourceConfig) -> EmbeddingResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EmbeddingError::Init {
                model: "http image source".to_string(),
                message: e.to_string(),
            })?;
        Ok(Self {
            client,
            semaphore: Arc::new(Semaphore::new(config.fetch_concurrency)),
        })
    }
}

#[async_trait]
impl ImageSource for HttpImageSource {
    /// A permit from the internal [`Semaphore`] is acquired before issuing
    /// the request, enforcing the configured concurrency limit.
    async fn fetch(&self, url: &str) -> Option<Vec<u8>> {
        let _permit = self.semaphore.acquire().await.ok()?;
        let res = match self.client.get(url).send().await {
            Ok(res) => res,
            Err(e) => {
                log::warn!("Failed to get image {url}: {e}");
                return None;
            }
        };
        if !res.status().is_success() {
            log::warn!("Failed to get image {}: {}", url, res.status());
            return None;
        }
        let bytes = match res.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                log::warn!("Failed to read image body {url}: {e}");
                return None;
            }
        };
        if bytes.is_empty() {
            return None;
        }
        Some(bytes.to_vec())
    }
}

/// Resolve an image `src` attribute the way the reseller pages use them.
///
/// Protocol-relative and root-relative paths are resolved against `base`,
/// absolute `http(s)` URLs are kept, anything else is skipped.
pub fn resolve_image_url(src: &str, base: &Url) -> Option<String> {
    let src = src.trim();
    if src.starts_with("//") || src.starts_with('/') {
        return base.join(src).ok().map(|url| url.to_string());
    }
    let url = Url::parse(src).ok()?;
    matches!(url.scheme(), "http" | "https").then(|| url.to_string())
}

/// Fetch up to `limit` images concurrently, keeping the ones that downloaded.
///
/// Returns the image bytes and the number of failed downloads.
pub async fn fetch_images<S>(
    source: &S,
    urls: &[String],
    base: &Url,
    limit: usize,
) -> (Vec<Vec<u8>>, usize)
where
    S: ImageSource + ?Sized,
{
    let resolved = urls
        .iter()
        .filter_map(|src| resolve_image_url(src, base))
        .take(limit)
        .collect::<Vec<_>>();

    let tasks = resolved.iter().map(|url| source.fetch(url));
    let fetched = future::join_all(tasks).await;

    let total = fetched.len();
    let images = fetched.into_iter().flatten().collect::<Vec<_>>();
    let failures = total - images.len();
    (images, failures)
}
