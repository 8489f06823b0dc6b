use std::fmt::Debug;

use async_trait::async_trait;
use thiserror::Error;

pub mod images;
pub mod local;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("failed to initialize model {model}: {message}")]
    Init { model: String, message: String },
    #[error("failed to generate embeddings: {0}")]
    Embed(String),
    #[error("no embedding model could be initialized: {}", .0.join("; "))]
    NoModelAvailable(Vec<String>),
}

pub type EmbeddingResult<T> = Result<T, EmbeddingError>;

/// Capability interface over text embedding models.
pub trait TextEmbedder {
    /// Embed every text, returning one vector per input in the same order.
    fn embed(&mut self, texts: &[String]) -> EmbeddingResult<Vec<Vec<f32>>>;

    /// Identifier of the loaded model, used in logs.
    fn model_name(&self) -> &str;
}

/// Capability interface over image feature extractors.
pub trait ImageEmbedder {
    /// Embed encoded images (JPEG, PNG, ...). Undecodable input fails the batch.
    fn embed_images(&mut self, images: &[Vec<u8>]) -> EmbeddingResult<Vec<Vec<f32>>>;

    fn model_name(&self) -> &str;
}

/// Source of raw image bytes, typically remote product photos.
#[async_trait]
pub trait ImageSource: Send + Sync {
    /// Fetches a single image. Failures are logged and reported as `None`.
    async fn fetch(&self, url: &str) -> Option<Vec<u8>>;
}

/// Initialize the first model of `models` that loads successfully.
///
/// Each failure is logged and remembered; when every model fails the
/// collected messages are returned in [`EmbeddingError::NoModelAvailable`].
pub fn init_with_fallback<M, E, F>(models: &[M], mut init: F) -> EmbeddingResult<(M, E)>
where
    M: Copy + Debug,
    F: FnMut(M) -> EmbeddingResult<E>,
{
    let mut failures = Vec::with_capacity(models.len());
    for &model in models {
        match init(model) {
            Ok(embedder) => {
                log::info!("Loaded embedding model {model:?}");
                return Ok((model, embedder));
            }
            Err(error) => {
                log::warn!("Embedding model {model:?} unavailable, trying next: {error}");
                failures.push(error.to_string());
            }
        }
    }
    Err(EmbeddingError::NoModelAvailable(failures))
}
