//! Helpers for integration tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use url::Url;

use ssadagu_matcher::embedders::{
    EmbeddingError, EmbeddingResult, ImageEmbedder, ImageSource, TextEmbedder,
};
use ssadagu_matcher::models::config::MatcherConfig;
use ssadagu_matcher::processing::matching::Matcher;
use ssadagu_matcher::processing::relevance::RelevanceScorer;

/// Unit vector whose cosine with [`keyword_axis`] is `similarity`.
pub fn at_similarity(similarity: f32) -> Vec<f32> {
    vec![similarity, (1.0 - similarity * similarity).max(0.0).sqrt()]
}

pub fn keyword_axis() -> Vec<f32> {
    vec![1.0, 0.0]
}

/// Text embedder backed by a lookup table; unknown texts embed to zeros.
#[derive(Default)]
pub struct FakeTextEmbedder {
    vectors: HashMap<String, Vec<f32>>,
    fail: bool,
    pub calls: usize,
}

impl FakeTextEmbedder {
    pub fn with(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.vectors.insert(text.to_string(), vector);
        self
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }
}

impl TextEmbedder for FakeTextEmbedder {
    fn embed(&mut self, texts: &[String]) -> EmbeddingResult<Vec<Vec<f32>>> {
        self.calls += 1;
        if self.fail {
            return Err(EmbeddingError::Embed("model offline".to_string()));
        }
        Ok(texts
            .iter()
            .map(|text| self.vectors.get(text).cloned().unwrap_or(vec![0.0, 0.0]))
            .collect())
    }

    fn model_name(&self) -> &str {
        "fake-text"
    }
}

/// Image embedder keyed by image bytes; the bytes `b"corrupt"` fail to decode.
#[derive(Default)]
pub struct FakeImageEmbedder {
    vectors: HashMap<Vec<u8>, Vec<f32>>,
}

impl FakeImageEmbedder {
    pub fn with(mut self, bytes: &[u8], vector: Vec<f32>) -> Self {
        self.vectors.insert(bytes.to_vec(), vector);
        self
    }
}

impl ImageEmbedder for FakeImageEmbedder {
    fn embed_images(&mut self, images: &[Vec<u8>]) -> EmbeddingResult<Vec<Vec<f32>>> {
        images
            .iter()
            .map(|image| {
                if image.as_slice() == b"corrupt" {
                    return Err(EmbeddingError::Embed("cannot decode image".to_string()));
                }
                Ok(self.vectors.get(image).cloned().unwrap_or(vec![0.0, 0.0]))
            })
            .collect()
    }

    fn model_name(&self) -> &str {
        "fake-image"
    }
}

/// Image source serving fixed bytes per URL and recording every request.
#[derive(Default)]
pub struct FakeImageSource {
    images: HashMap<String, Vec<u8>>,
    requested: Mutex<Vec<String>>,
}

impl FakeImageSource {
    pub fn with(mut self, url: &str, bytes: &[u8]) -> Self {
        self.images.insert(url.to_string(), bytes.to_vec());
        self
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().expect("requests mutex poisoned").clone()
    }
}

#[async_trait]
impl ImageSource for FakeImageSource {
    async fn fetch(&self, url: &str) -> Option<Vec<u8>> {
        self.requested
            .lock()
            .expect("requests mutex poisoned")
            .push(url.to_string());
        self.images.get(url).cloned()
    }
}

pub type TestMatcher = Matcher<FakeTextEmbedder, FakeImageEmbedder, FakeImageSource>;

pub fn matcher(
    config: MatcherConfig,
    text: FakeTextEmbedder,
    images: Option<FakeImageEmbedder>,
    source: FakeImageSource,
) -> TestMatcher {
    Matcher::new(
        RelevanceScorer::new(config),
        text,
        images,
        source,
        Url::parse("https://ssadagu.kr").expect("valid base url"),
        5,
    )
}
