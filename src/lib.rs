pub mod domain;
pub mod embedders;
pub mod models;
pub mod processing;

/// Default cosine-similarity gate for title/keyword text embeddings.
pub const TEXT_SIMILARITY_THRESHOLD: f32 = 0.6;

/// Default cosine-similarity gate for averaged image embeddings.
pub const IMAGE_SIMILARITY_THRESHOLD: f32 = 0.25;
