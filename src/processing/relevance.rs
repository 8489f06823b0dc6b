//! Relevance scoring of a scraped product title against a search keyword.
//!
//! Decisions run in a fixed order: keyword containment, the optional
//! token-overlap rule, the text-embedding gate and, when configured, the
//! image gate with its combined score. Every function here is pure and
//! never panics on malformed input; unusable input is reported through
//! [`MatchReason::Rejected`].

use crate::IMAGE_SIMILARITY_THRESHOLD;
use crate::domain::match_result::{MatchReason, MatchResult, ScoreError};
use crate::models::config::{ImageFallback, MatcherConfig};
use crate::processing::embedding::{average_embedding, cosine_similarity};

/// Drop all whitespace and lowercase ASCII letters. Hangul has no case.
pub fn normalize_for_match(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Whether the normalized keyword occurs in the normalized title.
pub fn is_exact_match(title: &str, keyword: &str) -> bool {
    let keyword = normalize_for_match(keyword);
    !keyword.is_empty() && normalize_for_match(title).contains(&keyword)
}

/// Share of keyword tokens found inside (or containing) a title token.
///
/// Keyword tokens shorter than two characters never match but still count
/// towards the total. `None` when the keyword has no tokens.
pub fn token_overlap_ratio(title: &str, keyword: &str) -> Option<f32> {
    let title = title.to_ascii_lowercase();
    let keyword = keyword.to_ascii_lowercase();
    let title_tokens = title.split_whitespace().collect::<Vec<_>>();
    let keyword_tokens = keyword.split_whitespace().collect::<Vec<_>>();
    if keyword_tokens.is_empty() {
        return None;
    }

    let matched = keyword_tokens
        .iter()
        .filter(|kw| kw.chars().count() >= 2)
        .filter(|kw| {
            title_tokens
                .iter()
                .any(|tw| tw.contains(**kw) || kw.contains(*tw))
        })
        .count();

    Some(matched as f32 / keyword_tokens.len() as f32)
}

/// Threshold gate over the text embeddings of title and keyword.
pub fn text_decision(
    title_embedding: Option<&[f32]>,
    keyword_embedding: Option<&[f32]>,
    threshold: f32,
) -> MatchResult {
    let similarity = match (title_embedding, keyword_embedding) {
        (Some(title), Some(keyword)) => cosine_similarity(title, keyword),
        _ => None,
    };
    match similarity {
        Some(similarity) if similarity >= threshold => {
            MatchResult::related(MatchReason::TextSimilarity(similarity))
        }
        Some(similarity) => MatchResult::unrelated(MatchReason::BelowThreshold(similarity)),
        None => MatchResult::rejected(ScoreError::NoEmbeddingSignal),
    }
}

/// Image gate for a candidate whose text similarity already passed.
///
/// `image_similarity` is `None` when no image features could be produced,
/// in which case the configured [`ImageFallback`] decides.
pub fn combined_decision(
    text_similarity: f32,
    image_similarity: Option<f32>,
    config: &MatcherConfig,
) -> MatchResult {
    let Some(image_similarity) = image_similarity else {
        return match config.image_fallback {
            ImageFallback::TextOnly => {
                MatchResult::related(MatchReason::TextSimilarity(text_similarity))
            }
            ImageFallback::Reject => MatchResult::rejected(ScoreError::ImageFeatureUnavailable),
        };
    };

    let threshold = config.image_threshold.unwrap_or(IMAGE_SIMILARITY_THRESHOLD);
    if image_similarity < threshold {
        return MatchResult::unrelated(MatchReason::BelowThreshold(image_similarity));
    }

    match config.combined_weights {
        Some(weights) => {
            let score = (text_similarity * weights.text + image_similarity * weights.image)
                .clamp(-1.0, 1.0);
            MatchResult::related(MatchReason::CombinedScore(score))
        }
        None => MatchResult::related(MatchReason::ImageSimilarity(image_similarity)),
    }
}

/// Outcome of the text stage.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TextStage {
    /// No further signal is needed.
    Decided(MatchResult),
    /// The text gate passed and the image gate has to run.
    AwaitingImages { text_similarity: f32 },
}

/// Scorer bound to one [`MatcherConfig`].
#[derive(Clone, Copy, Debug, Default)]
pub struct RelevanceScorer {
    config: MatcherConfig,
}

impl RelevanceScorer {
    pub fn new(config: MatcherConfig) -> Self {
        Self { config }
    }

    /// Run the keyword pre-filters and the text gate.
    pub fn score_text(
        &self,
        title: &str,
        keyword: &str,
        title_embedding: Option<&[f32]>,
        keyword_embedding: Option<&[f32]>,
    ) -> TextStage {
        if title.trim().is_empty() || keyword.trim().is_empty() {
            return TextStage::Decided(MatchResult::rejected(ScoreError::EmptyInput));
        }

        if self.config.exact_match_enabled && is_exact_match(title, keyword) {
            return TextStage::Decided(MatchResult::related(MatchReason::KeywordExactMatch));
        }

        if let Some(min_ratio) = self.config.token_overlap_ratio
            && let Some(ratio) = token_overlap_ratio(title, keyword)
            && ratio >= min_ratio
        {
            return TextStage::Decided(MatchResult::related(MatchReason::KeywordTokenOverlap(
                ratio,
            )));
        }

        let text = text_decision(title_embedding, keyword_embedding, self.config.text_threshold);
        match text.reason {
            MatchReason::TextSimilarity(text_similarity) if self.config.images_enabled() => {
                TextStage::AwaitingImages { text_similarity }
            }
            _ => TextStage::Decided(text),
        }
    }

    /// Decide the image gate from reference and candidate image embeddings.
    pub fn score_images(
        &self,
        text_similarity: f32,
        reference_embeddings: &[Vec<f32>],
        candidate_embeddings: &[Vec<f32>],
    ) -> MatchResult {
        let image_similarity = match (
            average_embedding(reference_embeddings),
            average_embedding(candidate_embeddings),
        ) {
            (Some(reference), Some(candidate)) => cosine_similarity(&reference, &candidate),
            _ => None,
        };
        combined_decision(text_similarity, image_similarity, &self.config)
    }

    /// Score a pair in one call, with image embeddings already at hand.
    ///
    /// `images` holds `(reference, candidate)` embeddings; `None` means no
    /// image features were produced.
    pub fn score(
        &self,
        title: &str,
        keyword: &str,
        title_embedding: Option<&[f32]>,
        keyword_embedding: Option<&[f32]>,
        images: Option<(&[Vec<f32>], &[Vec<f32>])>,
    ) -> MatchResult {
        match self.score_text(title, keyword, title_embedding, keyword_embedding) {
            TextStage::Decided(result) => result,
            TextStage::AwaitingImages { text_similarity } => match images {
                Some((reference, candidate)) => {
                    self.score_images(text_similarity, reference, candidate)
                }
                None => combined_decision(text_similarity, None, &self.config),
            },
        }
    }
}
