use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Local, recoverable reasons a pair could not be scored.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, Error)]
pub enum ScoreError {
    #[error("title or keyword is empty")]
    EmptyInput,
    #[error("embedding vector is missing or has zero norm")]
    NoEmbeddingSignal,
    #[error("no usable image features")]
    ImageFeatureUnavailable,
}

/// Why a candidate was or was not judged related.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq)]
pub enum MatchReason {
    KeywordExactMatch,
    KeywordTokenOverlap(f32),
    TextSimilarity(f32),
    ImageSimilarity(f32),
    CombinedScore(f32),
    BelowThreshold(f32),
    Rejected(ScoreError),
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq)]
pub struct MatchResult {
    pub is_related: bool,
    pub reason: MatchReason,
}

impl MatchResult {
    pub fn related(reason: MatchReason) -> Self {
        Self {
            is_related: true,
            reason,
        }
    }

    pub fn unrelated(reason: MatchReason) -> Self {
        Self {
            is_related: false,
            reason,
        }
    }

    pub fn rejected(error: ScoreError) -> Self {
        Self::unrelated(MatchReason::Rejected(error))
    }

    /// Whether the decision came from a keyword pre-filter rather than embeddings.
    pub fn is_keyword_match(&self) -> bool {
        matches!(
            self.reason,
            MatchReason::KeywordExactMatch | MatchReason::KeywordTokenOverlap(_)
        )
    }

    /// The numeric score carried by the reason, if any.
    pub fn score(&self) -> Option<f32> {
        match self.reason {
            MatchReason::KeywordTokenOverlap(score)
            | MatchReason::TextSimilarity(score)
            | MatchReason::ImageSimilarity(score)
            | MatchReason::CombinedScore(score)
            | MatchReason::BelowThreshold(score) => Some(score),
            MatchReason::KeywordExactMatch | MatchReason::Rejected(_) => None,
        }
    }

    /// A short human-readable explanation for logs and replies.
    pub fn describe(&self) -> String {
        match self.reason {
            MatchReason::KeywordExactMatch => "keyword found in title".to_string(),
            MatchReason::KeywordTokenOverlap(ratio) => {
                format!("keyword tokens overlap title ({ratio:.3})")
            }
            MatchReason::TextSimilarity(score) => format!("text similarity {score:.4}"),
            MatchReason::ImageSimilarity(score) => format!("image similarity {score:.4}"),
            MatchReason::CombinedScore(score) => format!("combined score {score:.4}"),
            MatchReason::BelowThreshold(score) => format!("below threshold ({score:.4})"),
            MatchReason::Rejected(error) => format!("rejected: {error}"),
        }
    }
}
