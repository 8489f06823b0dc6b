use serde::{Deserialize, Serialize};

use crate::domain::match_result::MatchResult;
use crate::processing::embedding::{has_signal, search_top_k};

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq)]
pub enum SelectionReason {
    /// Exactly one candidate matched the keyword itself.
    SingleKeywordMatch,
    /// Several keyword matches; the one closest to the keyword embedding.
    BestKeywordMatch(f32),
    /// Several keyword matches without usable embeddings; the first one.
    FirstKeywordMatch,
    /// No keyword match; the related candidate with the highest score.
    BestScore(f32),
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq)]
pub struct Selection {
    /// Position of the chosen candidate in the scored results.
    pub index: usize,
    pub reason: SelectionReason,
}

/// Pick the single best related candidate.
///
/// Keyword matches take precedence over embedding-only matches. `results`
/// and `title_embeddings` are parallel slices.
pub fn select_best(
    results: &[MatchResult],
    title_embeddings: &[Option<Vec<f32>>],
    keyword_embedding: Option<&[f32]>,
) -> Option<Selection> {
    let keyword_matches = results
        .iter()
        .enumerate()
        .filter(|(_, result)| result.is_related && result.is_keyword_match())
        .map(|(index, _)| index)
        .collect::<Vec<_>>();

    match keyword_matches.as_slice() {
        [] => best_score(results),
        [index] => Some(Selection {
            index: *index,
            reason: SelectionReason::SingleKeywordMatch,
        }),
        [first, ..] => Some(
            closest_to_keyword(&keyword_matches, title_embeddings, keyword_embedding).unwrap_or(
                Selection {
                    index: *first,
                    reason: SelectionReason::FirstKeywordMatch,
                },
            ),
        ),
    }
}

fn best_score(results: &[MatchResult]) -> Option<Selection> {
    results
        .iter()
        .enumerate()
        .filter(|(_, result)| result.is_related)
        .filter_map(|(index, result)| result.score().map(|score| (index, score)))
        .max_by(|a, b| a.1.total_cmp(&b.1).then(b.0.cmp(&a.0)))
        .map(|(index, score)| Selection {
            index,
            reason: SelectionReason::BestScore(score),
        })
}

fn closest_to_keyword(
    indices: &[usize],
    title_embeddings: &[Option<Vec<f32>>],
    keyword_embedding: Option<&[f32]>,
) -> Option<Selection> {
    let keyword_embedding = keyword_embedding.filter(|embedding| has_signal(embedding))?;

    let items = indices
        .iter()
        .filter_map(|&index| {
            let embedding = title_embeddings.get(index)?.as_ref()?;
            (embedding.len() == keyword_embedding.len() && has_signal(embedding))
                .then_some((index as u64, embedding))
        })
        .collect::<Vec<_>>();

    let (key, distance) = match search_top_k(keyword_embedding, &items, 1) {
        Ok(results) => results.into_iter().next()?,
        Err(error) => {
            log::warn!("Failed to rank keyword matches by similarity: {error}");
            return None;
        }
    };

    Some(Selection {
        index: usize::try_from(key).ok()?,
        reason: SelectionReason::BestKeywordMatch(1.0 - distance),
    })
}
