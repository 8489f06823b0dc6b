use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::domain::match_result::{MatchReason, MatchResult};
use crate::domain::product::ProductCandidate;
use crate::embedders::images::fetch_images;
use crate::embedders::{ImageEmbedder, ImageSource, TextEmbedder};
use crate::processing::embedding::cosine_similarity;
use crate::processing::relevance::{RelevanceScorer, TextStage};
use crate::processing::selection::{Selection, select_best};

/// A keyword and the scraped listings to judge against it.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct MatchRequest {
    pub keyword: String,
    pub candidates: Vec<ProductCandidate>,
    /// Images that show what the keyword looks like; used by the image gate.
    #[serde(default)]
    pub reference_image_urls: Vec<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct CandidateMatch {
    pub url: String,
    pub title: String,
    pub result: MatchResult,
    pub explanation: String,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct MatchStats {
    pub candidates_received: usize,
    pub skipped_placeholder_title: usize,
    pub exact_matches: usize,
    pub token_overlap_matches: usize,
    pub text_matches: usize,
    pub image_matches: usize,
    pub below_threshold: usize,
    pub rejected: usize,
    pub text_embeddings_generated: usize,
    pub image_embeddings_generated: usize,
    pub image_fetch_failures: usize,
    pub image_decode_failures: usize,
}

impl MatchStats {
    fn record(&mut self, result: &MatchResult) {
        match result.reason {
            MatchReason::KeywordExactMatch => self.exact_matches += 1,
            MatchReason::KeywordTokenOverlap(_) => self.token_overlap_matches += 1,
            MatchReason::TextSimilarity(_) => self.text_matches += 1,
            MatchReason::ImageSimilarity(_) | MatchReason::CombinedScore(_) => {
                self.image_matches += 1
            }
            MatchReason::BelowThreshold(_) => self.below_threshold += 1,
            MatchReason::Rejected(_) => self.rejected += 1,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct MatchResponse {
    pub keyword: String,
    pub results: Vec<CandidateMatch>,
    /// The best related candidate, by position in `results`, and why it won.
    pub selected: Option<Selection>,
    pub stats: MatchStats,
    pub scored_at: DateTime<Utc>,
}

impl MatchResponse {
    pub fn selected_candidate(&self) -> Option<&CandidateMatch> {
        self.selected
            .and_then(|selection| self.results.get(selection.index))
    }
}

/// Scores scraped candidates for a keyword using the configured embedders.
pub struct Matcher<T, I, S> {
    scorer: RelevanceScorer,
    text_embedder: T,
    image_embedder: Option<I>,
    image_source: S,
    image_base: Url,
    max_images: usize,
}

impl<T, I, S> Matcher<T, I, S>
where
    T: TextEmbedder,
    I: ImageEmbedder,
    S: ImageSource,
{
    /// `image_embedder` may be `None`; the image gate then sees no features.
    pub fn new(
        scorer: RelevanceScorer,
        text_embedder: T,
        image_embedder: Option<I>,
        image_source: S,
        image_base: Url,
        max_images: usize,
    ) -> Self {
        Self {
            scorer,
            text_embedder,
            image_embedder,
            image_source,
            image_base,
            max_images,
        }
    }

    pub fn text_embedder_mut(&mut self) -> &mut T {
        &mut self.text_embedder
    }

    pub fn image_source(&self) -> &S {
        &self.image_source
    }

    /// Cosine similarity between the embeddings of two texts.
    pub fn similarity(&mut self, first: &str, second: &str) -> Option<f32> {
        let texts = vec![first.to_string(), second.to_string()];
        match self.text_embedder.embed(&texts) {
            Ok(vectors) => match vectors.as_slice() {
                [a, b] => cosine_similarity(a, b),
                _ => None,
            },
            Err(e) => {
                log::error!("Failed to embed similarity pair: {e}");
                None
            }
        }
    }

    /// Judge every candidate against the keyword and select the best one.
    ///
    /// Candidates without a real title are skipped. Embedding failures
    /// degrade to "no signal" instead of failing the request.
    pub async fn process_match_request(&mut self, request: MatchRequest) -> MatchResponse {
        log::info!(
            "Received match request for keyword {:?} with {} candidates",
            request.keyword,
            request.candidates.len()
        );

        let mut stats = MatchStats {
            candidates_received: request.candidates.len(),
            ..Default::default()
        };

        let candidates = request
            .candidates
            .into_iter()
            .filter(|candidate| candidate.has_title())
            .collect::<Vec<_>>();
        stats.skipped_placeholder_title = stats.candidates_received - candidates.len();

        let keyword = request.keyword;
        let (keyword_embedding, title_embeddings) = if keyword.trim().is_empty() {
            (None, vec![None; candidates.len()])
        } else {
            self.embed_keyword_and_titles(&keyword, &candidates, &mut stats)
        };

        let mut reference_embeddings: Option<Vec<Vec<f32>>> = None;
        let mut results = Vec::with_capacity(candidates.len());
        for (candidate, title_embedding) in candidates.iter().zip(&title_embeddings) {
            let stage = self.scorer.score_text(
                &candidate.title,
                &keyword,
                title_embedding.as_deref(),
                keyword_embedding.as_deref(),
            );
            let result = match stage {
                TextStage::Decided(result) => result,
                TextStage::AwaitingImages { text_similarity } => {
                    if reference_embeddings.is_none() {
                        reference_embeddings = Some(
                            self.embed_images(&request.reference_image_urls, &mut stats)
                                .await,
                        );
                    }
                    let candidate_embeddings =
                        self.embed_images(&candidate.image_urls, &mut stats).await;
                    self.scorer.score_images(
                        text_similarity,
                        reference_embeddings.as_deref().unwrap_or(&[]),
                        &candidate_embeddings,
                    )
                }
            };
            log::debug!(
                "Candidate {:?}: related={} ({})",
                candidate.title,
                result.is_related,
                result.describe()
            );
            stats.record(&result);
            results.push(result);
        }

        let selected = select_best(&results, &title_embeddings, keyword_embedding.as_deref());

        log::info!(
            "Finished match request for keyword {keyword:?}: candidates_received={}, skipped_placeholder_title={}, exact_matches={}, token_overlap_matches={}, text_matches={}, image_matches={}, below_threshold={}, rejected={}, text_embeddings_generated={}, image_embeddings_generated={}, image_fetch_failures={}, image_decode_failures={}",
            stats.candidates_received,
            stats.skipped_placeholder_title,
            stats.exact_matches,
            stats.token_overlap_matches,
            stats.text_matches,
            stats.image_matches,
            stats.below_threshold,
            stats.rejected,
            stats.text_embeddings_generated,
            stats.image_embeddings_generated,
            stats.image_fetch_failures,
            stats.image_decode_failures
        );
        match selected {
            Some(selection) => log::info!(
                "Selected {:?} for keyword {keyword:?}: {:?}",
                candidates[selection.index].title,
                selection.reason
            ),
            None => log::warn!("No related product found for keyword {keyword:?}"),
        }

        let results = candidates
            .into_iter()
            .zip(results)
            .map(|(candidate, result)| CandidateMatch {
                url: candidate.url,
                title: candidate.title,
                explanation: result.describe(),
                result,
            })
            .collect();

        MatchResponse {
            keyword,
            results,
            selected,
            stats,
            scored_at: Utc::now(),
        }
    }

    /// Embed the keyword and every title in one batch.
    fn embed_keyword_and_titles(
        &mut self,
        keyword: &str,
        candidates: &[ProductCandidate],
        stats: &mut MatchStats,
    ) -> (Option<Vec<f32>>, Vec<Option<Vec<f32>>>) {
        let mut texts = Vec::with_capacity(candidates.len() + 1);
        texts.push(keyword.to_string());
        texts.extend(candidates.iter().map(|candidate| candidate.title.clone()));

        let embeddings = match self.text_embedder.embed(&texts) {
            Ok(vectors) if vectors.len() == texts.len() => {
                stats.text_embeddings_generated += vectors.len();
                vectors.into_iter().map(Some).collect::<Vec<_>>()
            }
            Ok(vectors) => {
                log::error!(
                    "Embedder {} returned {} vectors for {} texts",
                    self.text_embedder.model_name(),
                    vectors.len(),
                    texts.len()
                );
                vec![None; texts.len()]
            }
            Err(e) => {
                log::error!(
                    "Failed to embed titles with {}: {e}",
                    self.text_embedder.model_name()
                );
                vec![None; texts.len()]
            }
        };

        let mut embeddings = embeddings.into_iter();
        let keyword_embedding = embeddings.next().flatten();
        (keyword_embedding, embeddings.collect())
    }

    /// Fetch and embed images; an empty result means no usable features.
    async fn embed_images(&mut self, urls: &[String], stats: &mut MatchStats) -> Vec<Vec<f32>> {
        let Some(embedder) = self.image_embedder.as_mut() else {
            return vec![];
        };
        if urls.is_empty() {
            return vec![];
        }

        let (images, failures) =
            fetch_images(&self.image_source, urls, &self.image_base, self.max_images).await;
        stats.image_fetch_failures += failures;
        if images.is_empty() {
            return vec![];
        }

        let embeddings = match embedder.embed_images(&images) {
            Ok(embeddings) => embeddings,
            Err(e) => {
                // One undecodable image fails the whole batch, so retry singly.
                log::warn!(
                    "Batch image embedding with {} failed, embedding one by one: {e}",
                    embedder.model_name()
                );
                images
                    .iter()
                    .filter_map(|image| {
                        match embedder.embed_images(std::slice::from_ref(image)) {
                            Ok(mut embedding) => embedding.pop(),
                            Err(e) => {
                                stats.image_decode_failures += 1;
                                log::warn!("Skipping undecodable image: {e}");
                                None
                            }
                        }
                    })
                    .collect()
            }
        };
        stats.image_embeddings_generated += embeddings.len();
        embeddings
    }
}
