use serde::{Deserialize, Serialize};

use crate::embedders::{EmbeddingResult, TextEmbedder};
use crate::processing::embedding::cosine_similarity;

/// Thresholds swept when a request does not name any.
pub const DEFAULT_THRESHOLDS: [f32; 5] = [0.3, 0.4, 0.5, 0.6, 0.7];

/// A title hand-labelled as related or unrelated to a keyword.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct LabeledPair {
    pub keyword: String,
    pub title: String,
    pub expected: bool,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct BenchmarkRequest {
    pub cases: Vec<LabeledPair>,
    #[serde(default)]
    pub thresholds: Vec<f32>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct ThresholdReport {
    pub threshold: f32,
    pub correct: usize,
    pub total: usize,
    pub accuracy: f32,
}

/// Accuracy of the text gate at every threshold.
///
/// Each observation is `(similarity, expected)`; an undefined similarity
/// predicts "unrelated".
pub fn evaluate_thresholds(
    observations: &[(Option<f32>, bool)],
    thresholds: &[f32],
) -> Vec<ThresholdReport> {
    thresholds
        .iter()
        .map(|&threshold| {
            let correct = observations
                .iter()
                .filter(|(similarity, expected)| {
                    let predicted = similarity.is_some_and(|s| s >= threshold);
                    predicted == *expected
                })
                .count();
            let total = observations.len();
            let accuracy = if total == 0 {
                0.0
            } else {
                correct as f32 / total as f32
            };
            ThresholdReport {
                threshold,
                correct,
                total,
                accuracy,
            }
        })
        .collect()
}

/// Calibrate the text threshold against labelled pairs.
///
/// Only the embedding similarity is measured; the keyword pre-filters are
/// not applied.
pub fn process_benchmark_message<T>(
    msg: BenchmarkRequest,
    embedder: &mut T,
) -> EmbeddingResult<Vec<ThresholdReport>>
where
    T: TextEmbedder,
{
    log::info!("Received benchmark with {} cases", msg.cases.len());

    let texts = msg
        .cases
        .iter()
        .flat_map(|case| [case.title.clone(), case.keyword.clone()])
        .collect::<Vec<_>>();
    let embeddings = embedder.embed(&texts)?;

    let observations = msg
        .cases
        .iter()
        .enumerate()
        .map(|(i, case)| {
            let similarity = match (embeddings.get(2 * i), embeddings.get(2 * i + 1)) {
                (Some(title), Some(keyword)) => cosine_similarity(title, keyword),
                _ => None,
            };
            log::debug!(
                "Benchmark pair {:?} / {:?}: similarity={similarity:?}, expected={}",
                case.keyword,
                case.title,
                case.expected
            );
            (similarity, case.expected)
        })
        .collect::<Vec<_>>();

    let thresholds = if msg.thresholds.is_empty() {
        DEFAULT_THRESHOLDS.to_vec()
    } else {
        msg.thresholds
    };
    let reports = evaluate_thresholds(&observations, &thresholds);

    for report in &reports {
        log::info!(
            "Threshold {:.2}: accuracy {}/{} = {:.3}",
            report.threshold,
            report.correct,
            report.total,
            report.accuracy
        );
    }
    log::info!("Finished processing benchmark with model {}", embedder.model_name());

    Ok(reports)
}
