use std::error::Error;

use usearch::{Index, IndexOptions, MetricKind, ScalarKind};

/// Normalize a vector to unit length.
///
/// Returns the original vector when the norm is zero.
pub(crate) fn normalize_embedding(vec: &[f32]) -> Vec<f32> {
    let norm = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 {
        vec.to_vec()
    } else {
        vec.iter().map(|x| x / norm).collect()
    }
}

/// A vector carries signal when it is non-empty, finite and not all zeros.
pub(crate) fn has_signal(vec: &[f32]) -> bool {
    !vec.is_empty() && vec.iter().all(|x| x.is_finite()) && vec.iter().any(|&x| x != 0.0)
}

/// Cosine similarity `dot(a, b) / (|a| * |b|)`.
///
/// `None` when either vector has no signal or the dimensions differ, so a
/// zero-norm embedding never divides by zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() || !has_signal(a) || !has_signal(b) {
        return None;
    }

    let mut dot = 0.0_f64;
    let mut norm_a = 0.0_f64;
    let mut norm_b = 0.0_f64;
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let similarity = dot / (norm_a.sqrt() * norm_b.sqrt());
    similarity
        .is_finite()
        .then(|| similarity.clamp(-1.0, 1.0) as f32)
}

/// Average several embeddings after normalizing each to unit length.
///
/// Vectors without signal, or whose dimension differs from the first usable
/// vector, are ignored. `None` when nothing usable remains.
pub fn average_embedding(vectors: &[Vec<f32>]) -> Option<Vec<f32>> {
    let mut usable = vectors.iter().filter(|vec| has_signal(vec));
    let first = usable.next()?;

    let mut sum = normalize_embedding(first);
    let mut count = 1_usize;
    let dim = sum.len();
    for vec in usable.filter(|vec| vec.len() == dim) {
        for (acc, value) in sum.iter_mut().zip(normalize_embedding(vec)) {
            *acc += value;
        }
        count += 1;
    }

    let average = sum.into_iter().map(|x| x / count as f32).collect::<Vec<_>>();
    has_signal(&average).then_some(average)
}

/// Search the top-k closest vectors to the query embedding.
///
/// Returns `(key, distance)` pairs where the cosine distance is
/// `1 - similarity`.
pub(crate) fn search_top_k<'a, T>(
    query_embedding: &[f32],
    items: &'a [(u64, T)],
    k: usize,
) -> Result<Vec<(u64, f32)>, Box<dyn Error>>
where
    T: AsRef<[f32]> + 'a,
{
    if items.is_empty() || k == 0 {
        return Ok(Vec::new());
    }

    let dim = query_embedding.len();

    let index = Index::new(&IndexOptions {
        dimensions: dim,
        metric: MetricKind::Cos,
        quantization: ScalarKind::F32,
        ..Default::default()
    })?;

    index.reserve(items.len())?;

    for (id, embedding) in items {
        index.add(*id, embedding.as_ref())?;
    }

    let neighbors = index.search(query_embedding, k)?;

    let results: Vec<(u64, f32)> = neighbors
        .keys
        .iter()
        .zip(neighbors.distances.iter())
        .map(|(&key, &distance)| (key, distance))
        .collect();

    Ok(results)
}
