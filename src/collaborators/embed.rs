use std::sync::Arc;

use async_trait::async_trait;
use model2vec_rs::model::StaticModel;

use super::CResult;
use crate::core::errors::CollaboratorError;

/// **Embed** (§6): `list of texts -> (list of vectors, token count)`. Used by the
/// semantic dedup filters (§4.6) and by CherryPick.
#[async_trait]
pub trait Embed: Send + Sync {
    async fn embed(&self, texts: &[String]) -> CResult<Vec<Vec<f32>>>;
}

/// Default implementation backed by `model2vec-rs`, grounded in the teacher's
/// `nlp::semantic_shave` use of `StaticModel::encode_single` (here batched and
/// run on a blocking thread since the model is CPU-bound, not async).
pub struct StaticModelEmbed {
    model: Arc<StaticModel>,
}

impl StaticModelEmbed {
    pub fn new(model: Arc<StaticModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl Embed for StaticModelEmbed {
    async fn embed(&self, texts: &[String]) -> CResult<Vec<Vec<f32>>> {
        let model = Arc::clone(&self.model);
        let texts = texts.to_vec();
        tokio::task::spawn_blocking(move || {
            texts.iter().map(|t| model.encode_single(t)).collect::<Vec<_>>()
        })
        .await
        .map_err(|e| CollaboratorError::Other(anyhow::anyhow!("embedding task panicked: {e}")))
    }
}

/// Cosine similarity between two equal-length vectors; 0.0 if either has zero magnitude.
/// Grounded in the teacher's `nlp::semantic_shave::cosine_similarity`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }
    (dot / (mag_a * mag_b)).clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_vectors_have_similarity_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn orthogonal_vectors_have_similarity_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }
}
