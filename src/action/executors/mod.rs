pub mod answer;
pub mod code;
pub mod reflect;
pub mod search;
pub mod visit;

/// Semantic dedup against a corpus of already-seen strings (§4.6 — used for
/// search-query dedup and reflect sub-question dedup, both at cosine >= 0.86).
pub(crate) async fn dedup_against(
    embed: &dyn crate::collaborators::Embed,
    threshold: f32,
    corpus: &[String],
    candidates: Vec<String>,
) -> Vec<String> {
    if corpus.is_empty() {
        return candidates;
    }
    let mut to_embed = corpus.to_vec();
    to_embed.extend(candidates.iter().cloned());
    let vectors = match embed.embed(&to_embed).await {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, "embed collaborator failed during dedup; admitting all candidates");
            return candidates;
        }
    };
    let corpus_vecs = &vectors[..corpus.len()];
    let candidate_vecs = &vectors[corpus.len()..];

    let mut survivors = Vec::new();
    let mut accepted_vecs: Vec<&Vec<f32>> = corpus_vecs.iter().collect();
    for (candidate, vec) in candidates.into_iter().zip(candidate_vecs.iter()) {
        let is_duplicate = accepted_vecs
            .iter()
            .any(|other| crate::collaborators::embed::cosine_similarity(vec, other) >= threshold);
        if !is_duplicate {
            survivors.push(candidate);
            accepted_vecs.push(vec);
        }
    }
    survivors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{CResult, Embed};
    use async_trait::async_trait;

    /// Deterministic fake embedder: identical strings embed identically,
    /// distinct strings embed orthogonally — enough to exercise the
    /// duplicate/non-duplicate branches without a real model.
    struct ExactMatchEmbed;

    #[async_trait]
    impl Embed for ExactMatchEmbed {
        async fn embed(&self, texts: &[String]) -> CResult<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    let mut v = vec![0.0f32; texts.len()];
                    let idx = texts.iter().position(|x| x == t).unwrap();
                    v[idx] = 1.0;
                    v
                })
                .collect())
        }
    }

    #[tokio::test]
    async fn drops_exact_duplicates_against_corpus() {
        let embed = ExactMatchEmbed;
        let corpus = vec!["rust ownership rules".to_string()];
        let candidates = vec!["rust ownership rules".to_string(), "garbage collection tradeoffs".to_string()];
        let survivors = dedup_against(&embed, 0.86, &corpus, candidates).await;
        assert_eq!(survivors, vec!["garbage collection tradeoffs".to_string()]);
    }

    #[tokio::test]
    async fn empty_corpus_admits_everything() {
        let embed = ExactMatchEmbed;
        let candidates = vec!["a".to_string(), "b".to_string()];
        let survivors = dedup_against(&embed, 0.86, &[], candidates.clone()).await;
        assert_eq!(survivors, candidates);
    }
}
