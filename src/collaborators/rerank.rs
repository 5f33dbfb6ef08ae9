use async_trait::async_trait;

use super::CResult;

#[derive(Debug, Clone)]
pub struct RankedDocument {
    pub index: usize,
    pub relevance_score: f32,
}

/// **Rerank** (§6): `(query, list of documents) -> list of {index, relevance_score}`.
#[async_trait]
pub trait Rerank: Send + Sync {
    async fn rerank(&self, query: &str, documents: &[String]) -> CResult<Vec<RankedDocument>>;
}

/// Default TF-IDF-like reranker, adapted directly from the teacher's
/// `nlp::rerank::Reranker` (title/content token overlap scoring), generalized
/// from `SearchResult`-specific scoring to arbitrary documents.
pub struct DefaultRerank;

impl DefaultRerank {
    pub fn new() -> Self {
        Self
    }

    fn tokenize(text: &str) -> Vec<String> {
        text.to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|s| !s.is_empty() && s.len() > 2)
            .map(|s| s.to_string())
            .collect()
    }

    fn score(query_tokens: &[String], document: &str) -> f32 {
        if query_tokens.is_empty() {
            return 0.5;
        }
        let doc_tokens = Self::tokenize(document);
        let mut score = 0.0;
        let mut matches = 0;
        for q in query_tokens {
            if doc_tokens.contains(q) {
                score += 0.4;
                matches += 1;
            }
        }
        let max_score = query_tokens.len() as f32 * 0.4;
        let normalized = if max_score > 0.0 { (score / max_score).min(1.0) } else { 0.5 };
        let match_ratio = matches as f32 / query_tokens.len() as f32;
        ((normalized + match_ratio) / 2.0).clamp(0.0, 1.0)
    }
}

impl Default for DefaultRerank {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Rerank for DefaultRerank {
    async fn rerank(&self, query: &str, documents: &[String]) -> CResult<Vec<RankedDocument>> {
        let query_tokens = Self::tokenize(query);
        let mut scored: Vec<RankedDocument> = documents
            .iter()
            .enumerate()
            .map(|(index, doc)| RankedDocument {
                index,
                relevance_score: Self::score(&query_tokens, doc),
            })
            .collect();
        scored.sort_by(|a, b| b.relevance_score.partial_cmp(&a.relevance_score).unwrap_or(std::cmp::Ordering::Equal));
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ranks_matching_document_higher() {
        let reranker = DefaultRerank::new();
        let docs = vec![
            "Python tutorial for beginners".to_string(),
            "The Rust Programming Language official book".to_string(),
        ];
        let ranked = reranker.rerank("rust programming", &docs).await.unwrap();
        assert_eq!(ranked[0].index, 1);
    }
}
