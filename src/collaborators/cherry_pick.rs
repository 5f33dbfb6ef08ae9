use std::sync::Arc;

use async_trait::async_trait;

use super::embed::cosine_similarity;
use super::{CResult, Embed};

/// **CherryPick** (§6): `(question, long_text) -> short_text`. Chunked semantic
/// selection of the most relevant ~2-5 snippets via Embed.
#[async_trait]
pub trait CherryPick: Send + Sync {
    async fn cherry_pick(&self, question: &str, long_text: &str) -> CResult<String>;
}

const CHUNK_WORDS: usize = 200;
const CHUNK_STRIDE_WORDS: usize = 100;
const MAX_SNIPPETS: usize = 5;
const MIN_SNIPPETS: usize = 2;

/// Default implementation, ported from the teacher's `nlp::semantic_shave`
/// paragraph-chunking + cosine-similarity selection, generalized from a fixed
/// threshold to a top-k (2-5) snippet selection as required by §6's contract.
pub struct DefaultCherryPick {
    embed: Arc<dyn Embed>,
}

impl DefaultCherryPick {
    pub fn new(embed: Arc<dyn Embed>) -> Self {
        Self { embed }
    }
}

fn chunk_text(text: &str, window: usize, stride: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return vec![];
    }
    if words.len() <= window {
        return vec![text.to_string()];
    }
    let mut chunks = Vec::new();
    let mut start = 0usize;
    while start < words.len() {
        let end = (start + window).min(words.len());
        chunks.push(words[start..end].join(" "));
        if end == words.len() {
            break;
        }
        start += stride;
    }
    chunks
}

#[async_trait]
impl CherryPick for DefaultCherryPick {
    async fn cherry_pick(&self, question: &str, long_text: &str) -> CResult<String> {
        if long_text.trim().is_empty() {
            return Ok(String::new());
        }
        let chunks = chunk_text(long_text, CHUNK_WORDS, CHUNK_STRIDE_WORDS);
        if chunks.len() <= MIN_SNIPPETS {
            return Ok(long_text.to_string());
        }

        let mut to_embed = vec![question.to_string()];
        to_embed.extend(chunks.iter().cloned());
        let vectors = self.embed.embed(&to_embed).await?;
        let query_vec = &vectors[0];
        let chunk_vecs = &vectors[1..];

        let mut scored: Vec<(usize, f32)> = chunk_vecs
            .iter()
            .enumerate()
            .map(|(i, v)| (i, cosine_similarity(query_vec, v)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let keep = scored.len().min(MAX_SNIPPETS).max(MIN_SNIPPETS.min(scored.len()));
        let mut kept_indices: Vec<usize> = scored.into_iter().take(keep).map(|(i, _)| i).collect();
        kept_indices.sort_unstable();

        Ok(kept_indices
            .into_iter()
            .map(|i| chunks[i].as_str())
            .collect::<Vec<_>>()
            .join("\n\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::embed::Embed as _;

    struct WordCountEmbed;

    #[async_trait]
    impl Embed for WordCountEmbed {
        async fn embed(&self, texts: &[String]) -> CResult<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| vec![t.split_whitespace().count() as f32, t.len() as f32])
                .collect())
        }
    }

    #[tokio::test]
    async fn short_text_passes_through_unchanged() {
        let picker = DefaultCherryPick::new(Arc::new(WordCountEmbed));
        let out = picker.cherry_pick("q", "short text").await.unwrap();
        assert_eq!(out, "short text");
    }
}
