use aho_corasick::AhoCorasick;
use async_trait::async_trait;

use super::CResult;

/// **ClassifySpam** (§6): `text -> boolean`. Invoked on short content (< 300 chars,
/// per §4.6 visit) before it is accepted into the ledger.
#[async_trait]
pub trait ClassifySpam: Send + Sync {
    async fn classify(&self, text: &str) -> CResult<bool>;
}

/// Default heuristic classifier: an `aho-corasick` scan for common spam/placeholder
/// markers, grounded in the teacher's `core::content_quality` style of small,
/// dependency-light content heuristics (no ML classifier is carried — that would
/// require training data this crate does not have).
pub struct HeuristicClassifySpam {
    matcher: AhoCorasick,
}

const SPAM_MARKERS: &[&str] = &[
    "buy now",
    "click here",
    "limited time offer",
    "act now",
    "100% free",
    "congratulations you have won",
    "viagra",
    "casino",
    "lorem ipsum",
    "page not found",
    "access denied",
    "please enable javascript",
];

impl HeuristicClassifySpam {
    pub fn new() -> Self {
        Self {
            matcher: AhoCorasick::builder()
                .ascii_case_insensitive(true)
                .build(SPAM_MARKERS)
                .expect("valid spam marker patterns"),
        }
    }
}

impl Default for HeuristicClassifySpam {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ClassifySpam for HeuristicClassifySpam {
    async fn classify(&self, text: &str) -> CResult<bool> {
        Ok(self.matcher.is_match(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn flags_known_markers() {
        let classifier = HeuristicClassifySpam::new();
        assert!(classifier.classify("CLICK HERE to win a prize!").await.unwrap());
        assert!(!classifier.classify("Paris is the capital of France.").await.unwrap());
    }
}
