use serde::{Deserialize, Serialize};

/// A citation attached to an answer action. `url` is always the normalized
/// ledger key; `exact_quote` has its punctuation collapsed to single spaces
/// before storage (§3 Reference).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reference {
    pub exact_quote: String,
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub date_time: Option<String>,
}

impl Reference {
    pub fn new(exact_quote: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            exact_quote: collapse_quote_punctuation(&exact_quote.into()),
            url: url.into(),
            title: None,
            date_time: None,
        }
    }
}

/// Collapse runs of punctuation/whitespace in a quote down to single spaces,
/// matching the "exact_quote" normalization rule in §3.
pub fn collapse_quote_punctuation(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_was_space = false;
    for ch in text.chars() {
        let is_boundary = ch.is_whitespace() || ch.is_ascii_punctuation();
        if is_boundary {
            if !last_was_space {
                out.push(' ');
                last_was_space = true;
            }
        } else {
            out.push(ch);
            last_was_space = false;
        }
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_runs_of_punctuation() {
        assert_eq!(collapse_quote_punctuation("Hello,,  world!!"), "Hello world");
        assert_eq!(collapse_quote_punctuation("  a---b  "), "a b");
    }
}
