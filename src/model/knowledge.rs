use super::Reference;
use serde::{Deserialize, Serialize};

/// `KnowledgeItem.kind` discriminator (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KnowledgeKind {
    Qa,
    SideInfo,
    ChatHistory,
    Url,
    Coding,
}

/// Append-only knowledge item. Never mutated after insertion (§3 invariant).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeItem {
    pub kind: KnowledgeKind,
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub references: Vec<Reference>,
    /// Single source URL, only meaningful for `Url` kind items.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
    /// Source code payload, only meaningful for `Coding` kind items.
    #[serde(default)]
    pub source_code: Option<String>,
}

impl KnowledgeItem {
    pub fn qa(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self::new(KnowledgeKind::Qa, question, answer)
    }

    pub fn side_info(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self::new(KnowledgeKind::SideInfo, question, answer)
    }

    pub fn url_item(question: impl Into<String>, answer: impl Into<String>, url: impl Into<String>) -> Self {
        let mut item = Self::new(KnowledgeKind::Url, question, answer);
        item.url = Some(url.into());
        item
    }

    pub fn coding(question: impl Into<String>, answer: impl Into<String>, source_code: impl Into<String>) -> Self {
        let mut item = Self::new(KnowledgeKind::Coding, question, answer);
        item.source_code = Some(source_code.into());
        item
    }

    fn new(kind: KnowledgeKind, question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            kind,
            question: question.into(),
            answer: answer.into(),
            references: Vec::new(),
            url: None,
            updated_at: Some(chrono::Utc::now()),
            source_code: None,
        }
    }

    /// Render as a tagged block for an LLM prompt (§4.2). Excess blank lines collapsed.
    pub fn render_block(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("<question>\n{}\n</question>\n", self.question));
        if matches!(self.kind, KnowledgeKind::Url | KnowledgeKind::SideInfo) {
            if let Some(ts) = &self.updated_at {
                out.push_str(&format!("<observed>{}</observed>\n", ts.to_rfc3339()));
            }
        }
        if let KnowledgeKind::Url = self.kind {
            if let Some(url) = &self.url {
                out.push_str(&format!("<url>{}</url>\n", url));
            }
        }
        out.push_str(&format!("<answer>\n{}\n</answer>", self.answer));
        collapse_blank_lines(&out)
    }
}

fn collapse_blank_lines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_blank = false;
    for line in text.lines() {
        let is_blank = line.trim().is_empty();
        if is_blank && last_blank {
            continue;
        }
        out.push_str(line);
        out.push('\n');
        last_blank = is_blank;
    }
    out.trim_end().to_string()
}

/// Append-only knowledge store (C2).
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct KnowledgeStore {
    items: Vec<KnowledgeItem>,
}

impl KnowledgeStore {
    pub fn push(&mut self, item: KnowledgeItem) {
        self.items.push(item);
    }

    pub fn items(&self) -> &[KnowledgeItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Render the full store as alternating question/answer blocks, insertion order.
    pub fn render_diary(&self) -> String {
        self.diary_blocks().join("\n\n")
    }

    /// Same content as `render_diary`, as individual per-item blocks rather
    /// than one joined string (used where a caller needs a step-by-step
    /// context list, e.g. error analysis over prior steps).
    pub fn diary_blocks(&self) -> Vec<String> {
        self.items.iter().map(|i| i.render_block()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_collapses_blank_lines() {
        let item = KnowledgeItem::qa("q", "a");
        let block = item.render_block();
        assert!(!block.contains("\n\n\n"));
    }

    #[test]
    fn store_preserves_insertion_order() {
        let mut store = KnowledgeStore::default();
        store.push(KnowledgeItem::qa("q1", "a1"));
        store.push(KnowledgeItem::qa("q2", "a2"));
        let rendered = store.render_diary();
        assert!(rendered.find("q1").unwrap() < rendered.find("q2").unwrap());
    }
}
