use std::collections::HashMap;

use crate::model::TokenUsage;

/// Budget / Tracker (C4): per-tool token tally, action log, step counter.
#[derive(Debug, Default)]
pub struct BudgetTracker {
    total: TokenUsage,
    per_tool: HashMap<String, TokenUsage>,
}

impl BudgetTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a call's token usage against `tool` and accumulate the global total.
    /// Emits a tracing event so operators can observe spend in real time (§4.4).
    pub fn record(&mut self, tool: &str, usage: TokenUsage) {
        self.total.add(usage);
        self.per_tool.entry(tool.to_string()).or_default().add(usage);
        tracing::debug!(
            tool,
            total_tokens = self.total.total_tokens,
            call_tokens = usage.total_tokens,
            "token usage recorded"
        );
    }

    pub fn total(&self) -> TokenUsage {
        self.total
    }

    pub fn per_tool(&self) -> &HashMap<String, TokenUsage> {
        &self.per_tool
    }
}

/// One action-log entry per step (§4.4).
#[derive(Debug, Clone)]
pub struct ActionLogEntry {
    pub step: usize,
    pub action_kind: String,
    pub think: String,
    pub current_gaps: Vec<String>,
}

#[derive(Debug, Default)]
pub struct ActionLog {
    entries: Vec<ActionLogEntry>,
}

impl ActionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: ActionLogEntry) {
        tracing::info!(
            step = entry.step,
            action = %entry.action_kind,
            "step completed"
        );
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[ActionLogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_total_and_per_tool() {
        let mut tracker = BudgetTracker::new();
        tracker.record("llm", TokenUsage::new(100, 50));
        tracker.record("search", TokenUsage::new(10, 0));
        tracker.record("llm", TokenUsage::new(20, 5));
        assert_eq!(tracker.total().total_tokens, 185);
        assert_eq!(tracker.per_tool()["llm"].total_tokens, 175);
        assert_eq!(tracker.per_tool()["search"].total_tokens, 10);
    }
}
