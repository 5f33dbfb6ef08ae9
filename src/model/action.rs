use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::Reference;

/// The five action variants the LLM may choose between (§9 Design Notes:
/// "Dynamic action dispatch" — modeled as a tagged enum, not a string key).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Search(SearchAction),
    Visit(VisitAction),
    Answer(AnswerAction),
    Reflect(ReflectAction),
    Code(CodeAction),
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Search(_) => ActionKind::Search,
            Action::Visit(_) => ActionKind::Visit,
            Action::Answer(_) => ActionKind::Answer,
            Action::Reflect(_) => ActionKind::Reflect,
            Action::Code(_) => ActionKind::Code,
        }
    }

    pub fn think(&self) -> &str {
        match self {
            Action::Search(a) => &a.think,
            Action::Visit(a) => &a.think,
            Action::Answer(a) => &a.think,
            Action::Reflect(a) => &a.think,
            Action::Code(a) => &a.think,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Search,
    Visit,
    Answer,
    Reflect,
    Code,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Search => "search",
            ActionKind::Visit => "visit",
            ActionKind::Answer => "answer",
            ActionKind::Reflect => "reflect",
            ActionKind::Code => "code",
        }
    }
}

/// A `think` field is always required on every action variant (§4.5).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SearchAction {
    pub think: String,
    /// Candidate search queries for this step (before dedup/cap).
    pub queries: Vec<String>,
    /// Optional hostname allowlist, rendered as `site:` constraints on the second pass.
    #[serde(default)]
    pub only_hostnames: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct VisitAction {
    pub think: String,
    /// 1-based indices into the ranked URL short-list shown in the prompt.
    pub indices: Vec<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AnswerAction {
    pub think: String,
    pub answer: String,
    #[serde(default)]
    pub references: Vec<Reference>,
    /// Set by the Evaluator/executor once it is known the answer terminates the session.
    #[serde(default)]
    pub is_final: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ReflectAction {
    pub think: String,
    pub sub_questions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CodeAction {
    pub think: String,
    pub issue: String,
}

/// Per-step permission flags (§4.6 gating).
#[derive(Debug, Clone, Copy)]
pub struct ActionPermissions {
    pub search: bool,
    pub visit: bool,
    pub answer: bool,
    pub reflect: bool,
    pub code: bool,
}

impl ActionPermissions {
    pub fn all() -> Self {
        Self {
            search: true,
            visit: true,
            answer: true,
            reflect: true,
            code: true,
        }
    }

    pub fn only(kind: ActionKind) -> Self {
        Self {
            search: kind == ActionKind::Search,
            visit: kind == ActionKind::Visit,
            answer: kind == ActionKind::Answer,
            reflect: kind == ActionKind::Reflect,
            code: kind == ActionKind::Code,
        }
    }

    pub fn permitted_kinds(&self) -> Vec<ActionKind> {
        let mut out = Vec::new();
        if self.search {
            out.push(ActionKind::Search);
        }
        if self.visit {
            out.push(ActionKind::Visit);
        }
        if self.answer {
            out.push(ActionKind::Answer);
        }
        if self.reflect {
            out.push(ActionKind::Reflect);
        }
        if self.code {
            out.push(ActionKind::Code);
        }
        out
    }

    pub fn is_permitted(&self, kind: ActionKind) -> bool {
        match kind {
            ActionKind::Search => self.search,
            ActionKind::Visit => self.visit,
            ActionKind::Answer => self.answer,
            ActionKind::Reflect => self.reflect,
            ActionKind::Code => self.code,
        }
    }

    /// Turn off permission for `kind` (§4.6: an executor disables its own
    /// action for the step that follows it).
    pub fn disable(&mut self, kind: ActionKind) {
        match kind {
            ActionKind::Search => self.search = false,
            ActionKind::Visit => self.visit = false,
            ActionKind::Answer => self.answer = false,
            ActionKind::Reflect => self.reflect = false,
            ActionKind::Code => self.code = false,
        }
    }
}
