pub mod error_analyzer;

use crate::collaborators::Llm;
use crate::model::{AnswerAction, EvaluationCriterion, EvaluationOutcome, KnowledgeStore};

/// Category -> max-age-in-days table (§4.7 FRESHNESS), ported from the original's
/// freshness system prompt. `None` means unbounded (no freshness constraint).
const FRESHNESS_TABLE: &[(&str, f64)] = &[
    ("live price", 0.1),
    ("breaking news", 1.0),
    ("tech news", 7.0),
    ("product release", 7.0),
    ("regulatory update", 30.0),
    ("legal update", 30.0),
    ("general news", 14.0),
    ("scientific research", 365.0),
    ("tutorial", 180.0),
    ("how-to guide", 180.0),
    ("software version", 60.0),
    ("changelog", 60.0),
    ("sports score", 1.0),
    ("weather", 1.0),
    ("job listing", 30.0),
    ("event schedule", 30.0),
];

const DEFAULT_FRESHNESS_DAYS: f64 = 30.0;

/// Heuristically classify a question into a freshness category, if it appears
/// to be time-sensitive at all. Questions about historical/reference facts
/// return `None` (unbounded, per §9 Design Notes).
pub fn freshness_category_for(question: &str) -> Option<(String, f64)> {
    let lower = question.to_ascii_lowercase();
    const HISTORICAL_MARKERS: &[&str] = &["history of", "in 19", "in 18", "historical", "who invented", "who founded"];
    if HISTORICAL_MARKERS.iter().any(|m| lower.contains(m)) {
        return None;
    }

    for (category, days) in FRESHNESS_TABLE {
        let keyword = category.split(' ').next().unwrap_or(category);
        if lower.contains(category) || (keyword.len() > 3 && lower.contains(keyword)) {
            return Some((category.to_string(), *days));
        }
    }

    const TIME_SENSITIVE_MARKERS: &[&str] = &["today", "currently", "latest", "now", "this week", "right now"];
    if TIME_SENSITIVE_MARKERS.iter().any(|m| lower.contains(m)) {
        return Some(("default".to_string(), DEFAULT_FRESHNESS_DAYS));
    }

    None
}

/// Heuristically detect an explicit item count the question asks for (§4.7 PLURALITY).
pub fn plurality_required(question: &str) -> Option<usize> {
    let lower = question.to_ascii_lowercase();
    for marker in ["several", "few", "a handful of"] {
        if lower.contains(marker) {
            return Some(3);
        }
    }
    for word in lower.split_whitespace() {
        if let Some(rest) = word.strip_prefix("top-") {
            if let Ok(n) = rest.trim_end_matches(|c: char| !c.is_ascii_digit()).parse::<usize>() {
                return Some(n);
            }
        }
    }
    let words: Vec<&str> = lower.split_whitespace().collect();
    for (i, w) in words.iter().enumerate() {
        if let Ok(n) = w.parse::<usize>() {
            if n > 1 && n <= 20 {
                if words.get(i + 1).map(|w| w.ends_with('s')).unwrap_or(false) {
                    return Some(n);
                }
            }
        }
    }
    None
}

const HEDGE_MARKERS: &[&str] = &[
    "i'm not sure",
    "i am not sure",
    "i cannot",
    "i can't",
    "as an ai",
    "it depends",
    "i don't know",
    "i do not know",
    "consult a professional",
];

/// A harsh, skeptical reviewer persona for the STRICT criterion (§4.7):
/// default to rejecting the answer, judge substance only, and when rejecting,
/// synthesize a concrete improvement plan rather than a vague complaint.
const STRICT_REVIEW_SYSTEM_PROMPT: &str = "You are a harsh, nitpicking answer reviewer. Assume the answer in front of you is wrong until it proves otherwise against the supplied question and research diary.\n\nDo not penalize Markdown, JSON, or other formatting quirks — judge substance only. If the answer genuinely holds up, pass it. If it does not, explain why in `think` and, in `improvement_plan`, write one or two concrete sentences starting with \"In order to pass, you must...\" naming exactly what is missing or wrong.";

fn strict_review_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "think": {"type": "string"},
            "pass": {"type": "boolean"},
            "improvement_plan": {"type": "string"},
        },
        "required": ["think", "pass"],
        "additionalProperties": false,
    })
}

/// Evaluator (C7): runs criteria in sequence, returning on the first failure.
pub struct Evaluator;

impl Evaluator {
    pub fn new() -> Self {
        Self
    }

    pub async fn evaluate(
        &self,
        llm: &dyn Llm,
        question: &str,
        knowledge: &KnowledgeStore,
        answer: &AnswerAction,
        obligations: &[EvaluationCriterion],
    ) -> EvaluationOutcome {
        for criterion in obligations {
            let failure = if let EvaluationCriterion::Strict { .. } = criterion {
                self.check_strict(llm, question, knowledge, answer)
                    .await
                    .map(|(reasoning, plan)| (EvaluationCriterion::Strict { improvement_plan: plan }, reasoning))
            } else {
                self.check(answer, criterion).map(|reasoning| (criterion.clone(), reasoning))
            };

            if let Some((criterion, reasoning)) = failure {
                return EvaluationOutcome::Fail { criterion, reasoning };
            }
        }
        EvaluationOutcome::Pass
    }

    /// STRICT review (§4.7): an LLM call with a harsh-reviewer persona, able
    /// to produce a genuine improvement plan. Falls back to the length
    /// heuristic, with no plan, if the collaborator call itself fails.
    async fn check_strict(
        &self,
        llm: &dyn Llm,
        question: &str,
        knowledge: &KnowledgeStore,
        answer: &AnswerAction,
    ) -> Option<(String, Option<String>)> {
        let user_prompt = format!(
            "<question>\n{question}\n</question>\n\n<answer>\n{}\n</answer>\n\n<knowledge>\n{}\n</knowledge>",
            answer.answer,
            knowledge.render_diary(),
        );
        let messages = [("user".to_string(), user_prompt)];

        match llm.generate_object(&strict_review_schema(), STRICT_REVIEW_SYSTEM_PROMPT, &messages).await {
            Ok(result) => {
                let pass = result.value.get("pass").and_then(|v| v.as_bool()).unwrap_or(true);
                if pass {
                    None
                } else {
                    let reasoning = result
                        .value
                        .get("think")
                        .and_then(|v| v.as_str())
                        .unwrap_or("the reviewer rejected this answer")
                        .to_string();
                    let plan = result.value.get("improvement_plan").and_then(|v| v.as_str()).map(str::to_string);
                    Some((reasoning, plan))
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "strict reviewer LLM call failed; falling back to length heuristic");
                if answer.answer.trim().len() < 20 {
                    Some(("answer is too thin to survive a harsh review".to_string(), None))
                } else {
                    None
                }
            }
        }
    }

    fn check(&self, answer: &AnswerAction, criterion: &EvaluationCriterion) -> Option<String> {
        match criterion {
            EvaluationCriterion::Definitive => {
                let lower = answer.answer.to_ascii_lowercase();
                if HEDGE_MARKERS.iter().any(|m| lower.contains(m)) {
                    Some("answer is hedged or a refusal".to_string())
                } else {
                    None
                }
            }
            EvaluationCriterion::Freshness { max_age_days, .. } => {
                if *max_age_days <= 0.0 {
                    return None;
                }
                let has_recent_reference = answer.references.iter().any(|r| r.date_time.is_some());
                if !has_recent_reference && !answer.references.is_empty() {
                    Some("no reference carries a date to verify freshness".to_string())
                } else {
                    None
                }
            }
            EvaluationCriterion::Plurality { required, .. } => {
                let distinct_items = answer.answer.split(['\n', ';']).filter(|s| !s.trim().is_empty()).count();
                if distinct_items < *required {
                    Some(format!("expected at least {required} distinct items, found {distinct_items}"))
                } else {
                    None
                }
            }
            EvaluationCriterion::Completeness => None,
            EvaluationCriterion::Attribution => {
                if answer.references.is_empty() {
                    Some("no exact-quote reference supports the answer".to_string())
                } else {
                    None
                }
            }
            EvaluationCriterion::Strict { .. } => unreachable!("Strict is handled by check_strict in evaluate"),
        }
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{CResult, GenerateObjectResult};
    use crate::model::{Reference, TokenUsage};
    use async_trait::async_trait;

    /// Always errors, so tests exercising non-Strict criteria never actually
    /// depend on an LLM, and Strict tests can exercise the heuristic fallback.
    struct UnreachableLlm;

    #[async_trait]
    impl Llm for UnreachableLlm {
        async fn generate_object(
            &self,
            _schema: &serde_json::Value,
            _system_prompt: &str,
            _messages: &[(String, String)],
        ) -> CResult<GenerateObjectResult> {
            Err(crate::core::errors::CollaboratorError::Timeout(std::time::Duration::from_secs(0)))
        }
    }

    struct FixedLlm(serde_json::Value);

    #[async_trait]
    impl Llm for FixedLlm {
        async fn generate_object(
            &self,
            _schema: &serde_json::Value,
            _system_prompt: &str,
            _messages: &[(String, String)],
        ) -> CResult<GenerateObjectResult> {
            Ok(GenerateObjectResult {
                value: self.0.clone(),
                usage: TokenUsage::default(),
            })
        }
    }

    #[test]
    fn freshness_table_maps_stock_price_to_short_window() {
        let (_, days) = freshness_category_for("what is the live price of AAPL stock today").unwrap();
        assert!(days <= 1.0);
    }

    #[test]
    fn historical_questions_have_no_freshness_obligation() {
        assert!(freshness_category_for("who invented the telephone").is_none());
    }

    #[tokio::test]
    async fn definitive_check_flags_hedged_language() {
        let evaluator = Evaluator::new();
        let llm = UnreachableLlm;
        let answer = AnswerAction {
            think: "".into(),
            answer: "I'm not sure, it depends.".into(),
            references: vec![],
            is_final: false,
        };
        let knowledge = KnowledgeStore::default();
        let outcome = evaluator
            .evaluate(&llm, "q", &knowledge, &answer, &[EvaluationCriterion::Definitive])
            .await;
        assert!(matches!(outcome, EvaluationOutcome::Fail { .. }));
    }

    #[tokio::test]
    async fn attribution_passes_with_a_reference() {
        let evaluator = Evaluator::new();
        let llm = UnreachableLlm;
        let answer = AnswerAction {
            think: "".into(),
            answer: "Paris is the capital of France.".into(),
            references: vec![Reference::new("capital of France is Paris", "https://a.com")],
            is_final: false,
        };
        let knowledge = KnowledgeStore::default();
        let outcome = evaluator
            .evaluate(&llm, "q", &knowledge, &answer, &[EvaluationCriterion::Attribution])
            .await;
        assert!(matches!(outcome, EvaluationOutcome::Pass));
    }

    #[tokio::test]
    async fn strict_review_falls_back_to_length_heuristic_when_llm_fails() {
        let evaluator = Evaluator::new();
        let llm = UnreachableLlm;
        let answer = AnswerAction {
            think: "".into(),
            answer: "too short".into(),
            references: vec![],
            is_final: false,
        };
        let knowledge = KnowledgeStore::default();
        let outcome = evaluator
            .evaluate(&llm, "q", &knowledge, &answer, &[EvaluationCriterion::Strict { improvement_plan: None }])
            .await;
        match outcome {
            EvaluationOutcome::Fail { criterion: EvaluationCriterion::Strict { improvement_plan }, .. } => {
                assert!(improvement_plan.is_none());
            }
            _ => panic!("expected a Strict failure"),
        }
    }

    #[tokio::test]
    async fn strict_review_surfaces_the_llm_improvement_plan() {
        let evaluator = Evaluator::new();
        let llm = FixedLlm(serde_json::json!({
            "think": "the answer never cites a source",
            "pass": false,
            "improvement_plan": "In order to pass, you must cite at least one primary source.",
        }));
        let answer = AnswerAction {
            think: "".into(),
            answer: "This is a long enough answer to pass the bare length heuristic easily.".into(),
            references: vec![],
            is_final: false,
        };
        let knowledge = KnowledgeStore::default();
        let outcome = evaluator
            .evaluate(&llm, "q", &knowledge, &answer, &[EvaluationCriterion::Strict { improvement_plan: None }])
            .await;
        match outcome {
            EvaluationOutcome::Fail { criterion: EvaluationCriterion::Strict { improvement_plan: Some(plan) }, .. } => {
                assert!(plan.starts_with("In order to pass"));
            }
            _ => panic!("expected a Strict failure carrying a plan"),
        }
    }
}
