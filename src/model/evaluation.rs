use serde::{Deserialize, Serialize};

/// Evaluation criteria, each carrying its own data (§9 Design Notes: "Evaluation
/// obligations as a sum type" — avoids nullable fields).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EvaluationCriterion {
    Definitive,
    Freshness {
        category: String,
        max_age_days: f64,
    },
    Plurality {
        required: usize,
        provided: usize,
    },
    Completeness,
    Attribution,
    Strict {
        improvement_plan: Option<String>,
    },
}

impl EvaluationCriterion {
    pub fn name(&self) -> &'static str {
        match self {
            EvaluationCriterion::Definitive => "DEFINITIVE",
            EvaluationCriterion::Freshness { .. } => "FRESHNESS",
            EvaluationCriterion::Plurality { .. } => "PLURALITY",
            EvaluationCriterion::Completeness => "COMPLETENESS",
            EvaluationCriterion::Attribution => "ATTRIBUTION",
            EvaluationCriterion::Strict { .. } => "STRICT",
        }
    }
}

/// Obligation attached to a question: a criterion plus remaining retry budget (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationObligation {
    pub criterion: EvaluationCriterion,
    pub remaining_attempts: u32,
}

impl EvaluationObligation {
    pub fn new(criterion: EvaluationCriterion, remaining_attempts: u32) -> Self {
        Self {
            criterion,
            remaining_attempts,
        }
    }

    /// Decrement on failure; returns `true` if the obligation is now exhausted
    /// and should be removed from the question's obligation list.
    pub fn fail(&mut self) -> bool {
        self.remaining_attempts = self.remaining_attempts.saturating_sub(1);
        self.remaining_attempts == 0
    }
}

/// Result of running the Evaluator (C7) against a candidate answer.
#[derive(Debug, Clone)]
pub enum EvaluationOutcome {
    Pass,
    Fail {
        criterion: EvaluationCriterion,
        reasoning: String,
    },
}
