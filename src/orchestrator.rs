use std::collections::HashMap;
use std::sync::Arc;

use crate::action::ActionGenerator;
use crate::action::executors;
use crate::collaborators::Collaborators;
use crate::core::config::RunConfig;
use crate::evaluator::Evaluator;
use crate::ledger::{QuestionLedger, UrlLedger};
use crate::model::{
    Action, ActionKind, ActionPermissions, AnswerAction, EvaluationCriterion, EvaluationObligation,
    KnowledgeItem, KnowledgeStore, Reference,
};
use crate::tracker::{ActionLog, ActionLogEntry, BudgetTracker};

/// Session-scoped state carried explicitly through the loop and executors
/// (§9 Design Notes: "Global mutable session state" replaced by an explicit
/// context object, never a module-level global).
pub struct AgentState {
    pub config: RunConfig,
    pub questions: QuestionLedger,
    pub urls: UrlLedger,
    pub knowledge: KnowledgeStore,
    pub tracker: BudgetTracker,
    pub action_log: ActionLog,
    pub used_keywords: Vec<String>,
    pub obligations: HashMap<String, Vec<EvaluationObligation>>,
    pub improvement_plans: Vec<String>,
    pub last_shortlist: Vec<crate::ledger::url_ledger::RankedUrl>,
    pub final_answer: Option<AnswerAction>,
    pub step: usize,
    /// The action kind executed by the step that just ran, when that step did
    /// not terminate the session (§4.6: each executor disables its own action
    /// for the step that follows it; §4.7: `answer` specifically after a
    /// failed evaluation). Consumed by `compute_permissions` for the very
    /// next step only.
    pub suppressed_action: Option<ActionKind>,
}

impl AgentState {
    pub fn new(question: impl Into<String>, config: RunConfig) -> Self {
        Self {
            config,
            questions: QuestionLedger::new(question),
            urls: UrlLedger::new(),
            knowledge: KnowledgeStore::default(),
            tracker: BudgetTracker::new(),
            action_log: ActionLog::new(),
            used_keywords: Vec::new(),
            obligations: HashMap::new(),
            improvement_plans: Vec::new(),
            last_shortlist: Vec::new(),
            final_answer: None,
            step: 0,
            suppressed_action: None,
        }
    }
}

/// Final result of `Research` (§6).
#[derive(Debug, serde::Serialize)]
pub struct ResearchResult {
    pub final_answer: String,
    pub references: Vec<Reference>,
    pub is_final: bool,
    pub visited_urls: Vec<String>,
    pub read_urls: Vec<String>,
    pub all_urls: Vec<String>,
    pub usage: crate::model::TokenUsage,
}

/// Orchestrator (C8): the main loop.
pub struct Orchestrator {
    collaborators: Collaborators,
    generator: ActionGenerator,
}

impl Orchestrator {
    pub fn new(collaborators: Collaborators, llm: Arc<dyn crate::collaborators::Llm>) -> Self {
        Self {
            collaborators,
            generator: ActionGenerator::new(llm),
        }
    }

    /// Run a full research session to completion (§4.8).
    pub async fn run(&self, question: &str, config: RunConfig) -> ResearchResult {
        let mut state = AgentState::new(question, config);
        let evaluator = Evaluator::new();
        let regular_budget = state.config.regular_budget();

        loop {
            if state.tracker.total().total_tokens as u64 >= regular_budget {
                break;
            }

            state.step += 1;
            let current_question = state.questions.current_question(state.step - 1);
            let is_original = state.questions.is_original(&current_question);

            if is_original && !state.obligations.contains_key(&current_question) {
                let obligations = compute_initial_obligations(&current_question);
                state.obligations.insert(current_question.clone(), obligations);
            }

            let rerank_scores = self.compute_rerank_scores(&state, &current_question).await;
            let ranking_config = crate::ledger::url_ledger::RankingConfig::default();
            let ranked = state.urls.rank(&state.config.boost_hostnames, &rerank_scores, &ranking_config);
            let shortlist = crate::ledger::UrlLedger::diversify(ranked, state.config.hostname_diversification_k);
            state.last_shortlist = shortlist.clone();

            let permissions = self.compute_permissions(&state, is_original);
            state.suppressed_action = None;

            let system_prompt = ActionGenerator::build_system_prompt(
                &permissions,
                &state.used_keywords,
                shortlist.len(),
                &state.improvement_plans,
            );
            let messages = ActionGenerator::build_messages(&state.knowledge, &current_question);

            let generated = match self.generator.generate(&permissions, &system_prompt, &messages, 2).await {
                Ok(g) => g,
                Err(e) => {
                    tracing::warn!(step = state.step, error = %e, "action generation failed; skipping step");
                    tokio::time::sleep(state.config.step_sleep()).await;
                    continue;
                }
            };
            state.tracker.record("llm", generated.usage);

            let action_kind = generated.action.kind();
            let think = generated.action.think().to_string();

            let terminated = self
                .execute(&mut state, &evaluator, &current_question, is_original, generated.action)
                .await;

            if !terminated {
                state.suppressed_action = Some(action_kind);
            }

            state.action_log.push(ActionLogEntry {
                step: state.step,
                action_kind: action_kind.as_str().to_string(),
                think,
                current_gaps: state.questions.gaps().to_vec(),
            });

            if terminated {
                break;
            }

            tokio::time::sleep(state.config.step_sleep()).await;
        }

        if state.final_answer.is_none() {
            self.beast_mode(&mut state).await;
        }

        let answer = state.final_answer.unwrap_or(AnswerAction {
            think: "beast mode exhausted without an answer".to_string(),
            answer: String::new(),
            references: Vec::new(),
            is_final: true,
        });

        ResearchResult {
            final_answer: answer.answer,
            references: answer.references,
            is_final: true,
            visited_urls: state.urls.visited_urls(),
            read_urls: state.urls.read_urls(),
            all_urls: state.urls.all_urls(),
            usage: state.tracker.total(),
        }
    }

    async fn compute_rerank_scores(&self, state: &AgentState, question: &str) -> HashMap<String, f32> {
        let candidates: Vec<(String, String)> = state
            .urls
            .all_urls()
            .into_iter()
            .filter_map(|url| {
                let record = state.urls.get(&url)?;
                Some((url, format!("{} {}", record.title, record.description)))
            })
            .collect();
        if candidates.is_empty() {
            return HashMap::new();
        }
        let docs: Vec<String> = candidates.iter().map(|(_, d)| d.clone()).collect();
        match self.collaborators.rerank.rerank(question, &docs).await {
            Ok(ranked) => ranked
                .into_iter()
                .filter_map(|r| candidates.get(r.index).map(|(url, _)| (url.clone(), r.relevance_score)))
                .collect(),
            Err(e) => {
                tracing::warn!(error = %e, "rerank collaborator failed; degrading rerank_boost to 0");
                HashMap::new()
            }
        }
    }

    /// §4.6 "Action gating": fixed opening sequence for steps 1-4, state-derived after.
    fn compute_permissions(&self, state: &AgentState, is_original_question: bool) -> ActionPermissions {
        if state.step <= 4 {
            let forced = match state.step {
                1 => ActionKind::Search,
                2 => ActionKind::Visit,
                3 => ActionKind::Answer,
                4 => ActionKind::Reflect,
                _ => unreachable!(),
            };
            return ActionPermissions::only(forced);
        }

        let mut permissions = ActionPermissions::all();
        permissions.visit = !state.last_shortlist.is_empty();
        permissions.search = state.urls.len() < state.config.max_known_urls_for_search;
        permissions.reflect = state.questions.gaps().len() <= state.config.max_reflect_per_step;

        if let Some(kind) = state.suppressed_action {
            permissions.disable(kind);
        }

        if is_original_question && state.step == 1 {
            let question = state.questions.original();
            if let Some(obligations) = state.obligations.get(question) {
                if obligations.iter().any(|o| matches!(o.criterion, EvaluationCriterion::Freshness { .. })) {
                    permissions.answer = false;
                    permissions.reflect = false;
                }
            }
        }

        permissions
    }

    async fn execute(
        &self,
        state: &mut AgentState,
        evaluator: &Evaluator,
        current_question: &str,
        is_original: bool,
        action: Action,
    ) -> bool {
        match action {
            Action::Search(a) => {
                executors::search::execute(state, &self.collaborators, a).await;
                false
            }
            Action::Visit(a) => {
                executors::visit::execute(state, &self.collaborators, a).await;
                false
            }
            Action::Answer(a) => {
                executors::answer::execute(state, &self.collaborators, evaluator, current_question, is_original, a)
                    .await
            }
            Action::Reflect(a) => {
                executors::reflect::execute(state, &self.collaborators, a).await;
                false
            }
            Action::Code(a) => {
                executors::code::execute(state, &self.collaborators, a).await;
                false
            }
        }
    }

    /// Beast mode (§4.8 step 2): one final forced-answer generation, residual budget.
    async fn beast_mode(&self, state: &mut AgentState) {
        tracing::info!("entering beast mode");
        let permissions = ActionPermissions::only(ActionKind::Answer);
        let system_prompt = ActionGenerator::build_system_prompt(
            &permissions,
            &state.used_keywords,
            state.last_shortlist.len(),
            &state.improvement_plans,
        );
        let mut forceful = system_prompt;
        forceful.push_str("\nThis is your final chance. You MUST answer now with your best available information, even if imperfect. Do not refuse.\n");
        let question = state.questions.original().to_string();
        let messages = ActionGenerator::build_messages(&state.knowledge, &question);

        match self.generator.generate(&permissions, &forceful, &messages, 1).await {
            Ok(generated) => {
                state.tracker.record("llm", generated.usage);
                if let Action::Answer(mut answer) = generated.action {
                    answer.is_final = true;
                    state.final_answer = Some(answer);
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "beast mode generation failed");
            }
        }
    }
}

/// Compute the original question's evaluation obligations once at session start
/// (§4.7): always includes STRICT; FRESHNESS/PLURALITY are heuristically
/// derived from the question text rather than a separate meta-evaluation call,
/// since that call is itself an LLM collaborator invocation outside this core.
fn compute_initial_obligations(question: &str) -> Vec<EvaluationObligation> {
    let mut obligations = vec![
        EvaluationObligation::new(EvaluationCriterion::Definitive, 2),
        EvaluationObligation::new(EvaluationCriterion::Attribution, 2),
        EvaluationObligation::new(EvaluationCriterion::Completeness, 2),
    ];

    if let Some((category, max_age_days)) = crate::evaluator::freshness_category_for(question) {
        obligations.push(EvaluationObligation::new(
            EvaluationCriterion::Freshness { category, max_age_days },
            2,
        ));
    }

    if let Some(required) = crate::evaluator::plurality_required(question) {
        obligations.push(EvaluationObligation::new(
            EvaluationCriterion::Plurality { required, provided: 0 },
            2,
        ));
    }

    obligations.push(EvaluationObligation::new(
        EvaluationCriterion::Strict { improvement_plan: None },
        2,
    ));

    obligations
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_obligations_always_include_strict() {
        let obligations = compute_initial_obligations("what is the capital of France?");
        assert!(obligations.iter().any(|o| matches!(o.criterion, EvaluationCriterion::Strict { .. })));
    }
}
