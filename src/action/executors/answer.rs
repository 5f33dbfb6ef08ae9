use futures::future::join_all;

use crate::collaborators::Collaborators;
use crate::evaluator::Evaluator;
use crate::ledger::url_ledger::normalize_url;
use crate::model::{AnswerAction, EvaluationOutcome, KnowledgeItem, Reference};
use crate::orchestrator::AgentState;

/// **answer(text, references)** (§4.6). Returns `true` if the session should
/// terminate (trivial short-circuit, or evaluator pass on the original question).
pub async fn execute(
    state: &mut AgentState,
    collaborators: &Collaborators,
    evaluator: &Evaluator,
    current_question: &str,
    is_original: bool,
    mut action: AnswerAction,
) -> bool {
    // Trivial question short-circuit (§4.6, §8 S1): step 1, no references, direct
    // answers permitted.
    if state.step == 1 && action.references.is_empty() && !state.config.no_direct_answer {
        action.is_final = true;
        state.final_answer = Some(action);
        return true;
    }

    let mut normalized_refs: Vec<Reference> = Vec::new();
    for reference in action.references {
        let Ok(key) = normalize_url(&reference.url) else {
            continue;
        };
        if state.urls.is_bad(&key) {
            continue;
        }
        let mut enriched = Reference::new(reference.exact_quote, key.clone());
        if let Some(record) = state.urls.get(&key) {
            if !record.title.is_empty() {
                enriched.title = Some(record.title.clone());
            }
        }
        enriched.date_time = reference.date_time;

        if !state.urls.contains(&key) {
            let _ = state.urls.insert(&key, "", "", crate::ledger::url_ledger::WEIGHT_SEARCH_RESULT);
        }
        if !state.urls.is_visited(&key) {
            // A direct fetch, not the full visit executor: references are cited
            // by the model itself, so spam-checking and cherry-picking would
            // only discard content the model already chose to quote.
            if let Ok(fetched) = collaborators.fetch.fetch(&key, false).await {
                state.urls.mark_visited(&key);
                if enriched.title.is_none() {
                    enriched.title = Some(fetched.title);
                }
            } else {
                state.urls.mark_bad(&key);
                continue;
            }
        }

        normalized_refs.push(enriched);
    }

    // Async fill missing date_time via LastModified, fanned out (§4.6, §5).
    let fill_futures = normalized_refs.iter().map(|r| {
        let needs_fill = r.date_time.is_none();
        let url = r.url.clone();
        async move {
            if needs_fill {
                collaborators.last_modified.last_modified(&url).await.ok().flatten()
            } else {
                None
            }
        }
    });
    let filled_dates = join_all(fill_futures).await;
    for (reference, date) in normalized_refs.iter_mut().zip(filled_dates) {
        if reference.date_time.is_none() {
            reference.date_time = date;
        }
    }

    action.references = normalized_refs;

    if is_original {
        let obligation_criteria: Vec<_> = state
            .obligations
            .get(current_question)
            .map(|obs| obs.iter().map(|o| o.criterion.clone()).collect())
            .unwrap_or_default();

        let outcome = evaluator
            .evaluate(collaborators.llm.as_ref(), current_question, &state.knowledge, &action, &obligation_criteria)
            .await;

        match outcome {
            EvaluationOutcome::Pass => {
                action.is_final = true;
                state.final_answer = Some(action);
                true
            }
            EvaluationOutcome::Fail { criterion, reasoning } => {
                if let Some(obligations) = state.obligations.get_mut(current_question) {
                    if let Some(obligation) = obligations.iter_mut().find(|o| o.criterion.name() == criterion.name()) {
                        obligation.fail();
                    }
                    obligations.retain(|o| o.remaining_attempts > 0);
                }
                if let crate::model::EvaluationCriterion::Strict { improvement_plan: Some(plan) } = &criterion {
                    state.improvement_plans.push(plan.clone());
                }

                // §4.7: a separate error-analysis call over the full diary, combined
                // with the evaluator's own reasoning into the knowledge item's answer.
                let diary_context = state.knowledge.diary_blocks();
                let qa_answer = match crate::evaluator::error_analyzer::analyze(collaborators.llm.as_ref(), &diary_context).await {
                    Some(analysis) => {
                        format!("{reasoning}\n\n{}\n\n{}\n\n{}", analysis.recap, analysis.blame, analysis.improvement)
                    }
                    None => reasoning,
                };
                state.knowledge.push(KnowledgeItem::qa(
                    format!("why is this answer bad? reflect: {current_question}"),
                    qa_answer,
                ));
                false
            }
        }
    } else {
        // Sub-questions have an empty obligation list; any non-empty answer passes (§4.7).
        if !action.answer.trim().is_empty() {
            state.knowledge.push(KnowledgeItem::qa(current_question, &action.answer));
            state.questions.remove_gap(current_question);
        }
        false
    }
}
