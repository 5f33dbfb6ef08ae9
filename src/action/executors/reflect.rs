use crate::collaborators::Collaborators;
use crate::model::ReflectAction;
use crate::orchestrator::AgentState;

/// **reflect(subquestions)** (§4.6): semantic-dedup candidates against every
/// question ever seen, cap, append survivors to the gap set.
pub async fn execute(state: &mut AgentState, collaborators: &Collaborators, action: ReflectAction) {
    let cap = state.config.max_reflect_per_step;
    let threshold = state.config.similarity_threshold;

    let survivors = super::dedup_against(
        collaborators.embed.as_ref(),
        threshold,
        state.questions.all_questions_ever(),
        action.sub_questions,
    )
    .await;

    for question in survivors.into_iter().take(cap) {
        state.questions.push_gap(question);
    }
}
