use crate::collaborators::Collaborators;
use crate::model::{CodeAction, KnowledgeItem};
use crate::orchestrator::AgentState;

/// **code(issue)** (§4.6): delegate to the code sandbox collaborator with a
/// read-only context snapshot.
pub async fn execute(state: &mut AgentState, collaborators: &Collaborators, action: CodeAction) {
    let top_urls: Vec<String> = state.last_shortlist.iter().take(5).map(|u| u.url.clone()).collect();
    let context = format!(
        "diary:\n{}\n\ntop urls: {:?}",
        state.knowledge.render_diary(),
        top_urls
    );

    match collaborators.code_sandbox.solve(&action.issue, &context).await {
        Ok(solution) => {
            state.knowledge.push(KnowledgeItem::coding(&action.issue, &solution.output, &solution.code));
        }
        Err(e) => {
            tracing::warn!(issue = %action.issue, error = %e, "code sandbox failed");
        }
    }
}
