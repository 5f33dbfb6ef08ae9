use futures::future::join_all;

use crate::collaborators::Collaborators;
use crate::model::{KnowledgeItem, VisitAction};
use crate::orchestrator::AgentState;

struct VisitTask {
    url: String,
}

enum VisitOutcome {
    Success {
        url: String,
        title: String,
        snippet: String,
        links: Vec<(String, String)>,
    },
    HostResolutionFailure {
        url: String,
        hostname: String,
    },
    Failure {
        url: String,
    },
}

/// **visit(indices)** (§4.6): translate indices into the shortlist, fan out
/// fetch-and-distill tasks, fold results back into the ledger on the joining
/// side (§5, §9 Design Notes — no cross-task ledger mutex).
pub async fn execute(state: &mut AgentState, collaborators: &Collaborators, action: VisitAction) {
    let current_question = state.questions.current_question(state.step.saturating_sub(1));

    let mut targets: Vec<VisitTask> = Vec::new();
    for idx in &action.indices {
        let Some(candidate) = idx.checked_sub(1).and_then(|i| state.last_shortlist.get(i)) else {
            tracing::debug!(index = idx, "visit index out of range; skipped");
            continue;
        };
        if state.urls.is_visited(&candidate.url) {
            continue;
        }
        targets.push(VisitTask { url: candidate.url.clone() });
    }

    // Union with the top of the weighted list, cap at MAX_URLS_PER_STEP (§4.6).
    for candidate in &state.last_shortlist {
        if targets.len() >= state.config.max_urls_per_step {
            break;
        }
        if state.urls.is_visited(&candidate.url) || targets.iter().any(|t| t.url == candidate.url) {
            continue;
        }
        targets.push(VisitTask { url: candidate.url.clone() });
    }
    targets.truncate(state.config.max_urls_per_step);

    let futures = targets.into_iter().map(|task| {
        let question = current_question.clone();
        async move {
            fetch_and_distill(collaborators, &task.url, &question).await
        }
    });
    let outcomes = join_all(futures).await;

    for outcome in outcomes {
        match outcome {
            VisitOutcome::Success { url, title, snippet, links } => {
                state.urls.mark_visited(&url);
                state.knowledge.push(KnowledgeItem::url_item(&current_question, &snippet, &url));
                for (anchor, href) in links {
                    let _ = state.urls.insert(&href, &anchor, "", crate::ledger::url_ledger::WEIGHT_IN_PAGE_LINK);
                }
            }
            VisitOutcome::HostResolutionFailure { url, hostname } => {
                state.urls.mark_bad(&url);
                state.urls.evict_hostname(&hostname);
                tracing::warn!(url = %url, hostname = %hostname, "host resolution failed; hostname evicted");
            }
            VisitOutcome::Failure { url } => {
                state.urls.mark_bad(&url);
            }
        }
    }
}

async fn fetch_and_distill(collaborators: &Collaborators, url: &str, question: &str) -> VisitOutcome {
    let fetched = match collaborators.fetch.fetch(url, true).await {
        Ok(f) => f,
        Err(crate::core::errors::CollaboratorError::HostResolution { hostname, .. }) => {
            return VisitOutcome::HostResolutionFailure { url: url.to_string(), hostname };
        }
        Err(e) => {
            tracing::warn!(url = %url, error = %e, "fetch failed");
            return VisitOutcome::Failure { url: url.to_string() };
        }
    };

    if fetched.content.len() < 300 {
        match collaborators.classify_spam.classify(&fetched.content).await {
            Ok(true) => {
                tracing::info!(url = %url, "content classified as spam; treated as fetch failure");
                return VisitOutcome::Failure { url: url.to_string() };
            }
            Ok(false) => {}
            Err(e) => tracing::warn!(url = %url, error = %e, "spam classifier failed; proceeding"),
        }
    }

    let snippet = match collaborators.cherry_pick.cherry_pick(question, &fetched.content).await {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(url = %url, error = %e, "cherry-pick failed; using raw content");
            fetched.content.clone()
        }
    };

    // Opportunistic last-modified guess; failure here never fails the visit.
    let _ = collaborators.last_modified.last_modified(url).await;

    VisitOutcome::Success {
        url: url.to_string(),
        title: fetched.title,
        snippet,
        links: fetched.links,
    }
}
