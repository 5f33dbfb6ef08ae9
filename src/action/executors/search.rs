use serde_json::Value;

use crate::collaborators::Collaborators;
use crate::model::{KnowledgeItem, SearchAction};
use crate::orchestrator::AgentState;

/// System prompt for the between-passes query rewrite (§4.6), grounded on the
/// original's query-expansion tool: given what the first pass already turned
/// up, propose queries from distinct angles (a skeptic probing limitations, a
/// detail-seeker after precise specifics, a historian tracing how the topic
/// changed over time, a comparer weighing alternatives) rather than near
/// duplicates of what was just searched.
const QUERY_REWRITE_SYSTEM_PROMPT: &str = "You are an expert at expanding a search query into sharper follow-up queries.\n\nYou are given the original query, the searcher's reasoning, and a digest of what the first pass of search results already covered. Propose new queries that would surface what the first pass missed: edge cases and counterevidence, precise technical specifics, how the topic has changed over time, and comparisons with alternatives. Do not propose a query that is a near-duplicate of the original or of anything implied by the digest. Keep each query short and keyword-based (2-6 words).";

fn query_rewrite_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "think": {"type": "string"},
            "queries": {"type": "array", "items": {"type": "string"}},
        },
        "required": ["think", "queries"],
        "additionalProperties": false,
    })
}

/// Run one pass of search over `queries`, merging hits into the URL ledger and
/// recording one `side-info` knowledge item per query. Returns the
/// descriptions of every hit seen, for use as the next pass's digest.
async fn run_pass(
    state: &mut AgentState,
    collaborators: &Collaborators,
    queries: &[String],
    only_hostnames: &[String],
) -> Vec<String> {
    let mut digest = Vec::new();
    for query in queries {
        let effective_query = if only_hostnames.is_empty() {
            query.clone()
        } else {
            let sites: Vec<String> = only_hostnames.iter().map(|h| format!("site:{h}")).collect();
            format!("{query} {}", sites.join(" "))
        };

        match collaborators.search.search(&effective_query).await {
            Ok(hits) => {
                if hits.is_empty() {
                    tracing::warn!(query = %query, "search returned zero results");
                    continue;
                }
                let mut descriptions = Vec::new();
                for hit in &hits {
                    if let Err(e) = state
                        .urls
                        .insert(&hit.url, &hit.title, &hit.description, crate::ledger::url_ledger::WEIGHT_SEARCH_RESULT)
                    {
                        tracing::debug!(url = %hit.url, error = %e, "rejected search result URL");
                        continue;
                    }
                    descriptions.push(hit.description.clone());
                }
                state.knowledge.push(KnowledgeItem::side_info(query, descriptions.join("\n")));
                digest.extend(descriptions);
            }
            Err(e) => {
                tracing::warn!(query = %query, error = %e, "search collaborator failed");
            }
        }
        state.used_keywords.push(query.clone());
    }
    digest
}

/// Ask the LLM to rewrite queries given a digest of the first pass, falling
/// back to an empty rewrite (second pass simply skipped) on any collaborator
/// failure or malformed response.
async fn rewrite_queries(collaborators: &Collaborators, think: &str, digest: &[String]) -> Vec<String> {
    if digest.is_empty() {
        return Vec::new();
    }
    let user_prompt = format!(
        "<reasoning>\n{think}\n</reasoning>\n\n<first-pass-digest>\n{}\n</first-pass-digest>",
        digest.join("\n"),
    );
    let messages = [("user".to_string(), user_prompt)];
    match collaborators
        .llm
        .generate_object(&query_rewrite_schema(), QUERY_REWRITE_SYSTEM_PROMPT, &messages)
        .await
    {
        Ok(result) => result
            .value
            .get("queries")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|q| q.as_str().map(str::to_string)).collect())
            .unwrap_or_default(),
        Err(e) => {
            tracing::warn!(error = %e, "query rewrite LLM call failed; skipping second pass");
            Vec::new()
        }
    }
}

/// **search(queries)** (§4.6): two passes. The first pass runs the model's own
/// queries unconstrained; its results become a digest the LLM uses to rewrite
/// queries for a second pass, deduped against every keyword ever used, this
/// time honoring `only_hostnames` as a `site:` constraint. Disables `search`
/// for the next step (handled by the orchestrator's suppression gating).
pub async fn execute(state: &mut AgentState, collaborators: &Collaborators, action: SearchAction) {
    let cap = state.config.max_queries_per_step;
    let threshold = state.config.similarity_threshold;

    let first_pass = super::dedup_against(
        collaborators.embed.as_ref(),
        threshold,
        &state.used_keywords,
        action.queries,
    )
    .await;
    let first_pass: Vec<String> = first_pass.into_iter().take(cap).collect();

    let digest = run_pass(state, collaborators, &first_pass, &[]).await;

    let rewritten = rewrite_queries(collaborators, &action.think, &digest).await;
    if rewritten.is_empty() {
        return;
    }

    let second_pass = super::dedup_against(
        collaborators.embed.as_ref(),
        threshold,
        &state.used_keywords,
        rewritten,
    )
    .await;
    let second_pass: Vec<String> = second_pass.into_iter().take(cap).collect();
    if second_pass.is_empty() {
        return;
    }

    run_pass(state, collaborators, &second_pass, &action.only_hostnames).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::embed::Embed;
    use crate::collaborators::{
        CResult, ClassifySpam, CodeSandbox, CodeSolution, Fetch, FetchResult, GenerateObjectResult, LastModified,
        Llm, RankedDocument, Rerank, Search, SearchHit,
    };
    use crate::core::config::RunConfig;
    use crate::core::errors::CollaboratorError;
    use crate::model::TokenUsage;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Identical strings embed identically, distinct strings orthogonally —
    /// enough to exercise dedup without a real embedding model.
    struct ExactMatchEmbed;
    #[async_trait]
    impl Embed for ExactMatchEmbed {
        async fn embed(&self, texts: &[String]) -> CResult<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    let mut v = vec![0.0f32; texts.len()];
                    let idx = texts.iter().position(|x| x == t).unwrap();
                    v[idx] = 1.0;
                    v
                })
                .collect())
        }
    }

    struct RecordingSearch {
        queries_seen: Mutex<Vec<String>>,
        call_count: AtomicUsize,
    }

    #[async_trait]
    impl Search for RecordingSearch {
        async fn search(&self, query: &str) -> CResult<Vec<SearchHit>> {
            self.queries_seen.lock().unwrap().push(query.to_string());
            let n = self.call_count.fetch_add(1, Ordering::SeqCst);
            Ok(vec![SearchHit {
                title: format!("title-{n}"),
                url: format!("https://example.com/{n}"),
                description: format!("result from pass for {query}"),
                date: None,
                content: None,
            }])
        }
    }

    struct RewriteLlm(Value);
    #[async_trait]
    impl Llm for RewriteLlm {
        async fn generate_object(
            &self,
            _schema: &Value,
            _system_prompt: &str,
            _messages: &[(String, String)],
        ) -> CResult<GenerateObjectResult> {
            Ok(GenerateObjectResult {
                value: self.0.clone(),
                usage: TokenUsage::default(),
            })
        }
    }

    struct UnconfiguredFetch;
    #[async_trait]
    impl Fetch for UnconfiguredFetch {
        async fn fetch(&self, _url: &str, _with_links: bool) -> CResult<FetchResult> {
            Err(CollaboratorError::NotConfigured("fetch"))
        }
    }

    struct UnconfiguredRerank;
    #[async_trait]
    impl Rerank for UnconfiguredRerank {
        async fn rerank(&self, _query: &str, _documents: &[String]) -> CResult<Vec<RankedDocument>> {
            Ok(Vec::new())
        }
    }

    struct PermissiveSpam;
    #[async_trait]
    impl ClassifySpam for PermissiveSpam {
        async fn classify(&self, _text: &str) -> CResult<bool> {
            Ok(false)
        }
    }

    struct UnconfiguredCherryPick;
    #[async_trait]
    impl crate::collaborators::CherryPick for UnconfiguredCherryPick {
        async fn cherry_pick(&self, _question: &str, long_text: &str) -> CResult<String> {
            Ok(long_text.to_string())
        }
    }

    struct NoLastModified;
    #[async_trait]
    impl LastModified for NoLastModified {
        async fn last_modified(&self, _url: &str) -> CResult<Option<String>> {
            Ok(None)
        }
    }

    struct UnconfiguredCodeSandbox;
    #[async_trait]
    impl CodeSandbox for UnconfiguredCodeSandbox {
        async fn solve(&self, _issue: &str, _context: &str) -> CResult<CodeSolution> {
            Err(CollaboratorError::NotConfigured("code_sandbox"))
        }
    }

    fn collaborators_with(llm: Value, search: RecordingSearch) -> (Collaborators, std::sync::Arc<RecordingSearch>) {
        let search = std::sync::Arc::new(search);
        let collaborators = Collaborators {
            llm: Box::new(RewriteLlm(llm)),
            search: Box::new(ArcSearch(search.clone())),
            fetch: Box::new(UnconfiguredFetch),
            embed: Box::new(ExactMatchEmbed),
            rerank: Box::new(UnconfiguredRerank),
            classify_spam: Box::new(PermissiveSpam),
            cherry_pick: Box::new(UnconfiguredCherryPick),
            last_modified: Box::new(NoLastModified),
            code_sandbox: Box::new(UnconfiguredCodeSandbox),
        };
        (collaborators, search)
    }

    struct ArcSearch(std::sync::Arc<RecordingSearch>);
    #[async_trait]
    impl Search for ArcSearch {
        async fn search(&self, query: &str) -> CResult<Vec<SearchHit>> {
            self.0.search(query).await
        }
    }

    #[tokio::test]
    async fn second_pass_is_site_constrained_not_the_first() {
        let rewrite_response = serde_json::json!({"think": "", "queries": ["follow-up query"]});
        let recording = RecordingSearch {
            queries_seen: Mutex::new(Vec::new()),
            call_count: AtomicUsize::new(0),
        };
        let (collaborators, search) = collaborators_with(rewrite_response, recording);

        let mut state = AgentState::new("question", RunConfig::default());
        let action = SearchAction {
            think: "looking for X".to_string(),
            queries: vec!["first query".to_string()],
            only_hostnames: vec!["example.org".to_string()],
        };

        execute(&mut state, &collaborators, action).await;

        let seen = search.queries_seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(!seen[0].contains("site:"), "first pass must not carry a site: constraint");
        assert!(seen[1].contains("site:example.org"), "second pass must carry the site: constraint");
    }

    #[tokio::test]
    async fn empty_rewrite_skips_the_second_pass() {
        let rewrite_response = serde_json::json!({"think": "", "queries": []});
        let recording = RecordingSearch {
            queries_seen: Mutex::new(Vec::new()),
            call_count: AtomicUsize::new(0),
        };
        let (collaborators, search) = collaborators_with(rewrite_response, recording);

        let mut state = AgentState::new("question", RunConfig::default());
        let action = SearchAction {
            think: "looking for X".to_string(),
            queries: vec!["first query".to_string()],
            only_hostnames: Vec::new(),
        };

        execute(&mut state, &collaborators, action).await;

        assert_eq!(search.queries_seen.lock().unwrap().len(), 1);
    }
}
