use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::Json, routing::post, Router};
use model2vec_rs::model::StaticModel;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use deepcrawl_agent::collaborators::{
    Collaborators, DefaultCherryPick, DefaultFetch, DefaultRerank, DefaultSearch, Embed,
    HeuristicClassifySpam, HttpLastModified, HttpLlm, StaticModelEmbed, UnconfiguredCodeSandbox,
};
use deepcrawl_agent::core::config::load_run_config;
use deepcrawl_agent::{Orchestrator, ResearchResult, RunConfig};

fn parse_port_from_args() -> Option<u16> {
    let mut args = std::env::args().peekable();
    while let Some(a) = args.next() {
        if a == "--port" {
            if let Some(v) = args.next() {
                if let Ok(p) = v.parse::<u16>() {
                    return Some(p);
                }
            }
        } else if let Some(rest) = a.strip_prefix("--port=") {
            if let Ok(p) = rest.parse::<u16>() {
                return Some(p);
            }
        }
    }
    None
}

fn port_from_env() -> Option<u16> {
    for k in ["DEEPCRAWL_PORT", "PORT"] {
        if let Ok(v) = std::env::var(k) {
            if let Ok(p) = v.trim().parse::<u16>() {
                return Some(p);
            }
        }
    }
    None
}

fn question_from_args() -> Option<String> {
    let args: Vec<String> = std::env::args().collect();
    let idx = args.iter().position(|a| a == "--question" || a == "-q")?;
    args.get(idx + 1).cloned()
}

async fn load_embed_model() -> anyhow::Result<Arc<StaticModel>> {
    let model_id =
        std::env::var("MODEL2VEC_MODEL").unwrap_or_else(|_| "minishlab/potion-base-8M".to_string());
    info!(model_id = %model_id, "loading model2vec embedding model");
    let model = tokio::task::spawn_blocking(move || StaticModel::from_pretrained(&model_id, None, None, None))
        .await
        .map_err(|e| anyhow::anyhow!("model2vec load task panicked: {e}"))??;
    Ok(Arc::new(model))
}

async fn build_collaborators(config: &RunConfig) -> anyhow::Result<Collaborators> {
    let embed_model = load_embed_model().await?;
    let cherry_pick_embed: Arc<dyn Embed> = Arc::new(StaticModelEmbed::new(Arc::clone(&embed_model)));

    Ok(Collaborators {
        llm: Box::new(HttpLlm::new(
            config.resolve_llm_base_url(),
            config.resolve_llm_api_key(),
            config.llm_model.clone(),
        )),
        search: Box::new(DefaultSearch::new(
            std::env::var("SEARCH_ENDPOINT")
                .unwrap_or_else(|_| "https://api.search.brave.com/res/v1/web/search".to_string()),
            std::env::var("SEARCH_API_KEY").ok(),
        )),
        fetch: Box::new(DefaultFetch::new()),
        embed: Box::new(StaticModelEmbed::new(embed_model)),
        rerank: Box::new(DefaultRerank::new()),
        classify_spam: Box::new(HeuristicClassifySpam::new()),
        cherry_pick: Box::new(DefaultCherryPick::new(cherry_pick_embed)),
        last_modified: Box::new(HttpLastModified::new()),
        code_sandbox: Box::new(UnconfiguredCodeSandbox),
    })
}

fn build_llm(config: &RunConfig) -> Arc<dyn deepcrawl_agent::collaborators::Llm> {
    Arc::new(HttpLlm::new(
        config.resolve_llm_base_url(),
        config.resolve_llm_api_key(),
        config.llm_model.clone(),
    ))
}

#[derive(Debug, Deserialize)]
struct ResearchRequest {
    question: String,
    #[serde(default)]
    options: Option<RunConfigOverrides>,
}

/// Per-request overrides layered on top of the process-wide `RunConfig`
/// (hostname allow/deny lists and the no-direct-answer flag only; the budget
/// and threshold constants stay server-wide).
#[derive(Debug, Deserialize, Default)]
struct RunConfigOverrides {
    #[serde(default)]
    no_direct_answer: bool,
    #[serde(default)]
    only_hostnames: Vec<String>,
    #[serde(default)]
    bad_hostnames: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ResearchResponse {
    #[serde(flatten)]
    result: ResearchResult,
}

struct ServerState {
    orchestrator: Orchestrator,
    config: RunConfig,
}

async fn research_handler(
    State(state): State<Arc<ServerState>>,
    Json(req): Json<ResearchRequest>,
) -> Result<Json<ResearchResponse>, (StatusCode, String)> {
    if req.question.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "question must not be empty".to_string()));
    }

    let mut config = state.config.clone();
    if let Some(overrides) = req.options {
        config.no_direct_answer = overrides.no_direct_answer;
        if !overrides.only_hostnames.is_empty() {
            config.only_hostnames = overrides.only_hostnames;
        }
        config.bad_hostnames.extend(overrides.bad_hostnames);
    }

    let result = state.orchestrator.run(&req.question, config).await;
    Ok(Json(ResearchResponse { result }))
}

async fn health_check() -> &'static str {
    "ok"
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=warn"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let config = load_run_config();

    if let Some(question) = question_from_args() {
        info!(%question, "running one-shot research session");
        let collaborators = build_collaborators(&config).await?;
        let orchestrator = Orchestrator::new(collaborators, build_llm(&config));
        let result = orchestrator.run(&question, config).await;
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    info!("starting deepcrawl-agent research server");
    let collaborators = build_collaborators(&config).await?;
    let orchestrator = Orchestrator::new(collaborators, build_llm(&config));
    let state = Arc::new(ServerState { orchestrator, config });

    let app = Router::new()
        .route("/health", axum::routing::get(health_check))
        .route("/research", post(research_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let port: u16 = parse_port_from_args().or_else(port_from_env).unwrap_or(5000);
    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(l) => l,
        Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
            anyhow::bail!(
                "address already in use: {}. Stop the existing process or run with --port <n> (or set PORT/DEEPCRAWL_PORT).",
                bind_addr
            );
        }
        Err(e) => return Err(e.into()),
    };
    info!("listening on {}", bind_addr);

    if let Err(e) = axum::serve(listener, app).await {
        warn!(error = %e, "server exited with error");
    }

    Ok(())
}
