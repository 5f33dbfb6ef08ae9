use std::time::Duration;

/// Runtime configuration for a research session (§1 ambient stack / §6 "Configuration").
///
/// Loaded the way the teacher's `ShadowConfig` loads `cortex-scout.json`: an optional
/// JSON file on disk, overridden field-by-field by environment variables, with typed
/// `resolve_*`-style defaults rather than scattered `std::env::var` calls at call sites.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct RunConfig {
    #[serde(default = "RunConfig::default_token_budget")]
    pub token_budget: u64,
    #[serde(default = "RunConfig::default_max_bad_attempts")]
    pub max_bad_attempts: u32,
    #[serde(default)]
    pub no_direct_answer: bool,
    #[serde(default = "RunConfig::default_max_queries_per_step")]
    pub max_queries_per_step: usize,
    #[serde(default = "RunConfig::default_max_urls_per_step")]
    pub max_urls_per_step: usize,
    #[serde(default = "RunConfig::default_max_urls_read_per_step")]
    pub max_urls_read_per_step: usize,
    #[serde(default = "RunConfig::default_max_reflect_per_step")]
    pub max_reflect_per_step: usize,
    #[serde(default = "RunConfig::default_max_known_urls_for_search")]
    pub max_known_urls_for_search: usize,
    #[serde(default = "RunConfig::default_step_sleep_ms")]
    pub step_sleep_ms: u64,
    #[serde(default = "RunConfig::default_similarity_threshold")]
    pub similarity_threshold: f32,
    #[serde(default = "RunConfig::default_regular_budget_fraction")]
    pub regular_budget_fraction: f64,
    #[serde(default = "RunConfig::default_hostname_diversification_k")]
    pub hostname_diversification_k: usize,
    #[serde(default)]
    pub boost_hostnames: Vec<String>,
    #[serde(default)]
    pub bad_hostnames: Vec<String>,
    #[serde(default)]
    pub only_hostnames: Vec<String>,
    #[serde(default = "RunConfig::default_llm_model")]
    pub llm_model: String,
    #[serde(default)]
    pub llm_base_url: Option<String>,
    #[serde(default)]
    pub llm_api_key: Option<String>,
}

impl RunConfig {
    fn default_token_budget() -> u64 {
        400_000
    }
    fn default_max_bad_attempts() -> u32 {
        2
    }
    fn default_max_queries_per_step() -> usize {
        4
    }
    fn default_max_urls_per_step() -> usize {
        4
    }
    fn default_max_urls_read_per_step() -> usize {
        10
    }
    fn default_max_reflect_per_step() -> usize {
        4
    }
    fn default_max_known_urls_for_search() -> usize {
        200
    }
    fn default_step_sleep_ms() -> u64 {
        500
    }
    fn default_similarity_threshold() -> f32 {
        0.86
    }
    fn default_regular_budget_fraction() -> f64 {
        0.85
    }
    fn default_hostname_diversification_k() -> usize {
        2
    }
    fn default_llm_model() -> String {
        "gpt-4o-mini".to_string()
    }

    pub fn regular_budget(&self) -> u64 {
        (self.token_budget as f64 * self.regular_budget_fraction) as u64
    }

    pub fn step_sleep(&self) -> Duration {
        Duration::from_millis(self.step_sleep_ms)
    }

    /// API key: config field → `OPENAI_API_KEY` env var → `None`.
    pub fn resolve_llm_api_key(&self) -> Option<String> {
        if let Some(k) = &self.llm_api_key {
            return Some(k.trim().to_string());
        }
        std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|v| !v.trim().is_empty())
    }

    /// Base URL: config field → `OPENAI_BASE_URL` env var → default OpenAI endpoint.
    pub fn resolve_llm_base_url(&self) -> String {
        if let Some(u) = &self.llm_base_url {
            if !u.trim().is_empty() {
                return u.clone();
            }
        }
        std::env::var("OPENAI_BASE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string())
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            token_budget: Self::default_token_budget(),
            max_bad_attempts: Self::default_max_bad_attempts(),
            no_direct_answer: false,
            max_queries_per_step: Self::default_max_queries_per_step(),
            max_urls_per_step: Self::default_max_urls_per_step(),
            max_urls_read_per_step: Self::default_max_urls_read_per_step(),
            max_reflect_per_step: Self::default_max_reflect_per_step(),
            max_known_urls_for_search: Self::default_max_known_urls_for_search(),
            step_sleep_ms: Self::default_step_sleep_ms(),
            similarity_threshold: Self::default_similarity_threshold(),
            regular_budget_fraction: Self::default_regular_budget_fraction(),
            hostname_diversification_k: Self::default_hostname_diversification_k(),
            boost_hostnames: Vec::new(),
            bad_hostnames: Vec::new(),
            only_hostnames: Vec::new(),
            llm_model: Self::default_llm_model(),
            llm_base_url: None,
            llm_api_key: None,
        }
    }
}

/// Load `deepcrawl-agent.json` from standard locations, falling back to
/// `RunConfig::default()` (all env-var fallbacks then apply per-field).
///
/// Search order (first found wins):
/// 1. `DEEPCRAWL_CONFIG` env var path
/// 2. `./deepcrawl-agent.json`
/// 3. `../deepcrawl-agent.json`
pub fn load_run_config() -> RunConfig {
    let mut candidates: Vec<std::path::PathBuf> = vec![
        std::path::PathBuf::from("deepcrawl-agent.json"),
        std::path::PathBuf::from("../deepcrawl-agent.json"),
    ];
    if let Ok(env_path) = std::env::var("DEEPCRAWL_CONFIG") {
        candidates.insert(0, std::path::PathBuf::from(env_path));
    }

    for path in &candidates {
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                return match serde_json::from_str::<RunConfig>(&contents) {
                    Ok(cfg) => {
                        tracing::info!("deepcrawl-agent.json loaded from {}", path.display());
                        cfg
                    }
                    Err(e) => {
                        tracing::warn!(
                            "deepcrawl-agent.json parse error at {}: {} — using defaults",
                            path.display(),
                            e
                        );
                        RunConfig::default()
                    }
                };
            }
            Err(_) => continue,
        }
    }

    RunConfig::default()
}
