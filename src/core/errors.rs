use thiserror::Error;

/// Distinguishable failure cases from URL normalization (§4.1).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UrlError {
    #[error("unparseable URL: {0}")]
    Unparseable(String),
    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),
    #[error("sentinel/placeholder URL rejected: {0}")]
    Sentinel(String),
    #[error("empty URL")]
    Empty,
}

/// Distinguishable failure cases surfaced by collaborator trait implementations (§6/§7).
/// Most call sites treat these as non-fatal: record a diary entry and move on.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("host resolution failed for {hostname}: {message}")]
    HostResolution { hostname: String, message: String },

    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("upstream returned no usable result")]
    Empty,

    #[error("content classified as spam")]
    Spam,

    #[error("schema-constrained generation failed after retries: {0}")]
    SchemaGeneration(String),

    #[error("collaborator not configured: {0}")]
    NotConfigured(&'static str),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CollaboratorError {
    /// Whether this error's message matches the known DNS/host-resolution failure
    /// patterns from §4.1 "Bad-hostname eviction".
    pub fn looks_like_host_resolution_failure(message: &str) -> bool {
        const PATTERNS: &[&str] = &[
            "could not be resolved",
            "couldn't resolve host",
            "err_name_not_resolved",
            "err_connection_refused",
            "err_cert_common_name_invalid",
            "name or service not known",
            "temporary failure in name resolution",
        ];
        let lower = message.to_ascii_lowercase();
        PATTERNS.iter().any(|p| lower.contains(p))
    }
}
