use async_trait::async_trait;

use super::CResult;
use crate::core::errors::CollaboratorError;

#[derive(Debug, Clone)]
pub struct CodeSolution {
    pub output: String,
    pub code: String,
}

/// **CodeSandbox.solve** (§6): `(issue, context) -> {output, code}`.
#[async_trait]
pub trait CodeSandbox: Send + Sync {
    async fn solve(&self, issue: &str, context: &str) -> CResult<CodeSolution>;
}

/// A code execution sandbox is explicitly out of scope for this crate's network
/// surface (§1 Out of scope: "individual tool implementations"). This default
/// always fails clearly rather than silently no-op'ing, so a `code` action
/// fails as a recorded diary entry (§7 "Transient external failure") instead
/// of panicking; a real deployment substitutes an implementation of this trait.
pub struct UnconfiguredCodeSandbox;

#[async_trait]
impl CodeSandbox for UnconfiguredCodeSandbox {
    async fn solve(&self, _issue: &str, _context: &str) -> CResult<CodeSolution> {
        Err(CollaboratorError::NotConfigured("code sandbox"))
    }
}
