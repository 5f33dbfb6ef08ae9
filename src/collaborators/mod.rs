//! External collaborator traits (§6) and their default implementations (§4.9 / C9).
//!
//! The core orchestration loop depends only on these traits; swapping in a
//! different LLM vendor, search engine, or sandbox means implementing the
//! relevant trait, nothing more.

pub mod cherry_pick;
pub mod classify_spam;
pub mod code_sandbox;
pub mod embed;
pub mod fetch;
pub mod last_modified;
pub mod llm;
pub mod rerank;
pub mod search;

pub use cherry_pick::{CherryPick, DefaultCherryPick};
pub use classify_spam::{ClassifySpam, HeuristicClassifySpam};
pub use code_sandbox::{CodeSandbox, CodeSolution, UnconfiguredCodeSandbox};
pub use embed::{Embed, StaticModelEmbed};
pub use fetch::{DefaultFetch, Fetch, FetchResult};
pub use last_modified::{HttpLastModified, LastModified};
pub use llm::{GenerateObjectResult, HttpLlm, Llm};
pub use rerank::{DefaultRerank, RankedDocument, Rerank};
pub use search::{DefaultSearch, Search, SearchHit};

use crate::core::errors::CollaboratorError;

pub type CResult<T> = Result<T, CollaboratorError>;

/// Bundles every collaborator trait object a session needs, wired up once at
/// startup (analogous to the teacher's `AppState`) and passed by reference
/// through the orchestrator and executors.
pub struct Collaborators {
    pub llm: Box<dyn Llm>,
    pub search: Box<dyn Search>,
    pub fetch: Box<dyn Fetch>,
    pub embed: Box<dyn Embed>,
    pub rerank: Box<dyn Rerank>,
    pub classify_spam: Box<dyn ClassifySpam>,
    pub cherry_pick: Box<dyn CherryPick>,
    pub last_modified: Box<dyn LastModified>,
    pub code_sandbox: Box<dyn CodeSandbox>,
}
