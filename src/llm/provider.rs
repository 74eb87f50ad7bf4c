use std::path::Path;

use async_trait::async_trait;

use crate::agent_engine::state::IntentAction;
use crate::errors::PilotResult;
use crate::llm::types::ActionDescriptor;
use crate::perception::types::UIState;

/// Everything a proposer may look at for one decision.
#[derive(Debug, Clone, Copy)]
pub struct ProposalRequest<'a> {
    pub state: &'a UIState,
    pub goal: Option<&'a str>,
    /// Deterministic suggestions the proposer may pick from or ignore.
    pub candidates: &'a [IntentAction],
    pub screenshot: Option<&'a Path>,
}

/// Stochastic action proposer. Implementations may fail; the decision engine
/// retries and then degrades to an empty proposal list.
#[async_trait]
pub trait Proposer: Send + Sync {
    fn name(&self) -> &str;

    async fn propose(&self, request: &ProposalRequest<'_>) -> PilotResult<Vec<ActionDescriptor>>;
}
