// Execution dispatcher: structured backend first, raw input as fallback.
use std::sync::Arc;

use crate::agent_engine::state::{ExecutionResult, GroundedTarget, IntentAction};
use crate::executor::traits::Executor;

pub struct ExecutionDispatcher {
    structured: Option<Arc<dyn Executor>>,
    raw: Arc<dyn Executor>,
}

impl ExecutionDispatcher {
    pub fn new(structured: Option<Arc<dyn Executor>>, raw: Arc<dyn Executor>) -> Self {
        Self { structured, raw }
    }

    /// Raw input only; used when no accessibility backend is wired up.
    pub fn raw_only(raw: Arc<dyn Executor>) -> Self {
        Self::new(None, raw)
    }

    /// Tries the structured executor when an element was grounded and falls
    /// back to raw input on anything other than success.
    pub async fn dispatch(&self, intent: &IntentAction, grounded: &GroundedTarget) -> ExecutionResult {
        if let (Some(structured), Some(element)) = (self.structured.as_ref(), grounded.element.as_ref()) {
            let result = structured.execute(intent, grounded).await;
            if result.is_ok() {
                return result;
            }
            tracing::debug!(
                verb = %intent.verb,
                element = %element.element_id,
                status = ?result.status,
                error = ?result.error,
                "structured execution did not succeed, falling back to raw input"
            );
        }
        self.raw.execute(intent, grounded).await
    }
}
