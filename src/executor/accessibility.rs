use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use crate::agent_engine::state::{
    ActionVerb, ExecutionMethod, ExecutionResult, ExecutionStatus, GroundedTarget, IntentAction,
};
use crate::errors::PilotError;
use crate::executor::traits::{AccessibilityBackend, Executor, OpOutcome, StructuredOp};
use crate::retry::{attempt_with_backoff, RetryPolicy};

/// Structured executor: drives the grounded element through its
/// accessibility patterns instead of synthesizing input.
pub struct AccessibilityExecutor {
    backend: Arc<dyn AccessibilityBackend>,
    retry: RetryPolicy,
}

impl AccessibilityExecutor {
    pub fn new(backend: Arc<dyn AccessibilityBackend>, retry: RetryPolicy) -> Self {
        Self { backend, retry }
    }
}

/// Structured equivalent of an intent, if there is one.
pub fn structured_op(intent: &IntentAction) -> Option<StructuredOp> {
    match intent.verb {
        ActionVerb::Click => Some(StructuredOp::Invoke),
        ActionVerb::DoubleClick => Some(StructuredOp::DoubleInvoke),
        ActionVerb::RightClick => Some(StructuredOp::ContextMenu),
        ActionVerb::Type => intent.text.clone().map(|text| StructuredOp::SetValue { text }),
        ActionVerb::FocusWindow => Some(StructuredOp::Focus),
        ActionVerb::Scroll => intent.amount.map(|amount| StructuredOp::Scroll { amount }),
        _ => None,
    }
}

#[async_trait]
impl Executor for AccessibilityExecutor {
    fn method(&self) -> ExecutionMethod {
        ExecutionMethod::Accessibility
    }

    async fn execute(&self, intent: &IntentAction, grounded: &GroundedTarget) -> ExecutionResult {
        let started = Instant::now();
        let Some(element) = grounded.element.as_ref() else {
            let err = PilotError::MissingTarget(format!("no grounded element for {}", intent.verb));
            return ExecutionResult::failed(self.method(), started, &err);
        };
        let Some(op) = structured_op(intent) else {
            tracing::debug!(verb = %intent.verb, "no structured form, skipping");
            return ExecutionResult::finished(ExecutionStatus::Skipped, self.method(), started, None);
        };

        let outcome = attempt_with_backoff(&self.retry, "accessibility", |_| self.backend.perform(element, &op)).await;
        match outcome {
            Ok(OpOutcome::Performed) => {
                tracing::info!(verb = %intent.verb, element = %element.element_id, "structured action performed");
                ExecutionResult::finished(ExecutionStatus::Ok, self.method(), started, None)
            }
            Ok(OpOutcome::Unsupported) => {
                tracing::debug!(?op, element = %element.element_id, "element lacks capability");
                ExecutionResult::finished(
                    ExecutionStatus::Skipped,
                    self.method(),
                    started,
                    Some(format!("unsupported: {op:?}")),
                )
            }
            Err(e) => ExecutionResult::failed(self.method(), started, &e),
        }
    }
}
