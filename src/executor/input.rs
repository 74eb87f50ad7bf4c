// Physical input simulation over an `InputBackend`.
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::agent_engine::state::{
    ActionVerb, ExecutionMethod, ExecutionResult, ExecutionStatus, GroundedTarget, IntentAction,
    MAX_WAIT_SECONDS,
};
use crate::errors::{PilotError, PilotResult};
use crate::executor::coordinator::element_point;
use crate::executor::text_input::contains_cjk;
use crate::executor::traits::{Executor, InputBackend, MouseButton, OpOutcome};
use crate::retry::{attempt_with_backoff, RetryPolicy};

const DEFAULT_WAIT_SECONDS: f64 = 0.5;

/// Raw input-injection executor; the fallback when structured execution is
/// unavailable or did not succeed.
pub struct InputExecutor {
    backend: Arc<dyn InputBackend>,
    retry: RetryPolicy,
}

impl InputExecutor {
    pub fn new(backend: Arc<dyn InputBackend>, retry: RetryPolicy) -> Self {
        Self { backend, retry }
    }

    fn method_for(verb: ActionVerb) -> ExecutionMethod {
        match verb {
            ActionVerb::Type | ActionVerb::Keypress | ActionVerb::CloseDialog => ExecutionMethod::Keyboard,
            ActionVerb::Wait | ActionVerb::Stop | ActionVerb::AskUser | ActionVerb::OpenUrl => ExecutionMethod::Noop,
            _ => ExecutionMethod::Mouse,
        }
    }

    /// Validates parameters up front so hopeless intents are not retried.
    fn plan(&self, intent: &IntentAction, grounded: &GroundedTarget) -> PilotResult<Option<(i32, i32)>> {
        let point = grounded.element.as_ref().and_then(|e| element_point(e, None));
        match intent.verb {
            verb if verb.needs_target() => {
                let element = grounded
                    .element
                    .as_ref()
                    .ok_or_else(|| PilotError::MissingTarget(format!("cannot {verb} without a grounded element")))?;
                if point.is_none() {
                    return Err(PilotError::MissingTarget(format!(
                        "element {} has no coordinates",
                        element.element_id
                    )));
                }
            }
            ActionVerb::Type if intent.text.is_none() => {
                return Err(PilotError::Executor("type intent carries no text".into()));
            }
            ActionVerb::Keypress if intent.key.is_none() => {
                return Err(PilotError::Executor("keypress intent carries no key".into()));
            }
            ActionVerb::Scroll if intent.amount.is_none() => {
                return Err(PilotError::Executor("scroll intent carries no amount".into()));
            }
            ActionVerb::OpenUrl => {
                return Err(PilotError::Executor("open-url is not supported by raw input".into()));
            }
            ActionVerb::Wait => {
                wait_duration(intent)?;
            }
            _ => {}
        }
        Ok(point)
    }

    async fn perform(&self, intent: &IntentAction, point: Option<(i32, i32)>) -> PilotResult<()> {
        match intent.verb {
            ActionVerb::Click | ActionVerb::FocusWindow => self.click(point, MouseButton::Left, 1).await,
            ActionVerb::DoubleClick => self.click(point, MouseButton::Left, 2).await,
            ActionVerb::RightClick => self.click(point, MouseButton::Right, 1).await,
            ActionVerb::Type => {
                let text = intent.text.as_deref().unwrap_or_default();
                if contains_cjk(text) && self.backend.paste_text(text).await? == OpOutcome::Performed {
                    return Ok(());
                }
                self.backend.type_text(text).await
            }
            ActionVerb::Keypress => self.backend.key_press(intent.key.as_deref().unwrap_or_default()).await,
            ActionVerb::CloseDialog => self.backend.key_press("escape").await,
            ActionVerb::Scroll => self.backend.scroll(intent.amount.unwrap_or_default(), point).await,
            ActionVerb::Wait => {
                tokio::time::sleep(wait_duration(intent)?).await;
                Ok(())
            }
            ActionVerb::Stop | ActionVerb::AskUser | ActionVerb::OpenUrl => Ok(()),
        }
    }

    async fn click(&self, point: Option<(i32, i32)>, button: MouseButton, count: u32) -> PilotResult<()> {
        let (x, y) = point.ok_or_else(|| PilotError::MissingTarget("no click point".into()))?;
        self.backend.click(x, y, button, count).await
    }
}

fn wait_duration(intent: &IntentAction) -> PilotResult<Duration> {
    let secs = intent.wait_seconds.unwrap_or(DEFAULT_WAIT_SECONDS);
    if !(0.0..=MAX_WAIT_SECONDS).contains(&secs) {
        return Err(PilotError::Executor(format!(
            "wait of {secs}s is outside 0..={MAX_WAIT_SECONDS}s"
        )));
    }
    Duration::try_from_secs_f64(secs).map_err(|e| PilotError::Executor(format!("invalid wait: {e}")))
}

#[async_trait]
impl Executor for InputExecutor {
    fn method(&self) -> ExecutionMethod {
        ExecutionMethod::Mouse
    }

    async fn execute(&self, intent: &IntentAction, grounded: &GroundedTarget) -> ExecutionResult {
        let started = Instant::now();
        let method = Self::method_for(intent.verb);

        if matches!(intent.verb, ActionVerb::Stop | ActionVerb::AskUser) {
            return ExecutionResult::finished(ExecutionStatus::Skipped, method, started, None);
        }

        let point = match self.plan(intent, grounded) {
            Ok(point) => point,
            Err(e) => {
                tracing::warn!(verb = %intent.verb, error = %e, "raw input cannot perform intent");
                return ExecutionResult::failed(method, started, &e);
            }
        };

        match attempt_with_backoff(&self.retry, "raw-input", |_| self.perform(intent, point)).await {
            Ok(()) => {
                tracing::info!(verb = %intent.verb, ?point, "raw input performed");
                ExecutionResult::finished(ExecutionStatus::Ok, method, started, None)
            }
            Err(e) => ExecutionResult::failed(method, started, &e),
        }
    }
}

/// Backend that only logs; used for dry runs against scripted observations.
#[derive(Debug, Default)]
pub struct DryRunInputBackend;

#[async_trait]
impl InputBackend for DryRunInputBackend {
    async fn click(&self, x: i32, y: i32, button: MouseButton, count: u32) -> PilotResult<()> {
        tracing::info!(x, y, ?button, count, "[dry-run] click");
        Ok(())
    }

    async fn type_text(&self, text: &str) -> PilotResult<()> {
        tracing::info!(chars = text.chars().count(), "[dry-run] type");
        Ok(())
    }

    async fn key_press(&self, key: &str) -> PilotResult<()> {
        tracing::info!(key, "[dry-run] key press");
        Ok(())
    }

    async fn scroll(&self, amount: i64, at: Option<(i32, i32)>) -> PilotResult<()> {
        tracing::info!(amount, ?at, "[dry-run] scroll");
        Ok(())
    }
}
