use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::agent_engine::state::{ExecutionMethod, ExecutionResult, GroundedTarget, IntentAction};
use crate::errors::PilotResult;
use crate::perception::types::UIElement;

/// Runs one gated intent against the target application. Never errors:
/// failures come back as `ExecutionStatus::Fail` with a categorized message.
#[async_trait]
pub trait Executor: Send + Sync {
    fn method(&self) -> ExecutionMethod;

    async fn execute(&self, intent: &IntentAction, grounded: &GroundedTarget) -> ExecutionResult;
}

/// Result of a capability call at the adapter boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpOutcome {
    Performed,
    /// The backend object has no such capability; nothing happened.
    Unsupported,
}

/// Operations a structured (accessibility) backend may offer per element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum StructuredOp {
    Invoke,
    DoubleInvoke,
    ContextMenu,
    SetValue { text: String },
    Focus,
    Scroll { amount: i64 },
}

/// Accessibility/UI-Automation adapter. Capability checks happen here, not
/// in the core: an element that cannot perform `op` yields `Unsupported`.
#[async_trait]
pub trait AccessibilityBackend: Send + Sync {
    async fn perform(&self, element: &UIElement, op: &StructuredOp) -> PilotResult<OpOutcome>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MouseButton {
    Left,
    Right,
}

/// Raw input-injection adapter working in physical screen coordinates.
#[async_trait]
pub trait InputBackend: Send + Sync {
    async fn click(&self, x: i32, y: i32, button: MouseButton, count: u32) -> PilotResult<()>;

    async fn type_text(&self, text: &str) -> PilotResult<()>;

    /// Clipboard paste; backends without clipboard access keep the default.
    async fn paste_text(&self, _text: &str) -> PilotResult<OpOutcome> {
        Ok(OpOutcome::Unsupported)
    }

    async fn key_press(&self, key: &str) -> PilotResult<()>;

    async fn scroll(&self, amount: i64, at: Option<(i32, i32)>) -> PilotResult<()>;
}
