use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::errors::PilotError;
use crate::perception::types::UIElement;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionVerb {
    Click,
    DoubleClick,
    RightClick,
    Type,
    Keypress,
    Scroll,
    Wait,
    FocusWindow,
    OpenUrl,
    CloseDialog,
    AskUser,
    Stop,
}

impl ActionVerb {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionVerb::Click => "click",
            ActionVerb::DoubleClick => "double-click",
            ActionVerb::RightClick => "right-click",
            ActionVerb::Type => "type",
            ActionVerb::Keypress => "keypress",
            ActionVerb::Scroll => "scroll",
            ActionVerb::Wait => "wait",
            ActionVerb::FocusWindow => "focus-window",
            ActionVerb::OpenUrl => "open-url",
            ActionVerb::CloseDialog => "close-dialog",
            ActionVerb::AskUser => "ask-user",
            ActionVerb::Stop => "stop",
        }
    }

    /// Verbs that act on a concrete element.
    pub fn needs_target(&self) -> bool {
        matches!(
            self,
            ActionVerb::Click | ActionVerb::DoubleClick | ActionVerb::RightClick | ActionVerb::FocusWindow
        )
    }
}

impl fmt::Display for ActionVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionVerb {
    type Err = String;

    /// Accepts kebab-case, snake_case and a few aliases proposers tend to emit.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let folded = s.trim().to_lowercase().replace(['_', ' '], "-");
        let verb = match folded.as_str() {
            "click" | "left-click" => ActionVerb::Click,
            "double-click" | "doubleclick" => ActionVerb::DoubleClick,
            "right-click" | "rightclick" | "context-click" => ActionVerb::RightClick,
            "type" | "type-text" | "input" => ActionVerb::Type,
            "keypress" | "key-press" | "press" | "key" | "hotkey" => ActionVerb::Keypress,
            "scroll" => ActionVerb::Scroll,
            "wait" | "sleep" => ActionVerb::Wait,
            "focus-window" | "focus" => ActionVerb::FocusWindow,
            "open-url" | "navigate" => ActionVerb::OpenUrl,
            "close-dialog" | "dismiss" => ActionVerb::CloseDialog,
            "ask-user" => ActionVerb::AskUser,
            "stop" | "finish" | "done" => ActionVerb::Stop,
            other => return Err(format!("unknown verb: {other}")),
        };
        Ok(verb)
    }
}

/// Declarative match specification; `None` means "don't care".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntentTarget {
    pub role: Option<String>,
    pub name_equals: Option<String>,
    pub name_contains: Option<String>,
    pub automation_id: Option<String>,
    pub near_text: Option<String>,
    pub element_id: Option<String>,
}

impl IntentTarget {
    pub fn is_empty(&self) -> bool {
        self == &IntentTarget::default()
    }

    /// Human-facing text the selector screens against the deny list.
    pub fn text_fields(&self) -> impl Iterator<Item = &str> {
        self.name_contains.as_deref().into_iter().chain(self.name_equals.as_deref())
    }
}

/// Longest single `wait` the loop will honour.
pub const MAX_WAIT_SECONDS: f64 = 60.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentAction {
    pub verb: ActionVerb,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<IntentTarget>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_seconds: Option<f64>,
}

impl IntentAction {
    pub fn new(verb: ActionVerb) -> Self {
        Self {
            verb,
            target: None,
            text: None,
            key: None,
            amount: None,
            wait_seconds: None,
        }
    }

    pub fn with_target(mut self, target: IntentTarget) -> Self {
        self.target = Some(target);
        self
    }

    pub fn wait(seconds: f64) -> Self {
        Self {
            wait_seconds: Some(seconds),
            ..Self::new(ActionVerb::Wait)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundedTarget {
    pub element: Option<UIElement>,
    pub confidence: f64,
    pub alternatives: Vec<UIElement>,
}

impl GroundedTarget {
    pub fn none() -> Self {
        Self {
            element: None,
            confidence: 0.0,
            alternatives: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Ok,
    Fail,
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMethod {
    Accessibility,
    Mouse,
    Keyboard,
    Noop,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub status: ExecutionStatus,
    pub method: ExecutionMethod,
    pub duration_seconds: f64,
    pub error: Option<String>,
}

impl ExecutionResult {
    pub fn finished(status: ExecutionStatus, method: ExecutionMethod, started: Instant, error: Option<String>) -> Self {
        Self {
            status,
            method,
            duration_seconds: started.elapsed().as_secs_f64(),
            error,
        }
    }

    /// Failure with the error text prefixed by its coarse category.
    pub fn failed(method: ExecutionMethod, started: Instant, err: &PilotError) -> Self {
        Self::finished(
            ExecutionStatus::Fail,
            method,
            started,
            Some(format!("{}: {}", err.category(), err)),
        )
    }

    pub fn is_ok(&self) -> bool {
        self.status == ExecutionStatus::Ok
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Success,
    /// Reserved for blended multi-condition outcomes; nothing produces it yet.
    Partial,
    Fail,
    Stuck,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureReason {
    ScreenUnchanged,
    NoScreenChange,
    LargeElementDrop,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FailureReason::ScreenUnchanged => "screen signature unchanged",
            FailureReason::NoScreenChange => "no screen change detected",
            FailureReason::LargeElementDrop => "large element drop",
        })
    }
}

/// Symbolic replanning cue attached to a verification result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Guidance {
    Replan,
    RetryDifferentTarget,
    AdjustWindow,
    FocusShift,
}

impl fmt::Display for Guidance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Guidance::Replan => "replan",
            Guidance::RetryDifferentTarget => "retry-different-target",
            Guidance::AdjustWindow => "adjust-window",
            Guidance::FocusShift => "focus-shift",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub status: VerificationStatus,
    pub failure_reason: Option<FailureReason>,
    pub guidance: Option<Guidance>,
    pub updated_focus_id: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskMode {
    #[default]
    Normal,
    High,
}

/// State carried across steps of one run; only the loop mutates it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkingMemory {
    pub goal: Option<String>,
    pub subgoal: Option<String>,
    pub constraints: Vec<String>,
    pub risk_mode: RiskMode,
    pub step_budget: u32,
    pub last_error: Option<String>,
    pub reflection: Option<String>,
}

impl Default for WorkingMemory {
    fn default() -> Self {
        Self {
            goal: None,
            subgoal: None,
            constraints: Vec::new(),
            risk_mode: RiskMode::Normal,
            step_budget: 20,
            last_error: None,
            reflection: None,
        }
    }
}

impl WorkingMemory {
    pub fn with_goal(goal: impl Into<String>) -> Self {
        Self {
            goal: Some(goal.into()),
            ..Self::default()
        }
    }
}

/// Where a decision came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DecisionSource {
    Procedure { name: String },
    MicroPolicy,
    Proposer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionOutcome {
    pub intent: IntentAction,
    pub rationale: String,
    pub source: DecisionSource,
    pub used_proposer: bool,
}

/// One fully processed step, kept in the run trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodicStep {
    pub step_index: u32,
    pub intent: IntentAction,
    pub source: DecisionSource,
    pub grounded: GroundedTarget,
    pub execution: ExecutionResult,
    pub verification: VerificationResult,
    pub observation_signature: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbs_parse_from_common_spellings() {
        assert_eq!("double_click".parse::<ActionVerb>(), Ok(ActionVerb::DoubleClick));
        assert_eq!("Open-URL".parse::<ActionVerb>(), Ok(ActionVerb::OpenUrl));
        assert_eq!("press".parse::<ActionVerb>(), Ok(ActionVerb::Keypress));
        assert!("teleport".parse::<ActionVerb>().is_err());
    }

    #[test]
    fn verbs_serialize_kebab_case() {
        let json = serde_json::to_string(&ActionVerb::FocusWindow).unwrap();
        assert_eq!(json, "\"focus-window\"");
        assert_eq!(ActionVerb::FocusWindow.to_string(), "focus-window");
    }

    #[test]
    fn target_text_fields_cover_both_name_matchers() {
        let target = IntentTarget {
            name_contains: Some("Buy".into()),
            name_equals: Some("Buy now".into()),
            ..Default::default()
        };
        assert_eq!(target.text_fields().collect::<Vec<_>>(), vec!["Buy", "Buy now"]);
        assert!(IntentTarget::default().is_empty());
    }
}
