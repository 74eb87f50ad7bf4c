//! Shared fixtures and recording backends for unit tests.
use std::sync::Mutex;

use async_trait::async_trait;

use crate::errors::{PilotError, PilotResult};
use crate::executor::traits::{AccessibilityBackend, InputBackend, MouseButton, OpOutcome, StructuredOp};
use crate::perception::types::{BBox, ElementState, RawNode, TargetSource, UIElement, WindowInfo};

pub(crate) fn window() -> WindowInfo {
    WindowInfo {
        handle: Some(1),
        pid: Some(1),
        exe_name: Some("app.exe".into()),
        title: Some("Title".into()),
        bbox: Some(BBox::new(0, 0, 800, 600)),
    }
}

pub(crate) fn element(id: &str, role: &str, name: &str, bbox: [i32; 4]) -> UIElement {
    UIElement {
        element_id: id.into(),
        source: TargetSource::Accessibility,
        role: Some(role.into()),
        name: Some(name.into()),
        value: None,
        automation_id: None,
        class_name: None,
        bbox: Some(bbox.into()),
        states: vec![ElementState::Enabled],
        parent_ids: vec![],
        near_text: None,
        salience: 1.0,
        backend_ref: None,
    }
}

pub(crate) fn ok_button_tree() -> RawNode {
    RawNode {
        name: Some("OK".into()),
        role: Some("button".into()),
        automation_id: Some("ok".into()),
        class_name: Some("Button".into()),
        bbox: Some(BBox::new(0, 0, 10, 10)),
        states: vec!["enabled".into()],
        parent_chain: Some("root".into()),
        ..Default::default()
    }
}

/// Records every input call as a short string.
#[derive(Default)]
pub(crate) struct RecordingInput {
    pub calls: Mutex<Vec<String>>,
    pub can_paste: bool,
}

impl RecordingInput {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn push(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl InputBackend for RecordingInput {
    async fn click(&self, x: i32, y: i32, button: MouseButton, count: u32) -> PilotResult<()> {
        self.push(format!("click {x},{y} {button:?} x{count}"));
        Ok(())
    }

    async fn type_text(&self, text: &str) -> PilotResult<()> {
        self.push(format!("type {text}"));
        Ok(())
    }

    async fn paste_text(&self, text: &str) -> PilotResult<OpOutcome> {
        if !self.can_paste {
            return Ok(OpOutcome::Unsupported);
        }
        self.push(format!("paste {text}"));
        Ok(OpOutcome::Performed)
    }

    async fn key_press(&self, key: &str) -> PilotResult<()> {
        self.push(format!("key {key}"));
        Ok(())
    }

    async fn scroll(&self, amount: i64, _at: Option<(i32, i32)>) -> PilotResult<()> {
        self.push(format!("scroll {amount}"));
        Ok(())
    }
}

/// Accessibility backend scripted per test: fails the first `failures`
/// calls, then answers with `outcome`.
pub(crate) struct ScriptedAccessibility {
    pub failures: Mutex<u32>,
    pub outcome: OpOutcome,
    pub ops: Mutex<Vec<StructuredOp>>,
}

impl ScriptedAccessibility {
    pub fn new(failures: u32, outcome: OpOutcome) -> Self {
        Self {
            failures: Mutex::new(failures),
            outcome,
            ops: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl AccessibilityBackend for ScriptedAccessibility {
    async fn perform(&self, _element: &UIElement, op: &StructuredOp) -> PilotResult<OpOutcome> {
        self.ops.lock().unwrap().push(op.clone());
        let mut failures = self.failures.lock().unwrap();
        if *failures > 0 {
            *failures -= 1;
            return Err(PilotError::Timeout("element did not respond".into()));
        }
        Ok(self.outcome)
    }
}
