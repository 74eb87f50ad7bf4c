use serde::{Deserialize, Serialize};

use crate::perception::hashing::window_fingerprint;

/// Screen rectangle `[left, top, right, bottom]` in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[i32; 4]", into = "[i32; 4]")]
pub struct BBox {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl BBox {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self { left, top, right, bottom }
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    pub fn area(&self) -> i64 {
        (self.width().max(0) as i64) * (self.height().max(0) as i64)
    }

    pub fn center(&self) -> (i32, i32) {
        ((self.left + self.right) / 2, (self.top + self.bottom) / 2)
    }
}

impl From<[i32; 4]> for BBox {
    fn from(v: [i32; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl From<BBox> for [i32; 4] {
    fn from(b: BBox) -> Self {
        [b.left, b.top, b.right, b.bottom]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowInfo {
    pub handle: Option<u64>,
    pub pid: Option<u32>,
    pub exe_name: Option<String>,
    pub title: Option<String>,
    pub bbox: Option<BBox>,
}

impl WindowInfo {
    /// Scopes element ids to this window instance.
    pub fn fingerprint(&self) -> String {
        window_fingerprint(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetSource {
    Accessibility,
    Ocr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementState {
    Enabled,
    Disabled,
    Focused,
    Checked,
    Selected,
    Offscreen,
}

impl ElementState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementState::Enabled => "enabled",
            ElementState::Disabled => "disabled",
            ElementState::Focused => "focused",
            ElementState::Checked => "checked",
            ElementState::Selected => "selected",
            ElementState::Offscreen => "offscreen",
        }
    }

    /// Lenient parse used on raw observer output; unknown names yield `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "enabled" => Some(ElementState::Enabled),
            "disabled" => Some(ElementState::Disabled),
            "focused" => Some(ElementState::Focused),
            "checked" => Some(ElementState::Checked),
            "selected" => Some(ElementState::Selected),
            "offscreen" => Some(ElementState::Offscreen),
            _ => None,
        }
    }
}

/// One interactive or readable surface unit, rebuilt every frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UIElement {
    pub element_id: String,
    pub source: TargetSource,
    pub role: Option<String>,
    pub name: Option<String>,
    pub value: Option<String>,
    pub automation_id: Option<String>,
    pub class_name: Option<String>,
    pub bbox: Option<BBox>,
    #[serde(default)]
    pub states: Vec<ElementState>,
    /// Ancestor element ids, root first.
    #[serde(default)]
    pub parent_ids: Vec<String>,
    pub near_text: Option<String>,
    #[serde(default)]
    pub salience: f64,
    /// Opaque handle only the execution layer interprets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_ref: Option<String>,
}

impl UIElement {
    pub fn has_state(&self, state: ElementState) -> bool {
        self.states.contains(&state)
    }

    pub fn is_focused(&self) -> bool {
        self.has_state(ElementState::Focused)
    }

    pub fn is_disabled(&self) -> bool {
        self.has_state(ElementState::Disabled)
    }

    pub fn name_or_empty(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }
}

/// One compressed frame; owned by the loop for exactly one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UIState {
    pub window: WindowInfo,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub elements: Vec<UIElement>,
    pub focused_element_id: Option<String>,
    pub salient_text: Vec<String>,
    pub screen_signature: Option<String>,
}

impl UIState {
    pub fn element(&self, element_id: &str) -> Option<&UIElement> {
        self.elements.iter().find(|e| e.element_id == element_id)
    }
}

/// Raw accessibility node as delivered by an observer backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawNode {
    pub name: Option<String>,
    pub role: Option<String>,
    pub automation_id: Option<String>,
    pub class_name: Option<String>,
    pub value: Option<String>,
    pub bbox: Option<BBox>,
    pub states: Vec<String>,
    pub children: Vec<RawNode>,
    pub parent_chain: Option<String>,
    pub near_text: Option<String>,
    pub backend_ref: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrSpan {
    pub text: String,
    #[serde(default)]
    pub bbox: Option<BBox>,
    #[serde(default)]
    pub confidence: Option<f32>,
}

/// OCR engines hand back either bare strings or positioned spans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OcrInput {
    Text(String),
    Span(OcrSpan),
}

impl OcrInput {
    pub fn into_span(self) -> OcrSpan {
        match self {
            OcrInput::Text(text) => OcrSpan { text, bbox: None, confidence: None },
            OcrInput::Span(span) => span,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub window: WindowInfo,
    #[serde(default)]
    pub raw_tree: Option<RawNode>,
    #[serde(default)]
    pub screenshot_path: Option<std::path::PathBuf>,
    #[serde(default)]
    pub ocr_results: Option<Vec<OcrInput>>,
    #[serde(default = "chrono::Utc::now")]
    pub timestamp: chrono::DateTime<chrono::Utc>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl Observation {
    pub fn new(window: WindowInfo) -> Self {
        Self {
            window,
            raw_tree: None,
            screenshot_path: None,
            ocr_results: None,
            timestamp: chrono::Utc::now(),
            warnings: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_observation_parses_from_observer_json() {
        let json = r#"{
            "window": {"handle": 7, "pid": 1, "exe_name": "app.exe", "title": "App", "bbox": [0, 0, 800, 600]},
            "raw_tree": {
                "role": "window", "name": "App",
                "children": [{"role": "button", "name": "OK", "bbox": [10, 10, 60, 30], "states": ["enabled", "hovered"]}]
            },
            "ocr_results": ["Welcome", {"text": "Cancel", "bbox": [70, 10, 120, 30]}]
        }"#;
        let obs: Observation = serde_json::from_str(json).unwrap();
        assert_eq!(obs.window.bbox, Some(BBox::new(0, 0, 800, 600)));
        let tree = obs.raw_tree.unwrap();
        assert_eq!(tree.children.len(), 1);
        assert_eq!(tree.children[0].states, vec!["enabled", "hovered"]);
        let ocr = obs.ocr_results.unwrap();
        assert!(matches!(ocr[0], OcrInput::Text(ref t) if t == "Welcome"));
        assert!(matches!(ocr[1], OcrInput::Span(ref s) if s.bbox.is_some()));
    }

    #[test]
    fn unknown_state_names_are_rejected() {
        assert_eq!(ElementState::parse(" Focused "), Some(ElementState::Focused));
        assert_eq!(ElementState::parse("hovered"), None);
    }
}
