use crate::perception::hashing::{frame_signature, sha256_hex, stable_element_id};
use crate::perception::types::{
    BBox, ElementState, Observation, OcrSpan, RawNode, TargetSource, UIElement, UIState, WindowInfo,
};

pub const DEFAULT_ELEMENT_CAP: usize = 250;
const SALIENT_TEXT_LIMIT: usize = 15;
const OCR_BASE_SALIENCE: f64 = 0.2;

const INTERACTIVE_ROLES: &[&str] = &["button", "hyperlink", "link", "menuitem", "listitem"];
const SALIENT_TEXT_ROLES: &[&str] = &["button", "link", "hyperlink", "menuitem", "text"];

/// Lower-cases a role and drops separators so `menu-item`, `MenuItem` and
/// `menu_item` compare equal.
pub fn canonical_role(role: &str) -> String {
    role.chars()
        .filter(|c| !matches!(c, '-' | '_' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Turns raw observations into ranked, capped [`UIState`] frames.
#[derive(Debug, Clone)]
pub struct UiCompressor {
    element_cap: usize,
}

impl Default for UiCompressor {
    fn default() -> Self {
        Self::new(DEFAULT_ELEMENT_CAP)
    }
}

impl UiCompressor {
    pub fn new(element_cap: usize) -> Self {
        Self { element_cap }
    }

    pub fn compress(&self, observation: &Observation) -> UIState {
        let window = &observation.window;
        let mut elements = Vec::new();
        if let Some(tree) = &observation.raw_tree {
            flatten_tree(tree, window, &mut Vec::new(), &mut elements);
        }
        if let Some(ocr) = &observation.ocr_results {
            let spans: Vec<OcrSpan> = ocr.iter().cloned().map(|o| o.into_span()).collect();
            elements.extend(elements_from_ocr(window, &spans));
        }

        let total = elements.len();
        let elements = self.prioritize(elements);
        let focused_element_id = elements
            .iter()
            .find(|e| e.is_focused())
            .map(|e| e.element_id.clone());
        let salient_text = salient_text(&elements);
        let screen_signature = screen_signature(observation, &elements);

        tracing::debug!(
            raw = total,
            kept = elements.len(),
            focused = ?focused_element_id,
            "observation compressed"
        );

        UIState {
            window: window.clone(),
            timestamp: observation.timestamp,
            elements,
            focused_element_id,
            salient_text,
            screen_signature,
        }
    }

    fn prioritize(&self, mut elements: Vec<UIElement>) -> Vec<UIElement> {
        elements.sort_by(|a, b| {
            b.salience
                .total_cmp(&a.salience)
                .then_with(|| b.is_focused().cmp(&a.is_focused()))
                .then_with(|| a.role.cmp(&b.role))
                .then_with(|| a.name.cmp(&b.name))
                .then_with(|| a.element_id.cmp(&b.element_id))
        });
        elements.truncate(self.element_cap);
        elements
    }
}

fn flatten_tree(node: &RawNode, window: &WindowInfo, ancestors: &mut Vec<String>, out: &mut Vec<UIElement>) {
    let parent_chain = node
        .parent_chain
        .clone()
        .unwrap_or_else(|| if ancestors.is_empty() { "root".to_string() } else { ancestors.join(">") });
    let element_id = stable_element_id(
        window,
        node.role.as_deref(),
        node.name.as_deref(),
        node.automation_id.as_deref(),
        node.bbox.as_ref(),
        &parent_chain,
    );
    let states: Vec<ElementState> = node.states.iter().filter_map(|s| ElementState::parse(s)).collect();
    let salience = salience_score(node, &states);

    out.push(UIElement {
        element_id: element_id.clone(),
        source: TargetSource::Accessibility,
        role: node.role.clone(),
        name: node.name.clone(),
        value: node.value.clone(),
        automation_id: node.automation_id.clone(),
        class_name: node.class_name.clone(),
        bbox: node.bbox,
        states,
        parent_ids: ancestors.clone(),
        near_text: node.near_text.clone(),
        salience,
        backend_ref: node.backend_ref.clone(),
    });

    ancestors.push(element_id);
    for child in &node.children {
        flatten_tree(child, window, ancestors, out);
    }
    ancestors.pop();
}

fn salience_score(node: &RawNode, states: &[ElementState]) -> f64 {
    let role = node.role.as_deref().map(canonical_role).unwrap_or_default();
    let name_len = node.name.as_deref().map(|n| n.chars().count()).unwrap_or(0);
    let mut score = 0.0;
    if INTERACTIVE_ROLES.contains(&role.as_str()) {
        score += 2.5;
    }
    if states.contains(&ElementState::Focused) {
        score += 3.0;
    }
    if states.contains(&ElementState::Enabled) {
        score += 0.5;
    }
    if states.contains(&ElementState::Offscreen) {
        score -= 1.0;
    }
    score += (name_len as f64 / 20.0).min(1.0);
    if node.automation_id.as_deref().is_some_and(|a| !a.is_empty()) {
        score += 0.5;
    }
    score
}

fn elements_from_ocr(window: &WindowInfo, spans: &[OcrSpan]) -> Vec<UIElement> {
    spans
        .iter()
        .enumerate()
        .filter(|(_, span)| !span.text.trim().is_empty())
        .map(|(idx, span)| {
            let element_id = stable_element_id(
                window,
                Some("text"),
                Some(&span.text),
                None,
                span.bbox.as_ref(),
                &format!("ocr:{idx}"),
            );
            // Without geometry, approximate one so mouse fallback has a point to hit.
            let bbox = span.bbox.unwrap_or_else(|| {
                let row = idx as i32 * 10;
                let width = (span.text.chars().count() as i32 * 6).max(40);
                BBox::new(0, row, width, row + 14)
            });
            UIElement {
                element_id,
                source: TargetSource::Ocr,
                role: Some("text".to_string()),
                name: Some(span.text.clone()),
                value: None,
                automation_id: None,
                class_name: None,
                bbox: Some(bbox),
                states: vec![ElementState::Enabled],
                parent_ids: Vec::new(),
                near_text: None,
                salience: OCR_BASE_SALIENCE,
                backend_ref: None,
            }
        })
        .collect()
}

fn salient_text(elements: &[UIElement]) -> Vec<String> {
    let mut ranked: Vec<&UIElement> = elements.iter().collect();
    ranked.sort_by(|a, b| b.salience.total_cmp(&a.salience));
    ranked
        .into_iter()
        .filter(|e| {
            e.role
                .as_deref()
                .map(|r| SALIENT_TEXT_ROLES.contains(&canonical_role(r).as_str()))
                .unwrap_or(false)
        })
        .filter_map(|e| e.name.clone().filter(|n| !n.trim().is_empty()))
        .take(SALIENT_TEXT_LIMIT)
        .collect()
}

fn screen_signature(observation: &Observation, elements: &[UIElement]) -> Option<String> {
    let mut parts = Vec::new();
    if let Some(path) = &observation.screenshot_path {
        match std::fs::read(path) {
            Ok(bytes) => parts.push(sha256_hex(&bytes)),
            Err(e) => tracing::debug!(path = %path.display(), error = %e, "screenshot unreadable, skipped in signature"),
        }
    }
    if !elements.is_empty() {
        parts.push(frame_signature(elements, &observation.window));
    }
    if parts.is_empty() {
        return None;
    }
    Some(sha256_hex(parts.join("|").as_bytes()))
}
