use crate::agent_engine::state::{GroundedTarget, IntentAction, IntentTarget};
use crate::grounding::similarity;
use crate::perception::compression::canonical_role;
use crate::perception::types::{UIElement, UIState};

const ELEMENT_ID_MATCH: f64 = 10.0;
const AUTOMATION_ID_MATCH: f64 = 5.0;
const NAME_EQUALS_MATCH: f64 = 4.0;
const ROLE_MATCH: f64 = 0.5;
const ROLE_MISMATCH: f64 = -0.5;
const NAME_CONTAINS_BASE: f64 = 2.0;
const NEAR_TEXT_WEIGHT: f64 = 1.0;
const AREA_PENALTY_MAX: f64 = 0.5;
/// Area (px²) at which the oversize penalty saturates.
const AREA_PENALTY_SPAN: f64 = 1_000_000.0;
const SALIENCE_WEIGHT: f64 = 0.1;
const SALIENCE_BONUS_CAP: f64 = 0.5;
/// Floor for a surviving candidate, so a match never reports zero confidence.
const MIN_CONFIDENCE: f64 = 0.01;

/// Minimum similarity for a `name_contains` candidate without a literal hit.
pub const FUZZY_THRESHOLD: f64 = 0.6;

/// Resolves intent targets to concrete elements. Never fails: an unmatched
/// target yields a zero-confidence result with no element.
#[derive(Debug, Clone, Default)]
pub struct Grounder;

impl Grounder {
    pub fn new() -> Self {
        Self
    }

    pub fn ground(&self, intent: &IntentAction, state: &UIState) -> GroundedTarget {
        let Some(target) = intent.target.as_ref().filter(|t| !t.is_empty()) else {
            return GroundedTarget::none();
        };

        let mut scored: Vec<(f64, &UIElement)> = state
            .elements
            .iter()
            .filter_map(|e| score(target, e).map(|s| (s, e)))
            .collect();
        scored.sort_by(|(sa, a), (sb, b)| sb.total_cmp(sa).then_with(|| a.element_id.cmp(&b.element_id)));

        let mut ranked = scored.into_iter();
        match ranked.next() {
            Some((score, element)) => {
                let confidence = score.max(MIN_CONFIDENCE);
                let alternatives: Vec<UIElement> = ranked.map(|(_, e)| e.clone()).collect();
                tracing::debug!(
                    verb = %intent.verb,
                    element = %element.element_id,
                    confidence,
                    alternatives = alternatives.len(),
                    "target grounded"
                );
                GroundedTarget {
                    element: Some(element.clone()),
                    confidence,
                    alternatives,
                }
            }
            None => {
                tracing::debug!(verb = %intent.verb, ?target, "no element matched target");
                GroundedTarget::none()
            }
        }
    }
}

/// Combined match score, or `None` when a hard constraint rules the element out.
fn score(target: &IntentTarget, element: &UIElement) -> Option<f64> {
    let mut total = 0.0;

    if let Some(wanted) = &target.element_id {
        if &element.element_id != wanted {
            return None;
        }
        total += ELEMENT_ID_MATCH;
    }

    if let Some(wanted) = &target.automation_id {
        if element.automation_id.as_ref() != Some(wanted) {
            return None;
        }
        total += AUTOMATION_ID_MATCH;
    }

    if let Some(wanted) = &target.name_equals {
        if element.name_or_empty().trim().to_lowercase() != wanted.trim().to_lowercase() {
            return None;
        }
        total += NAME_EQUALS_MATCH;
    }

    if let (Some(wanted), Some(actual)) = (&target.role, &element.role) {
        total += if canonical_role(wanted) == canonical_role(actual) {
            ROLE_MATCH
        } else {
            ROLE_MISMATCH
        };
    }

    if let Some(needle) = &target.name_contains {
        let name = element.name_or_empty();
        let literal = name.to_lowercase().contains(&needle.trim().to_lowercase());
        let fuzzy = best_ratio(needle, name);
        if !literal && fuzzy < FUZZY_THRESHOLD {
            return None;
        }
        total += if literal {
            NAME_CONTAINS_BASE + fuzzy
        } else {
            NAME_CONTAINS_BASE * fuzzy
        };
    }

    if let Some(hint) = &target.near_text {
        let near = element.near_text.as_deref().unwrap_or("");
        let hit = !near.is_empty() && near.to_lowercase().contains(&hint.trim().to_lowercase());
        total += NEAR_TEXT_WEIGHT * if hit { 1.0 } else { best_ratio(hint, near) };
    }

    if let Some(bbox) = &element.bbox {
        total -= AREA_PENALTY_MAX * (bbox.area() as f64 / AREA_PENALTY_SPAN).min(1.0);
    }
    total += (element.salience.max(0.0) * SALIENCE_WEIGHT).min(SALIENCE_BONUS_CAP);

    Some(total)
}

/// Similarity against the whole text or its best single word.
fn best_ratio(needle: &str, haystack: &str) -> f64 {
    if haystack.is_empty() {
        return 0.0;
    }
    haystack
        .split_whitespace()
        .map(|word| similarity::ratio(needle, word))
        .fold(similarity::ratio(needle, haystack), f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent_engine::state::ActionVerb;
    use crate::perception::types::{BBox, ElementState, TargetSource, WindowInfo};

    fn button(id: &str, name: &str, automation_id: &str, bbox: BBox, salience: f64) -> UIElement {
        UIElement {
            element_id: id.into(),
            source: TargetSource::Accessibility,
            role: Some("button".into()),
            name: Some(name.into()),
            value: None,
            automation_id: Some(automation_id.into()),
            class_name: None,
            bbox: Some(bbox),
            states: vec![ElementState::Enabled],
            parent_ids: vec![],
            near_text: Some("form".into()),
            salience,
            backend_ref: None,
        }
    }

    fn form() -> UIState {
        UIState {
            window: WindowInfo {
                handle: Some(1),
                pid: Some(2),
                exe_name: Some("sample.exe".into()),
                title: Some("Sample".into()),
                bbox: Some(BBox::new(0, 0, 100, 100)),
            },
            timestamp: chrono::Utc::now(),
            elements: vec![
                button("submit-btn", "Submit", "submit", BBox::new(0, 0, 10, 10), 2.0),
                button("cancel-btn", "Cancel", "cancel", BBox::new(10, 0, 20, 10), 1.0),
            ],
            focused_element_id: None,
            salient_text: vec![],
            screen_signature: Some("sig".into()),
        }
    }

    fn click(target: IntentTarget) -> IntentAction {
        IntentAction::new(ActionVerb::Click).with_target(target)
    }

    #[test]
    fn automation_id_is_a_hard_constraint() {
        let grounded = Grounder::new().ground(
            &click(IntentTarget { automation_id: Some("cancel".into()), ..Default::default() }),
            &form(),
        );
        assert_eq!(grounded.element.unwrap().element_id, "cancel-btn");
        assert!(grounded.alternatives.is_empty());
    }

    #[test]
    fn name_contains_resolves_submit() {
        let grounded = Grounder::new().ground(
            &click(IntentTarget { name_contains: Some("submit".into()), ..Default::default() }),
            &form(),
        );
        assert_eq!(grounded.element.unwrap().element_id, "submit-btn");
        assert!(grounded.confidence > 0.0);
    }

    #[test]
    fn fuzzy_name_tolerates_typos() {
        let grounded = Grounder::new().ground(
            &click(IntentTarget { name_contains: Some("Cancle".into()), ..Default::default() }),
            &form(),
        );
        assert_eq!(grounded.element.unwrap().element_id, "cancel-btn");
    }

    #[test]
    fn element_id_mismatch_disqualifies() {
        let grounded = Grounder::new().ground(
            &click(IntentTarget {
                element_id: Some("missing".into()),
                name_contains: Some("submit".into()),
                ..Default::default()
            }),
            &form(),
        );
        assert!(grounded.element.is_none());
        assert_eq!(grounded.confidence, 0.0);
    }

    #[test]
    fn exact_name_is_case_insensitive_but_strict() {
        let g = Grounder::new();
        let hit = g.ground(&click(IntentTarget { name_equals: Some("cancel".into()), ..Default::default() }), &form());
        assert_eq!(hit.element.unwrap().element_id, "cancel-btn");
        let miss = g.ground(&click(IntentTarget { name_equals: Some("Canc".into()), ..Default::default() }), &form());
        assert!(miss.element.is_none());
    }

    #[test]
    fn role_mismatch_only_penalizes() {
        let grounded = Grounder::new().ground(
            &click(IntentTarget {
                role: Some("hyperlink".into()),
                name_contains: Some("submit".into()),
                ..Default::default()
            }),
            &form(),
        );
        assert_eq!(grounded.element.unwrap().element_id, "submit-btn");
    }

    #[test]
    fn role_only_target_still_grounds_on_a_different_role() {
        let mut search = button("search-box", "Search", "", BBox::new(0, 0, 400, 40), 0.5);
        search.role = Some("edit".into());
        search.automation_id = None;
        let mut state = form();
        state.elements = vec![search];

        let grounded = Grounder::new().ground(
            &click(IntentTarget { role: Some("button".into()), ..Default::default() }),
            &state,
        );
        assert_eq!(grounded.element.unwrap().element_id, "search-box");
        assert!(grounded.confidence > 0.0);
    }

    #[test]
    fn oversized_containers_lose_ties() {
        let mut state = form();
        state.elements = vec![
            button("pane", "Save", "", BBox::new(0, 0, 1600, 1000), 1.0),
            button("save", "Save", "", BBox::new(0, 0, 60, 20), 1.0),
        ];
        for e in &mut state.elements {
            e.automation_id = None;
        }
        let grounded = Grounder::new().ground(
            &click(IntentTarget { name_contains: Some("save".into()), ..Default::default() }),
            &state,
        );
        assert_eq!(grounded.element.unwrap().element_id, "save");
        assert_eq!(grounded.alternatives.len(), 1);
    }

    #[test]
    fn untargeted_intent_grounds_to_nothing() {
        let grounded = Grounder::new().ground(&IntentAction::wait(1.0), &form());
        assert!(grounded.element.is_none());
        assert_eq!(grounded.confidence, 0.0);
    }
}
