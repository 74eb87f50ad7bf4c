use async_trait::async_trait;

use crate::agent_engine::state::ActionVerb;
use crate::errors::PilotResult;
use crate::llm::provider::{ProposalRequest, Proposer};
use crate::llm::types::{ActionDescriptor, DescriptorTarget};
use crate::perception::types::UIElement;

const CLICKABLE_ROLES: &[&str] = &["button", "link", "hyperlink", "menuitem"];

/// Offline proposer used when no model backend is configured. Picks the most
/// salient enabled clickable whose name shares a word with the goal, else the
/// most salient enabled clickable.
#[derive(Debug, Default)]
pub struct HeuristicProposer;

fn clickable(element: &UIElement) -> bool {
    !element.is_disabled()
        && !element.name_or_empty().trim().is_empty()
        && element
            .role
            .as_deref()
            .is_some_and(|r| CLICKABLE_ROLES.contains(&r))
}

fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= 3)
        .map(|w| w.to_lowercase())
        .collect()
}

fn click_on(element: &UIElement) -> ActionDescriptor {
    ActionDescriptor {
        target: Some(DescriptorTarget {
            element_id: Some(element.element_id.clone()),
            name_equals: element.name.clone(),
            role: element.role.clone(),
            ..Default::default()
        }),
        ..ActionDescriptor::new(ActionVerb::Click)
    }
}

#[async_trait]
impl Proposer for HeuristicProposer {
    fn name(&self) -> &str {
        "heuristic"
    }

    async fn propose(&self, request: &ProposalRequest<'_>) -> PilotResult<Vec<ActionDescriptor>> {
        let goal_words = request.goal.map(words).unwrap_or_default();
        let clickables: Vec<&UIElement> = request.state.elements.iter().filter(|e| clickable(e)).collect();

        let pick = clickables
            .iter()
            .find(|e| words(e.name_or_empty()).iter().any(|w| goal_words.contains(w)))
            .or_else(|| clickables.first())
            .copied();
        tracing::debug!(picked = ?pick.map(|e| &e.element_id), goal_words = goal_words.len(), "heuristic proposal");
        Ok(pick.map(click_on).into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perception::types::{ElementState, UIState};
    use crate::test_support::{element, window};

    fn state(elements: Vec<UIElement>) -> UIState {
        UIState {
            window: window(),
            timestamp: chrono::Utc::now(),
            elements,
            focused_element_id: None,
            salient_text: vec![],
            screen_signature: None,
        }
    }

    fn request<'a>(state: &'a UIState, goal: Option<&'a str>) -> ProposalRequest<'a> {
        ProposalRequest {
            state,
            goal,
            candidates: &[],
            screenshot: None,
        }
    }

    #[tokio::test]
    async fn prefers_element_named_in_goal() {
        let state = state(vec![
            element("a", "button", "Cancel", [0, 0, 10, 10]),
            element("b", "button", "Settings", [20, 0, 30, 10]),
        ]);
        let proposals = HeuristicProposer.propose(&request(&state, Some("open the settings page"))).await.unwrap();
        assert_eq!(proposals.len(), 1);
        assert_eq!(proposals[0].target.as_ref().unwrap().element_id.as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn falls_back_to_most_salient_enabled_clickable() {
        let mut disabled = element("a", "button", "Apply", [0, 0, 10, 10]);
        disabled.states = vec![ElementState::Disabled];
        let state = state(vec![
            disabled,
            element("t", "text", "Hello", [0, 20, 10, 30]),
            element("c", "link", "Help", [0, 40, 10, 50]),
        ]);
        let proposals = HeuristicProposer.propose(&request(&state, None)).await.unwrap();
        assert_eq!(proposals[0].target.as_ref().unwrap().element_id.as_deref(), Some("c"));
    }

    #[tokio::test]
    async fn nothing_clickable_means_no_proposal() {
        let state = state(vec![element("t", "text", "Loading", [0, 0, 10, 10])]);
        assert!(HeuristicProposer.propose(&request(&state, Some("wait"))).await.unwrap().is_empty());
    }
}
