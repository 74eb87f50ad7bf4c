// Prompt rendering and reply parsing for chat-style proposers.
use std::fmt::Write as _;
use std::sync::OnceLock;

use regex::Regex;

use crate::llm::provider::ProposalRequest;
use crate::llm::types::ActionDescriptor;

/// Elements beyond this many are left out of the prompt.
const PROMPT_ELEMENT_LIMIT: usize = 60;

pub const SYSTEM_PROMPT: &str = "You operate a desktop application for the user. \
You receive the current window and its most salient UI elements. \
Reply with a JSON array of candidate actions, best first. Each action is an object: \
{\"verb\": one of click|double-click|right-click|type|keypress|scroll|wait|focus-window|close-dialog|ask-user|stop, \
\"target\": {\"element_id\"?, \"automation_id\"?, \"name_contains\"?, \"name_equals\"?, \"role\"?}, \
\"text\"?, \"key\"?, \"amount\"?, \"wait_seconds\"?}. Reply with the array only.";

/// Compact text rendering of the frame.
pub fn render_state(request: &ProposalRequest<'_>) -> String {
    let state = request.state;
    let mut out = String::new();
    let _ = writeln!(out, "Goal: {}", request.goal.unwrap_or("(none)"));
    let _ = writeln!(
        out,
        "Window: {} ({})",
        state.window.title.as_deref().unwrap_or("?"),
        state.window.exe_name.as_deref().unwrap_or("?")
    );
    if let Some(focused) = &state.focused_element_id {
        let _ = writeln!(out, "Focused: {focused}");
    }
    if !state.salient_text.is_empty() {
        let _ = writeln!(out, "Visible text: {}", state.salient_text.join(" | "));
    }
    let _ = writeln!(out, "Elements:");
    for element in state.elements.iter().take(PROMPT_ELEMENT_LIMIT) {
        let _ = write!(
            out,
            "- [{}] {} \"{}\"",
            element.element_id,
            element.role.as_deref().unwrap_or("?"),
            element.name_or_empty()
        );
        if let Some(value) = element.value.as_deref().filter(|v| !v.is_empty()) {
            let _ = write!(out, " value=\"{value}\"");
        }
        if let Some(auto) = &element.automation_id {
            let _ = write!(out, " automation_id={auto}");
        }
        if !element.states.is_empty() {
            let states: Vec<&str> = element.states.iter().map(|s| s.as_str()).collect();
            let _ = write!(out, " [{}]", states.join(","));
        }
        out.push('\n');
    }
    if state.elements.len() > PROMPT_ELEMENT_LIMIT {
        let _ = writeln!(out, "({} more elements omitted)", state.elements.len() - PROMPT_ELEMENT_LIMIT);
    }
    if !request.candidates.is_empty() {
        let candidates: Vec<ActionDescriptor> = request.candidates.iter().map(ActionDescriptor::from).collect();
        if let Ok(json) = serde_json::to_string(&candidates) {
            let _ = writeln!(out, "Suggested candidates: {json}");
        }
    }
    out
}

fn fenced_block() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)```").expect("fence regex must compile"))
}

fn bare_array() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\[.*\]").expect("array regex must compile"))
}

/// Pulls descriptors out of a free-form reply. Accepts a bare array, a fenced
/// block, or an object with an `actions` array; malformed entries are dropped.
pub fn parse_descriptors(reply: &str) -> Vec<ActionDescriptor> {
    let body = fenced_block()
        .captures(reply)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(reply)
        .trim();

    let value = serde_json::from_str::<serde_json::Value>(body).ok().or_else(|| {
        bare_array()
            .find(body)
            .and_then(|m| serde_json::from_str::<serde_json::Value>(m.as_str()).ok())
    });

    let items = match value {
        Some(serde_json::Value::Array(items)) => items,
        Some(serde_json::Value::Object(mut obj)) => match obj.remove("actions") {
            Some(serde_json::Value::Array(items)) => items,
            _ => vec![serde_json::Value::Object(obj)],
        },
        _ => {
            tracing::warn!(reply_len = reply.len(), "proposer reply carried no JSON actions");
            return Vec::new();
        }
    };

    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<ActionDescriptor>(item) {
            Ok(descriptor) => Some(descriptor),
            Err(e) => {
                tracing::debug!(error = %e, "skipping malformed descriptor");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent_engine::state::{ActionVerb, IntentAction};
    use crate::perception::types::UIState;
    use crate::test_support::{element, window};

    fn state() -> UIState {
        UIState {
            window: window(),
            timestamp: chrono::Utc::now(),
            elements: vec![element("a1", "button", "Save", [0, 0, 40, 20])],
            focused_element_id: Some("a1".into()),
            salient_text: vec!["Save".into()],
            screen_signature: None,
        }
    }

    #[test]
    fn parses_fenced_reply() {
        let reply = "Sure:\n```json\n[{\"verb\": \"click\", \"target\": {\"name_equals\": \"Save\"}}]\n```";
        let parsed = parse_descriptors(reply);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].verb, "click");
    }

    #[test]
    fn parses_array_embedded_in_prose() {
        let reply = "I would do [{\"verb\": \"wait\", \"wait_seconds\": 2}] next.";
        let parsed = parse_descriptors(reply);
        assert_eq!(parsed[0].wait_seconds, Some(2.0));
    }

    #[test]
    fn drops_malformed_entries_but_keeps_the_rest() {
        let reply = r#"{"actions": [{"target": {}}, {"verb": "stop"}]}"#;
        let parsed = parse_descriptors(reply);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].verb, "stop");
    }

    #[test]
    fn prose_without_json_yields_nothing() {
        assert!(parse_descriptors("I am not sure what to do.").is_empty());
    }

    #[test]
    fn rendering_lists_elements_and_candidates() {
        let state = state();
        let candidates = vec![IntentAction::new(ActionVerb::Stop)];
        let text = render_state(&ProposalRequest {
            state: &state,
            goal: Some("save the file"),
            candidates: &candidates,
            screenshot: None,
        });
        assert!(text.contains("Goal: save the file"));
        assert!(text.contains("- [a1] button \"Save\""));
        assert!(text.contains("\"verb\":\"stop\""));
    }
}
