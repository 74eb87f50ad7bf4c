use serde::{Deserialize, Serialize};

use crate::agent_engine::state::{ActionVerb, IntentAction, IntentTarget, MAX_WAIT_SECONDS};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn user(parts: Vec<ContentPart>) -> Self {
        Self {
            role: "user".into(),
            content: MessageContent::Parts(parts),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

/// Target part of a proposer descriptor. Accepts snake_case and camelCase keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DescriptorTarget {
    #[serde(alias = "elementId", skip_serializing_if = "Option::is_none")]
    pub element_id: Option<String>,
    #[serde(alias = "automationId", skip_serializing_if = "Option::is_none")]
    pub automation_id: Option<String>,
    #[serde(alias = "nameContains", skip_serializing_if = "Option::is_none")]
    pub name_contains: Option<String>,
    #[serde(alias = "nameEquals", skip_serializing_if = "Option::is_none")]
    pub name_equals: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// Loosely typed action as returned by a proposer. The verb stays a string so
/// one bad entry can be dropped without rejecting the whole reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDescriptor {
    pub verb: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<DescriptorTarget>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<i64>,
    #[serde(default, alias = "waitSeconds", skip_serializing_if = "Option::is_none")]
    pub wait_seconds: Option<f64>,
}

impl ActionDescriptor {
    pub fn new(verb: ActionVerb) -> Self {
        Self {
            verb: verb.as_str().to_string(),
            target: None,
            text: None,
            key: None,
            amount: None,
            wait_seconds: None,
        }
    }

    /// `None` when the verb is not recognised.
    pub fn into_intent(self) -> Option<IntentAction> {
        let verb = match self.verb.parse::<ActionVerb>() {
            Ok(verb) => verb,
            Err(e) => {
                tracing::debug!(error = %e, "dropping proposal");
                return None;
            }
        };
        let target = self
            .target
            .map(|t| IntentTarget {
                role: t.role,
                name_equals: t.name_equals,
                name_contains: t.name_contains,
                automation_id: t.automation_id,
                near_text: None,
                element_id: t.element_id,
            })
            .filter(|t| !t.is_empty());
        Some(IntentAction {
            verb,
            target,
            text: self.text,
            key: self.key,
            amount: self.amount,
            wait_seconds: self.wait_seconds.map(bounded_wait),
        })
    }
}

/// Proposed waits land in `[0, MAX_WAIT_SECONDS]`; NaN becomes zero.
fn bounded_wait(seconds: f64) -> f64 {
    if seconds.is_nan() {
        0.0
    } else {
        seconds.clamp(0.0, MAX_WAIT_SECONDS)
    }
}

impl From<&IntentAction> for ActionDescriptor {
    fn from(intent: &IntentAction) -> Self {
        Self {
            verb: intent.verb.as_str().to_string(),
            target: intent.target.as_ref().map(|t| DescriptorTarget {
                element_id: t.element_id.clone(),
                automation_id: t.automation_id.clone(),
                name_contains: t.name_contains.clone(),
                name_equals: t.name_equals.clone(),
                role: t.role.clone(),
            }),
            text: intent.text.clone(),
            key: intent.key.clone(),
            amount: intent.amount,
            wait_seconds: intent.wait_seconds,
        }
    }
}
