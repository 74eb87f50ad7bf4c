use std::path::Path;

use async_trait::async_trait;
use base64::Engine as _;

use crate::config::ProposerConfig;
use crate::errors::{PilotError, PilotResult};
use crate::llm::prompt::{parse_descriptors, render_state, SYSTEM_PROMPT};
use crate::llm::provider::{ProposalRequest, Proposer};
use crate::llm::types::{ActionDescriptor, ChatMessage, ContentPart, ImageUrl};

pub struct OpenAiCompatibleProposer {
    api_base: String,
    api_key: String,
    model: String,
    temperature: f64,
    send_screenshot: bool,
    client: reqwest::Client,
}

impl OpenAiCompatibleProposer {
    pub fn new(api_base: String, api_key: String, model: String) -> Self {
        Self {
            api_base,
            api_key,
            model,
            temperature: 0.1,
            send_screenshot: false,
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &ProposerConfig) -> PilotResult<Self> {
        let api_key = config.resolve_api_key().ok_or_else(|| {
            PilotError::Config(format!(
                "proposer enabled but no api_key configured and {} is unset",
                crate::config::API_KEY_ENV
            ))
        })?;
        let mut proposer = Self::new(config.api_base.clone(), api_key, config.model.clone());
        proposer.temperature = config.temperature;
        proposer.send_screenshot = config.send_screenshot;
        Ok(proposer)
    }

    async fn screenshot_part(&self, path: &Path) -> Option<ContentPart> {
        match tokio::fs::read(path).await {
            Ok(bytes) => {
                let mime = match path.extension().and_then(|e| e.to_str()) {
                    Some("jpg") | Some("jpeg") => "image/jpeg",
                    _ => "image/png",
                };
                let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
                Some(ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: format!("data:{mime};base64,{encoded}"),
                    },
                })
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "screenshot unreadable, sending text only");
                None
            }
        }
    }

    fn build_body(&self, messages: &[ChatMessage]) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "messages": messages,
            "stream": false,
            "temperature": self.temperature,
        })
    }
}

/// Copy of the request body with image payloads replaced, for logging.
fn sanitized(body: &serde_json::Value) -> String {
    let mut log_body = body.clone();
    if let Some(msgs) = log_body.get_mut("messages").and_then(|m| m.as_array_mut()) {
        for msg in msgs {
            let Some(parts) = msg.get_mut("content").and_then(|c| c.as_array_mut()) else {
                continue;
            };
            for part in parts {
                if part.get("type").and_then(|t| t.as_str()) == Some("image_url") {
                    part["image_url"]["url"] = serde_json::Value::String("<omitted_base64_image>".into());
                }
            }
        }
    }
    serde_json::to_string(&log_body).unwrap_or_default()
}

#[async_trait]
impl Proposer for OpenAiCompatibleProposer {
    fn name(&self) -> &str {
        &self.model
    }

    async fn propose(&self, request: &ProposalRequest<'_>) -> PilotResult<Vec<ActionDescriptor>> {
        let mut parts = vec![ContentPart::Text {
            text: render_state(request),
        }];
        if self.send_screenshot {
            if let Some(path) = request.screenshot {
                parts.extend(self.screenshot_part(path).await);
            }
        }
        let messages = vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(parts)];
        let body = self.build_body(&messages);

        tracing::debug!(model = %self.model, api_base = %self.api_base, "sending proposer request");
        tracing::trace!(body = %sanitized(&body), "request body (sanitized, base64 omitted)");

        let response = self
            .client
            .post(&self.api_base)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let err_body = response.text().await.unwrap_or_default();
            return Err(PilotError::Proposer(format!("{}: {}", status, err_body)));
        }

        let json: serde_json::Value = response.json().await?;
        let content = json["choices"][0]["message"]["content"].as_str().unwrap_or("");
        let descriptors = parse_descriptors(content);

        tracing::info!(
            content_len = content.len(),
            proposals = descriptors.len(),
            "proposer response received"
        );
        Ok(descriptors)
    }
}
