//! Anthropic messages API client.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::{CompletionRequest, Provider, ProviderFuture, http_client, non_empty};
use crate::{Error, Result};

pub const ANTHROPIC_URL: &str = "https://api.anthropic.com/v1/messages";
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Serialize, Debug)]
struct MessagesRequest<'a> {
    model: &'a str,
    system: &'a str,
    messages: [UserMessage<'a>; 1],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize, Debug)]
struct UserMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize, Debug)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize, Debug)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize, Debug)]
struct Usage {
    input_tokens: Option<u32>,
    output_tokens: Option<u32>,
}

pub struct AnthropicProvider {
    client: reqwest::Client,
    api_key: String,
    url: String,
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            api_key: api_key.into(),
            url: ANTHROPIC_URL.to_string(),
        })
    }

    async fn messages(&self, request: &CompletionRequest) -> Result<String> {
        let body = MessagesRequest {
            model: &request.model,
            system: &request.system,
            messages: [UserMessage {
                role: "user",
                content: &request.user,
            }],
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };
        debug!(
            "Anthropic request: model={}, max_tokens={}, temp={}",
            request.model, request.max_tokens, request.temperature
        );
        trace!(
            "Request payload size: {} bytes",
            serde_json::to_string(&body).map_or(0, |s| s.len())
        );

        let start = Instant::now();
        let resp = self
            .client
            .post(&self.url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        let text = resp.text().await?;
        debug!(
            "Anthropic response: HTTP {} in {:.1}s ({} bytes)",
            status,
            start.elapsed().as_secs_f64(),
            text.len()
        );

        if !status.is_success() {
            return Err(Error::Http {
                provider: "Anthropic",
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: MessagesResponse = serde_json::from_str(&text)
            .map_err(|e| Error::InvalidResponse(format!("failed to parse response: {e}")))?;
        if let Some(usage) = &parsed.usage {
            debug!(
                "Token usage: input={}, output={}",
                usage.input_tokens.unwrap_or(0),
                usage.output_tokens.unwrap_or(0)
            );
        }
        non_empty("Anthropic", joined_text(parsed))
    }
}

/// Concatenate the `text` blocks of a response.
fn joined_text(response: MessagesResponse) -> Option<String> {
    let parts: Vec<String> = response
        .content
        .into_iter()
        .filter(|b| b.kind == "text")
        .filter_map(|b| b.text)
        .collect();
    (!parts.is_empty()).then(|| parts.join(""))
}

impl Provider for AnthropicProvider {
    fn name(&self) -> &'static str {
        "Anthropic"
    }

    fn complete<'a>(&'a self, request: &'a CompletionRequest) -> ProviderFuture<'a> {
        Box::pin(self.messages(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_blocks_are_joined() {
        let raw = r#"{"content":[{"type":"text","text":"what: "},{"type":"thinking"},{"type":"text","text":"x"}],"usage":{"input_tokens":5,"output_tokens":2}}"#;
        let parsed: MessagesResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(joined_text(parsed).as_deref(), Some("what: x"));
    }

    #[test]
    fn no_text_blocks_is_none() {
        let parsed: MessagesResponse = serde_json::from_str(r#"{"content":[]}"#).unwrap();
        assert!(joined_text(parsed).is_none());
    }

    #[test]
    fn request_carries_system_separately() {
        let body = MessagesRequest {
            model: "claude-haiku-4-5",
            system: "sys",
            messages: [UserMessage {
                role: "user",
                content: "u",
            }],
            max_tokens: 100,
            temperature: 0.2,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["system"], "sys");
        assert_eq!(json["messages"].as_array().map(Vec::len), Some(1));
    }
}
