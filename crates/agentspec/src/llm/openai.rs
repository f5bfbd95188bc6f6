//! OpenAI chat completions client (also used for Ollama and other
//! OpenAI-compatible servers).

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::{CompletionRequest, Provider, ProviderFuture, http_client, non_empty};
use crate::{Error, Result};

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const LOCAL_BASE_URL: &str = "http://localhost:11434/v1";

// ── Wire types ─────────────────────────────────────────────────────

#[derive(Serialize, Debug)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize, Debug)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize, Debug)]
struct RawChatResponse {
    choices: Option<Vec<RawChoice>>,
    error: Option<ApiErrorResponse>,
    #[serde(default)]
    usage: Option<UsageInfo>,
}

#[derive(Deserialize, Debug)]
struct RawChoice {
    message: RawResponseMessage,
}

#[derive(Deserialize, Debug)]
struct RawResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ApiErrorResponse {
    message: String,
}

#[derive(Deserialize, Debug)]
struct UsageInfo {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
}

// ── Client ─────────────────────────────────────────────────────────

/// Client for `POST {base_url}/chat/completions`.
pub struct OpenAiProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    name: &'static str,
}

impl OpenAiProvider {
    /// OpenAI proper: the key is required.
    pub fn new(api_key: impl Into<String>, base_url: Option<String>) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            base_url: trim_base(base_url.as_deref().unwrap_or(OPENAI_BASE_URL)),
            api_key: Some(api_key.into()),
            name: "OpenAI",
        })
    }

    /// A local OpenAI-compatible server; the key is optional.
    pub fn local(base_url: Option<String>, api_key: Option<String>) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            base_url: trim_base(base_url.as_deref().unwrap_or(LOCAL_BASE_URL)),
            api_key,
            name: "local",
        })
    }

    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    async fn chat(&self, request: &CompletionRequest) -> Result<String> {
        let body = ChatRequest {
            model: &request.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user,
                },
            ],
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };
        debug!(
            "{} request: model={}, max_tokens={}, temp={}",
            self.name, request.model, request.max_tokens, request.temperature
        );
        trace!(
            "Request payload size: {} bytes",
            serde_json::to_string(&body).map_or(0, |s| s.len())
        );

        let start = Instant::now();
        let mut builder = self.client.post(self.endpoint()).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {key}"));
        }
        let resp = builder.send().await?;
        let status = resp.status();
        let text = resp.text().await?;
        debug!(
            "{} response: HTTP {} in {:.1}s ({} bytes)",
            self.name,
            status,
            start.elapsed().as_secs_f64(),
            text.len()
        );

        if !status.is_success() {
            return Err(Error::Http {
                provider: self.name,
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: RawChatResponse = serde_json::from_str(&text)
            .map_err(|e| Error::InvalidResponse(format!("failed to parse response: {e}")))?;
        if let Some(err) = parsed.error {
            return Err(Error::InvalidResponse(format!(
                "{} API error: {}",
                self.name, err.message
            )));
        }
        if let Some(usage) = &parsed.usage {
            debug!(
                "Token usage: prompt={}, completion={}",
                usage.prompt_tokens.unwrap_or(0),
                usage.completion_tokens.unwrap_or(0)
            );
        }

        let content = parsed
            .choices
            .and_then(|c| c.into_iter().next())
            .and_then(|c| c.message.content);
        non_empty(self.name, content)
    }
}

impl Provider for OpenAiProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    fn complete<'a>(&'a self, request: &'a CompletionRequest) -> ProviderFuture<'a> {
        Box::pin(self.chat(request))
    }
}

fn trim_base(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_base_url() {
        let p = OpenAiProvider::new("k", Some("https://example.test/v1/".into())).unwrap();
        assert_eq!(p.endpoint(), "https://example.test/v1/chat/completions");
        let local = OpenAiProvider::local(None, None).unwrap();
        assert_eq!(local.endpoint(), "http://localhost:11434/v1/chat/completions");
        assert_eq!(local.name(), "local");
    }

    #[test]
    fn response_content_is_read_from_first_choice() {
        let raw = r#"{"choices":[{"message":{"content":"what: x"}}],"usage":{"prompt_tokens":3}}"#;
        let parsed: RawChatResponse = serde_json::from_str(raw).unwrap();
        let content = parsed.choices.unwrap().remove(0).message.content;
        assert_eq!(content.as_deref(), Some("what: x"));
    }

    #[test]
    fn request_serializes_two_messages() {
        let body = ChatRequest {
            model: "gpt-4o-mini",
            messages: [
                ChatMessage {
                    role: "system",
                    content: "s",
                },
                ChatMessage {
                    role: "user",
                    content: "u",
                },
            ],
            max_tokens: 10,
            temperature: 0.5,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["max_tokens"], 10);
    }
}
