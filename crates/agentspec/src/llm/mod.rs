//! Model providers.
//!
//! Generation needs exactly one thing from a model: turn a system prompt and
//! a user prompt into text. [`Provider`] is that seam. Implementations:
//!
//! - [`openai::OpenAiProvider`]: the chat completions API. Also serves local
//!   servers that speak it (Ollama at `http://localhost:11434/v1`).
//! - [`anthropic::AnthropicProvider`]: the messages API.
//!
//! [`router`] resolves [`ProviderKind::Auto`] from the model name and
//! configuration; [`retry`] wraps a call with backoff for transient failures.

pub mod anthropic;
pub mod openai;
pub mod retry;
pub mod router;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::Serialize;

use crate::{Error, Result};

pub use retry::{RetryConfig, with_retry};
pub use router::{build_provider, resolve_kind};

/// HTTP timeout for a single completion request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Boxed future returned by [`Provider::complete`].
pub type ProviderFuture<'a> = Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;

/// One prompt/response exchange.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub system: String,
    pub user: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// A model backend.
pub trait Provider: Send + Sync {
    /// Human-readable name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Send `request` and return the response text.
    fn complete<'a>(&'a self, request: &'a CompletionRequest) -> ProviderFuture<'a>;
}

/// Which provider to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ProviderKind {
    /// Pick from the model name and configured base URL.
    #[default]
    Auto,
    #[value(name = "openai")]
    OpenAi,
    Anthropic,
    /// An OpenAI-compatible local server (Ollama).
    Local,
}

impl ProviderKind {
    /// Parse the `AGENTSPEC_PROVIDER` value.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "auto" | "" => Some(Self::Auto),
            "openai" => Some(Self::OpenAi),
            "anthropic" | "claude" => Some(Self::Anthropic),
            "local" | "ollama" => Some(Self::Local),
            _ => None,
        }
    }
}

/// Build the shared HTTP client.
pub(crate) fn http_client() -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(concat!("agentspec/", env!("CARGO_PKG_VERSION")))
        .timeout(REQUEST_TIMEOUT)
        .build()?;
    Ok(client)
}

/// Turn an empty completion into an error.
pub(crate) fn non_empty(provider: &'static str, text: Option<String>) -> Result<String> {
    match text {
        Some(t) if !t.trim().is_empty() => Ok(t),
        _ => Err(Error::InvalidResponse(format!(
            "{provider} returned no text"
        ))),
    }
}
