//! Provider selection.
//!
//! [`ProviderKind::Auto`] resolves by model name first (`claude*` goes to
//! Anthropic), then by base URL (anything other than the OpenAI API is a
//! local server), and defaults to OpenAI.

use tracing::debug;

use super::anthropic::AnthropicProvider;
use super::openai::{OPENAI_BASE_URL, OpenAiProvider};
use super::{Provider, ProviderKind};
use crate::config::ProviderSettings;
use crate::{Error, Result};

/// Resolve `Auto` to a concrete provider kind.
pub fn resolve_kind(kind: ProviderKind, model: &str, base_url: Option<&str>) -> ProviderKind {
    if kind != ProviderKind::Auto {
        return kind;
    }
    if model.to_ascii_lowercase().starts_with("claude") {
        return ProviderKind::Anthropic;
    }
    match base_url {
        Some(url) if !is_openai_url(url) => ProviderKind::Local,
        _ => ProviderKind::OpenAi,
    }
}

fn is_openai_url(url: &str) -> bool {
    url.trim_end_matches('/') == OPENAI_BASE_URL || url.contains("api.openai.com")
}

/// Build the provider described by `settings`.
pub fn build_provider(settings: &ProviderSettings) -> Result<Box<dyn Provider>> {
    let kind = resolve_kind(settings.kind, &settings.model, settings.base_url.as_deref());
    debug!(
        "Provider: {:?} (requested {:?}) for model {}",
        kind, settings.kind, settings.model
    );
    let provider: Box<dyn Provider> = match kind {
        ProviderKind::Anthropic => {
            let key = settings
                .anthropic_api_key
                .clone()
                .ok_or(Error::MissingApiKey("ANTHROPIC_API_KEY"))?;
            Box::new(AnthropicProvider::new(key)?)
        }
        ProviderKind::Local => Box::new(OpenAiProvider::local(
            settings.base_url.clone(),
            settings.openai_api_key.clone(),
        )?),
        ProviderKind::OpenAi | ProviderKind::Auto => {
            let key = settings
                .openai_api_key
                .clone()
                .ok_or(Error::MissingApiKey("OPENAI_API_KEY"))?;
            Box::new(OpenAiProvider::new(key, settings.base_url.clone())?)
        }
    };
    Ok(provider)
}
