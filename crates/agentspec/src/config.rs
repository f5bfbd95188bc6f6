//! Generation and provider configuration.
//!
//! [`ProviderSettings`] comes from the environment (the binary loads `.env`
//! first); [`GenerateConfig`] carries everything else. CLI flags are applied
//! on top of both.

use crate::llm::{ProviderKind, RetryConfig};
use crate::metadata::CollectOptions;
use crate::{DEFAULT_LOCAL_MODEL, DEFAULT_MODEL};

/// Default `max_tokens` per block.
pub const DEFAULT_MAX_TOKENS: u32 = 2000;

/// `max_tokens` cap in terse mode.
pub const TERSE_MAX_TOKENS: u32 = 900;

/// Which provider to use and how to authenticate.
#[derive(Debug, Clone, Default)]
pub struct ProviderSettings {
    pub kind: ProviderKind,
    pub model: String,
    /// `OPENAI_API_KEY`. Optional for local servers.
    pub openai_api_key: Option<String>,
    /// `ANTHROPIC_API_KEY`.
    pub anthropic_api_key: Option<String>,
    /// `OPENAI_BASE_URL`.
    pub base_url: Option<String>,
}

impl ProviderSettings {
    /// Read `AGENTSPEC_PROVIDER`, `AGENTSPEC_MODEL`, `OPENAI_API_KEY`,
    /// `ANTHROPIC_API_KEY`, and `OPENAI_BASE_URL`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let kind = get("AGENTSPEC_PROVIDER")
            .and_then(|v| ProviderKind::parse(&v))
            .unwrap_or_default();
        let model = get("AGENTSPEC_MODEL").unwrap_or_else(|| default_model(kind).to_string());
        Self {
            kind,
            model,
            openai_api_key: get("OPENAI_API_KEY"),
            anthropic_api_key: get("ANTHROPIC_API_KEY"),
            base_url: get("OPENAI_BASE_URL"),
        }
    }

    pub fn with_kind(mut self, kind: ProviderKind) -> Self {
        // A model chosen for another provider makes no sense locally.
        if kind == ProviderKind::Local && self.model == DEFAULT_MODEL {
            self.model = DEFAULT_LOCAL_MODEL.to_string();
        }
        self.kind = kind;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }
}

fn default_model(kind: ProviderKind) -> &'static str {
    match kind {
        ProviderKind::Local => DEFAULT_LOCAL_MODEL,
        _ => DEFAULT_MODEL,
    }
}

/// Settings for a `generate` run.
#[derive(Debug, Clone)]
pub struct GenerateConfig {
    /// Model identifier. Default: [`DEFAULT_MODEL`].
    pub model: String,
    /// Maximum tokens per response. Default: [`DEFAULT_MAX_TOKENS`].
    pub max_tokens: u32,
    /// Sampling temperature. Default: `0.2`.
    pub temperature: f32,
    /// Ask for short blocks. Default: `false`.
    pub terse: bool,
    /// Print blocks instead of writing files. Default: `false`.
    pub dry_run: bool,
    /// Also regenerate symbols that already have a block. Default: `false`.
    pub update_existing: bool,
    /// Regenerate everything, including symbols whose block fails to parse.
    /// Default: `false`.
    pub force: bool,
    pub collect: CollectOptions,
    pub retry: RetryConfig,
}

impl Default for GenerateConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: 0.2,
            terse: false,
            dry_run: false,
            update_existing: false,
            force: false,
            collect: CollectOptions::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl GenerateConfig {
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_terse(mut self, terse: bool) -> Self {
        self.terse = terse;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_update_existing(mut self, update_existing: bool) -> Self {
        self.update_existing = update_existing;
        self
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn with_changelog(mut self, enabled: bool) -> Self {
        self.collect.changelog = enabled;
        self
    }

    pub fn with_changelog_limit(mut self, limit: usize) -> Self {
        self.collect.changelog_limit = limit;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retry.max_retries = retries;
        self
    }

    /// `max_tokens` after the terse cap.
    pub fn effective_max_tokens(&self) -> u32 {
        if self.terse {
            self.max_tokens.min(TERSE_MAX_TOKENS)
        } else {
            self.max_tokens
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = GenerateConfig::default();
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.max_tokens, 2000);
        assert!((config.temperature - 0.2).abs() < f32::EPSILON);
        assert!(config.collect.changelog);
        assert_eq!(config.retry.max_retries, 0);
    }

    #[test]
    fn terse_caps_max_tokens() {
        let config = GenerateConfig::default().with_terse(true);
        assert_eq!(config.effective_max_tokens(), TERSE_MAX_TOKENS);
        let small = GenerateConfig::default().with_terse(true).with_max_tokens(300);
        assert_eq!(small.effective_max_tokens(), 300);
    }

    #[test]
    fn settings_from_environment() {
        let settings = ProviderSettings::from_lookup(lookup(&[
            ("AGENTSPEC_PROVIDER", "anthropic"),
            ("ANTHROPIC_API_KEY", "sk-ant"),
            ("OPENAI_API_KEY", ""),
        ]));
        assert_eq!(settings.kind, ProviderKind::Anthropic);
        assert_eq!(settings.model, DEFAULT_MODEL);
        assert_eq!(settings.anthropic_api_key.as_deref(), Some("sk-ant"));
        assert!(settings.openai_api_key.is_none());
    }

    #[test]
    fn local_provider_defaults_to_local_model() {
        let settings = ProviderSettings::from_lookup(lookup(&[("AGENTSPEC_PROVIDER", "ollama")]));
        assert_eq!(settings.model, DEFAULT_LOCAL_MODEL);

        let switched = ProviderSettings::from_lookup(lookup(&[])).with_kind(ProviderKind::Local);
        assert_eq!(switched.model, DEFAULT_LOCAL_MODEL);

        let explicit = ProviderSettings::from_lookup(lookup(&[("AGENTSPEC_MODEL", "qwen2.5")]))
            .with_kind(ProviderKind::Local);
        assert_eq!(explicit.model, "qwen2.5");
    }
}
