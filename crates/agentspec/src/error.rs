//! Crate-wide error type.

use std::io;
use std::path::PathBuf;

/// Everything that can go wrong while discovering, generating, or writing blocks.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to write {}: {source}", .path.display())]
    Write { path: PathBuf, source: io::Error },

    #[error("unsupported file type: {}", .0.display())]
    UnsupportedLanguage(PathBuf),

    #[error("parser initialization failed: {0}")]
    ParserInit(String),

    #[error("invalid agentspec YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid LLM response: {0}")]
    InvalidResponse(String),

    #[error("{provider} API HTTP {status}: {body}")]
    Http {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{0} is not set")]
    MissingApiKey(&'static str),

    #[error(
        "edit rejected for {}: syntax errors would increase from {before} to {after}",
        .path.display()
    )]
    UnsafeEdit {
        path: PathBuf,
        before: usize,
        after: usize,
    },

    #[error("overlapping edits at byte {0}")]
    OverlappingEdits(usize),

    #[error("edit span {start}..{end} is outside the source or splits a character")]
    EditOutOfRange { start: usize, end: usize },

    #[error("file walk failed: {0}")]
    Walk(#[from] ignore::Error),

    #[error("failed to serialize JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("git: {0}")]
    Git(String),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether retrying the same request might succeed (429, 5xx, timeouts,
    /// dropped connections). 4xx responses other than 429 are permanent.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Http { status, .. } => *status == 429 || (500..=599).contains(status),
            Error::Transport(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            _ => false,
        }
    }
}
