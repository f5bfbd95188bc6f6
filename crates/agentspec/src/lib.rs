//! Structured, machine-readable documentation blocks for Python and JS/TS code.
//!
//! `agentspec` finds every function, method, and class in a source tree,
//! gathers the facts that can be derived without a model (call names,
//! imports, the in-run `called_by` graph, git history), asks an LLM for the
//! narrative parts, and writes the result back as a YAML block inside the
//! symbol's docstring or JSDoc comment:
//!
//! ```text
//! def charge(order):
//!     """
//!     Charge the order's payment method.
//!
//!     ---agentspec
//!     what: |
//!       Captures the authorized amount ...
//!     deps:
//!       calls:
//!         - gateway.capture
//!       called_by: []
//!       imports:
//!         - payments.gateway
//!     why: |
//!       ...
//!     guardrails:
//!       - DO NOT retry a declined capture
//!     changelog:
//!       - '2025-03-02: split capture from authorize (9f3c2e1)'
//!     ---/agentspec
//!     """
//! ```
//!
//! # Where to find things
//!
//! - **Symbol discovery:** [`lang::parse_file`] produces a [`SourceFile`](lang::SourceFile)
//!   with every [`Symbol`](lang::Symbol) and where its doc comment lives.
//!   Python and JS/TS use tree-sitter; JS/TS falls back to
//!   [`lang::fallback`] when the tree is unusable.
//! - **Deterministic facts:** [`metadata`] ([`CallIndex`](metadata::CallIndex),
//!   [`metadata::git`]).
//! - **The block itself:** [`block::AgentSpec`] for parsing and rendering,
//!   [`block::docstring`] and [`block::jsdoc`] for the comment syntax.
//! - **Writing back safely:** [`edit::apply_checked`] refuses edits that
//!   would add syntax errors.
//! - **Commands:** [`generate::Generator`], [`lint`], [`extract`], [`strip`].
//! - **Models:** the [`Provider`](llm::Provider) trait with OpenAI-compatible
//!   (including Ollama) and Anthropic implementations in [`llm`].
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`lang`] | Language detection, tree-sitter and regex symbol extraction |
//! | [`metadata`] | Calls, imports, `called_by`, git changelog |
//! | [`block`] | Block model, YAML rendering, docstring/JSDoc syntax |
//! | [`edit`] | Byte-range edits with a re-parse safety check |
//! | [`llm`] | Provider trait, OpenAI/Anthropic/local clients, routing, retry |
//! | [`prompt`] | System and per-symbol prompts |
//! | [`generate`] | The generation pipeline |
//! | [`lint`] | Block validation |
//! | [`extract`] | Markdown / JSON / agent-context rendering |
//! | [`strip`] | Block removal |
//! | [`collect`] | File discovery honouring `.gitignore` and `.agentspecignore` |

pub mod block;
pub mod collect;
pub mod config;
pub mod edit;
pub mod error;
pub mod events;
pub mod extract;
pub mod generate;
pub mod lang;
pub mod lint;
pub mod llm;
pub mod metadata;
pub mod prompt;
pub mod strip;

pub use error::{Error, Result};

// ── Constants ──────────────────────────────────────────────────────

/// Line that opens an agentspec block inside a doc comment.
pub const BLOCK_START: &str = "---agentspec";

/// Line that closes an agentspec block.
pub const BLOCK_END: &str = "---/agentspec";

/// Per-directory ignore file, read in addition to `.gitignore`.
pub const IGNORE_FILENAME: &str = ".agentspecignore";

/// Default model for generation.
pub const DEFAULT_MODEL: &str = "claude-haiku-4-5";

/// Default model when the local (Ollama) provider is selected without `--model`.
pub const DEFAULT_LOCAL_MODEL: &str = "llama3.2";
