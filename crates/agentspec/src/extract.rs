//! Read blocks back out of source files and render them.

use std::fmt::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::warn;

use crate::Result;
use crate::block::{AgentSpec, find_block};
use crate::lang::{Language, SourceFile, SymbolKind, parse_file};

/// Output format for `extract`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ExtractFormat {
    #[default]
    Markdown,
    Json,
    /// Compact text for pasting into an agent's context.
    AgentContext,
}

/// One block found in a source file.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractedBlock {
    pub file: PathBuf,
    pub symbol: String,
    pub kind: SymbolKind,
    pub language: Language,
    /// 1-based line of the definition.
    pub line: usize,
    /// The parsed block, when it parses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spec: Option<AgentSpec>,
    /// Block body as written, when it does not parse.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Blocks in an already-parsed file, in source order.
pub fn extract_source(file: &SourceFile) -> Vec<ExtractedBlock> {
    file.symbols
        .iter()
        .filter_map(|symbol| {
            let doc = symbol.doc.as_ref()?;
            let block = find_block(&doc.content)?;
            let parsed = if block.is_terminated() {
                AgentSpec::parse(&block.body).map_err(|e| e.to_string())
            } else {
                Err("unterminated block".to_string())
            };
            let (spec, raw, error) = match parsed {
                Ok(spec) => (Some(spec), None, None),
                Err(e) => (None, Some(block.body), Some(e)),
            };
            Some(ExtractedBlock {
                file: file.path.clone(),
                symbol: symbol.name.clone(),
                kind: symbol.kind,
                language: file.language,
                line: symbol.start_line,
                spec,
                raw,
                error,
            })
        })
        .collect()
}

pub fn extract_file(path: &Path) -> Result<Vec<ExtractedBlock>> {
    Ok(extract_source(&parse_file(path)?))
}

/// Blocks from every readable file in `paths`. Unreadable files are logged
/// and skipped.
pub fn extract_paths(paths: &[PathBuf]) -> Vec<ExtractedBlock> {
    let mut blocks = Vec::new();
    for path in paths {
        match extract_file(path) {
            Ok(found) => blocks.extend(found),
            Err(e) => warn!("{}: {e}", path.display()),
        }
    }
    blocks
}

/// Render `blocks` in `format`.
pub fn render(blocks: &[ExtractedBlock], format: ExtractFormat) -> Result<String> {
    match format {
        ExtractFormat::Json => Ok(serde_json::to_string_pretty(blocks)? + "\n"),
        ExtractFormat::Markdown => Ok(render_markdown(blocks)),
        ExtractFormat::AgentContext => Ok(render_agent_context(blocks)),
    }
}

// ── Markdown ───────────────────────────────────────────────────────

fn render_markdown(blocks: &[ExtractedBlock]) -> String {
    let mut out = String::from("# Agentspec\n");
    let mut current: Option<&Path> = None;
    for block in blocks {
        if current != Some(block.file.as_path()) {
            current = Some(block.file.as_path());
            let _ = write!(out, "\n## {}\n", block.file.display());
        }
        let _ = write!(
            out,
            "\n### `{}` ({}, line {})\n\n",
            block.symbol, block.kind, block.line
        );
        match (&block.spec, &block.raw) {
            (Some(spec), _) => markdown_spec(&mut out, spec),
            (None, raw) => {
                let _ = write!(
                    out,
                    "> Block does not parse: {}\n\n```yaml\n{}\n```\n",
                    block.error.as_deref().unwrap_or("unknown error"),
                    raw.as_deref().unwrap_or("").trim_end()
                );
            }
        }
    }
    out
}

fn markdown_spec(out: &mut String, spec: &AgentSpec) {
    let _ = write!(out, "**What**\n\n{}\n\n", spec.what);
    markdown_list(out, "Calls", &spec.deps.calls, true);
    markdown_list(out, "Called by", &spec.deps.called_by, true);
    markdown_list(out, "Imports", &spec.deps.imports, true);
    if !spec.why.is_empty() {
        let _ = write!(out, "**Why**\n\n{}\n\n", spec.why);
    }
    markdown_list(out, "Guardrails", &spec.guardrails, false);
    for (key, value) in &spec.extra {
        let text = match value {
            serde_yaml::Value::String(s) => s.trim_end().to_string(),
            other => serde_yaml::to_string(other)
                .map(|s| s.trim_end().to_string())
                .unwrap_or_default(),
        };
        let _ = write!(out, "**{}**\n\n{}\n\n", title_case(key), text);
    }
    markdown_list(out, "Changelog", &spec.changelog, false);
}

fn markdown_list(out: &mut String, title: &str, items: &[String], code: bool) {
    if items.is_empty() {
        return;
    }
    let _ = write!(out, "**{title}**\n\n");
    for item in items {
        if code {
            let _ = writeln!(out, "- `{item}`");
        } else {
            let _ = writeln!(out, "- {item}");
        }
    }
    out.push('\n');
}

fn title_case(key: &str) -> String {
    let words: Vec<String> = key
        .split('_')
        .enumerate()
        .map(|(i, word)| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) if i == 0 => first.to_uppercase().chain(chars).collect(),
                _ => word.to_string(),
            }
        })
        .collect();
    words.join(" ")
}

// ── Agent context ──────────────────────────────────────────────────

fn render_agent_context(blocks: &[ExtractedBlock]) -> String {
    let mut out = String::new();
    for block in blocks {
        let _ = writeln!(
            out,
            "[{}::{}] {} at line {}",
            block.file.display(),
            block.symbol,
            block.kind,
            block.line
        );
        let Some(spec) = &block.spec else {
            let _ = writeln!(
                out,
                "  (block does not parse: {})\n",
                block.error.as_deref().unwrap_or("unknown error")
            );
            continue;
        };
        let what: String = spec.what.split_whitespace().collect::<Vec<_>>().join(" ");
        let _ = writeln!(out, "  WHAT: {what}");
        for rule in &spec.guardrails {
            let _ = writeln!(out, "  GUARDRAIL: {rule}");
        }
        if !spec.deps.calls.is_empty() {
            let _ = writeln!(out, "  CALLS: {}", spec.deps.calls.join(", "));
        }
        if !spec.deps.called_by.is_empty() {
            let _ = writeln!(out, "  CALLED BY: {}", spec.deps.called_by.join(", "));
        }
        out.push('\n');
    }
    out
}
