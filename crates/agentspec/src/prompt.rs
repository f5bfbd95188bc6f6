//! Prompts sent to the model.
//!
//! The model writes only the narrative keys. `deps` and `changelog` are
//! filled in from [`SymbolMetadata`] afterwards, so the prompt shows them as
//! context and tells the model not to repeat them.

use std::fmt::Write;

use crate::block::{OPTIONAL_KEYS, split_block};
use crate::lang::{SourceFile, Symbol};
use crate::metadata::SymbolMetadata;

/// Code longer than this (in characters) is cut before it goes into a prompt.
pub const MAX_CODE_CHARS: usize = 12_000;

/// System prompt for full blocks.
pub fn system_prompt() -> String {
    format!(
        "You write agentspec blocks: structured YAML documentation that lets \
coding agents change code safely.

Reply with YAML only. No prose, no code fences, no ---agentspec markers.

Required keys:
  what:       a block scalar (|). First line is a one-sentence summary of \
what the code does. Then the behaviour an agent must know: inputs, outputs, \
side effects, error cases, edge cases.
  why:        a block scalar (|). Why it is built this way and what the \
alternatives would break.
  guardrails: a list of one-line rules, each starting with DO NOT or ALWAYS, \
naming the concrete thing that would break.

Optional keys, only when there is something specific to say: {}.

Do not write deps or changelog; they are filled in from the source and git \
history. Describe the code you are shown. Do not invent callers, \
configuration, or history.",
        OPTIONAL_KEYS.join(", ")
    )
}

/// System prompt for terse blocks.
pub fn terse_system_prompt() -> String {
    "You write short agentspec blocks: structured YAML documentation for coding agents.

Reply with YAML only. No prose, no code fences, no ---agentspec markers.

Keys:
  what:       a block scalar (|) of at most three lines. First line is a one-sentence summary.
  why:        one or two sentences.
  guardrails: at most three one-line rules starting with DO NOT or ALWAYS.

No other keys. Do not write deps or changelog."
        .to_string()
}

/// The per-symbol prompt.
pub fn user_prompt(
    file: &SourceFile,
    symbol: &Symbol,
    metadata: &SymbolMetadata,
    terse: bool,
) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Document this {} {} `{}`.",
        file.language, symbol.kind, symbol.name
    );
    let _ = writeln!(
        out,
        "File: {} (lines {}-{})",
        file.path.display(),
        symbol.start_line,
        symbol.end_line
    );
    if symbol.is_async {
        out.push_str("The definition is async.\n");
    }

    if let Some(doc) = &symbol.doc {
        let (summary, _) = split_block(&doc.content);
        if !summary.is_empty() {
            out.push_str("\nExisting documentation:\n");
            for line in summary.lines() {
                let _ = writeln!(out, "  {line}");
            }
        }
    }

    out.push_str("\nFacts (already recorded, do not repeat):\n");
    push_facts(&mut out, "calls", &metadata.calls);
    push_facts(&mut out, "called_by", &metadata.called_by);
    push_facts(&mut out, "imports", &metadata.imports);
    let changelog: Vec<String> = metadata.changelog.iter().map(|c| c.to_string()).collect();
    push_facts(&mut out, "changelog", &changelog);

    let (code, cut) = truncate_chars(&symbol.code, MAX_CODE_CHARS);
    let _ = writeln!(out, "\n```{}\n{}\n```", file.language.fence(), code.trim_end());
    if cut {
        out.push_str("(code truncated)\n");
    }

    if terse {
        out.push_str("\nKeep it short.\n");
    }
    out
}

fn push_facts(out: &mut String, key: &str, items: &[String]) {
    if items.is_empty() {
        let _ = writeln!(out, "  {key}: none");
    } else {
        let _ = writeln!(out, "  {key}: {}", items.join(", "));
    }
}

/// At most `max` characters of `text`, and whether anything was cut.
fn truncate_chars(text: &str, max: usize) -> (&str, bool) {
    match text.char_indices().nth(max) {
        Some((byte, _)) => (text.get(..byte).unwrap_or(text), true),
        None => (text, false),
    }
}
