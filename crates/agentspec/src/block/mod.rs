//! The agentspec block: location, model, LLM-response parsing, and rendering.
//!
//! A block lives inside a doc comment between a [`BLOCK_START`] line and a
//! [`BLOCK_END`] line. Its body is YAML with a fixed set of keys:
//!
//! | Key | Source | Required |
//! |-----|--------|----------|
//! | `what` | LLM | yes |
//! | `deps` (`calls`, `called_by`, `imports`) | deterministic | yes |
//! | `why` | LLM | yes |
//! | `guardrails` | LLM | yes |
//! | `changelog` | git | no |
//! | [`OPTIONAL_KEYS`] | LLM | no |
//!
//! `deps` and `changelog` are never taken from the model: see
//! [`AgentSpec::from_parts`].

pub mod docstring;
pub mod jsdoc;

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_yaml::{Mapping, Value};

use crate::metadata::SymbolMetadata;
use crate::{BLOCK_END, BLOCK_START, Error, Result};

/// Keys every block must carry.
pub const REQUIRED_KEYS: &[&str] = &["what", "deps", "why", "guardrails"];

/// Narrative keys a block may carry in addition to the required ones.
pub const OPTIONAL_KEYS: &[&str] = &[
    "config_files",
    "environment",
    "lessons",
    "monitoring",
    "performance",
    "security",
    "testing",
];

/// Keys allowed under `deps`.
pub const DEPS_KEYS: &[&str] = &["calls", "called_by", "imports"];

/// Summary lines generated from `what` are cut at this many characters.
const SUMMARY_MAX_CHARS: usize = 100;

// ── Location ───────────────────────────────────────────────────────

/// Position of a block inside cleaned doc-comment text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockLocation {
    /// 0-based line of the start marker.
    pub start_line: usize,
    /// 0-based line of the end marker; `None` when the block is unterminated.
    pub end_line: Option<usize>,
    /// Lines between the markers.
    pub body: String,
}

impl BlockLocation {
    pub fn is_terminated(&self) -> bool {
        self.end_line.is_some()
    }

    /// Number of body lines.
    pub fn body_lines(&self) -> usize {
        if self.body.is_empty() {
            0
        } else {
            self.body.lines().count()
        }
    }
}

/// Find the first block in doc-comment text.
pub fn find_block(content: &str) -> Option<BlockLocation> {
    let lines: Vec<&str> = content.lines().collect();
    let start = lines.iter().position(|l| l.trim() == BLOCK_START)?;
    let end = lines
        .iter()
        .skip(start + 1)
        .position(|l| l.trim() == BLOCK_END)
        .map(|i| start + 1 + i);
    let body_end = end.unwrap_or(lines.len());
    Some(BlockLocation {
        start_line: start,
        end_line: end,
        body: lines[start + 1..body_end].join("\n"),
    })
}

/// Split doc-comment text into the human-written part and the block.
///
/// The returned text has the block's lines removed and surrounding blank
/// lines trimmed.
pub fn split_block(content: &str) -> (String, Option<BlockLocation>) {
    let Some(location) = find_block(content) else {
        return (content.trim().to_string(), None);
    };
    let lines: Vec<&str> = content.lines().collect();
    let after = location.end_line.map_or(lines.len(), |e| e + 1);
    let before = lines[..location.start_line].join("\n");
    let rest = lines[after..].join("\n");
    let outside = match (before.trim(), rest.trim()) {
        ("", "") => String::new(),
        (b, "") => b.to_string(),
        ("", r) => r.to_string(),
        (b, r) => format!("{b}\n\n{r}"),
    };
    (outside, Some(location))
}

/// Join a human summary and a rendered block into doc-comment text.
pub fn compose(summary: &str, block: &str) -> String {
    let summary = summary.trim();
    if summary.is_empty() {
        block.trim_end().to_string()
    } else {
        format!("{summary}\n\n{}", block.trim_end())
    }
}

// ── Model ──────────────────────────────────────────────────────────

/// A parsed agentspec block.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AgentSpec {
    pub what: String,
    #[serde(default)]
    pub deps: Deps,
    #[serde(default)]
    pub why: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub guardrails: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub changelog: Vec<String>,
    /// Optional and unknown keys, kept verbatim.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// The `deps` mapping.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Deps {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub calls: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub called_by: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub imports: Vec<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// `calls: null` (or `calls:` with nothing after it) reads as an empty list.
fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Vec<String>>::deserialize(deserializer).map(Option::unwrap_or_default)
}

impl AgentSpec {
    /// Parse a block body.
    pub fn parse(yaml: &str) -> Result<Self> {
        let mut spec: AgentSpec = serde_yaml::from_str(yaml)?;
        spec.normalize();
        Ok(spec)
    }

    /// Combine the model's narrative with deterministic metadata.
    pub fn from_parts(narrative: Narrative, metadata: &SymbolMetadata) -> Self {
        let mut spec = AgentSpec {
            what: narrative.what,
            deps: Deps {
                calls: metadata.calls.clone(),
                called_by: metadata.called_by.clone(),
                imports: metadata.imports.clone(),
                extra: BTreeMap::new(),
            },
            why: narrative.why,
            guardrails: narrative.guardrails,
            changelog: metadata.changelog.iter().map(|c| c.to_string()).collect(),
            extra: narrative.extra,
        };
        spec.normalize();
        spec
    }

    fn normalize(&mut self) {
        self.what = self.what.trim().to_string();
        self.why = self.why.trim().to_string();
        self.guardrails = self
            .guardrails
            .iter()
            .map(|g| one_line(g))
            .filter(|g| !g.is_empty())
            .collect();
        // Rendering trims string extras, so parsing must too.
        for value in self.extra.values_mut().chain(self.deps.extra.values_mut()) {
            if let Value::String(text) = value {
                *text = text.trim().to_string();
            }
        }
    }

    /// First line of `what`, shortened for use as a docstring summary.
    pub fn summary_line(&self) -> String {
        let first = self.what.lines().next().unwrap_or("").trim();
        if first.chars().count() <= SUMMARY_MAX_CHARS {
            return first.to_string();
        }
        let cut: String = first.chars().take(SUMMARY_MAX_CHARS - 3).collect();
        format!("{}...", cut.trim_end())
    }

    /// Render the YAML body (no markers) in the canonical key order.
    pub fn render(&self) -> String {
        let mut out = String::new();
        push_text(&mut out, "what", &self.what, "");

        out.push_str("deps:\n");
        push_list(&mut out, "calls", &self.deps.calls, "  ");
        push_list(&mut out, "called_by", &self.deps.called_by, "  ");
        push_list(&mut out, "imports", &self.deps.imports, "  ");
        for (key, value) in &self.deps.extra {
            push_value(&mut out, key, value, "  ");
        }

        push_text(&mut out, "why", &self.why, "");
        push_list(&mut out, "guardrails", &self.guardrails, "");
        for (key, value) in &self.extra {
            push_value(&mut out, key, value, "");
        }
        push_list(&mut out, "changelog", &self.changelog, "");
        out
    }

    /// Render the block including its start and end markers.
    pub fn render_block(&self) -> String {
        format!("{BLOCK_START}\n{}{BLOCK_END}", self.render())
    }
}

// ── Rendering helpers ──────────────────────────────────────────────

fn one_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// A YAML scalar for `text`, quoted only when plain style would change its meaning.
fn scalar(text: &str) -> String {
    match serde_yaml::to_string(text) {
        Ok(s) if !s.contains('\n') || s.trim_end().lines().count() == 1 => {
            s.trim_end().to_string()
        }
        _ => serde_json::to_string(text).unwrap_or_else(|_| format!("'{text}'")),
    }
}

fn push_text(out: &mut String, key: &str, text: &str, indent: &str) {
    if text.is_empty() {
        out.push_str(&format!("{indent}{key}: ''\n"));
        return;
    }
    if !text.contains('\n') && !text.starts_with(' ') {
        // Single lines still use block style so the body reads the same
        // whether or not the model wrapped it.
        out.push_str(&format!("{indent}{key}: |\n{indent}  {text}\n"));
        return;
    }
    let header = if text.lines().find(|l| !l.trim().is_empty()).is_some_and(|l| l.starts_with(' ')) {
        "|2"
    } else {
        "|"
    };
    out.push_str(&format!("{indent}{key}: {header}\n"));
    for line in text.lines() {
        if line.trim().is_empty() {
            out.push('\n');
        } else {
            out.push_str(&format!("{indent}  {}\n", line.trim_end()));
        }
    }
}

fn push_list(out: &mut String, key: &str, items: &[String], indent: &str) {
    if items.is_empty() {
        out.push_str(&format!("{indent}{key}: []\n"));
        return;
    }
    out.push_str(&format!("{indent}{key}:\n"));
    for item in items {
        out.push_str(&format!("{indent}  - {}\n", scalar(&one_line(item))));
    }
}

fn push_value(out: &mut String, key: &str, value: &Value, indent: &str) {
    if let Value::String(text) = value {
        push_text(out, key, text.trim(), indent);
        return;
    }
    let mut mapping = Mapping::new();
    mapping.insert(Value::String(key.to_string()), value.clone());
    if let Ok(text) = serde_yaml::to_string(&mapping) {
        for line in text.lines() {
            out.push_str(indent);
            out.push_str(line);
            out.push('\n');
        }
    }
}

// ── LLM response ───────────────────────────────────────────────────

/// The parts of a block the model writes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Narrative {
    pub what: String,
    pub why: String,
    pub guardrails: Vec<String>,
    pub extra: BTreeMap<String, Value>,
}

impl Narrative {
    /// Parse a model response into a narrative.
    ///
    /// Tolerates Markdown code fences, block markers, and any leading prose
    /// before the first YAML key. `deps` and `changelog` in the response are
    /// discarded.
    pub fn from_response(text: &str) -> Result<Self> {
        let yaml = response_yaml(text);
        let value: Value = serde_yaml::from_str(&yaml)
            .map_err(|e| Error::InvalidResponse(format!("not valid YAML: {e}")))?;
        let Value::Mapping(map) = value else {
            return Err(Error::InvalidResponse("expected a YAML mapping".into()));
        };

        let mut narrative = Narrative::default();
        for (key, value) in map {
            let Value::String(key) = key else { continue };
            match key.as_str() {
                "what" => narrative.what = value_text(&value),
                "why" => narrative.why = value_text(&value),
                "guardrails" => narrative.guardrails = value_list(&value),
                "deps" | "changelog" => {}
                _ => {
                    narrative.extra.insert(key, value);
                }
            }
        }

        if narrative.what.trim().is_empty() {
            return Err(Error::InvalidResponse("response has no `what`".into()));
        }
        Ok(narrative)
    }
}

fn response_yaml(text: &str) -> String {
    let mut lines: Vec<&str> = text.lines().collect();

    // Keep only the first fenced section when there is one.
    if let Some(open) = lines.iter().position(|l| l.trim_start().starts_with("```")) {
        let close = lines
            .iter()
            .skip(open + 1)
            .position(|l| l.trim_start().starts_with("```"))
            .map_or(lines.len(), |i| open + 1 + i);
        lines = lines[open + 1..close].to_vec();
    }

    let lines: Vec<&str> = lines
        .into_iter()
        .filter(|l| {
            let t = l.trim();
            t != BLOCK_START && t != BLOCK_END
        })
        .collect();

    // Drop prose before the first top-level key.
    let first_key = lines
        .iter()
        .position(|l| !l.starts_with(' ') && l.contains(':'))
        .unwrap_or(0);
    lines[first_key..].join("\n")
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Sequence(items) => items
            .iter()
            .map(value_text)
            .collect::<Vec<_>>()
            .join("\n"),
        Value::Null => String::new(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

fn value_list(value: &Value) -> Vec<String> {
    match value {
        Value::Sequence(items) => items.iter().map(value_text).collect(),
        Value::Null => Vec::new(),
        other => vec![value_text(other)],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{ChangelogEntry, SymbolMetadata};
    use chrono::NaiveDate;

    fn metadata() -> SymbolMetadata {
        SymbolMetadata {
            calls: vec!["os.path.join".into(), "helper".into()],
            called_by: vec!["main".into()],
            imports: vec!["os".into()],
            changelog: vec![ChangelogEntry {
                date: NaiveDate::from_ymd_opt(2025, 3, 2).unwrap(),
                hash: "9f3c2e1".into(),
                subject: "split capture: from authorize".into(),
            }],
        }
    }

    const RESPONSE: &str = "what: |\n  Joins two paths.\n  Returns the result.\nwhy: Keeps path logic in one place.\nguardrails:\n  - DO NOT pass absolute paths as b\n  - \"ALWAYS: normalize\"\ntesting: |\n  Covered by test_join.\n";

    #[test]
    fn find_block_locates_markers() {
        let content = "Summary.\n\n---agentspec\nwhat: x\n---/agentspec\nTrailer.";
        let loc = find_block(content).unwrap();
        assert_eq!(loc.start_line, 2);
        assert_eq!(loc.end_line, Some(4));
        assert_eq!(loc.body, "what: x");
        assert_eq!(loc.body_lines(), 1);
    }

    #[test]
    fn find_block_reports_unterminated() {
        let loc = find_block("---agentspec\nwhat: x\nwhy: y").unwrap();
        assert!(!loc.is_terminated());
        assert_eq!(loc.body, "what: x\nwhy: y");
        assert!(find_block("no block here").is_none());
    }

    #[test]
    fn split_block_keeps_surrounding_text() {
        let content = "Summary.\n\n---agentspec\nwhat: x\n---/agentspec\n\nTrailer.";
        let (outside, loc) = split_block(content);
        assert!(loc.is_some());
        assert_eq!(outside, "Summary.\n\nTrailer.");

        let (outside, _) = split_block("---agentspec\nwhat: x\n---/agentspec");
        assert!(outside.is_empty());
    }

    #[test]
    fn narrative_parses_plain_response() {
        let n = Narrative::from_response(RESPONSE).unwrap();
        assert_eq!(n.what, "Joins two paths.\nReturns the result.\n");
        assert_eq!(n.why, "Keeps path logic in one place.");
        assert_eq!(n.guardrails.len(), 2);
        assert!(n.extra.contains_key("testing"));
    }

    #[test]
    fn narrative_tolerates_fences_prose_and_markers() {
        let wrapped = format!("Here is the block:\n```yaml\n---agentspec\n{RESPONSE}---/agentspec\n```\n");
        let n = Narrative::from_response(&wrapped).unwrap();
        assert_eq!(n.why, "Keeps path logic in one place.");
    }

    #[test]
    fn narrative_ignores_model_supplied_deps() {
        let text = format!("{RESPONSE}deps:\n  calls: [made_up]\nchangelog:\n  - fake\n");
        let n = Narrative::from_response(&text).unwrap();
        assert!(!n.extra.contains_key("deps"));
        assert!(!n.extra.contains_key("changelog"));
    }

    #[test]
    fn narrative_requires_what() {
        let err = Narrative::from_response("why: because\n").unwrap_err();
        assert!(err.to_string().contains("no `what`"));
        assert!(Narrative::from_response("- just\n- a list\n").is_err());
    }

    #[test]
    fn from_parts_uses_deterministic_metadata() {
        let spec = AgentSpec::from_parts(Narrative::from_response(RESPONSE).unwrap(), &metadata());
        assert_eq!(spec.deps.calls, ["os.path.join", "helper"]);
        assert_eq!(spec.deps.called_by, ["main"]);
        assert_eq!(
            spec.changelog,
            ["2025-03-02: split capture: from authorize (9f3c2e1)"]
        );
        assert_eq!(spec.what, "Joins two paths.\nReturns the result.");
    }

    #[test]
    fn render_parses_back_to_the_same_spec() {
        let spec = AgentSpec::from_parts(Narrative::from_response(RESPONSE).unwrap(), &metadata());
        let rendered = spec.render();
        assert!(rendered.starts_with("what: |\n  Joins two paths.\n"));
        let parsed = AgentSpec::parse(&rendered).unwrap();
        assert_eq!(parsed, spec);
    }

    #[test]
    fn string_extras_survive_a_render_cycle() {
        let mut spec = AgentSpec::parse("what: x\nwhy: y\nguardrails: [g]\n").unwrap();
        spec.extra.insert("testing".into(), Value::String("T.\n".into()));
        spec.deps.extra.insert("services".into(), Value::String("  redis \n".into()));
        spec.normalize();
        let parsed = AgentSpec::parse(&spec.render()).unwrap();
        assert_eq!(parsed, spec);
        assert_eq!(parsed.extra["testing"], Value::String("T.".into()));
    }

    #[test]
    fn null_lists_read_as_empty() {
        let spec = AgentSpec::parse("what: x\ndeps:\n  calls: null\n  imports:\nguardrails: ~\n").unwrap();
        assert!(spec.deps.calls.is_empty());
        assert!(spec.deps.imports.is_empty());
        assert!(spec.guardrails.is_empty());
        assert!(AgentSpec::parse("what: x\ndeps:\n  calls: 3\n").is_err());
    }

    #[test]
    fn render_keeps_canonical_key_order() {
        let spec = AgentSpec::from_parts(Narrative::from_response(RESPONSE).unwrap(), &metadata());
        let rendered = spec.render();
        let keys: Vec<&str> = rendered
            .lines()
            .filter(|l| !l.starts_with(' ') && !l.is_empty())
            .map(|l| l.split(':').next().unwrap())
            .collect();
        assert_eq!(keys, ["what", "deps", "why", "guardrails", "testing", "changelog"]);
    }

    #[test]
    fn render_handles_leading_indentation_and_empty_lists() {
        let spec = AgentSpec {
            what: "  indented first line\nnext".into(),
            why: "w".into(),
            guardrails: vec!["g".into()],
            ..Default::default()
        };
        let rendered = spec.render();
        assert!(rendered.contains("what: |2\n"));
        assert!(rendered.contains("  calls: []\n"));
        let parsed = AgentSpec::parse(&rendered).unwrap();
        assert_eq!(parsed.what, "indented first line\nnext".trim());
    }

    #[test]
    fn render_block_has_markers() {
        let spec = AgentSpec {
            what: "w".into(),
            ..Default::default()
        };
        let block = spec.render_block();
        assert!(block.starts_with("---agentspec\nwhat: |"));
        assert!(block.ends_with("\n---/agentspec"));
    }

    #[test]
    fn summary_line_is_truncated() {
        let spec = AgentSpec {
            what: format!("{}\nsecond", "x".repeat(150)),
            ..Default::default()
        };
        let summary = spec.summary_line();
        assert_eq!(summary.chars().count(), 100);
        assert!(summary.ends_with("..."));
    }

    #[test]
    fn compose_joins_summary_and_block() {
        assert_eq!(compose("Sum.", "---agentspec\n---/agentspec\n"), "Sum.\n\n---agentspec\n---/agentspec");
        assert_eq!(compose("  ", "B"), "B");
    }
}
