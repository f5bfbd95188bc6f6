//! Block validation.
//!
//! | Code | Severity | Check |
//! |------|----------|-------|
//! | `AS000` | error | file could not be read or parsed |
//! | `AS001` | warning | symbol has no block |
//! | `AS002` | error | block has no `---/agentspec` line |
//! | `AS003` | error | block body is not a YAML mapping |
//! | `AS004` | error | required key missing |
//! | `AS005` | warning | block shorter than `min_lines` |
//! | `AS006` | error | `guardrails` empty or not a list |
//! | `AS007` | warning | unknown top-level key |
//! | `AS008` | error | `deps` not a mapping, or a `deps` entry not a list |
//!
//! With `strict`, every warning is reported as an error.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_yaml::Value;

use crate::BLOCK_START;
use crate::block::{DEPS_KEYS, OPTIONAL_KEYS, REQUIRED_KEYS, find_block};
use crate::lang::{SourceFile, Symbol, parse_file};

pub const DEFAULT_MIN_LINES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// One finding, printed as `path:line: severity[code]: message`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub path: PathBuf,
    pub line: usize,
    pub severity: Severity,
    pub code: &'static str,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: {}[{}]: {}",
            self.path.display(),
            self.line,
            self.severity,
            self.code,
            self.message
        )
    }
}

#[derive(Debug, Clone)]
pub struct LintOptions {
    /// Minimum block body length in lines. Default: [`DEFAULT_MIN_LINES`].
    pub min_lines: usize,
    /// Report warnings as errors. Default: `false`.
    pub strict: bool,
}

impl Default for LintOptions {
    fn default() -> Self {
        Self {
            min_lines: DEFAULT_MIN_LINES,
            strict: false,
        }
    }
}

/// Diagnostics over a set of files.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LintReport {
    pub files: usize,
    pub diagnostics: Vec<Diagnostic>,
}

impl LintReport {
    pub fn errors(&self) -> usize {
        self.count(Severity::Error)
    }

    pub fn warnings(&self) -> usize {
        self.count(Severity::Warning)
    }

    pub fn has_errors(&self) -> bool {
        self.errors() > 0
    }

    fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }
}

/// Lint every file in `paths`.
pub fn lint_paths(paths: &[PathBuf], options: &LintOptions) -> LintReport {
    let diagnostics = paths
        .iter()
        .flat_map(|path| lint_file(path, options))
        .collect();
    LintReport {
        files: paths.len(),
        diagnostics,
    }
}

/// Lint one file from disk.
pub fn lint_file(path: &Path, options: &LintOptions) -> Vec<Diagnostic> {
    match parse_file(path) {
        Ok(file) => lint_source(&file, options),
        Err(e) => vec![Diagnostic {
            path: path.to_path_buf(),
            line: 1,
            severity: Severity::Error,
            code: "AS000",
            message: e.to_string(),
        }],
    }
}

/// Lint an already-parsed file.
pub fn lint_source(file: &SourceFile, options: &LintOptions) -> Vec<Diagnostic> {
    let mut sink = Sink {
        path: &file.path,
        strict: options.strict,
        out: Vec::new(),
    };
    for symbol in &file.symbols {
        lint_symbol(file, symbol, options, &mut sink);
    }
    sink.out
}

struct Sink<'a> {
    path: &'a Path,
    strict: bool,
    out: Vec<Diagnostic>,
}

impl Sink<'_> {
    fn push(&mut self, line: usize, severity: Severity, code: &'static str, message: String) {
        let severity = if self.strict {
            Severity::Error
        } else {
            severity
        };
        self.out.push(Diagnostic {
            path: self.path.to_path_buf(),
            line,
            severity,
            code,
            message,
        });
    }
}

fn lint_symbol(file: &SourceFile, symbol: &Symbol, options: &LintOptions, sink: &mut Sink<'_>) {
    let name = &symbol.name;
    let Some((doc, block)) = symbol
        .doc
        .as_ref()
        .and_then(|doc| find_block(&doc.content).map(|b| (doc, b)))
    else {
        sink.push(
            symbol.start_line,
            Severity::Warning,
            "AS001",
            format!("{} `{name}` has no agentspec block", symbol.kind),
        );
        return;
    };

    // Line of the start marker in the file.
    let line = doc
        .raw
        .find(BLOCK_START)
        .map_or(symbol.start_line, |offset| file.line_of(doc.span.start + offset));

    if !block.is_terminated() {
        sink.push(
            line,
            Severity::Error,
            "AS002",
            format!("block of `{name}` is not terminated by ---/agentspec"),
        );
        return;
    }

    let value: Value = match serde_yaml::from_str(&block.body) {
        Ok(v) => v,
        Err(e) => {
            sink.push(
                line,
                Severity::Error,
                "AS003",
                format!("block of `{name}` is not valid YAML: {e}"),
            );
            return;
        }
    };
    let Value::Mapping(map) = value else {
        sink.push(
            line,
            Severity::Error,
            "AS003",
            format!("block of `{name}` is not a YAML mapping"),
        );
        return;
    };

    for key in REQUIRED_KEYS {
        if !map.contains_key(*key) {
            sink.push(
                line,
                Severity::Error,
                "AS004",
                format!("block of `{name}` is missing required key `{key}`"),
            );
        }
    }

    let lines = block.body_lines();
    if lines < options.min_lines {
        sink.push(
            line,
            Severity::Warning,
            "AS005",
            format!(
                "block of `{name}` has {lines} line(s), fewer than {}",
                options.min_lines
            ),
        );
    }

    match map.get("guardrails") {
        Some(Value::Sequence(items)) if !items.is_empty() => {}
        Some(Value::Sequence(_)) | Some(Value::Null) => sink.push(
            line,
            Severity::Error,
            "AS006",
            format!("`guardrails` of `{name}` is empty"),
        ),
        Some(_) => sink.push(
            line,
            Severity::Error,
            "AS006",
            format!("`guardrails` of `{name}` is not a list"),
        ),
        None => {}
    }

    for key in map.keys() {
        let Value::String(key) = key else { continue };
        let known = REQUIRED_KEYS.contains(&key.as_str())
            || OPTIONAL_KEYS.contains(&key.as_str())
            || key == "changelog";
        if !known {
            sink.push(
                line,
                Severity::Warning,
                "AS007",
                format!("block of `{name}` has unknown key `{key}`"),
            );
        }
    }

    match map.get("deps") {
        Some(Value::Mapping(deps)) => {
            for key in DEPS_KEYS {
                match deps.get(*key) {
                    None | Some(Value::Sequence(_)) | Some(Value::Null) => {}
                    Some(_) => sink.push(
                        line,
                        Severity::Error,
                        "AS008",
                        format!("`deps.{key}` of `{name}` is not a list"),
                    ),
                }
            }
        }
        Some(_) => sink.push(
            line,
            Severity::Error,
            "AS008",
            format!("`deps` of `{name}` is not a mapping"),
        ),
        None => {}
    }
}
