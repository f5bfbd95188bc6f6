//! Language detection and symbol discovery.
//!
//! [`parse_file`] reads a source file, parses it with the matching
//! tree-sitter grammar, and returns a [`SourceFile`] listing every function,
//! method, and class together with its existing doc comment and the
//! [`DocSlot`] where a new one would go.
//!
//! | Language | Extensions | Backend |
//! |----------|------------|---------|
//! | Python | `.py` | tree-sitter-python |
//! | JavaScript | `.js .jsx .mjs .cjs` | tree-sitter-javascript, regex fallback |
//! | TypeScript | `.ts .mts .cts` | tree-sitter-typescript, regex fallback |
//! | TSX | `.tsx` | tree-sitter-typescript (tsx), regex fallback |
//!
//! JS/TS trees that contain syntax errors are handed to [`fallback`], which
//! works line by line and is not confused by grammar features the bundled
//! parser does not know yet.

pub mod fallback;
pub mod javascript;
pub mod python;

use std::fmt;
use std::ops::Range;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::{BLOCK_START, Error, Result};

// ── Language ───────────────────────────────────────────────────────

/// A supported source language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    #[value(name = "javascript", alias = "js")]
    JavaScript,
    #[value(name = "typescript", alias = "ts")]
    TypeScript,
    Tsx,
}

impl Language {
    /// File extensions for this language.
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Language::Python => &["py"],
            Language::JavaScript => &["js", "jsx", "mjs", "cjs"],
            Language::TypeScript => &["ts", "mts", "cts"],
            Language::Tsx => &["tsx"],
        }
    }

    /// Detect language from a file extension (without the dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.to_ascii_lowercase();
        [
            Language::Python,
            Language::JavaScript,
            Language::TypeScript,
            Language::Tsx,
        ]
        .into_iter()
        .find(|lang| lang.extensions().contains(&ext.as_str()))
    }

    /// Detect language from a path's extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// The tree-sitter grammar for this language.
    pub fn tree_sitter_language(&self) -> tree_sitter::Language {
        match self {
            Language::Python => tree_sitter_python::LANGUAGE.into(),
            Language::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            Language::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Language::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
        }
    }

    /// Whether documentation is written as JSDoc (`/** ... */`) rather than a docstring.
    pub fn uses_jsdoc(&self) -> bool {
        !matches!(self, Language::Python)
    }

    /// Fence tag used in prompts and Markdown output.
    pub fn fence(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Tsx => "tsx",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Tsx => "tsx",
        };
        f.write_str(name)
    }
}

// ── Symbols ────────────────────────────────────────────────────────

/// What kind of definition a [`Symbol`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Function,
    Method,
    Class,
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolKind::Function => write!(f, "function"),
            SymbolKind::Method => write!(f, "method"),
            SymbolKind::Class => write!(f, "class"),
        }
    }
}

/// An existing docstring or JSDoc comment attached to a symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocComment {
    /// Byte range of the literal / comment in the source.
    pub span: Range<usize>,
    /// Source text of the literal, quotes and comment markers included.
    pub raw: String,
    /// Text with quotes, comment markers, escapes, and indentation removed.
    pub content: String,
    /// Whether the comment can be deleted outright without leaving an empty
    /// body behind (a Python docstring that is the only statement cannot).
    pub removable: bool,
}

/// Where a new doc comment goes, or which one to replace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocSlot {
    /// Replace the existing comment at `span`.
    Replace { span: Range<usize> },
    /// Insert at byte `at`. `indent` is the indentation of the comment's
    /// lines. `inline` marks a position that shares its line with earlier
    /// code (a Python body on the `def` line, a JS member after another
    /// one), which has to be split onto its own line first.
    Insert {
        at: usize,
        indent: String,
        inline: bool,
    },
}

/// A function, method, or class definition.
#[derive(Debug, Clone)]
pub struct Symbol {
    /// Dotted name including enclosing classes and functions (`Cart.total`).
    pub name: String,
    /// Name as written at the definition (`total`).
    pub simple_name: String,
    /// Simple name of the enclosing class, for methods.
    pub parent_class: Option<String>,
    /// Simple names of the classes a class extends; empty otherwise.
    pub bases: Vec<String>,
    pub kind: SymbolKind,
    pub is_async: bool,
    /// 1-based first line, decorators and `export` included.
    pub start_line: usize,
    /// 1-based last line.
    pub end_line: usize,
    /// Indentation of the definition line.
    pub indent: String,
    /// Source text of the definition.
    pub code: String,
    /// Callee names found in the body, deduplicated, in source order.
    pub calls: Vec<String>,
    pub doc: Option<DocComment>,
    pub slot: DocSlot,
}

impl Symbol {
    /// Whether the symbol's doc comment already carries an agentspec block.
    pub fn has_block(&self) -> bool {
        self.doc
            .as_ref()
            .is_some_and(|d| d.content.lines().any(|l| l.trim() == BLOCK_START))
    }
}

/// Which extractor produced a [`SourceFile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Backend {
    TreeSitter,
    Regex,
}

/// A parsed source file.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub language: Language,
    pub source: String,
    /// Symbols in source order (parents before their members).
    pub symbols: Vec<Symbol>,
    /// Imported module names, deduplicated, in source order.
    pub imports: Vec<String>,
    /// ERROR / MISSING nodes in the tree-sitter parse.
    pub parse_errors: usize,
    pub backend: Backend,
}

impl SourceFile {
    /// Look up a symbol by qualified name.
    pub fn symbol(&self, name: &str) -> Option<&Symbol> {
        self.symbols.iter().find(|s| s.name == name)
    }

    /// 1-based line number of a byte offset.
    pub fn line_of(&self, byte: usize) -> usize {
        line_number(&self.source, byte)
    }
}

// ── Parsing ────────────────────────────────────────────────────────

/// Read and parse a source file.
pub fn parse_file(path: &Path) -> Result<SourceFile> {
    let language =
        Language::from_path(path).ok_or_else(|| Error::UnsupportedLanguage(path.to_path_buf()))?;
    let source = std::fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_source(path, language, source)
}

/// Parse already-loaded source text.
pub fn parse_source(
    path: impl Into<PathBuf>,
    language: Language,
    source: String,
) -> Result<SourceFile> {
    let path = path.into();
    let tree = parse_tree(language, &source)?;
    let parse_errors = tree.as_ref().map_or(0, |t| count_errors(t.root_node()));

    let usable = tree.as_ref().is_some_and(|t| !t.root_node().has_error());
    let (symbols, imports, backend) = match (&tree, language) {
        (Some(tree), Language::Python) => {
            let (symbols, imports) = python::extract(tree, &source);
            (symbols, imports, Backend::TreeSitter)
        }
        (Some(tree), _) if usable => {
            let (symbols, imports) = javascript::extract(tree, &source);
            (symbols, imports, Backend::TreeSitter)
        }
        (None, Language::Python) => (Vec::new(), Vec::new(), Backend::TreeSitter),
        _ => {
            debug!(
                "{}: tree-sitter parse unusable ({} error nodes), using regex fallback",
                path.display(),
                parse_errors
            );
            let (symbols, imports) = fallback::extract(&source);
            (symbols, imports, Backend::Regex)
        }
    };

    debug!(
        "{}: {} symbol(s), {} import(s), {} parse error(s)",
        path.display(),
        symbols.len(),
        imports.len(),
        parse_errors
    );

    Ok(SourceFile {
        path,
        language,
        source,
        symbols,
        imports,
        parse_errors,
        backend,
    })
}

/// Number of ERROR / MISSING nodes tree-sitter reports for `source`.
pub fn syntax_error_count(language: Language, source: &str) -> Result<usize> {
    Ok(parse_tree(language, source)?.map_or(0, |t| count_errors(t.root_node())))
}

fn parse_tree(language: Language, source: &str) -> Result<Option<tree_sitter::Tree>> {
    let mut parser = tree_sitter::Parser::new();
    parser
        .set_language(&language.tree_sitter_language())
        .map_err(|e| Error::ParserInit(e.to_string()))?;
    Ok(parser.parse(source, None))
}

fn count_errors(root: tree_sitter::Node<'_>) -> usize {
    let mut count = 0;
    let mut cursor = root.walk();
    loop {
        let node = cursor.node();
        if node.is_error() || node.is_missing() {
            count += 1;
        }
        if node.has_error() && cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return count;
            }
        }
    }
}

// ── Text helpers shared by the extractors ──────────────────────────

pub(crate) fn node_text<'s>(node: tree_sitter::Node<'_>, source: &'s str) -> &'s str {
    source.get(node.byte_range()).unwrap_or("")
}

/// Byte offset of the start of the line containing `byte`.
pub(crate) fn line_start(source: &str, byte: usize) -> usize {
    source
        .get(..byte)
        .and_then(|s| s.rfind('\n'))
        .map_or(0, |i| i + 1)
}

/// Byte offset just past the newline ending the line containing `byte`
/// (or the end of the source).
pub(crate) fn line_end_inclusive(source: &str, byte: usize) -> usize {
    source
        .get(byte..)
        .and_then(|s| s.find('\n'))
        .map_or(source.len(), |i| byte + i + 1)
}

/// Leading whitespace of the line containing `byte`.
pub(crate) fn indentation_at(source: &str, byte: usize) -> String {
    let start = line_start(source, byte);
    source
        .get(start..)
        .unwrap_or("")
        .chars()
        .take_while(|c| *c == ' ' || *c == '\t')
        .collect()
}

pub(crate) fn line_number(source: &str, byte: usize) -> usize {
    source
        .get(..byte)
        .map_or(1, |s| s.bytes().filter(|b| *b == b'\n').count() + 1)
}

pub(crate) fn push_unique(list: &mut Vec<String>, item: impl Into<String>) {
    let item = item.into();
    if !item.is_empty() && !list.contains(&item) {
        list.push(item);
    }
}

/// Collapse whitespace runs (including newlines) inside a callee expression.
pub(crate) fn squash_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<String>()
}
