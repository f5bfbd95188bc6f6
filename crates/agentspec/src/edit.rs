//! Byte-range source edits and the doc-comment placement rules.
//!
//! Every write goes through [`apply_checked`]: the edited text is parsed
//! again and the edit is refused if it has more syntax errors than before.

use std::ops::Range;

use tracing::debug;

use crate::block::{compose, docstring, jsdoc, split_block};
use crate::lang::{
    DocComment, DocSlot, Language, SourceFile, Symbol, indentation_at, line_start,
    syntax_error_count,
};
use crate::{Error, Result};

/// Replace `span` of the source with `replacement`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub span: Range<usize>,
    pub replacement: String,
}

impl Edit {
    pub fn insert(at: usize, text: impl Into<String>) -> Self {
        Self {
            span: at..at,
            replacement: text.into(),
        }
    }

    pub fn replace(span: Range<usize>, text: impl Into<String>) -> Self {
        Self {
            span,
            replacement: text.into(),
        }
    }
}

/// Apply `edits` to `source`. Edits may come in any order; they are applied
/// from the end of the file backwards so earlier offsets stay valid.
/// Several zero-length inserts at one offset are allowed and keep their
/// relative order.
pub fn apply(source: &str, mut edits: Vec<Edit>) -> Result<String> {
    for edit in &edits {
        let Range { start, end } = edit.span;
        if start > end
            || end > source.len()
            || !source.is_char_boundary(start)
            || !source.is_char_boundary(end)
        {
            return Err(Error::EditOutOfRange { start, end });
        }
    }

    // Stable sort: equal spans keep caller order.
    edits.sort_by_key(|e| (e.span.start, e.span.end));
    for pair in edits.windows(2) {
        if let [a, b] = pair
            && b.span.start < a.span.end
        {
            return Err(Error::OverlappingEdits(b.span.start));
        }
    }

    let mut out = source.to_string();
    for edit in edits.iter().rev() {
        out.replace_range(edit.span.clone(), &edit.replacement);
    }
    Ok(out)
}

/// Apply `edits` to `file` and re-parse; refuse the result when it has more
/// syntax errors than the original.
pub fn apply_checked(file: &SourceFile, edits: Vec<Edit>) -> Result<String> {
    let count = edits.len();
    let updated = apply(&file.source, edits)?;
    let before = file.parse_errors;
    let after = syntax_error_count(file.language, &updated)?;
    if after > before {
        return Err(Error::UnsafeEdit {
            path: file.path.clone(),
            before,
            after,
        });
    }
    debug!(
        "{}: {count} edit(s) applied, {} -> {} bytes",
        file.path.display(),
        file.source.len(),
        updated.len()
    );
    Ok(updated)
}

/// Doc-comment text for `symbol` once `block` (a rendered
/// `---agentspec`...`---/agentspec` block) is in place.
///
/// Human-written text outside an existing block is kept as is. When there
/// is none, `fallback_summary` becomes the first line.
pub fn merged_doc_content(
    existing: Option<&DocComment>,
    block: &str,
    fallback_summary: &str,
) -> String {
    let summary = existing
        .map(|doc| split_block(&doc.content).0)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| fallback_summary.to_string());
    compose(&summary, block)
}

/// The edit that makes `symbol`'s doc comment read `content`.
pub fn plan_doc_edit(file: &SourceFile, symbol: &Symbol, content: &str) -> Edit {
    let source = file.source.as_str();
    match (&symbol.slot, file.language) {
        (DocSlot::Replace { span }, Language::Python) => {
            let indent = comment_indent(source, span.start, symbol);
            Edit::replace(span.clone(), docstring::render(content, &indent))
        }
        (DocSlot::Replace { span }, _) => {
            let indent = comment_indent(source, span.start, symbol);
            Edit::replace(span.clone(), jsdoc::render(content, &indent))
        }
        (
            DocSlot::Insert {
                at,
                indent,
                inline: true,
            },
            Language::Python,
        ) => {
            // `def f(): return 1` becomes a header line and an indented body.
            let ws_start = source
                .get(..*at)
                .map_or(*at, |s| s.trim_end_matches([' ', '\t']).len());
            let literal = docstring::render(content, indent);
            Edit::replace(ws_start..*at, format!("\n{indent}{literal}\n{indent}"))
        }
        (DocSlot::Insert { at, indent, .. }, Language::Python) => {
            let literal = docstring::render(content, indent);
            Edit::insert(*at, format!("{indent}{literal}\n"))
        }
        (
            DocSlot::Insert {
                at,
                indent,
                inline: true,
            },
            _,
        ) => {
            let ws_start = source
                .get(..*at)
                .map_or(*at, |s| s.trim_end_matches([' ', '\t']).len());
            let comment = jsdoc::render(content, indent);
            Edit::replace(ws_start..*at, format!("\n{indent}{comment}\n{indent}"))
        }
        (DocSlot::Insert { at, indent, .. }, _) => {
            let comment = jsdoc::render(content, indent);
            Edit::insert(*at, format!("{indent}{comment}\n"))
        }
    }
}

/// Indentation for a re-rendered comment starting at `start`. A docstring
/// sharing its line with other code is re-indented one level inside the
/// definition.
fn comment_indent(source: &str, start: usize, symbol: &Symbol) -> String {
    let own_line = source
        .get(line_start(source, start)..start)
        .is_some_and(|prefix| prefix.trim().is_empty());
    if own_line {
        indentation_at(source, start)
    } else {
        format!("{}    ", symbol.indent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::parse_source;

    const BLOCK: &str = "---agentspec\nwhat: |\n  Adds.\n---/agentspec";

    fn python(src: &str) -> SourceFile {
        parse_source("m.py", Language::Python, src.to_string()).unwrap()
    }

    fn javascript(src: &str) -> SourceFile {
        parse_source("m.js", Language::JavaScript, src.to_string()).unwrap()
    }

    fn write_doc(file: &SourceFile, name: &str, fallback: &str) -> SourceFile {
        let symbol = file.symbol(name).unwrap();
        let content = merged_doc_content(symbol.doc.as_ref(), BLOCK, fallback);
        let edit = plan_doc_edit(file, symbol, &content);
        let updated = apply_checked(file, vec![edit]).unwrap();
        parse_source(file.path.clone(), file.language, updated).unwrap()
    }

    #[test]
    fn apply_runs_bottom_up() {
        let out = apply(
            "abcdef",
            vec![Edit::replace(0..1, "X"), Edit::insert(3, "--"), Edit::replace(5..6, "")],
        )
        .unwrap();
        assert_eq!(out, "Xbc--de");
    }

    #[test]
    fn apply_rejects_overlaps() {
        let err = apply("abcdef", vec![Edit::replace(0..3, "x"), Edit::replace(2..4, "y")])
            .unwrap_err();
        assert!(matches!(err, Error::OverlappingEdits(2)));
    }

    #[test]
    fn inserts_at_one_offset_keep_order() {
        let out = apply("ab", vec![Edit::insert(1, "1"), Edit::insert(1, "2")]).unwrap();
        assert_eq!(out, "a12b");
    }

    #[test]
    fn apply_rejects_spans_outside_the_source() {
        assert!(matches!(
            apply("ab", vec![Edit::insert(5, "x")]),
            Err(Error::EditOutOfRange { start: 5, end: 5 })
        ));
        assert!(matches!(
            apply("é", vec![Edit::insert(1, "x")]),
            Err(Error::EditOutOfRange { .. })
        ));
    }

    #[test]
    fn python_insert_before_first_statement() {
        let file = python("class A:\n    def add(self, a, b):\n        return a + b\n");
        let updated = write_doc(&file, "A.add", "Add two numbers.");
        assert_eq!(
            updated.source,
            "class A:\n    def add(self, a, b):\n        \"\"\"\n        Add two numbers.\n\n        ---agentspec\n        what: |\n          Adds.\n        ---/agentspec\n        \"\"\"\n        return a + b\n"
        );
        let doc = updated.symbol("A.add").unwrap().doc.as_ref().unwrap();
        assert!(doc.content.starts_with("Add two numbers.\n\n---agentspec"));
    }

    #[test]
    fn python_replace_keeps_human_summary() {
        let file = python("def add(a, b):\n    \"\"\"Adds a and b.\"\"\"\n    return a + b\n");
        let updated = write_doc(&file, "add", "ignored");
        let doc = updated.symbol("add").unwrap().doc.as_ref().unwrap();
        assert_eq!(doc.content, format!("Adds a and b.\n\n{BLOCK}"));
    }

    #[test]
    fn python_replace_swaps_an_old_block() {
        let file = python(
            "def add(a, b):\n    \"\"\"\n    Adds.\n\n    ---agentspec\n    what: old\n    ---/agentspec\n    \"\"\"\n    return a + b\n",
        );
        let updated = write_doc(&file, "add", "ignored");
        let doc = updated.symbol("add").unwrap().doc.as_ref().unwrap();
        assert_eq!(doc.content, format!("Adds.\n\n{BLOCK}"));
        assert!(!updated.source.contains("what: old"));
    }

    #[test]
    fn python_inline_body_is_split() {
        let file = python("def f(): return 1\n");
        let updated = write_doc(&file, "f", "One.");
        assert!(updated.source.starts_with("def f():\n    \"\"\"\n    One.\n"));
        assert!(updated.source.ends_with("    \"\"\"\n    return 1\n"));
        assert_eq!(updated.parse_errors, 0);
    }

    #[test]
    fn javascript_insert_above_export() {
        let file = javascript("export function add(a, b) {\n  return a + b;\n}\n");
        let updated = write_doc(&file, "add", "Adds.");
        assert!(updated.source.starts_with("/**\n * Adds.\n *\n * ---agentspec\n"));
        let add = updated.symbol("add").unwrap();
        assert!(add.has_block());
        assert_eq!(add.start_line, 9);
    }

    #[test]
    fn javascript_replace_indented_method_doc() {
        let file = javascript(
            "class A {\n  /** Does m. */\n  m() {\n    return 1;\n  }\n}\n",
        );
        let updated = write_doc(&file, "A.m", "ignored");
        assert!(updated.source.contains("\n  /**\n   * Does m.\n   *\n   * ---agentspec\n"));
        assert!(updated.source.contains("   * ---/agentspec\n   */\n  m() {"));
        let doc = updated.symbol("A.m").unwrap().doc.as_ref().unwrap();
        assert_eq!(doc.content, format!("Does m.\n\n{BLOCK}"));
    }

    #[test]
    fn javascript_one_line_members_keep_their_docs() {
        let file = javascript("class Pair { left() { return 1; } right() { return 2; } }\n");
        let edits = [("Pair.left", "Left side."), ("Pair.right", "Right side.")]
            .into_iter()
            .map(|(name, summary)| {
                let symbol = file.symbol(name).unwrap();
                plan_doc_edit(&file, symbol, &merged_doc_content(None, BLOCK, summary))
            })
            .collect();
        let updated = apply_checked(&file, edits).unwrap();
        let updated = parse_source("m.js", Language::JavaScript, updated).unwrap();
        assert_eq!(updated.parse_errors, 0);
        assert!(updated.symbol("Pair").unwrap().doc.is_none());
        let summary = |name: &str| {
            let doc = updated.symbol(name).unwrap().doc.as_ref().unwrap();
            split_block(&doc.content).0
        };
        assert_eq!(summary("Pair.left"), "Left side.");
        assert_eq!(summary("Pair.right"), "Right side.");
    }

    #[test]
    fn edits_that_break_syntax_are_refused() {
        let file = python("def f():\n    return 1\n");
        let err = apply_checked(&file, vec![Edit::insert(0, "def (:\n")]).unwrap_err();
        assert!(matches!(err, Error::UnsafeEdit { before: 0, .. }));
    }
}
