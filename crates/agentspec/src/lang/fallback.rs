//! Regex-based JS/TS extraction for sources the grammar cannot parse.
//!
//! Strings, template literals, and comments are first masked with spaces
//! (byte length preserved, newlines kept) so that braces and keywords inside
//! them do not confuse the scanner. Declarations are then matched line by
//! line and their bodies delimited by brace matching on the masked text.

use std::sync::LazyLock;

use regex::Regex;

use super::{
    DocComment, DocSlot, Symbol, SymbolKind, indentation_at, line_end_inclusive, line_number,
    line_start, push_unique,
};
use crate::block::jsdoc;

static FUNCTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[ \t]*(?:export[ \t]+(?:default[ \t]+)?)?(?:declare[ \t]+)?(async[ \t]+)?function\b[ \t]*\*?[ \t]*([A-Za-z_$][\w$]*)",
    )
    .expect("valid function regex")
});

static CLASS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[ \t]*(?:export[ \t]+(?:default[ \t]+)?)?(?:declare[ \t]+)?(?:abstract[ \t]+)?class[ \t]+([A-Za-z_$][\w$]*)(?:[ \t]*<[^>{]*>)?(?:[ \t]+extends[ \t]+([A-Za-z_$][\w$.]*))?",
    )
    .expect("valid class regex")
});

static ARROW_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[ \t]*(?:export[ \t]+)?(?:const|let|var)[ \t]+([A-Za-z_$][\w$]*)[^=;]*=[ \t]*(async[ \t]+)?(?:function\b|(?:\([^)]*\)|[A-Za-z_$][\w$]*)[ \t]*(?::[^=;]+)?=>)",
    )
    .expect("valid arrow regex")
});

static METHOD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[ \t]*(?:(?:public|private|protected|static|readonly|override|get|set)[ \t]+)*(async[ \t]+)?\*?[ \t]*([A-Za-z_$#][\w$]*)[ \t]*(?:<[^>]*>)?[ \t]*\([^)]*\)[^;{]*\{",
    )
    .expect("valid method regex")
});

static CALL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\bnew[ \t]+)?([A-Za-z_$][\w$]*(?:[ \t]*\.[ \t]*[A-Za-z_$][\w$]*)*)[ \t]*\(")
        .expect("valid call regex")
});

static IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?:\bimport\b[^'"`;]*?\bfrom[ \t]*|\bimport[ \t]*\(?[ \t]*|\brequire[ \t]*\([ \t]*|\bexport\b[^'"`;]*?\bfrom[ \t]*)['"]([^'"\n]+)['"]"#,
    )
    .expect("valid import regex")
});

/// Words followed by `(` that are not calls.
const KEYWORDS: &[&str] = &[
    "if", "for", "while", "switch", "catch", "return", "function", "typeof", "await", "yield",
    "with", "do", "else", "new", "delete", "void", "in", "of", "instanceof", "super", "import",
    "constructor",
];

#[derive(Debug)]
struct Found {
    simple_name: String,
    kind: SymbolKind,
    is_async: bool,
    /// Last segment of the `extends` target, for classes.
    base: Option<String>,
    /// Byte offset of the declaration line.
    line_start: usize,
    /// Byte offset of the opening brace, when the body has one.
    body_open: Option<usize>,
    /// Byte offset one past the end of the declaration.
    end: usize,
}

/// Extract symbols and imports from JS/TS source without a syntax tree.
pub fn extract(source: &str) -> (Vec<Symbol>, Vec<String>) {
    let masked = mask(source);
    let mut found: Vec<Found> = Vec::new();

    let mut offset = 0;
    for line in masked.split_inclusive('\n') {
        let start = offset;
        offset += line.len();

        if let Some(caps) = CLASS_RE.captures(line) {
            let name = caps.get(1).map_or("", |m| m.as_str());
            if let Some((open, end)) = brace_body(&masked, start + caps.get(0).map_or(0, |m| m.end()))
            {
                let base = caps
                    .get(2)
                    .and_then(|m| m.as_str().rsplit('.').next())
                    .map(str::to_string);
                found.push(Found {
                    simple_name: name.to_string(),
                    kind: SymbolKind::Class,
                    is_async: false,
                    base,
                    line_start: start,
                    body_open: Some(open),
                    end,
                });
            }
            continue;
        }

        if let Some(caps) = FUNCTION_RE.captures(line) {
            let name = caps.get(2).map_or("", |m| m.as_str());
            if let Some((open, end)) = brace_body(&masked, start + caps.get(0).map_or(0, |m| m.end()))
            {
                found.push(Found {
                    simple_name: name.to_string(),
                    kind: SymbolKind::Function,
                    is_async: caps.get(1).is_some(),
                    base: None,
                    line_start: start,
                    body_open: Some(open),
                    end,
                });
            }
            continue;
        }

        if let Some(caps) = ARROW_RE.captures(line) {
            let name = caps.get(1).map_or("", |m| m.as_str());
            let after = start + caps.get(0).map_or(0, |m| m.end());
            let is_arrow = caps.get(0).is_some_and(|m| m.as_str().ends_with("=>"));
            let rest = masked.get(after..).unwrap_or("");
            let body = if !is_arrow || rest.trim_start().starts_with('{') {
                brace_body(&masked, after)
            } else {
                // Expression body: ends with the statement's line.
                Some((after, line_end_inclusive(&masked, after).min(masked.len())))
            };
            if let Some((open, end)) = body {
                let braced = masked.as_bytes().get(open) == Some(&b'{');
                found.push(Found {
                    simple_name: name.to_string(),
                    kind: SymbolKind::Function,
                    is_async: caps.get(2).is_some(),
                    base: None,
                    line_start: start,
                    body_open: braced.then_some(open),
                    end: trim_end(&masked, end),
                });
            }
            continue;
        }

        // Methods only directly inside a class body, not in method bodies.
        let in_class_body = found
            .iter()
            .filter(|f| f.body_open.is_some_and(|open| open < start) && start < f.end)
            .max_by_key(|f| f.line_start)
            .is_some_and(|f| f.kind == SymbolKind::Class);
        if in_class_body && let Some(caps) = METHOD_RE.captures(line) {
            let name = caps.get(2).map_or("", |m| m.as_str());
            if KEYWORDS.contains(&name) && name != "constructor" {
                continue;
            }
            let brace = start + caps.get(0).map_or(0, |m| m.end()) - 1;
            if let Some((open, end)) = brace_body(&masked, brace) {
                found.push(Found {
                    simple_name: name.to_string(),
                    kind: SymbolKind::Method,
                    is_async: caps.get(1).is_some(),
                    base: None,
                    line_start: start,
                    body_open: Some(open),
                    end,
                });
            }
        }
    }

    let symbols = qualify(source, &masked, &found);
    let imports = extract_imports(source, &masked);
    (symbols, imports)
}

fn qualify(source: &str, masked: &str, found: &[Found]) -> Vec<Symbol> {
    let mut symbols = Vec::with_capacity(found.len());
    // Enclosing declarations: (index into `found`, end offset).
    let mut stack: Vec<(usize, usize)> = Vec::new();

    for (i, f) in found.iter().enumerate() {
        while stack.last().is_some_and(|(_, end)| f.line_start >= *end) {
            stack.pop();
        }
        let mut names: Vec<&str> = stack
            .iter()
            .filter_map(|(j, _)| found.get(*j).map(|p| p.simple_name.as_str()))
            .collect();
        names.push(&f.simple_name);

        let parent_class = match f.kind {
            SymbolKind::Method => stack
                .last()
                .and_then(|(j, _)| found.get(*j))
                .filter(|p| p.kind == SymbolKind::Class)
                .map(|p| p.simple_name.clone()),
            _ => None,
        };

        let decl_start = f.line_start + leading_ws(source, f.line_start);
        let doc = jsdoc_above(source, f.line_start);
        let slot = match &doc {
            Some(d) => DocSlot::Replace {
                span: d.span.clone(),
            },
            None => DocSlot::Insert {
                at: f.line_start,
                indent: indentation_at(source, f.line_start),
                inline: false,
            },
        };

        let calls = match f.body_open {
            Some(open) => body_calls(masked, open + 1, f.end, found, i),
            None => body_calls(masked, decl_start, f.end, found, i),
        };

        symbols.push(Symbol {
            name: names.join("."),
            simple_name: f.simple_name.clone(),
            parent_class,
            bases: f.base.iter().cloned().collect(),
            kind: f.kind,
            is_async: f.is_async,
            start_line: line_number(source, decl_start),
            end_line: line_number(source, f.end.saturating_sub(1).max(decl_start)),
            indent: indentation_at(source, f.line_start),
            code: source.get(decl_start..f.end).unwrap_or("").to_string(),
            calls,
            doc,
            slot,
        });
        stack.push((i, f.end));
    }
    symbols
}

/// Callee names between `from` and `to`, skipping nested declarations.
fn body_calls(masked: &str, from: usize, to: usize, found: &[Found], me: usize) -> Vec<String> {
    let mut holes: Vec<(usize, usize)> = found
        .iter()
        .enumerate()
        .filter(|(j, f)| *j != me && f.line_start >= from && f.end <= to)
        .map(|(_, f)| (f.line_start, f.end))
        .collect();
    holes.sort_unstable();

    let mut calls = Vec::new();
    let Some(text) = masked.get(from..to) else {
        return calls;
    };
    // Skip the declaration's own name (`function name(` on the first line).
    let own_name = found.get(me).map(|f| f.simple_name.as_str());
    let first_line_end = text.find('\n').unwrap_or(text.len());

    for caps in CALL_RE.captures_iter(text) {
        let Some(m) = caps.get(1) else { continue };
        let at = from + m.start();
        if holes.iter().any(|(s, e)| at >= *s && at < *e) {
            continue;
        }
        let name: String = m.as_str().split_whitespace().collect();
        if KEYWORDS.contains(&name.as_str()) && name != "super" {
            continue;
        }
        if m.start() < first_line_end && Some(name.as_str()) == own_name {
            continue;
        }
        // `f().then(`: the receiver is a call result, not a name.
        let preceded_by_dot = text
            .get(..m.start())
            .and_then(|s| s.trim_end().chars().last())
            == Some('.');
        if preceded_by_dot {
            continue;
        }
        push_unique(&mut calls, name);
    }
    calls
}

fn extract_imports(source: &str, masked: &str) -> Vec<String> {
    // Module specifiers live in string literals, which are masked; match on
    // the original text but only where the keyword itself is unmasked code.
    let mut imports = Vec::new();
    for caps in IMPORT_RE.captures_iter(source) {
        let (Some(full), Some(spec)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let keyword_live = masked
            .get(full.start()..full.start() + 1)
            .is_some_and(|c| c != " ");
        if keyword_live {
            push_unique(&mut imports, spec.as_str());
        }
    }
    imports
}

/// A `/** ... */` comment ending on the line directly above `line_start`.
fn jsdoc_above(source: &str, line_start_at: usize) -> Option<DocComment> {
    let before = source.get(..line_start_at)?;
    let trimmed = before.trim_end_matches([' ', '\t']);
    let trimmed = trimmed.strip_suffix('\n').unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix('\r').unwrap_or(trimmed);
    let trimmed = trimmed.trim_end_matches([' ', '\t']);
    if !trimmed.ends_with("*/") {
        return None;
    }
    let end = trimmed.len();
    // The opener of the trailing comment, which must itself be `/**`.
    let start = trimmed.get(..end - 2)?.rfind("/*")?;
    let raw = source.get(start..end)?;
    if !raw.starts_with("/**") || raw.starts_with("/**/") {
        return None;
    }
    // Nothing but indentation may precede the comment on its first line.
    let first_line = source.get(line_start(source, start)..start)?;
    if !first_line.trim().is_empty() {
        return None;
    }
    Some(DocComment {
        span: start..end,
        raw: raw.to_string(),
        content: jsdoc::clean(raw),
        removable: true,
    })
}

/// Find the `{` at or after `from` and its matching `}`; returns
/// `(open, one past close)`.
fn brace_body(masked: &str, from: usize) -> Option<(usize, usize)> {
    let bytes = masked.as_bytes();
    let mut i = from;
    // Braces inside the parameter list are destructuring patterns; a `;`
    // first means a declaration without a body.
    let mut parens = 0usize;
    let open = loop {
        match bytes.get(i)? {
            b'(' => parens += 1,
            b')' => parens = parens.saturating_sub(1),
            b'{' if parens == 0 => break i,
            b';' if parens == 0 => return None,
            _ => {}
        }
        i += 1;
    };
    let mut depth = 0usize;
    while i < bytes.len() {
        match bytes.get(i) {
            Some(b'{') => depth += 1,
            Some(b'}') => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some((open, i + 1));
                }
            }
            _ => {}
        }
        i += 1;
    }
    // Unterminated: the body runs to the end of the file.
    (open < bytes.len()).then_some((open, bytes.len()))
}

fn leading_ws(source: &str, at: usize) -> usize {
    source
        .get(at..)
        .map_or(0, |s| s.len() - s.trim_start_matches([' ', '\t']).len())
}

fn trim_end(masked: &str, end: usize) -> usize {
    masked
        .get(..end)
        .map_or(end, |s| s.trim_end_matches(['\n', '\r', ' ', '\t']).len())
}

/// Replace the contents of strings, template literals, and comments with spaces.
/// Newlines are kept so line numbers and offsets stay valid.
fn mask(source: &str) -> String {
    #[derive(Clone, Copy, PartialEq)]
    enum State {
        Code,
        Line,
        Block,
        Str(char),
    }

    let mut out = String::with_capacity(source.len());
    let mut state = State::Code;
    let mut chars = source.chars().peekable();

    let blank = |c: char, out: &mut String| {
        if c == '\n' {
            out.push('\n');
        } else {
            out.extend(std::iter::repeat_n(' ', c.len_utf8()));
        }
    };

    while let Some(c) = chars.next() {
        match state {
            State::Code => match c {
                '/' if chars.peek() == Some(&'/') => {
                    state = State::Line;
                    blank(c, &mut out);
                }
                '/' if chars.peek() == Some(&'*') => {
                    state = State::Block;
                    blank(c, &mut out);
                    if let Some(star) = chars.next() {
                        blank(star, &mut out);
                    }
                }
                '\'' | '"' | '`' => {
                    state = State::Str(c);
                    blank(c, &mut out);
                }
                _ => out.push(c),
            },
            State::Line => {
                if c == '\n' {
                    state = State::Code;
                }
                blank(c, &mut out);
            }
            State::Block => {
                if c == '*' && chars.peek() == Some(&'/') {
                    blank(c, &mut out);
                    if let Some(slash) = chars.next() {
                        blank(slash, &mut out);
                    }
                    state = State::Code;
                } else {
                    blank(c, &mut out);
                }
            }
            State::Str(quote) => {
                if c == '\\' {
                    blank(c, &mut out);
                    if let Some(escaped) = chars.next() {
                        blank(escaped, &mut out);
                    }
                } else {
                    if c == quote || (c == '\n' && quote != '`') {
                        state = State::Code;
                    }
                    blank(c, &mut out);
                }
            }
        }
    }
    out
}
