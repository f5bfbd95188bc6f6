//! JavaScript / TypeScript symbol extraction over the tree-sitter grammars.
//!
//! The JavaScript, TypeScript, and TSX grammars share node kinds for
//! everything extracted here, so one walker serves all three.

use tree_sitter::{Node, Tree};

use super::{
    DocComment, DocSlot, Symbol, SymbolKind, indentation_at, line_start, node_text, push_unique,
    squash_whitespace,
};
use crate::block::jsdoc;

const FUNCTION_VALUES: &[&str] = &[
    "arrow_function",
    "function_expression",
    "function",
    "generator_function",
];

const CLASS_KINDS: &[&str] = &["class_declaration", "abstract_class_declaration"];

const FUNCTION_KINDS: &[&str] = &["function_declaration", "generator_function_declaration"];

/// Extract symbols and imports from a parsed JS/TS program.
pub fn extract(tree: &Tree, source: &str) -> (Vec<Symbol>, Vec<String>) {
    let root = tree.root_node();
    let mut walker = Walker {
        source,
        symbols: Vec::new(),
    };
    walker.visit(root, &[], None);

    let mut imports = Vec::new();
    collect_imports(root, source, &mut imports);
    (walker.symbols, imports)
}

struct Walker<'s> {
    source: &'s str,
    symbols: Vec<Symbol>,
}

impl Walker<'_> {
    fn visit(&mut self, node: Node<'_>, scope: &[String], class: Option<&str>) {
        let mut cursor = node.walk();
        let children: Vec<Node<'_>> = node.named_children(&mut cursor).collect();
        for child in children {
            let kind = child.kind();
            if FUNCTION_KINDS.contains(&kind) {
                self.symbol(child, child, SymbolKind::Function, scope, None);
            } else if CLASS_KINDS.contains(&kind) {
                self.symbol(child, child, SymbolKind::Class, scope, None);
            } else if kind == "method_definition" {
                self.symbol(child, child, SymbolKind::Method, scope, class);
            } else if kind == "variable_declarator" {
                match function_value(child) {
                    Some(value) if single_declarator(child) => {
                        self.symbol(child, value, SymbolKind::Function, scope, None);
                    }
                    _ => self.visit(child, scope, class),
                }
            } else {
                self.visit(child, scope, class);
            }
        }
    }

    /// `decl` carries the name; `func` carries the body and `async` keyword
    /// (they differ for `const f = () => {}`).
    fn symbol(
        &mut self,
        decl: Node<'_>,
        func: Node<'_>,
        kind: SymbolKind,
        scope: &[String],
        class: Option<&str>,
    ) {
        let Some(name_node) = decl.child_by_field_name("name") else {
            // `export default function () {}` and computed names.
            return;
        };
        let simple_name = node_text(name_node, self.source).to_string();
        if simple_name.is_empty() || simple_name.starts_with('[') {
            return;
        }

        let mut qualified = scope.to_vec();
        qualified.push(simple_name.clone());

        let anchor = anchor_for(decl);
        let first = leading_decorators(anchor);
        let doc = jsdoc_before(first, self.source);
        let slot = match &doc {
            Some(d) => DocSlot::Replace {
                span: d.span.clone(),
            },
            None => {
                let at = first.start_byte();
                let line_at = line_start(self.source, at);
                // Methods written on one line each get their own offset.
                let inline = self
                    .source
                    .get(line_at..at)
                    .is_some_and(|prefix| !prefix.trim().is_empty());
                DocSlot::Insert {
                    at: if inline { at } else { line_at },
                    indent: indentation_at(self.source, at),
                    inline,
                }
            }
        };

        let body = func.child_by_field_name("body");
        let mut calls = Vec::new();
        if let Some(b) = body {
            collect_calls(b, self.source, &mut calls);
        }

        let bases = if kind == SymbolKind::Class {
            base_names(decl, self.source)
        } else {
            Vec::new()
        };

        let start = first.start_byte();
        let end = anchor.end_byte();
        self.symbols.push(Symbol {
            name: qualified.join("."),
            simple_name: simple_name.clone(),
            parent_class: class.map(str::to_string),
            bases,
            kind,
            is_async: has_token(func, "async"),
            start_line: first.start_position().row + 1,
            end_line: anchor.end_position().row + 1,
            indent: indentation_at(self.source, start),
            code: self.source.get(start..end).unwrap_or("").to_string(),
            calls,
            doc,
            slot,
        });

        if let Some(b) = body {
            let inner_class = (kind == SymbolKind::Class).then_some(simple_name.as_str());
            self.visit(b, &qualified, inner_class);
        }
    }
}

fn function_value(declarator: Node<'_>) -> Option<Node<'_>> {
    declarator
        .child_by_field_name("value")
        .filter(|v| FUNCTION_VALUES.contains(&v.kind()))
}

/// `const a = () => {}, b = 1;` shares one doc comment between declarators,
/// so only single-declarator declarations become symbols.
fn single_declarator(declarator: Node<'_>) -> bool {
    declarator.parent().is_some_and(|p| {
        let mut cursor = p.walk();
        let count = p
            .named_children(&mut cursor)
            .filter(|c| c.kind() == "variable_declarator")
            .count();
        count == 1
    })
}

/// The outermost node a doc comment sits above: the declaration itself, its
/// `const`/`let`/`var` statement, and any enclosing `export`.
fn anchor_for(decl: Node<'_>) -> Node<'_> {
    let mut anchor = decl;
    if decl.kind() == "variable_declarator"
        && let Some(parent) = decl.parent()
        && matches!(parent.kind(), "lexical_declaration" | "variable_declaration")
    {
        anchor = parent;
    }
    if let Some(parent) = anchor.parent()
        && parent.kind() == "export_statement"
    {
        anchor = parent;
    }
    anchor
}

/// Method decorators are siblings of the method in a class body; the doc
/// comment goes above them.
fn leading_decorators(anchor: Node<'_>) -> Node<'_> {
    let mut first = anchor;
    while let Some(prev) = first.prev_named_sibling() {
        if prev.kind() != "decorator" {
            break;
        }
        first = prev;
    }
    first
}

fn jsdoc_before(node: Node<'_>, source: &str) -> Option<DocComment> {
    let prev = node.prev_named_sibling()?;
    if prev.kind() != "comment" {
        return None;
    }
    let raw = node_text(prev, source);
    if !raw.starts_with("/**") || raw.starts_with("/**/") {
        return None;
    }
    // Directly above (or on the same line as) the declaration.
    if prev.end_position().row + 1 < node.start_position().row {
        return None;
    }
    Some(DocComment {
        span: prev.byte_range(),
        raw: raw.to_string(),
        content: jsdoc::clean(raw),
        removable: true,
    })
}

/// The `extends` target of a class (`extends mod.Base<T>` gives `Base`);
/// `implements` clauses are not bases.
fn base_names(class: Node<'_>, source: &str) -> Vec<String> {
    let mut cursor = class.walk();
    let Some(heritage) = class
        .named_children(&mut cursor)
        .find(|c| c.kind() == "class_heritage")
    else {
        return Vec::new();
    };
    let mut cursor = heritage.walk();
    let mut values = Vec::new();
    for child in heritage.named_children(&mut cursor) {
        match child.kind() {
            "extends_clause" => {
                let mut inner = child.walk();
                values.extend(child.children_by_field_name("value", &mut inner));
            }
            "implements_clause" | "comment" => {}
            _ => values.push(child),
        }
    }
    values
        .into_iter()
        .filter_map(|v| match v.kind() {
            "identifier" => Some(node_text(v, source).to_string()),
            "member_expression" => v
                .child_by_field_name("property")
                .map(|p| node_text(p, source).to_string()),
            _ => None,
        })
        .collect()
}

fn has_token(node: Node<'_>, token: &str) -> bool {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).any(|c| c.kind() == token);
    found
}

/// Whether `node` is itself a symbol whose calls are recorded separately.
fn is_nested_symbol(node: Node<'_>) -> bool {
    let kind = node.kind();
    FUNCTION_KINDS.contains(&kind)
        || CLASS_KINDS.contains(&kind)
        || kind == "method_definition"
        || (kind == "variable_declarator" && function_value(node).is_some() && single_declarator(node))
}

/// Calls made in `node` (an expression body such as `() => f()` counts
/// itself), excluding those inside nested symbols.
fn collect_calls(node: Node<'_>, source: &str, calls: &mut Vec<String>) {
    let callee = match node.kind() {
        "call_expression" => node.child_by_field_name("function"),
        "new_expression" => node.child_by_field_name("constructor"),
        _ => None,
    };
    if let Some(name) = callee.and_then(|c| callee_name(c, source)) {
        push_unique(calls, name);
    }
    let mut cursor = node.walk();
    let children: Vec<Node<'_>> = node.named_children(&mut cursor).collect();
    for child in children {
        if !is_nested_symbol(child) {
            collect_calls(child, source, calls);
        }
    }
}

fn callee_name(node: Node<'_>, source: &str) -> Option<String> {
    match node.kind() {
        "identifier" | "this" | "super" => Some(node_text(node, source).to_string()),
        "member_expression" if is_dotted(node) => Some(squash_whitespace(node_text(node, source))),
        "member_expression" => node
            .child_by_field_name("property")
            .map(|p| node_text(p, source).to_string()),
        _ => None,
    }
}

fn is_dotted(node: Node<'_>) -> bool {
    match node.kind() {
        "identifier" | "this" | "super" => true,
        "member_expression" => node.child_by_field_name("object").is_some_and(is_dotted),
        _ => false,
    }
}

fn collect_imports(node: Node<'_>, source: &str, imports: &mut Vec<String>) {
    match node.kind() {
        "import_statement" | "export_statement" => {
            if let Some(src) = node.child_by_field_name("source") {
                push_unique(imports, unquote(node_text(src, source)));
            }
        }
        "call_expression" => {
            let is_loader = node.child_by_field_name("function").is_some_and(|f| {
                f.kind() == "import" || (f.kind() == "identifier" && node_text(f, source) == "require")
            });
            if is_loader
                && let Some(args) = node.child_by_field_name("arguments")
                && let Some(first) = args.named_child(0)
                && first.kind() == "string"
            {
                push_unique(imports, unquote(node_text(first, source)));
            }
        }
        _ => {}
    }

    let mut cursor = node.walk();
    let children: Vec<Node<'_>> = node.named_children(&mut cursor).collect();
    for child in children {
        collect_imports(child, source, imports);
    }
}

fn unquote(text: &str) -> String {
    let trimmed = text.trim();
    trimmed
        .strip_prefix(['\'', '"', '`'])
        .and_then(|t| t.strip_suffix(['\'', '"', '`']))
        .unwrap_or(trimmed)
        .to_string()
}
