//! Python symbol extraction over the tree-sitter-python grammar.

use tree_sitter::{Node, Tree};

use super::{
    DocComment, DocSlot, Symbol, SymbolKind, indentation_at, line_start, node_text, push_unique,
    squash_whitespace,
};
use crate::block::docstring;

/// Node kinds whose bodies belong to another symbol.
const NESTED_DEFINITIONS: &[&str] = &[
    "function_definition",
    "class_definition",
    "decorated_definition",
];

/// Extract symbols and imports from a parsed Python module.
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
            match child.kind() {
                "function_definition" | "class_definition" => {
                    self.definition(child, child, scope, class);
                }
                "decorated_definition" => {
                    if let Some(def) = child.child_by_field_name("definition") {
                        self.definition(def, child, scope, class);
                    }
                }
                _ => self.visit(child, scope, class),
            }
        }
    }

    /// `def` is the definition node; `outer` includes its decorators.
    fn definition(&mut self, def: Node<'_>, outer: Node<'_>, scope: &[String], class: Option<&str>) {
        let Some(name_node) = def.child_by_field_name("name") else {
            return;
        };
        let simple_name = node_text(name_node, self.source).to_string();
        let is_class = def.kind() == "class_definition";
        let kind = match (is_class, class) {
            (true, _) => SymbolKind::Class,
            (false, Some(_)) => SymbolKind::Method,
            (false, None) => SymbolKind::Function,
        };

        let mut qualified = scope.to_vec();
        qualified.push(simple_name.clone());

        let body = def.child_by_field_name("body");
        let doc = body.and_then(|b| docstring_of(b, self.source));
        let slot = match &doc {
            Some(d) => DocSlot::Replace {
                span: d.span.clone(),
            },
            None => insert_slot(def, body, self.source),
        };
        let mut calls = Vec::new();
        if let Some(b) = body {
            collect_calls(b, self.source, &mut calls);
        }
        let bases = match def.child_by_field_name("superclasses") {
            Some(list) if is_class => base_names(list, self.source),
            _ => Vec::new(),
        };

        self.symbols.push(Symbol {
            name: qualified.join("."),
            simple_name: simple_name.clone(),
            parent_class: class.map(str::to_string),
            bases,
            kind,
            is_async: !is_class && has_token(def, "async"),
            start_line: outer.start_position().row + 1,
            end_line: outer.end_position().row + 1,
            indent: indentation_at(self.source, outer.start_byte()),
            code: node_text(outer, self.source).to_string(),
            calls,
            doc,
            slot,
        });

        if let Some(b) = body {
            let inner_class = if is_class { Some(simple_name.as_str()) } else { None };
            self.visit(b, &qualified, inner_class);
        }
    }
}

fn has_token(node: Node<'_>, token: &str) -> bool {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).any(|c| c.kind() == token);
    found
}

fn first_statement<'t>(body: Node<'t>) -> Option<Node<'t>> {
    let mut cursor = body.walk();
    let first = body.named_children(&mut cursor).find(|n| n.kind() != "comment");
    first
}

fn statement_count(body: Node<'_>) -> usize {
    let mut cursor = body.walk();
    let count = body
        .named_children(&mut cursor)
        .filter(|n| n.kind() != "comment")
        .count();
    count
}

/// The docstring is the first statement when it is a lone string expression.
fn docstring_of(body: Node<'_>, source: &str) -> Option<DocComment> {
    let stmt = first_statement(body)?;
    if stmt.kind() != "expression_statement" || stmt.named_child_count() != 1 {
        return None;
    }
    let string = stmt.named_child(0)?;
    if string.kind() != "string" {
        return None;
    }
    let raw = node_text(string, source).to_string();
    let own_line = source
        .get(line_start(source, string.start_byte())..string.start_byte())
        .is_some_and(|prefix| prefix.trim().is_empty());
    Some(DocComment {
        span: string.byte_range(),
        content: docstring::clean(&raw),
        raw,
        removable: own_line && statement_count(body) > 1,
    })
}

fn insert_slot(def: Node<'_>, body: Option<Node<'_>>, source: &str) -> DocSlot {
    let def_indent = indentation_at(source, def.start_byte());
    let Some(stmt) = body.and_then(first_statement) else {
        // Empty or unparsable body: place the docstring after the header line.
        let at = super::line_end_inclusive(source, def.start_byte());
        return DocSlot::Insert {
            at,
            indent: format!("{def_indent}    "),
            inline: false,
        };
    };

    let colon_row = colon_row(def).unwrap_or(def.start_position().row);
    if stmt.start_position().row == colon_row {
        DocSlot::Insert {
            at: stmt.start_byte(),
            indent: format!("{def_indent}    "),
            inline: true,
        }
    } else {
        DocSlot::Insert {
            at: line_start(source, stmt.start_byte()),
            indent: indentation_at(source, stmt.start_byte()),
            inline: false,
        }
    }
}

/// Row of the `:` that ends the definition header.
fn colon_row(def: Node<'_>) -> Option<usize> {
    let body_start = def.child_by_field_name("body")?.start_byte();
    let mut cursor = def.walk();
    let row = def
        .children(&mut cursor)
        .filter(|c| c.kind() == ":" && c.start_byte() <= body_start)
        .last()
        .map(|c| c.start_position().row);
    row
}

fn collect_calls(node: Node<'_>, source: &str, calls: &mut Vec<String>) {
    let mut cursor = node.walk();
    let children: Vec<Node<'_>> = node.named_children(&mut cursor).collect();
    for child in children {
        if NESTED_DEFINITIONS.contains(&child.kind()) {
            continue;
        }
        if child.kind() == "call"
            && let Some(callee) = child.child_by_field_name("function")
            && let Some(name) = callee_name(callee, source)
        {
            push_unique(calls, name);
        }
        collect_calls(child, source, calls);
    }
}

/// Dotted text for identifier/attribute chains, `super.name` for
/// `super().name`, otherwise the final attribute.
fn callee_name(node: Node<'_>, source: &str) -> Option<String> {
    match node.kind() {
        // `super()` on its own only builds the proxy.
        "identifier" if node_text(node, source) == "super" => None,
        "identifier" => Some(node_text(node, source).to_string()),
        "attribute" if is_dotted(node) => Some(squash_whitespace(node_text(node, source))),
        "attribute" if is_super_call(node.child_by_field_name("object"), source) => node
            .child_by_field_name("attribute")
            .map(|a| format!("super.{}", node_text(a, source))),
        "attribute" => node
            .child_by_field_name("attribute")
            .map(|a| node_text(a, source).to_string()),
        _ => None,
    }
}

fn is_super_call(node: Option<Node<'_>>, source: &str) -> bool {
    node.filter(|n| n.kind() == "call")
        .and_then(|n| n.child_by_field_name("function"))
        .is_some_and(|f| f.kind() == "identifier" && node_text(f, source) == "super")
}

/// `class C(Base, mod.Mixin, metaclass=M)` gives `["Base", "Mixin"]`.
fn base_names(list: Node<'_>, source: &str) -> Vec<String> {
    let mut cursor = list.walk();
    let names = list
        .named_children(&mut cursor)
        .filter(|c| is_dotted(*c))
        .filter_map(|c| node_text(c, source).rsplit('.').next().map(|n| n.trim().to_string()))
        .collect();
    names
}

fn is_dotted(node: Node<'_>) -> bool {
    match node.kind() {
        "identifier" => true,
        "attribute" => node.child_by_field_name("object").is_some_and(is_dotted),
        _ => false,
    }
}

fn collect_imports(node: Node<'_>, source: &str, imports: &mut Vec<String>) {
    match node.kind() {
        "import_statement" => {
            let mut cursor = node.walk();
            for name in node.children_by_field_name("name", &mut cursor) {
                let module = match name.kind() {
                    "aliased_import" => name
                        .child_by_field_name("name")
                        .map(|n| node_text(n, source))
                        .unwrap_or_default(),
                    _ => node_text(name, source),
                };
                push_unique(imports, squash_whitespace(module));
            }
            return;
        }
        "import_from_statement" | "future_import_statement" => {
            let module = if node.kind() == "future_import_statement" {
                "__future__".to_string()
            } else {
                node.child_by_field_name("module_name")
                    .map(|m| squash_whitespace(node_text(m, source)))
                    .unwrap_or_default()
            };
            let mut names = Vec::new();
            {
                let mut cursor = node.walk();
                for name in node.children_by_field_name("name", &mut cursor) {
                    let imported = match name.kind() {
                        "aliased_import" => name
                            .child_by_field_name("name")
                            .map(|n| node_text(n, source))
                            .unwrap_or_default(),
                        _ => node_text(name, source),
                    };
                    names.push(squash_whitespace(imported));
                }
            }
            if has_named_child(node, "wildcard_import") {
                names.push("*".to_string());
            }
            for name in names {
                push_unique(imports, join_module(&module, &name));
            }
            return;
        }
        _ => {}
    }

    let mut cursor = node.walk();
    let children: Vec<Node<'_>> = node.named_children(&mut cursor).collect();
    for child in children {
        collect_imports(child, source, imports);
    }
}

fn has_named_child(node: Node<'_>, kind: &str) -> bool {
    let mut cursor = node.walk();
    let found = node.named_children(&mut cursor).any(|c| c.kind() == kind);
    found
}

fn join_module(module: &str, name: &str) -> String {
    if module.is_empty() {
        name.to_string()
    } else if module.ends_with('.') {
        format!("{module}{name}")
    } else {
        format!("{module}.{name}")
    }
}

#[cfg(test)]
mod tests {
    use crate::lang::{Backend, DocSlot, Language, SourceFile, SymbolKind, parse_source};

    fn parse(src: &str) -> SourceFile {
        parse_source("t.py", Language::Python, src.to_string()).unwrap()
    }

    const SAMPLE: &str = r#"import os
import numpy as np
from typing import List, Optional
from . import sibling
from .pkg import *

def top(a, b):
    """Add things."""
    return os.path.join(a, helper(b))

class Cart:
    @property
    def total(self):
        return sum(self.items())

    async def refresh(self):
        await self.client.fetch()

        def inner():
            return hidden()
        return inner
"#;

    #[test]
    fn finds_functions_classes_and_methods() {
        let file = parse(SAMPLE);
        assert_eq!(file.backend, Backend::TreeSitter);
        let names: Vec<&str> = file.symbols.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            ["top", "Cart", "Cart.total", "Cart.refresh", "Cart.refresh.inner"]
        );
        assert_eq!(file.symbol("Cart").unwrap().kind, SymbolKind::Class);
        assert_eq!(file.symbol("Cart.total").unwrap().kind, SymbolKind::Method);
        assert_eq!(
            file.symbol("Cart.refresh.inner").unwrap().kind,
            SymbolKind::Function
        );
        assert!(file.symbol("Cart.refresh").unwrap().is_async);
        assert_eq!(
            file.symbol("Cart.total").unwrap().parent_class.as_deref(),
            Some("Cart")
        );
    }

    #[test]
    fn decorators_extend_the_start_line() {
        let file = parse(SAMPLE);
        let total = file.symbol("Cart.total").unwrap();
        assert_eq!(total.start_line, 12);
        assert!(total.code.starts_with("@property"));
    }

    #[test]
    fn calls_exclude_nested_definitions() {
        let file = parse(SAMPLE);
        assert_eq!(
            file.symbol("top").unwrap().calls,
            ["os.path.join", "helper"]
        );
        let refresh = file.symbol("Cart.refresh").unwrap();
        assert_eq!(refresh.calls, ["self.client.fetch"]);
        assert_eq!(file.symbol("Cart.refresh.inner").unwrap().calls, ["hidden"]);
    }

    #[test]
    fn super_calls_are_qualified_and_bases_recorded() {
        let src = "class Child(Base, mixins.Audit, metaclass=Meta):\n    def save(self):\n        super().save()\n        super(Child, self).flush()\n        return save()\n";
        let file = parse(src);
        assert_eq!(file.symbol("Child").unwrap().bases, ["Base", "Audit"]);
        assert!(file.symbol("Child.save").unwrap().bases.is_empty());
        assert_eq!(
            file.symbol("Child.save").unwrap().calls,
            ["super.save", "super.flush", "save"]
        );
    }

    #[test]
    fn imports_are_rendered_as_module_paths() {
        let file = parse(SAMPLE);
        assert_eq!(
            file.imports,
            [
                "os",
                "numpy",
                "typing.List",
                "typing.Optional",
                ".sibling",
                ".pkg.*"
            ]
        );
    }

    #[test]
    fn existing_docstring_is_a_replace_slot() {
        let file = parse(SAMPLE);
        let top = file.symbol("top").unwrap();
        let doc = top.doc.as_ref().unwrap();
        assert_eq!(doc.content, "Add things.");
        assert_eq!(doc.raw, "\"\"\"Add things.\"\"\"");
        assert!(doc.removable);
        assert_eq!(
            top.slot,
            DocSlot::Replace {
                span: doc.span.clone()
            }
        );
    }

    #[test]
    fn missing_docstring_inserts_before_first_statement() {
        let src = "class A:\n    def m(self):\n        return 1\n";
        let file = parse(src);
        let m = file.symbol("A.m").unwrap();
        assert!(m.doc.is_none());
        let at = src.find("        return").unwrap();
        assert_eq!(
            m.slot,
            DocSlot::Insert {
                at,
                indent: "        ".into(),
                inline: false
            }
        );
    }

    #[test]
    fn inline_body_is_flagged() {
        let src = "def f(): return 1\n";
        let file = parse(src);
        let f = file.symbol("f").unwrap();
        assert_eq!(
            f.slot,
            DocSlot::Insert {
                at: src.find("return").unwrap(),
                indent: "    ".into(),
                inline: true
            }
        );
    }

    #[test]
    fn sole_docstring_is_not_removable() {
        let file = parse("def f():\n    \"\"\"Only a docstring.\"\"\"\n");
        assert!(!file.symbol("f").unwrap().doc.as_ref().unwrap().removable);
    }

    #[test]
    fn multiline_signature_uses_body_indentation() {
        let src = "def f(\n    a,\n    b,\n):\n    return a\n";
        let file = parse(src);
        match &file.symbol("f").unwrap().slot {
            DocSlot::Insert { at, indent, inline } => {
                assert_eq!(*at, src.find("    return").unwrap());
                assert_eq!(indent, "    ");
                assert!(!inline);
            }
            other => panic!("unexpected slot {other:?}"),
        }
    }

    #[test]
    fn empty_module_has_no_symbols() {
        let file = parse("");
        assert!(file.symbols.is_empty());
        assert!(file.imports.is_empty());
    }
}
