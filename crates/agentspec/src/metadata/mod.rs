//! Deterministic facts about a symbol: what it calls, who calls it, what
//! its file imports, and how it changed.
//!
//! None of this comes from the model. Calls and imports are read off the
//! syntax tree by [`crate::lang`]; `called_by` is the inverse of the call
//! lists across every file in the current run ([`CallIndex`]); the
//! changelog comes from [`git`].

pub mod git;

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use crate::lang::{SourceFile, Symbol, SymbolKind};

/// Default number of changelog entries per symbol.
pub const DEFAULT_CHANGELOG_LIMIT: usize = 5;

/// Receivers that mark a call as a call to a method of the current class.
const SELF_RECEIVERS: &[&str] = &["self", "cls", "this"];

/// One commit touching a symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangelogEntry {
    pub date: NaiveDate,
    pub hash: String,
    pub subject: String,
}

impl fmt::Display for ChangelogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} ({})",
            self.date.format("%Y-%m-%d"),
            self.subject,
            self.hash
        )
    }
}

/// Deterministic metadata for one symbol.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SymbolMetadata {
    pub calls: Vec<String>,
    pub called_by: Vec<String>,
    pub imports: Vec<String>,
    pub changelog: Vec<ChangelogEntry>,
}

/// Options for [`collect`].
#[derive(Debug, Clone)]
pub struct CollectOptions {
    /// Query git for history. Default: `true`.
    pub changelog: bool,
    /// Maximum changelog entries. Default: [`DEFAULT_CHANGELOG_LIMIT`].
    pub changelog_limit: usize,
}

impl Default for CollectOptions {
    fn default() -> Self {
        Self {
            changelog: true,
            changelog_limit: DEFAULT_CHANGELOG_LIMIT,
        }
    }
}

// ── Call index ─────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct Caller {
    path: PathBuf,
    name: String,
    calls: Vec<String>,
    /// Bases of the caller's class, for resolving `super` calls.
    bases: Vec<String>,
}

/// Inverse call graph over every file parsed in a run.
#[derive(Debug, Clone, Default)]
pub struct CallIndex {
    callers: Vec<Caller>,
}

impl CallIndex {
    /// Index the call lists of every symbol in `files`.
    pub fn build<'a>(files: impl IntoIterator<Item = &'a SourceFile>) -> Self {
        let callers = files
            .into_iter()
            .flat_map(|file| {
                file.symbols.iter().map(|s| Caller {
                    path: file.path.clone(),
                    name: s.name.clone(),
                    calls: s.calls.clone(),
                    bases: class_bases(file, s),
                })
            })
            .collect();
        Self { callers }
    }

    /// Symbols that call `symbol`, defined in `path`.
    ///
    /// Callers in the same file are listed by name; callers elsewhere as
    /// `path::name`. A call matches when it names the symbol directly, goes
    /// through `self`/`this`/`cls`, or through the enclosing class name.
    /// Classes also match `new Class(...)` (recorded as the bare name).
    /// `super.m` reaches `m` only on a base of the caller's class.
    pub fn called_by(&self, path: &Path, symbol: &Symbol) -> Vec<String> {
        let mut result = Vec::new();
        for caller in &self.callers {
            if caller.path == path && caller.name == symbol.name {
                continue;
            }
            if !caller
                .calls
                .iter()
                .any(|call| call_matches(call, symbol, &caller.bases))
            {
                continue;
            }
            let label = if caller.path == path {
                caller.name.clone()
            } else {
                format!("{}::{}", caller.path.display(), caller.name)
            };
            crate::lang::push_unique(&mut result, label);
        }
        result
    }
}

/// Bases of the class `symbol` is a method of, looked up in its own file.
fn class_bases(file: &SourceFile, symbol: &Symbol) -> Vec<String> {
    if symbol.kind != SymbolKind::Method {
        return Vec::new();
    }
    let Some((class_name, _)) = symbol.name.rsplit_once('.') else {
        return Vec::new();
    };
    file.symbol(class_name)
        .map(|class| class.bases.clone())
        .unwrap_or_default()
}

fn call_matches(call: &str, symbol: &Symbol, caller_bases: &[String]) -> bool {
    let name = symbol.simple_name.as_str();
    let on_base = || {
        symbol.kind == SymbolKind::Method
            && symbol
                .parent_class
                .as_ref()
                .is_some_and(|class| caller_bases.contains(class))
    };
    if call == "super" {
        // JS `super(...)` inside a constructor.
        return name == "constructor" && on_base();
    }
    if let Some(method) = call.strip_prefix("super.") {
        return method == name && on_base();
    }
    let Some((receiver, method)) = call.rsplit_once('.') else {
        // Bare calls only reach free functions and constructors.
        return call == name && symbol.kind != SymbolKind::Method;
    };
    if method != name || symbol.kind != SymbolKind::Method {
        return false;
    }
    SELF_RECEIVERS.contains(&receiver)
        || symbol.parent_class.as_deref() == Some(receiver)
}

// ── Collection ─────────────────────────────────────────────────────

/// Gather the deterministic metadata for `symbol`.
pub async fn collect(
    file: &SourceFile,
    symbol: &Symbol,
    index: &CallIndex,
    options: &CollectOptions,
) -> SymbolMetadata {
    let changelog = if options.changelog {
        git::changelog(
            &file.path,
            symbol.start_line,
            symbol.end_line,
            options.changelog_limit,
        )
        .await
    } else {
        Vec::new()
    };
    let metadata = SymbolMetadata {
        calls: symbol.calls.clone(),
        called_by: index.called_by(&file.path, symbol),
        imports: file.imports.clone(),
        changelog,
    };
    debug!(
        "{}::{}: {} call(s), {} caller(s), {} import(s), {} changelog entr(ies)",
        file.path.display(),
        symbol.name,
        metadata.calls.len(),
        metadata.called_by.len(),
        metadata.imports.len(),
        metadata.changelog.len()
    );
    metadata
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::{Language, parse_source};

    fn file(path: &str, src: &str) -> SourceFile {
        parse_source(path, Language::Python, src.to_string()).unwrap()
    }

    const CART: &str = "class Cart:\n    def total(self):\n        return self.subtotal()\n\n    def subtotal(self):\n        return 1\n\ndef checkout(cart):\n    c = Cart()\n    return c.total()\n";

    #[test]
    fn changelog_entry_display() {
        let entry = ChangelogEntry {
            date: NaiveDate::from_ymd_opt(2024, 1, 9).unwrap(),
            hash: "abc1234".into(),
            subject: "Fix rounding".into(),
        };
        assert_eq!(entry.to_string(), "2024-01-09: Fix rounding (abc1234)");
    }

    #[test]
    fn changelog_dates_serialize_as_iso() {
        let meta = SymbolMetadata {
            changelog: vec![ChangelogEntry {
                date: NaiveDate::from_ymd_opt(2024, 1, 9).unwrap(),
                hash: "abc1234".into(),
                subject: "Fix rounding".into(),
            }],
            ..Default::default()
        };
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["changelog"][0]["date"], "2024-01-09");
    }

    #[test]
    fn called_by_follows_self_calls() {
        let cart = file("cart.py", CART);
        let index = CallIndex::build([&cart]);
        let subtotal = cart.symbol("Cart.subtotal").unwrap();
        assert_eq!(index.called_by(&cart.path, subtotal), ["Cart.total"]);
    }

    #[test]
    fn constructor_calls_reach_the_class() {
        let cart = file("cart.py", CART);
        let index = CallIndex::build([&cart]);
        let class = cart.symbol("Cart").unwrap();
        assert_eq!(index.called_by(&cart.path, class), ["checkout"]);
    }

    #[test]
    fn unrelated_receivers_do_not_match_methods() {
        let cart = file("cart.py", CART);
        let index = CallIndex::build([&cart]);
        // `c.total()` goes through a local variable, not self or the class.
        let total = cart.symbol("Cart.total").unwrap();
        assert!(index.called_by(&cart.path, total).is_empty());
    }

    #[test]
    fn super_calls_reach_only_the_base_method() {
        let src = "class Base:\n    def save(self):\n        return 1\n\nclass Other:\n    def save(self):\n        return 2\n\nclass Child(Base):\n    def save(self):\n        return super().save()\n\ndef save():\n    return 3\n";
        let models = file("models.py", src);
        let index = CallIndex::build([&models]);
        let called_by = |name: &str| index.called_by(&models.path, models.symbol(name).unwrap());
        assert_eq!(called_by("Base.save"), ["Child.save"]);
        assert!(called_by("Other.save").is_empty());
        assert!(called_by("save").is_empty());
    }

    #[test]
    fn javascript_super_constructor_reaches_the_base() {
        let src = "class Base {\n  constructor() {\n    this.ready = true;\n  }\n}\nclass Child extends Base {\n  constructor() {\n    super();\n  }\n}\n";
        let models = parse_source("models.js", Language::JavaScript, src.to_string()).unwrap();
        let index = CallIndex::build([&models]);
        let base_ctor = models.symbol("Base.constructor").unwrap();
        assert_eq!(index.called_by(&models.path, base_ctor), ["Child.constructor"]);
    }

    #[test]
    fn cross_file_callers_are_path_qualified() {
        let lib = file("lib.py", "def helper():\n    return 1\n");
        let app = file("app.py", "def main():\n    return helper()\n");
        let index = CallIndex::build([&lib, &app]);
        let helper = lib.symbol("helper").unwrap();
        assert_eq!(index.called_by(&lib.path, helper), ["app.py::main"]);
    }

    #[test]
    fn recursion_does_not_list_itself() {
        let f = file("r.py", "def fact(n):\n    return n * fact(n - 1)\n");
        let index = CallIndex::build([&f]);
        assert!(index.called_by(&f.path, f.symbol("fact").unwrap()).is_empty());
    }

    #[tokio::test]
    async fn collect_without_changelog() {
        let cart = file("cart.py", "import os\n\ndef f():\n    return os.getcwd()\n");
        let index = CallIndex::build([&cart]);
        let options = CollectOptions {
            changelog: false,
            ..Default::default()
        };
        let meta = collect(&cart, cart.symbol("f").unwrap(), &index, &options).await;
        assert_eq!(meta.calls, ["os.getcwd"]);
        assert_eq!(meta.imports, ["os"]);
        assert!(meta.changelog.is_empty());
    }
}
