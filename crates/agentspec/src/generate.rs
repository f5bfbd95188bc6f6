//! The generation pipeline.
//!
//! ```text
//! parse every file ─► CallIndex ─► per file ─► per selected symbol:
//!     metadata ─► prompt ─► provider (with retry) ─► Narrative
//!     ─► AgentSpec::from_parts ─► doc-comment edit
//! ─► apply_checked (all edits of the file at once) ─► write
//! ```
//!
//! A failing symbol is reported and counted; the run goes on. A file whose
//! edits are refused or cannot be written is left untouched.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::block::{AgentSpec, Narrative, find_block};
use crate::config::GenerateConfig;
use crate::edit::{Edit, apply_checked, merged_doc_content, plan_doc_edit};
use crate::events::{EventHandler, GenerateEvent, NoopHandler};
use crate::lang::{SourceFile, Symbol, parse_file};
use crate::llm::{CompletionRequest, Provider, with_retry};
use crate::metadata::{self, CallIndex};
use crate::prompt::{system_prompt, terse_system_prompt, user_prompt};
use crate::{Error, Result};

/// Counts for a finished run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GenerateReport {
    /// Files parsed.
    pub files: usize,
    /// Blocks produced.
    pub generated: usize,
    /// Symbols left alone.
    pub skipped: usize,
    /// Symbols whose generation failed.
    pub failed: usize,
    /// Files rewritten.
    pub written: usize,
    /// Files that could not be read, parsed, or written.
    pub file_errors: usize,
}

impl GenerateReport {
    pub fn has_failures(&self) -> bool {
        self.failed > 0 || self.file_errors > 0
    }
}

/// Why a symbol is not sent to the model, if it is not.
fn skip_reason(symbol: &Symbol, config: &GenerateConfig) -> Option<&'static str> {
    if config.force {
        return None;
    }
    let doc = symbol.doc.as_ref()?;
    let block = find_block(&doc.content)?;
    if !config.update_existing {
        return Some("already has a block");
    }
    if !block.is_terminated() {
        return Some("unterminated block (use --force to replace it)");
    }
    None
}

/// Runs generation over a set of files.
pub struct Generator<'a> {
    provider: &'a dyn Provider,
    config: GenerateConfig,
    handler: &'a dyn EventHandler,
}

impl<'a> Generator<'a> {
    pub fn new(provider: &'a dyn Provider, config: GenerateConfig) -> Self {
        Self {
            provider,
            config,
            handler: &NoopHandler,
        }
    }

    pub fn with_event_handler(mut self, handler: &'a dyn EventHandler) -> Self {
        self.handler = handler;
        self
    }

    pub fn config(&self) -> &GenerateConfig {
        &self.config
    }

    /// Generate blocks for every selected symbol in `paths`.
    pub async fn run(&self, paths: &[PathBuf]) -> GenerateReport {
        let mut report = GenerateReport::default();

        let mut files = Vec::with_capacity(paths.len());
        for path in paths {
            match parse_file(path) {
                Ok(file) => files.push(file),
                Err(error) => {
                    report.file_errors += 1;
                    self.emit(GenerateEvent::FileFailed { path, error: &error });
                }
            }
        }
        report.files = files.len();

        // `called_by` spans every file in the run.
        let index = CallIndex::build(&files);

        for file in &files {
            self.run_file(file, &index, &mut report).await;
        }

        self.emit(GenerateEvent::Finished { report: &report });
        report
    }

    async fn run_file(&self, file: &SourceFile, index: &CallIndex, report: &mut GenerateReport) {
        let path = file.path.as_path();
        let selected: Vec<&Symbol> = file
            .symbols
            .iter()
            .filter(|symbol| match skip_reason(symbol, &self.config) {
                Some(reason) => {
                    report.skipped += 1;
                    self.emit(GenerateEvent::SymbolSkipped {
                        path,
                        symbol,
                        reason,
                    });
                    false
                }
                None => true,
            })
            .collect();
        self.emit(GenerateEvent::FileStarted {
            path,
            selected: selected.len(),
            total: file.symbols.len(),
        });

        let mut edits: Vec<Edit> = Vec::new();
        for symbol in selected {
            self.emit(GenerateEvent::Generating { path, symbol });
            match self.generate_symbol(file, symbol, index).await {
                Ok((block, edit)) => {
                    report.generated += 1;
                    self.emit(GenerateEvent::Generated {
                        path,
                        symbol,
                        block: &block,
                    });
                    edits.push(edit);
                }
                Err(error) => {
                    report.failed += 1;
                    self.emit(GenerateEvent::SymbolFailed {
                        path,
                        symbol,
                        error: &error,
                    });
                }
            }
        }

        if edits.is_empty() || self.config.dry_run {
            return;
        }
        let count = edits.len();
        match write_edits(file, edits).await {
            Ok(()) => {
                report.written += 1;
                self.emit(GenerateEvent::FileWritten { path, edits: count });
            }
            Err(error) => {
                report.file_errors += 1;
                self.emit(GenerateEvent::FileFailed {
                    path,
                    error: &error,
                });
            }
        }
    }

    /// The rendered block and the edit that puts it in place.
    async fn generate_symbol(
        &self,
        file: &SourceFile,
        symbol: &Symbol,
        index: &CallIndex,
    ) -> Result<(String, Edit)> {
        let meta = metadata::collect(file, symbol, index, &self.config.collect).await;

        let system = if self.config.terse {
            terse_system_prompt()
        } else {
            system_prompt()
        };
        let request = CompletionRequest {
            model: self.config.model.clone(),
            system,
            user: user_prompt(file, symbol, &meta, self.config.terse),
            max_tokens: self.config.effective_max_tokens(),
            temperature: self.config.temperature,
        };

        let label = format!("{}::{}", file.path.display(), symbol.name);
        let provider = self.provider;
        let req = &request;
        let response = with_retry(&self.config.retry, &label, move || provider.complete(req)).await?;
        debug!("{label}: {} byte response from {}", response.len(), provider.name());

        let narrative = Narrative::from_response(&response)?;
        let spec = AgentSpec::from_parts(narrative, &meta);
        let block = spec.render_block();
        let content = merged_doc_content(symbol.doc.as_ref(), &block, &spec.summary_line());
        Ok((block, plan_doc_edit(file, symbol, &content)))
    }

    fn emit(&self, event: GenerateEvent<'_>) {
        self.handler.on_event(&event);
    }
}

async fn write_edits(file: &SourceFile, edits: Vec<Edit>) -> Result<()> {
    let updated = apply_checked(file, edits)?;
    write_source(&file.path, updated).await
}

pub(crate) async fn write_source(path: &Path, text: String) -> Result<()> {
    tokio::fs::write(path, text)
        .await
        .map_err(|source| Error::Write {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::lang::{Language, parse_source};
    use crate::llm::ProviderFuture;

    struct Canned {
        replies: Mutex<Vec<Result<String>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl Canned {
        fn new(replies: Vec<Result<String>>) -> Self {
            Self {
                replies: Mutex::new(replies),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    impl Provider for Canned {
        fn name(&self) -> &'static str {
            "canned"
        }

        fn complete<'a>(&'a self, request: &'a CompletionRequest) -> ProviderFuture<'a> {
            self.prompts.lock().unwrap().push(request.user.clone());
            let reply = self.replies.lock().unwrap().remove(0);
            Box::pin(async move { reply })
        }
    }

    const REPLY: &str = "what: |\n  Adds numbers.\nwhy: |\n  Shared helper.\nguardrails:\n  - DO NOT change the return type\n";

    fn config() -> GenerateConfig {
        GenerateConfig::default().with_changelog(false)
    }

    #[test]
    fn skip_rules() {
        let file = parse_source(
            "m.py",
            Language::Python,
            "def a():\n    \"\"\"\n    ---agentspec\n    what: x\n    ---/agentspec\n    \"\"\"\n\ndef b():\n    \"\"\"\n    ---agentspec\n    what: x\n    \"\"\"\n\ndef c():\n    pass\n"
                .to_string(),
        )
        .unwrap();
        let a = file.symbol("a").unwrap();
        let b = file.symbol("b").unwrap();
        let c = file.symbol("c").unwrap();

        let plain = config();
        assert_eq!(skip_reason(a, &plain), Some("already has a block"));
        assert_eq!(skip_reason(c, &plain), None);

        let update = config().with_update_existing(true);
        assert_eq!(skip_reason(a, &update), None);
        assert!(skip_reason(b, &update).is_some());

        let force = config().with_force(true);
        assert_eq!(skip_reason(b, &force), None);
    }

    #[tokio::test]
    async fn writes_blocks_and_counts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.py");
        std::fs::write(
            &path,
            "def add(a, b):\n    return a + b\n\ndef main():\n    return add(1, 2)\n",
        )
        .unwrap();

        let provider = Canned::new(vec![
            Ok(REPLY.to_string()),
            Err(Error::InvalidResponse("boom".into())),
        ]);
        let report = Generator::new(&provider, config())
            .run(&[path.clone()])
            .await;
        assert_eq!(
            report,
            GenerateReport {
                files: 1,
                generated: 1,
                failed: 1,
                written: 1,
                ..Default::default()
            }
        );

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("    Adds numbers.\n\n    ---agentspec\n    what: |\n"));
        assert!(written.contains("      called_by:\n        - main\n"));

        let prompts = provider.prompts.lock().unwrap();
        assert!(prompts[0].contains("called_by: main"));
    }

    #[tokio::test]
    async fn dry_run_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.js");
        let src = "function add(a, b) {\n  return a + b;\n}\n";
        std::fs::write(&path, src).unwrap();

        let provider = Canned::new(vec![Ok(REPLY.to_string())]);
        let blocks = Mutex::new(Vec::new());
        let handler = crate::events::FnEventHandler::new(|event| {
            if let GenerateEvent::Generated { block, .. } = event {
                blocks.lock().unwrap().push(block.to_string());
            }
        });
        let report = Generator::new(&provider, config().with_dry_run(true))
            .with_event_handler(&handler)
            .run(&[path.clone()])
            .await;
        assert_eq!(report.generated, 1);
        assert_eq!(report.written, 0);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), src);
        assert!(blocks.lock().unwrap()[0].starts_with("---agentspec\nwhat: |\n  Adds numbers.\n"));
    }

    #[tokio::test]
    async fn unreadable_files_are_counted() {
        let provider = Canned::new(Vec::new());
        let report = Generator::new(&provider, config())
            .run(&[PathBuf::from("/nonexistent/agentspec/x.py")])
            .await;
        assert_eq!(report.file_errors, 1);
        assert_eq!(report.files, 0);
        assert!(report.has_failures());
    }
}
