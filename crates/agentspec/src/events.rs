//! Progress events for a [`Generator`](crate::generate::Generator) run.
//!
//! The generator reports what it is doing through [`GenerateEvent`] values.
//! Callers implement [`EventHandler`] to render progress, collect results,
//! or log.
//!
//! | Handler | Use case |
//! |---------|----------|
//! | [`NoopHandler`] | Tests or silent runs |
//! | [`LoggingHandler`] | Structured logging via `tracing` |
//! | [`FnEventHandler`] | Quick closures |
//! | [`CompositeEventHandler`] | Several handlers in order |

use std::path::Path;

use tracing::{debug, info, warn};

use crate::Error;
use crate::generate::GenerateReport;
use crate::lang::Symbol;

// ── Events ─────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum GenerateEvent<'a> {
    /// A file was parsed and is about to be processed.
    FileStarted {
        path: &'a Path,
        /// Symbols selected for generation.
        selected: usize,
        total: usize,
    },
    /// A symbol was left alone.
    SymbolSkipped {
        path: &'a Path,
        symbol: &'a Symbol,
        reason: &'a str,
    },
    /// A request is about to be sent for `symbol`.
    Generating { path: &'a Path, symbol: &'a Symbol },
    /// A block was produced (rendered, marker lines included).
    Generated {
        path: &'a Path,
        symbol: &'a Symbol,
        block: &'a str,
    },
    /// Generation failed for one symbol; the run continues.
    SymbolFailed {
        path: &'a Path,
        symbol: &'a Symbol,
        error: &'a Error,
    },
    /// The file was rewritten with `edits` new or replaced blocks.
    FileWritten { path: &'a Path, edits: usize },
    /// The file could not be parsed, edited, or written.
    FileFailed { path: &'a Path, error: &'a Error },
    /// The run is over.
    Finished { report: &'a GenerateReport },
}

// ── Handlers ───────────────────────────────────────────────────────

/// Observer for [`GenerateEvent`]s. The default implementation ignores
/// everything.
pub trait EventHandler: Send + Sync {
    fn on_event(&self, event: &GenerateEvent<'_>) {
        let _ = event;
    }
}

pub struct NoopHandler;
impl EventHandler for NoopHandler {}

/// An event handler backed by a closure.
///
/// ```ignore
/// let handler = FnEventHandler::new(|event| {
///     if let GenerateEvent::Generated { block, .. } = event {
///         println!("{block}");
///     }
/// });
/// ```
pub struct FnEventHandler<F>(F)
where
    F: Fn(&GenerateEvent<'_>) + Send + Sync;

impl<F> FnEventHandler<F>
where
    F: Fn(&GenerateEvent<'_>) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> EventHandler for FnEventHandler<F>
where
    F: Fn(&GenerateEvent<'_>) + Send + Sync,
{
    fn on_event(&self, event: &GenerateEvent<'_>) {
        (self.0)(event)
    }
}

/// Dispatches every event to each inner handler, in registration order.
pub struct CompositeEventHandler {
    handlers: Vec<Box<dyn EventHandler>>,
}

impl CompositeEventHandler {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    pub fn with(mut self, handler: impl EventHandler + 'static) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    /// Add `handler` only when `condition` holds.
    pub fn with_if(self, condition: bool, handler: impl EventHandler + 'static) -> Self {
        if condition { self.with(handler) } else { self }
    }
}

impl Default for CompositeEventHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHandler for CompositeEventHandler {
    fn on_event(&self, event: &GenerateEvent<'_>) {
        for handler in &self.handlers {
            handler.on_event(event);
        }
    }
}

/// Logs events via `tracing`.
pub struct LoggingHandler;

impl EventHandler for LoggingHandler {
    fn on_event(&self, event: &GenerateEvent<'_>) {
        match event {
            GenerateEvent::FileStarted {
                path,
                selected,
                total,
            } => {
                info!("{}: {selected}/{total} symbol(s) selected", path.display());
            }
            GenerateEvent::SymbolSkipped {
                path,
                symbol,
                reason,
            } => {
                debug!("{}::{} skipped: {reason}", path.display(), symbol.name);
            }
            GenerateEvent::Generating { path, symbol } => {
                debug!(
                    "{}::{} ({}, lines {}-{})",
                    path.display(),
                    symbol.name,
                    symbol.kind,
                    symbol.start_line,
                    symbol.end_line
                );
            }
            GenerateEvent::Generated {
                path,
                symbol,
                block,
            } => {
                debug!(
                    "{}::{}: block of {} line(s)",
                    path.display(),
                    symbol.name,
                    block.lines().count()
                );
            }
            GenerateEvent::SymbolFailed {
                path,
                symbol,
                error,
            } => {
                warn!("{}::{} failed: {error}", path.display(), symbol.name);
            }
            GenerateEvent::FileWritten { path, edits } => {
                info!("{}: wrote {edits} block(s)", path.display());
            }
            GenerateEvent::FileFailed { path, error } => {
                warn!("{}: {error}", path.display());
            }
            GenerateEvent::Finished { report } => {
                info!(
                    "Done: {} file(s), {} generated, {} skipped, {} failed, {} written",
                    report.files, report.generated, report.skipped, report.failed, report.written
                );
            }
        }
    }
}
