//! Remove agentspec blocks, keeping any human-written documentation.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use crate::Result;
use crate::block::split_block;
use crate::edit::{Edit, apply_checked, plan_doc_edit};
use crate::generate::write_source;
use crate::lang::{DocComment, SourceFile, line_end_inclusive, line_start, parse_file};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StripReport {
    /// Files parsed.
    pub files: usize,
    /// Blocks removed (or that would be, in a dry run).
    pub stripped: usize,
    /// Files rewritten.
    pub written: usize,
    pub file_errors: usize,
}

/// The edits that remove every block in `file`. A doc comment holding an
/// unterminated block is left alone.
pub fn strip_edits(file: &SourceFile) -> Vec<Edit> {
    file.symbols
        .iter()
        .filter(|symbol| symbol.has_block())
        .filter_map(|symbol| {
            let doc = symbol.doc.as_ref()?;
            let Some(outside) = without_blocks(&doc.content) else {
                warn!(
                    "{}: {}: unterminated block, leaving it in place",
                    file.path.display(),
                    symbol.name
                );
                return None;
            };
            if !outside.is_empty() {
                return Some(plan_doc_edit(file, symbol, &outside));
            }
            if doc.removable {
                Some(removal(&file.source, doc))
            } else {
                // The docstring is the whole body.
                Some(Edit::replace(doc.span.clone(), "pass"))
            }
        })
        .collect()
}

/// `content` with every block removed; `None` if one is unterminated.
fn without_blocks(content: &str) -> Option<String> {
    let mut text = content.to_string();
    loop {
        match split_block(&text) {
            (outside, None) => return Some(outside),
            (_, Some(location)) if !location.is_terminated() => return None,
            (outside, Some(_)) => text = outside,
        }
    }
}

/// Delete `doc`, taking its lines with it when nothing else shares them.
fn removal(source: &str, doc: &DocComment) -> Edit {
    let first = line_start(source, doc.span.start);
    let last = line_end_inclusive(source, doc.span.end);
    let before = source.get(first..doc.span.start).unwrap_or("");
    let after = source.get(doc.span.end..last).unwrap_or("");
    if before.trim().is_empty() && after.trim().is_empty() {
        Edit::replace(first..last, "")
    } else {
        let trailing = after.len() - after.trim_start_matches([' ', '\t']).len();
        Edit::replace(doc.span.start..doc.span.end + trailing, "")
    }
}

/// Strip one file. Returns the number of blocks removed.
pub async fn strip_file(path: &Path, dry_run: bool) -> Result<usize> {
    let file = parse_file(path)?;
    let edits = strip_edits(&file);
    let count = edits.len();
    if count == 0 || dry_run {
        return Ok(count);
    }
    let updated = apply_checked(&file, edits)?;
    write_source(path, updated).await?;
    Ok(count)
}

pub async fn strip_paths(paths: &[PathBuf], dry_run: bool) -> StripReport {
    let mut report = StripReport::default();
    for path in paths {
        match strip_file(path, dry_run).await {
            Ok(0) => report.files += 1,
            Ok(count) => {
                report.files += 1;
                report.stripped += count;
                if dry_run {
                    info!("{}: would strip {count} block(s)", path.display());
                } else {
                    report.written += 1;
                    info!("{}: stripped {count} block(s)", path.display());
                }
            }
            Err(e) => {
                report.file_errors += 1;
                warn!("{}: {e}", path.display());
            }
        }
    }
    report
}
