//! Source file discovery.
//!
//! Directories are walked with `ignore`, so `.gitignore`, `.ignore`, and
//! [`IGNORE_FILENAME`](crate::IGNORE_FILENAME) files are honoured at every
//! level. Hidden entries and a few well-known dependency and build
//! directories are skipped. A file named explicitly is always kept when its
//! language is supported, even if an ignore file would exclude it.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use tracing::debug;

use crate::lang::Language;
use crate::{Error, IGNORE_FILENAME, Result};

/// Directory names never descended into.
pub const SKIPPED_DIRS: &[&str] = &[
    "node_modules",
    "__pycache__",
    "venv",
    "site-packages",
    "dist",
    "build",
];

/// Supported files under `paths`, sorted and deduplicated.
///
/// An empty `languages` slice accepts every supported language.
pub fn collect_files(paths: &[PathBuf], languages: &[Language]) -> Result<Vec<PathBuf>> {
    let accepts = |path: &Path| {
        Language::from_path(path)
            .is_some_and(|lang| languages.is_empty() || languages.contains(&lang))
    };

    let mut found = BTreeSet::new();
    for root in paths {
        let meta = std::fs::metadata(root).map_err(|source| Error::Read {
            path: root.clone(),
            source,
        })?;
        if meta.is_file() {
            if accepts(root) {
                found.insert(root.clone());
            } else {
                debug!("{}: unsupported file type, skipped", root.display());
            }
            continue;
        }

        let walker = WalkBuilder::new(root)
            .hidden(true)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .ignore(true)
            .parents(true)
            .require_git(false)
            .add_custom_ignore_filename(IGNORE_FILENAME)
            .filter_entry(|entry| {
                let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
                !(is_dir
                    && entry.depth() > 0
                    && entry
                        .file_name()
                        .to_str()
                        .is_some_and(|name| SKIPPED_DIRS.contains(&name)))
            })
            .build();

        for entry in walker {
            let entry = entry?;
            if entry.file_type().is_some_and(|t| t.is_file()) && accepts(entry.path()) {
                found.insert(entry.into_path());
            }
        }
    }

    debug!("collected {} file(s)", found.len());
    Ok(found.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, "").unwrap();
    }

    fn names(root: &Path, files: &[PathBuf]) -> Vec<String> {
        files
            .iter()
            .map(|p| {
                p.strip_prefix(root)
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect()
    }

    #[test]
    fn walks_supported_files_and_honours_ignore_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(root, "app/main.py");
        touch(root, "app/util.ts");
        touch(root, "app/README.md");
        touch(root, "app/generated/schema.py");
        touch(root, "web/index.js");
        touch(root, "web/node_modules/dep/index.js");
        touch(root, ".hidden/x.py");
        touch(root, "scratch.py");
        fs::write(root.join(".gitignore"), "scratch.py\n").unwrap();
        fs::write(root.join("app").join(IGNORE_FILENAME), "generated/\n").unwrap();

        let files = collect_files(&[root.to_path_buf()], &[]).unwrap();
        assert_eq!(
            names(root, &files),
            ["app/main.py", "app/util.ts", "web/index.js"]
        );
    }

    #[test]
    fn language_filter_and_explicit_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(root, "a.py");
        touch(root, "b.js");
        touch(root, "notes.txt");

        let files = collect_files(&[root.to_path_buf()], &[Language::Python]).unwrap();
        assert_eq!(names(root, &files), ["a.py"]);

        let explicit = vec![root.join("b.js"), root.join("notes.txt"), root.join("b.js")];
        let files = collect_files(&explicit, &[]).unwrap();
        assert_eq!(names(root, &files), ["b.js"]);
    }

    #[test]
    fn missing_paths_are_errors() {
        let err = collect_files(&[PathBuf::from("/nonexistent/agentspec")], &[]).unwrap_err();
        assert!(matches!(err, Error::Read { .. }));
    }
}
