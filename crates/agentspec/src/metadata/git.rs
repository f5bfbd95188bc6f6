//! Changelog entries from git history.
//!
//! Symbol history comes from `git log -L <start>,<end>:<file>`, which
//! follows the line range through earlier revisions. When that fails
//! (untracked file, no repository, git not installed) the file-level log is
//! used instead, and when that fails too the changelog is empty.

use std::path::Path;

use chrono::NaiveDate;
use tokio::process::Command;
use tracing::debug;

use super::ChangelogEntry;
use crate::{Error, Result};

/// Field separator in the `--format` string (ASCII unit separator).
const SEP: char = '\u{1f}';
const FORMAT: &str = "--format=%x1f%h%x1f%ad%x1f%s";

/// Recent commits touching lines `start..=end` (1-based) of `path`.
pub async fn changelog(path: &Path, start: usize, end: usize, limit: usize) -> Vec<ChangelogEntry> {
    let (workdir, file) = split_path(path);

    let range = format!("-L{start},{end}:{file}");
    let limit_arg = format!("-n{limit}");
    let line_log = run_git(
        &workdir,
        &["log", "-s", "--date=short", FORMAT, &limit_arg, &range],
    )
    .await;

    let entries = match line_log {
        Ok(out) => parse_log(&out),
        Err(e) => {
            debug!("line history unavailable for {}: {e}", path.display());
            match run_git(
                &workdir,
                &["log", "--follow", "--date=short", FORMAT, &limit_arg, "--", &file],
            )
            .await
            {
                Ok(out) => parse_log(&out),
                Err(e) => {
                    debug!("file history unavailable for {}: {e}", path.display());
                    Vec::new()
                }
            }
        }
    };

    entries.into_iter().take(limit).collect()
}

fn split_path(path: &Path) -> (String, String) {
    let workdir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| ".".to_string(), |p| p.to_string_lossy().into_owned());
    let file = path
        .file_name()
        .map_or_else(String::new, |f| f.to_string_lossy().into_owned());
    (workdir, file)
}

/// Run a git command in `workdir`, returning stdout on success.
async fn run_git(workdir: &str, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(workdir)
        .output()
        .await
        .map_err(|e| Error::Git(format!("failed to run git: {e}")))?;

    if !output.status.success() {
        let code = output.status.code().unwrap_or(-1);
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::Git(format!("exit {code}: {}", stderr.trim())));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Parse output produced with [`FORMAT`]. Lines that do not start with the
/// separator (patch text, blank lines) are skipped.
pub fn parse_log(output: &str) -> Vec<ChangelogEntry> {
    output
        .lines()
        .filter_map(|line| {
            let rest = line.strip_prefix(SEP)?;
            let mut fields = rest.splitn(3, SEP);
            let hash = fields.next()?.trim();
            let date = NaiveDate::parse_from_str(fields.next()?.trim(), "%Y-%m-%d").ok()?;
            let subject = fields.next().unwrap_or("").trim();
            if hash.is_empty() {
                return None;
            }
            Some(ChangelogEntry {
                date,
                hash: hash.to_string(),
                subject: subject.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_log_reads_formatted_lines() {
        let out = "\u{1f}9f3c2e1\u{1f}2025-03-02\u{1f}Split capture from authorize\n\
                   \n\
                   diff --git a/x.py b/x.py\n\
                   \u{1f}1a2b3c4\u{1f}2024-12-31\u{1f}Initial version\n";
        let entries = parse_log(out);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].hash, "9f3c2e1");
        assert_eq!(entries[0].subject, "Split capture from authorize");
        assert_eq!(entries[1].date, NaiveDate::from_ymd_opt(2024, 12, 31).unwrap());
    }

    #[test]
    fn parse_log_skips_bad_dates() {
        let out = "\u{1f}abc\u{1f}yesterday\u{1f}nope\n";
        assert!(parse_log(out).is_empty());
    }

    #[test]
    fn split_path_defaults_to_current_dir() {
        assert_eq!(
            split_path(Path::new("main.py")),
            (".".to_string(), "main.py".to_string())
        );
        assert_eq!(
            split_path(Path::new("src/pkg/mod.py")),
            ("src/pkg".to_string(), "mod.py".to_string())
        );
    }

    #[tokio::test]
    async fn outside_a_repository_the_changelog_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("loose.py");
        std::fs::write(&path, "def f():\n    pass\n").unwrap();
        assert!(changelog(&path, 1, 2, 5).await.is_empty());
    }
}
