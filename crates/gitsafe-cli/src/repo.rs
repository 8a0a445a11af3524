//! Git plumbing via the git CLI
//!
//! Everything goes through `std::process::Command` rather than a libgit2
//! binding: the filters are installed into git's own config and the tool
//! must see exactly the repository state git sees.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::Output;

/// Handle to the enclosing repository.
pub struct GitRepo {
    pub git_dir: PathBuf,
    pub work_tree: PathBuf,
}

impl GitRepo {
    /// Locate the repository containing the current directory by asking
    /// git itself.
    pub fn discover() -> Result<Self> {
        let top = git_stdout(None, &["rev-parse", "--show-toplevel"])?;
        let work_tree = PathBuf::from(top.trim_end());

        let raw = git_stdout(Some(&work_tree), &["rev-parse", "--git-dir"])?;
        let raw = raw.trim_end();
        let git_dir = if Path::new(raw).is_absolute() {
            PathBuf::from(raw)
        } else {
            work_tree.join(raw)
        };

        Ok(Self { git_dir, work_tree })
    }

    pub fn config_set(&self, key: &str, value: &str) -> Result<()> {
        git_stdout(Some(&self.work_tree), &["config", key, value]).map(|_| ())
    }

    pub fn config_get(&self, key: &str) -> Option<String> {
        git_stdout(Some(&self.work_tree), &["config", "--get", key])
            .ok()
            .map(|v| v.trim_end().to_string())
    }

    /// Unset a config key, tolerating it not being set (exit code 5).
    pub fn config_unset(&self, key: &str) -> Result<()> {
        let output = git_output(Some(&self.work_tree), &["config", "--unset", key])?;
        if !output.status.success() && output.status.code() != Some(5) {
            anyhow::bail!(
                "git config --unset {key} failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(())
    }

    /// Tracked files, work-tree relative with forward slashes.
    pub fn tracked_files(&self) -> Result<Vec<String>> {
        let out = git_stdout(Some(&self.work_tree), &["ls-files", "-z"])?;
        Ok(parse_zero_separated(&out))
    }

    /// `git status --porcelain -z` entries as (code, path) pairs.
    pub fn status_porcelain(&self) -> Result<Vec<(String, String)>> {
        let out = git_stdout(Some(&self.work_tree), &["status", "--porcelain", "-z"])?;
        Ok(parse_porcelain(&out))
    }

    /// Check out paths from the index, re-running any configured filters.
    pub fn checkout_paths(&self, paths: &[String]) -> Result<()> {
        if paths.is_empty() {
            return Ok(());
        }
        let mut args: Vec<&str> = vec!["checkout", "--"];
        args.extend(paths.iter().map(|s| s.as_str()));
        git_stdout(Some(&self.work_tree), &args).map(|_| ())
    }
}

fn git_output(cwd: Option<&Path>, args: &[&str]) -> Result<Output> {
    let mut cmd = std::process::Command::new("git");
    cmd.args(args);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    cmd.output()
        .with_context(|| format!("running git {}", args.join(" ")))
}

fn git_stdout(cwd: Option<&Path>, args: &[&str]) -> Result<String> {
    let output = git_output(cwd, args)?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("git {} failed: {}", args.join(" "), stderr.trim());
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn parse_zero_separated(out: &str) -> Vec<String> {
    out.split('\0')
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

/// Parse `--porcelain -z` records. Paths are literal in this format (no
/// C-quoting to undo); rename and copy records carry the origin path as one
/// extra NUL field.
fn parse_porcelain(out: &str) -> Vec<(String, String)> {
    let mut entries = Vec::new();
    let mut fields = out.split('\0').filter(|f| !f.is_empty());
    while let Some(record) = fields.next() {
        // A record is two status bytes, a space, and the path.
        if record.len() < 4 || record.as_bytes()[2] != b' ' {
            continue;
        }
        let (code, rest) = record.split_at(2);
        if code.contains('R') || code.contains('C') {
            fields.next();
        }
        entries.push((code.trim().to_string(), rest[1..].to_string()));
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_zero_separated() {
        let out = "a.txt\0dir/b.secret\0c\0";
        assert_eq!(parse_zero_separated(out), vec!["a.txt", "dir/b.secret", "c"]);
        assert!(parse_zero_separated("").is_empty());
    }

    #[test]
    fn test_parse_porcelain() {
        let out = " M config/prod.env\0?? notes.txt\0A  api.secret\0";
        let entries = parse_porcelain(out);

        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0], ("M".to_string(), "config/prod.env".to_string()));
        assert_eq!(entries[1], ("??".to_string(), "notes.txt".to_string()));
        assert_eq!(entries[2], ("A".to_string(), "api.secret".to_string()));
    }

    #[test]
    fn test_parse_porcelain_keeps_special_paths_literal() {
        let entries = parse_porcelain("?? caf\u{e9} \"rapport\".env\0");
        assert_eq!(entries[0].1, "caf\u{e9} \"rapport\".env");
    }

    #[test]
    fn test_parse_porcelain_rename_keeps_destination() {
        let out = "R  renamed.secret\0original.secret\0 M other.txt\0";
        let entries = parse_porcelain(out);

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], ("R".to_string(), "renamed.secret".to_string()));
        assert_eq!(entries[1], ("M".to_string(), "other.txt".to_string()));
    }
}
