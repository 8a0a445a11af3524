//! .gitattributes parsing and editing for filter bindings
//!
//! The file format is line-oriented: `<pattern> <attr> [<attr>...]`, with
//! `#` comments and blank lines. We only touch lines binding a pattern to
//! our filter driver (`filter=git-safe`); everything else is preserved
//! byte-for-byte when editing.
//!
//! Pattern matching follows gitignore rules as far as the tool needs them:
//! a pattern without a slash matches the basename in any directory, a
//! pattern with a slash is anchored at the work-tree root, and `**` spans
//! directories.

use glob::{MatchOptions, Pattern};

/// Extract the patterns bound to `filter=<filter_name>`.
pub fn filter_patterns(content: &str, filter_name: &str) -> Vec<String> {
    let wanted = format!("filter={filter_name}");
    let mut patterns = Vec::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut fields = line.split_whitespace();
        let Some(pattern) = fields.next() else {
            continue;
        };
        if fields.any(|attr| attr == wanted) {
            patterns.push(pattern.to_string());
        }
    }

    patterns
}

/// Append filter bindings for any of `patterns` not already bound.
///
/// Returns the updated content and how many lines were added. Existing
/// lines, comments, and ordering are left untouched; additions carry both
/// the filter and diff attributes so textconv diffs work out of the box.
pub fn ensure_patterns(content: &str, patterns: &[String], filter_name: &str) -> (String, usize) {
    let mut bound = filter_patterns(content, filter_name);
    let mut out = content.to_string();
    let mut added = 0;

    for pattern in patterns {
        if bound.iter().any(|p| p == pattern) {
            continue;
        }
        if !out.is_empty() && !out.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(&format!("{pattern} filter={filter_name} diff={filter_name}\n"));
        bound.push(pattern.clone());
        added += 1;
    }

    (out, added)
}

/// Compile attribute patterns, dropping any that are not valid globs.
pub fn compile_patterns(patterns: &[String]) -> Vec<Pattern> {
    patterns
        .iter()
        .filter_map(|p| match Pattern::new(p) {
            Ok(compiled) => Some(compiled),
            Err(e) => {
                tracing::warn!("skipping invalid attribute pattern {p:?}: {e}");
                None
            }
        })
        .collect()
}

/// Does a work-tree-relative path (forward slashes) match any pattern?
pub fn matches_any(path: &str, patterns: &[Pattern]) -> bool {
    patterns.iter().any(|p| pattern_matches(path, p))
}

fn pattern_matches(path: &str, pattern: &Pattern) -> bool {
    let options = MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: false,
    };

    if pattern.as_str().contains('/') {
        // Anchored: match the full path from the work-tree root
        pattern.matches_with(path, options)
    } else {
        // Unanchored: match the basename in any directory
        let basename = path.rsplit('/').next().unwrap_or(path);
        pattern.matches_with(basename, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
# encrypted files
*.secret filter=git-safe diff=git-safe
passwords.txt filter=git-safe
config/*.env filter=git-safe diff=git-safe

# unrelated attributes
*.jpg binary
*.sh text eol=lf
";

    #[test]
    fn test_filter_patterns_parse() {
        let patterns = filter_patterns(SAMPLE, "git-safe");
        assert_eq!(patterns, vec!["*.secret", "passwords.txt", "config/*.env"]);
    }

    #[test]
    fn test_filter_patterns_ignore_other_filters() {
        let content = "*.lfs filter=lfs\n*.secret filter=git-safe\n";
        assert_eq!(filter_patterns(content, "git-safe"), vec!["*.secret"]);
    }

    #[test]
    fn test_filter_patterns_empty_content() {
        assert!(filter_patterns("", "git-safe").is_empty());
        assert!(filter_patterns("# only a comment\n", "git-safe").is_empty());
    }

    #[test]
    fn test_ensure_patterns_appends_missing() {
        let (out, added) = ensure_patterns(
            SAMPLE,
            &["*.secret".to_string(), "secrets/**".to_string()],
            "git-safe",
        );

        assert_eq!(added, 1, "only the missing pattern is added");
        assert!(out.contains("secrets/** filter=git-safe diff=git-safe\n"));
        // Untouched existing content
        assert!(out.contains("*.jpg binary\n"));
        assert!(out.starts_with("# encrypted files\n"));
    }

    #[test]
    fn test_ensure_patterns_noop_when_present() {
        let (out, added) = ensure_patterns(SAMPLE, &["*.secret".to_string()], "git-safe");
        assert_eq!(added, 0);
        assert_eq!(out, SAMPLE);
    }

    #[test]
    fn test_ensure_patterns_on_empty_file() {
        let (out, added) = ensure_patterns("", &["*.secret".to_string()], "git-safe");
        assert_eq!(added, 1);
        assert_eq!(out, "*.secret filter=git-safe diff=git-safe\n");
    }

    #[test]
    fn test_ensure_patterns_collapses_repeated_requests() {
        let (out, added) = ensure_patterns(
            "",
            &["*.secret".to_string(), "*.secret".to_string()],
            "git-safe",
        );

        assert_eq!(added, 1, "a pattern listed twice is bound once");
        assert_eq!(out, "*.secret filter=git-safe diff=git-safe\n");
    }

    #[test]
    fn test_ensure_patterns_adds_trailing_newline_first() {
        let (out, _) = ensure_patterns("*.jpg binary", &["*.secret".to_string()], "git-safe");
        assert_eq!(out, "*.jpg binary\n*.secret filter=git-safe diff=git-safe\n");
    }

    #[test]
    fn test_match_basename_anywhere() {
        let patterns = compile_patterns(&["*.secret".to_string()]);

        assert!(matches_any("api.secret", &patterns));
        assert!(matches_any("deep/nested/dir/api.secret", &patterns));
        assert!(!matches_any("api.secret.bak", &patterns));
    }

    #[test]
    fn test_match_exact_filename() {
        let patterns = compile_patterns(&["passwords.txt".to_string()]);

        assert!(matches_any("passwords.txt", &patterns));
        assert!(matches_any("config/passwords.txt", &patterns));
        assert!(!matches_any("old-passwords.txt", &patterns));
    }

    #[test]
    fn test_match_anchored_directory_pattern() {
        let patterns = compile_patterns(&["config/*.env".to_string()]);

        assert!(matches_any("config/prod.env", &patterns));
        assert!(!matches_any("other/prod.env", &patterns));
        assert!(
            !matches_any("config/sub/prod.env", &patterns),
            "single star must not cross directories"
        );
    }

    #[test]
    fn test_match_double_star() {
        let patterns = compile_patterns(&["secrets/**".to_string()]);

        assert!(matches_any("secrets/token", &patterns));
        assert!(matches_any("secrets/deep/nested/token", &patterns));
        assert!(!matches_any("other/secrets-file", &patterns));
    }

    #[test]
    fn test_invalid_pattern_is_skipped() {
        let patterns = compile_patterns(&["[".to_string(), "*.secret".to_string()]);
        assert_eq!(patterns.len(), 1);
        assert!(matches_any("x.secret", &patterns));
    }
}
