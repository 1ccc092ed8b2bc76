//! Shared utility functions for the bulk crate.

use anyhow::{Context, Result};
use glob::glob;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Convert a title to a branch-safe slug, limited to `max_len` characters.
pub fn slugify(title: &str, max_len: usize) -> String {
    let slug: String = title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    if slug.len() > max_len {
        slug[..slug.floor_char_boundary(max_len)]
            .trim_end_matches('-')
            .to_string()
    } else {
        slug
    }
}

/// First `len` hex characters of the SHA-256 digest of `data`.
pub fn short_hash(data: &[u8], len: usize) -> String {
    let digest = Sha256::digest(data);
    let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    hex[..len.min(hex.len())].to_string()
}

/// Directory name for a repository's working copy: `owner/name` -> `owner__name`.
///
/// Anything outside `[A-Za-z0-9._-]` is replaced so the result is a single path segment.
pub fn sanitize_repo_dir(full_name: &str) -> String {
    full_name
        .replace('/', "__")
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '-'
            }
        })
        .collect()
}

/// Regular files under `root` matching any of `patterns`, sorted and de-duplicated.
///
/// Patterns are relative to `root`; `**` matches across directories.
pub fn glob_files(root: &Path, patterns: &[String]) -> Result<Vec<PathBuf>> {
    let escaped_root = glob::Pattern::escape(&root.to_string_lossy());
    let mut files = BTreeSet::new();
    for pattern in patterns {
        let full = format!("{}/{}", escaped_root, pattern.trim_start_matches("./"));
        let entries = glob(&full).with_context(|| format!("Invalid glob pattern: {}", pattern))?;
        files.extend(entries.filter_map(|entry| entry.ok()).filter(|p| p.is_file()));
    }
    Ok(files.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_basic() {
        assert_eq!(slugify("Bump setup-node to v4", 40), "bump-setup-node-to-v4");
    }

    #[test]
    fn test_slugify_truncates_without_trailing_dash() {
        let slug = slugify("aaaa bbbb cccc", 5);
        assert_eq!(slug, "aaaa");
    }

    #[test]
    fn test_short_hash_is_stable_and_sized() {
        let a = short_hash(b"playbook", 8);
        let b = short_hash(b"playbook", 8);
        assert_eq!(a, b);
        assert_eq!(a.len(), 8);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, short_hash(b"other playbook", 8));
    }

    #[test]
    fn test_sanitize_repo_dir() {
        assert_eq!(sanitize_repo_dir("octo-org/web.app"), "octo-org__web.app");
        assert_eq!(sanitize_repo_dir("a/b c"), "a__b-c");
    }

    #[test]
    fn test_glob_files_matches_nested_and_dedupes() {
        let dir = tempfile::tempdir().unwrap();
        let wf = dir.path().join(".github/workflows");
        std::fs::create_dir_all(&wf).unwrap();
        std::fs::write(wf.join("ci.yml"), "a").unwrap();
        std::fs::write(wf.join("notes.txt"), "b").unwrap();
        std::fs::create_dir_all(dir.path().join("src/deep")).unwrap();
        std::fs::write(dir.path().join("src/deep/x.yml"), "c").unwrap();

        let files = glob_files(
            dir.path(),
            &[".github/workflows/*.yml".into(), "./.github/**/*.yml".into()],
        )
        .unwrap();
        assert_eq!(files, vec![wf.join("ci.yml")]);

        let all = glob_files(dir.path(), &["**/*.yml".into()]).unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_glob_files_no_match_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(glob_files(dir.path(), &["*.rs".into()]).unwrap().is_empty());
    }
}
