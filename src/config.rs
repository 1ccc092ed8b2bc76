use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::github::DEFAULT_API_URL;

pub const DEFAULT_GIT_BASE: &str = "https://github.com";
const DEFAULT_GIT_NAME: &str = "bulk-bot";
const DEFAULT_GIT_EMAIL: &str = "bulk-bot@users.noreply.github.com";

/// Author/committer used for bulk commits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitIdentity {
    pub name: String,
    pub email: String,
}

impl Default for CommitIdentity {
    fn default() -> Self {
        Self {
            name: DEFAULT_GIT_NAME.to_string(),
            email: DEFAULT_GIT_EMAIL.to_string(),
        }
    }
}

/// Runtime configuration for a run.
///
/// The playbook says *what* to do; this says *where* and *as whom*:
/// credentials, API endpoint, clone remote, and local directories.
/// Values come from the environment (after `.env` is loaded) with CLI
/// overrides applied by the caller.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// API token (`GITHUB_TOKEN`, falling back to `GH_TOKEN`)
    pub token: Option<String>,
    /// REST API base (`GITHUB_API_URL`)
    pub api_url: String,
    /// Clone remote base (`BULK_GIT_BASE`); `<base>/<owner>/<name>.git`
    pub git_base: String,
    /// Where report files are written
    pub out_dir: PathBuf,
    /// Where working copies are cloned (`BULK_WORKDIR`, default `<out_dir>/work`)
    pub work_dir: PathBuf,
    pub identity: CommitIdentity,
}

impl RunConfig {
    /// Build from process environment.
    pub fn from_env(out_dir: &Path) -> Self {
        Self::from_lookup(out_dir, |key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(out_dir: &Path, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let token = get("GITHUB_TOKEN").or_else(|| get("GH_TOKEN"));
        let api_url = get("GITHUB_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let git_base = get("BULK_GIT_BASE").unwrap_or_else(|| DEFAULT_GIT_BASE.to_string());
        let work_dir = get("BULK_WORKDIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| out_dir.join("work"));
        let defaults = CommitIdentity::default();
        let identity = CommitIdentity {
            name: get("BULK_GIT_NAME").unwrap_or(defaults.name),
            email: get("BULK_GIT_EMAIL").unwrap_or(defaults.email),
        };

        Self {
            token,
            api_url,
            git_base: git_base.trim_end_matches('/').to_string(),
            out_dir: out_dir.to_path_buf(),
            work_dir,
            identity,
        }
    }

    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.out_dir).context("Failed to create output directory")?;
        std::fs::create_dir_all(&self.work_dir)
            .context("Failed to create working-copy directory")?;
        Ok(())
    }
}
