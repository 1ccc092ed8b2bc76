//! Local working-copy manager.
//!
//! Working copies are acquired lazily: the scheduler only asks for a clone
//! when an operation needs file access. `WorkingCopies` is the seam so the
//! scheduler can be tested without git or network.

pub mod git;

#[cfg(test)]
pub(crate) mod testing;

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::{CommitIdentity, RunConfig};
use crate::errors::WorktreeError;
use crate::github::Repository;
use crate::playbook::DiffPolicy;
use crate::util::sanitize_repo_dir;

#[async_trait]
pub trait WorkingCopies: Send + Sync {
    /// Shallow checkout of the repository's default branch; returns its path.
    async fn clone_repo(&self, repo: &Repository) -> Result<PathBuf, WorktreeError>;

    async fn create_branch(&self, path: &Path, name: &str) -> Result<(), WorktreeError>;

    async fn has_changes(&self, path: &Path) -> Result<bool, WorktreeError>;

    async fn has_meaningful_changes(
        &self,
        path: &Path,
        policy: DiffPolicy,
    ) -> Result<bool, WorktreeError>;

    /// Stage and commit everything; `Ok(None)` when there was nothing to commit.
    async fn commit_all(&self, path: &Path, message: &str)
    -> Result<Option<String>, WorktreeError>;

    /// Push `branch`; `force` is for bot-owned work branches rewritten on every run.
    async fn push(
        &self,
        path: &Path,
        branch: &str,
        repo: &Repository,
        force: bool,
    ) -> Result<(), WorktreeError>;
}

/// `WorkingCopies` backed by git: `<root>/<owner>__<name>` per repository.
#[derive(Debug, Clone)]
pub struct GitWorktrees {
    root: PathBuf,
    git_base: String,
    token: Option<String>,
    identity: CommitIdentity,
}

impl GitWorktrees {
    pub fn new(
        root: impl Into<PathBuf>,
        git_base: impl Into<String>,
        token: Option<String>,
        identity: CommitIdentity,
    ) -> Self {
        Self {
            root: root.into(),
            git_base: git_base.into(),
            token,
            identity,
        }
    }

    pub fn from_config(config: &RunConfig) -> Self {
        Self::new(
            config.work_dir.clone(),
            config.git_base.clone(),
            config.token.clone(),
            config.identity.clone(),
        )
    }

    pub fn path_for(&self, repo: &Repository) -> PathBuf {
        self.root.join(sanitize_repo_dir(&repo.full_name))
    }
}

/// Run a git2 call on a blocking thread. Everything `f` touches must be owned.
async fn blocking<F, R>(f: F) -> Result<R, WorktreeError>
where
    F: FnOnce() -> Result<R, WorktreeError> + Send + 'static,
    R: Send + 'static,
{
    tokio::task::spawn_blocking(f).await?
}

#[async_trait]
impl WorkingCopies for GitWorktrees {
    async fn clone_repo(&self, repo: &Repository) -> Result<PathBuf, WorktreeError> {
        let dest = self.path_for(repo);
        let url = git::remote_url(&self.git_base, &repo.full_name, self.token.as_deref());
        info!(repo = %repo.full_name, branch = %repo.default_branch, "Cloning");
        git::clone_shallow(&url, &repo.default_branch, &dest, self.token.as_deref()).await?;
        Ok(dest)
    }

    async fn create_branch(&self, path: &Path, name: &str) -> Result<(), WorktreeError> {
        git::create_branch(path, name).await
    }

    async fn has_changes(&self, path: &Path) -> Result<bool, WorktreeError> {
        let path = path.to_path_buf();
        blocking(move || git::has_changes(&path)).await
    }

    async fn has_meaningful_changes(
        &self,
        path: &Path,
        policy: DiffPolicy,
    ) -> Result<bool, WorktreeError> {
        let path = path.to_path_buf();
        blocking(move || git::has_meaningful_changes(&path, policy)).await
    }

    async fn commit_all(
        &self,
        path: &Path,
        message: &str,
    ) -> Result<Option<String>, WorktreeError> {
        let path = path.to_path_buf();
        let message = message.to_string();
        let identity = self.identity.clone();
        blocking(move || git::commit_all(&path, &message, &identity)).await
    }

    async fn push(
        &self,
        path: &Path,
        branch: &str,
        repo: &Repository,
        force: bool,
    ) -> Result<(), WorktreeError> {
        git::push(
            path,
            branch,
            &self.git_base,
            self.token.as_deref(),
            &repo.full_name,
            force,
        )
        .await
    }
}
