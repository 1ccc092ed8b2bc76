//! `WorkingCopies` double that delegates to git but records every call.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{GitWorktrees, WorkingCopies};
use crate::config::CommitIdentity;
use crate::errors::WorktreeError;
use crate::github::Repository;
use crate::playbook::DiffPolicy;

pub struct RecordingWorktrees {
    inner: GitWorktrees,
    clones: AtomicUsize,
    pushes: Mutex<Vec<(String, String)>>,
}

impl RecordingWorktrees {
    /// Clone from bare remotes under `remote_root` into `work_root`.
    pub fn new(remote_root: &Path, work_root: &Path) -> Self {
        Self {
            inner: GitWorktrees::new(
                work_root,
                format!("file://{}", remote_root.display()),
                None,
                CommitIdentity::default(),
            ),
            clones: AtomicUsize::new(0),
            pushes: Mutex::new(Vec::new()),
        }
    }

    pub fn clone_count(&self) -> usize {
        self.clones.load(Ordering::SeqCst)
    }

    /// `(repo, branch)` pairs pushed so far.
    pub fn pushes(&self) -> Vec<(String, String)> {
        self.pushes.lock().unwrap().clone()
    }
}

#[async_trait]
impl WorkingCopies for RecordingWorktrees {
    async fn clone_repo(&self, repo: &Repository) -> Result<PathBuf, WorktreeError> {
        self.clones.fetch_add(1, Ordering::SeqCst);
        self.inner.clone_repo(repo).await
    }

    async fn create_branch(&self, path: &Path, name: &str) -> Result<(), WorktreeError> {
        self.inner.create_branch(path, name).await
    }

    async fn has_changes(&self, path: &Path) -> Result<bool, WorktreeError> {
        self.inner.has_changes(path).await
    }

    async fn has_meaningful_changes(
        &self,
        path: &Path,
        policy: DiffPolicy,
    ) -> Result<bool, WorktreeError> {
        self.inner.has_meaningful_changes(path, policy).await
    }

    async fn commit_all(
        &self,
        path: &Path,
        message: &str,
    ) -> Result<Option<String>, WorktreeError> {
        self.inner.commit_all(path, message).await
    }

    async fn push(
        &self,
        path: &Path,
        branch: &str,
        repo: &Repository,
        force: bool,
    ) -> Result<(), WorktreeError> {
        self.pushes
            .lock()
            .unwrap()
            .push((repo.full_name.clone(), branch.to_string()));
        self.inner.push(path, branch, repo, force).await
    }
}
