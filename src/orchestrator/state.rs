use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::fmt;

use crate::github::Repository;

/// Terminal state of one repository's pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RepoStatus {
    Ok,
    Skipped,
    Error,
}

impl fmt::Display for RepoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepoStatus::Ok => write!(f, "ok"),
            RepoStatus::Skipped => write!(f, "skipped"),
            RepoStatus::Error => write!(f, "error"),
        }
    }
}

/// What happened to the working copy, derived after all steps ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeStatus {
    NoChanges,
    WouldApply,
    Applied,
    /// Changes exist but none survive the named diff policy.
    Skipped(String),
}

impl fmt::Display for ChangeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeStatus::NoChanges => write!(f, "no changes"),
            ChangeStatus::WouldApply => write!(f, "would apply"),
            ChangeStatus::Applied => write!(f, "applied"),
            ChangeStatus::Skipped(policy) => write!(f, "skipped({})", policy),
        }
    }
}

impl Serialize for ChangeStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// The one record each repository produces per run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeRecord {
    pub repo: String,
    /// Operation ids in playbook order, comma-separated
    pub op: String,
    pub status: RepoStatus,
    pub change: ChangeStatus,
    pub changed_files: usize,
    pub pr_url: Option<String>,
    pub issue_url: Option<String>,
    pub notes: Vec<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rows: Vec<Value>,
}

impl OutcomeRecord {
    pub fn new(repo: &Repository, op: &str) -> Self {
        Self {
            repo: repo.full_name.clone(),
            op: op.to_string(),
            status: RepoStatus::Ok,
            change: ChangeStatus::NoChanges,
            changed_files: 0,
            pr_url: None,
            issue_url: None,
            notes: Vec::new(),
            timestamp: Utc::now(),
            rows: Vec::new(),
        }
    }

    pub fn note(&mut self, note: impl Into<String>) {
        self.notes.push(note.into());
    }

    /// Mark failed; the message becomes the last note.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.status = RepoStatus::Error;
        self.note(message);
    }

    pub fn skip(&mut self, reason: impl Into<String>) {
        self.status = RepoStatus::Skipped;
        self.note(reason);
    }

    pub fn is_error(&self) -> bool {
        self.status == RepoStatus::Error
    }

    /// Notes joined for single-line outputs.
    pub fn notes_line(&self) -> String {
        self.notes.join("; ")
    }
}

/// Final tally of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl RunSummary {
    pub fn add(&mut self, record: &OutcomeRecord) {
        self.total += 1;
        match record.status {
            RepoStatus::Ok => self.success += 1,
            RepoStatus::Error => self.failed += 1,
            RepoStatus::Skipped => self.skipped += 1,
        }
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}
