//! Remote repository gateway.
//!
//! `RepoHost` is the seam between the engine and the hosting platform:
//! - `GitHubClient`: real implementation over the GitHub REST API, with
//!   automatic rate-limit backoff (see `retry`)
//! - `create_or_update_pr`: idempotent pull request helper built on the trait

mod client;
mod pr;
pub mod retry;
mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{DEFAULT_API_URL, GitHubClient};
pub use pr::{PrOutcome, PrRequest, create_or_update_pr, user_reviewers};
pub use types::{
    Account, BranchRef, Issue, IssueDraft, Label, NewPullRequest, PullRequest, Repository,
};

use crate::errors::GatewayError;
use async_trait::async_trait;

/// Remote hosting API used by the engine. Test double: `testing::FakeHost`.
#[async_trait]
pub trait RepoHost: Send + Sync {
    /// One page of repository search results, most recently updated first.
    async fn search_repositories(
        &self,
        query: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<Repository>, GatewayError>;

    /// Open pull requests from `head` (a branch in `owner/repo`) into `base`.
    async fn list_open_pulls(
        &self,
        owner: &str,
        repo: &str,
        head: &str,
        base: &str,
    ) -> Result<Vec<PullRequest>, GatewayError>;

    async fn create_pull(
        &self,
        owner: &str,
        repo: &str,
        pull: &NewPullRequest,
    ) -> Result<PullRequest, GatewayError>;

    async fn update_pull(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        title: &str,
        body: &str,
    ) -> Result<PullRequest, GatewayError>;

    async fn add_labels(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        labels: &[String],
    ) -> Result<(), GatewayError>;

    async fn request_reviewers(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        reviewers: &[String],
    ) -> Result<(), GatewayError>;

    /// All open issues, pull requests excluded.
    async fn list_open_issues(&self, owner: &str, repo: &str) -> Result<Vec<Issue>, GatewayError>;

    async fn create_issue(
        &self,
        owner: &str,
        repo: &str,
        draft: &IssueDraft,
    ) -> Result<Issue, GatewayError>;

    async fn update_issue(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        draft: &IssueDraft,
    ) -> Result<Issue, GatewayError>;
}
