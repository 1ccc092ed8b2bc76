//! Idempotent pull request helper.
//!
//! An existing open PR for the same head/base pair is rewritten in place
//! (title and body always overwritten). Labels and reviewers are only applied
//! when the PR is first opened.

use tracing::info;

use super::RepoHost;
use super::types::NewPullRequest;
use crate::errors::GatewayError;

#[derive(Debug, Clone)]
pub struct PrRequest {
    pub head: String,
    pub base: String,
    pub title: String,
    pub body: String,
    pub labels: Vec<String>,
    pub reviewers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrOutcome {
    pub number: u64,
    pub url: String,
    pub created: bool,
}

/// User reviewers only; `org/team` entries need the team-reviewers API.
pub fn user_reviewers(reviewers: &[String]) -> Vec<String> {
    reviewers
        .iter()
        .map(|r| r.trim())
        .filter(|r| !r.is_empty() && !r.contains('/'))
        .map(str::to_string)
        .collect()
}

pub async fn create_or_update_pr(
    host: &dyn RepoHost,
    owner: &str,
    repo: &str,
    request: &PrRequest,
) -> Result<PrOutcome, GatewayError> {
    let existing = host
        .list_open_pulls(owner, repo, &request.head, &request.base)
        .await?;

    if let Some(pr) = existing.first() {
        let updated = host
            .update_pull(owner, repo, pr.number, &request.title, &request.body)
            .await?;
        info!(repo = %format!("{}/{}", owner, repo), number = updated.number, "Updated pull request");
        return Ok(PrOutcome {
            number: updated.number,
            url: updated.html_url,
            created: false,
        });
    }

    let created = host
        .create_pull(
            owner,
            repo,
            &NewPullRequest {
                title: request.title.clone(),
                body: request.body.clone(),
                head: request.head.clone(),
                base: request.base.clone(),
            },
        )
        .await?;
    info!(repo = %format!("{}/{}", owner, repo), number = created.number, "Opened pull request");

    if !request.labels.is_empty() {
        host.add_labels(owner, repo, created.number, &request.labels)
            .await?;
    }
    let reviewers = user_reviewers(&request.reviewers);
    if !reviewers.is_empty() {
        host.request_reviewers(owner, repo, created.number, &reviewers)
            .await?;
    }

    Ok(PrOutcome {
        number: created.number,
        url: created.html_url,
        created: true,
    })
}
