//! In-memory `RepoHost` for unit tests.

use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard};

use super::RepoHost;
use super::types::{BranchRef, Issue, IssueDraft, Label, NewPullRequest, PullRequest, Repository};
use crate::errors::GatewayError;

#[derive(Debug, Default)]
pub struct FakeState {
    pub repos: Vec<Repository>,
    pub pulls: Vec<PullRequest>,
    pub issues: Vec<Issue>,
    pub labels_added: Vec<(u64, Vec<String>)>,
    pub reviewers_requested: Vec<(u64, Vec<String>)>,
    pub search_pages: Vec<u32>,
    pub fail_search: bool,
    pub issue_creates: usize,
    pub issue_updates: usize,
    next_number: u64,
}

#[derive(Debug, Default)]
pub struct FakeHost {
    state: Mutex<FakeState>,
}

fn prefix(owner: &str, repo: &str) -> String {
    format!("https://github.com/{}/{}/", owner, repo)
}

impl FakeHost {
    pub fn with_repos(repos: Vec<Repository>) -> Self {
        let host = Self::default();
        host.state().repos = repos;
        host
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn seed_issue(&self, owner: &str, repo: &str, title: &str, body: &str, labels: &[&str]) -> u64 {
        let mut state = self.state();
        state.next_number += 1;
        let number = state.next_number;
        state.issues.push(Issue {
            number,
            title: title.to_string(),
            body: Some(body.to_string()),
            state: "open".into(),
            html_url: format!("{}issues/{}", prefix(owner, repo), number),
            labels: labels.iter().map(|l| Label { name: l.to_string() }).collect(),
            pull_request: None,
        });
        number
    }
}

#[async_trait]
impl RepoHost for FakeHost {
    async fn search_repositories(
        &self,
        _query: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<Repository>, GatewayError> {
        let mut state = self.state();
        state.search_pages.push(page);
        if state.fail_search {
            return Err(GatewayError::Status {
                status: 422,
                body: "Validation Failed".into(),
            });
        }
        let start = ((page - 1) * per_page) as usize;
        Ok(state
            .repos
            .iter()
            .skip(start)
            .take(per_page as usize)
            .cloned()
            .collect())
    }

    async fn list_open_pulls(
        &self,
        owner: &str,
        repo: &str,
        head: &str,
        base: &str,
    ) -> Result<Vec<PullRequest>, GatewayError> {
        let p = prefix(owner, repo);
        Ok(self
            .state()
            .pulls
            .iter()
            .filter(|pr| {
                pr.html_url.starts_with(&p) && pr.head.ref_name == head && pr.base.ref_name == base
            })
            .cloned()
            .collect())
    }

    async fn create_pull(
        &self,
        owner: &str,
        repo: &str,
        pull: &NewPullRequest,
    ) -> Result<PullRequest, GatewayError> {
        let mut state = self.state();
        state.next_number += 1;
        let pr = PullRequest {
            number: state.next_number,
            html_url: format!("{}pull/{}", prefix(owner, repo), state.next_number),
            title: pull.title.clone(),
            body: Some(pull.body.clone()),
            head: BranchRef {
                ref_name: pull.head.clone(),
            },
            base: BranchRef {
                ref_name: pull.base.clone(),
            },
        };
        state.pulls.push(pr.clone());
        Ok(pr)
    }

    async fn update_pull(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        title: &str,
        body: &str,
    ) -> Result<PullRequest, GatewayError> {
        let p = prefix(owner, repo);
        let mut state = self.state();
        let pr = state
            .pulls
            .iter_mut()
            .find(|pr| pr.number == number && pr.html_url.starts_with(&p))
            .ok_or(GatewayError::Status {
                status: 404,
                body: "Not Found".into(),
            })?;
        pr.title = title.to_string();
        pr.body = Some(body.to_string());
        Ok(pr.clone())
    }

    async fn add_labels(
        &self,
        _owner: &str,
        _repo: &str,
        number: u64,
        labels: &[String],
    ) -> Result<(), GatewayError> {
        self.state().labels_added.push((number, labels.to_vec()));
        Ok(())
    }

    async fn request_reviewers(
        &self,
        _owner: &str,
        _repo: &str,
        number: u64,
        reviewers: &[String],
    ) -> Result<(), GatewayError> {
        self.state()
            .reviewers_requested
            .push((number, reviewers.to_vec()));
        Ok(())
    }

    async fn list_open_issues(&self, owner: &str, repo: &str) -> Result<Vec<Issue>, GatewayError> {
        let p = prefix(owner, repo);
        Ok(self
            .state()
            .issues
            .iter()
            .filter(|i| i.html_url.starts_with(&p) && i.state == "open")
            .cloned()
            .collect())
    }

    async fn create_issue(
        &self,
        owner: &str,
        repo: &str,
        draft: &IssueDraft,
    ) -> Result<Issue, GatewayError> {
        let mut state = self.state();
        state.next_number += 1;
        state.issue_creates += 1;
        let issue = Issue {
            number: state.next_number,
            title: draft.title.clone(),
            body: Some(draft.body.clone()),
            state: "open".into(),
            html_url: format!("{}issues/{}", prefix(owner, repo), state.next_number),
            labels: draft
                .labels
                .iter()
                .map(|l| Label { name: l.clone() })
                .collect(),
            pull_request: None,
        };
        state.issues.push(issue.clone());
        Ok(issue)
    }

    async fn update_issue(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        draft: &IssueDraft,
    ) -> Result<Issue, GatewayError> {
        let p = prefix(owner, repo);
        let mut state = self.state();
        state.issue_updates += 1;
        let issue = state
            .issues
            .iter_mut()
            .find(|i| i.number == number && i.html_url.starts_with(&p))
            .ok_or(GatewayError::Status {
                status: 404,
                body: "Not Found".into(),
            })?;
        issue.title = draft.title.clone();
        issue.body = Some(draft.body.clone());
        issue.labels = draft
            .labels
            .iter()
            .map(|l| Label { name: l.clone() })
            .collect();
        Ok(issue.clone())
    }
}
