use async_trait::async_trait;
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, warn};

use super::RepoHost;
use super::retry::{self, RateLimitKind, RetryPolicy};
use super::types::{
    Issue, IssueDraft, NewPullRequest, PullRequest, Repository, SearchResponse,
};
use crate::errors::GatewayError;

pub const DEFAULT_API_URL: &str = "https://api.github.com";
const USER_AGENT: &str = "bulk-orchestrator";
const PAGE_SIZE: u32 = 100;

/// GitHub REST client. Every call goes through the rate-limit retry loop.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    api_base: String,
    token: Option<String>,
    retry: RetryPolicy,
}

impl GitHubClient {
    pub fn new(api_base: impl Into<String>, token: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        let builder = builder
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", USER_AGENT)
            .header("X-GitHub-Api-Version", "2022-11-28");
        match &self.token {
            Some(token) => builder.header("Authorization", format!("Bearer {}", token)),
            None => builder,
        }
    }

    /// Send a request, retrying on rate-limit responses.
    ///
    /// `make` rebuilds the request for each attempt.
    async fn execute<F>(&self, make: F) -> Result<Response, GatewayError>
    where
        F: Fn() -> RequestBuilder + Send + Sync,
    {
        let mut primary = 0u32;
        let mut secondary = 0u32;

        loop {
            let resp = self.authorize(make()).send().await?;
            let status = resp.status();
            if status.is_success() {
                return Ok(resp);
            }

            let headers = resp.headers().clone();
            let body = resp.text().await.unwrap_or_default();
            let now = chrono::Utc::now().timestamp().max(0) as u64;

            let Some(limit) =
                retry::classify(status, &headers, &body, now, self.retry.fallback_delay)
            else {
                return Err(GatewayError::Status {
                    status: status.as_u16(),
                    body,
                });
            };

            let attempts = match limit.kind {
                RateLimitKind::Primary => &mut primary,
                RateLimitKind::Secondary => &mut secondary,
            };
            if *attempts >= self.retry.max_retries(limit.kind) {
                return Err(GatewayError::RateLimited {
                    retries: *attempts,
                    body,
                });
            }
            *attempts += 1;

            let delay = self.retry.clamp(limit.delay);
            warn!(
                kind = ?limit.kind,
                attempt = *attempts,
                delay_secs = delay.as_secs(),
                "GitHub rate limit hit, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn fetch<T, F>(&self, make: F) -> Result<T, GatewayError>
    where
        T: DeserializeOwned,
        F: Fn() -> RequestBuilder + Send + Sync,
    {
        let resp = self.execute(make).await?;
        let text = resp.text().await?;
        serde_json::from_str(&text).map_err(|e| GatewayError::Decode(e.to_string()))
    }
}

#[async_trait]
impl RepoHost for GitHubClient {
    async fn search_repositories(
        &self,
        query: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<Repository>, GatewayError> {
        debug!(query, page, "Searching repositories");
        let url = self.url("/search/repositories");
        let page = page.to_string();
        let per_page = per_page.to_string();
        let resp: SearchResponse = self
            .fetch(|| {
                self.http.get(&url).query(&[
                    ("q", query),
                    ("sort", "updated"),
                    ("order", "desc"),
                    ("per_page", per_page.as_str()),
                    ("page", page.as_str()),
                ])
            })
            .await?;
        Ok(resp.items.into_iter().map(Repository::from).collect())
    }

    async fn list_open_pulls(
        &self,
        owner: &str,
        repo: &str,
        head: &str,
        base: &str,
    ) -> Result<Vec<PullRequest>, GatewayError> {
        let url = self.url(&format!("/repos/{}/{}/pulls", owner, repo));
        let head = format!("{}:{}", owner, head);
        self.fetch(|| {
            self.http.get(&url).query(&[
                ("state", "open"),
                ("head", head.as_str()),
                ("base", base),
                ("per_page", "100"),
            ])
        })
        .await
    }

    async fn create_pull(
        &self,
        owner: &str,
        repo: &str,
        pull: &NewPullRequest,
    ) -> Result<PullRequest, GatewayError> {
        let url = self.url(&format!("/repos/{}/{}/pulls", owner, repo));
        self.fetch(|| self.http.post(&url).json(pull)).await
    }

    async fn update_pull(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        title: &str,
        body: &str,
    ) -> Result<PullRequest, GatewayError> {
        let url = self.url(&format!("/repos/{}/{}/pulls/{}", owner, repo, number));
        let payload = json!({ "title": title, "body": body });
        self.fetch(|| self.http.patch(&url).json(&payload)).await
    }

    async fn add_labels(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        labels: &[String],
    ) -> Result<(), GatewayError> {
        let url = self.url(&format!("/repos/{}/{}/issues/{}/labels", owner, repo, number));
        let payload = json!({ "labels": labels });
        self.execute(|| self.http.post(&url).json(&payload)).await?;
        Ok(())
    }

    async fn request_reviewers(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        reviewers: &[String],
    ) -> Result<(), GatewayError> {
        let url = self.url(&format!(
            "/repos/{}/{}/pulls/{}/requested_reviewers",
            owner, repo, number
        ));
        let payload = json!({ "reviewers": reviewers });
        self.execute(|| self.http.post(&url).json(&payload)).await?;
        Ok(())
    }

    async fn list_open_issues(&self, owner: &str, repo: &str) -> Result<Vec<Issue>, GatewayError> {
        let url = self.url(&format!("/repos/{}/{}/issues", owner, repo));
        let mut all_issues = Vec::new();
        let mut page = 1u32;

        loop {
            let page_str = page.to_string();
            let batch: Vec<Issue> = self
                .fetch(|| {
                    self.http.get(&url).query(&[
                        ("state", "open"),
                        ("per_page", "100"),
                        ("page", page_str.as_str()),
                    ])
                })
                .await?;

            let count = batch.len();
            all_issues.extend(batch.into_iter().filter(|i| i.pull_request.is_none()));

            if count < PAGE_SIZE as usize {
                break;
            }
            page += 1;
        }

        Ok(all_issues)
    }

    async fn create_issue(
        &self,
        owner: &str,
        repo: &str,
        draft: &IssueDraft,
    ) -> Result<Issue, GatewayError> {
        let url = self.url(&format!("/repos/{}/{}/issues", owner, repo));
        self.fetch(|| self.http.post(&url).json(draft)).await
    }

    async fn update_issue(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        draft: &IssueDraft,
    ) -> Result<Issue, GatewayError> {
        let url = self.url(&format!("/repos/{}/{}/issues/{}", owner, repo, number));
        self.fetch(|| self.http.patch(&url).json(draft)).await
    }
}
