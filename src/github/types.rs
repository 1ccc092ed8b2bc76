use serde::{Deserialize, Serialize};

/// A target repository, resolved once per run and immutable afterwards.
///
/// Serialized in camelCase because the same shape is handed to script operations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Repository {
    pub owner: String,
    pub name: String,
    pub full_name: String,
    pub default_branch: String,
}

impl Repository {
    pub fn new(owner: &str, name: &str, default_branch: &str) -> Self {
        Self {
            owner: owner.to_string(),
            name: name.to_string(),
            full_name: format!("{}/{}", owner, name),
            default_branch: default_branch.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchResponse {
    pub items: Vec<SearchRepo>,
}

/// A repository item from the search API (subset of fields).
#[derive(Debug, Deserialize)]
pub(crate) struct SearchRepo {
    pub full_name: String,
    pub name: String,
    pub owner: Account,
    pub default_branch: String,
}

impl From<SearchRepo> for Repository {
    fn from(item: SearchRepo) -> Self {
        Self {
            owner: item.owner.login,
            name: item.name,
            full_name: item.full_name,
            default_branch: item.default_branch,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Account {
    pub login: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Label {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BranchRef {
    #[serde(rename = "ref")]
    pub ref_name: String,
}

/// A pull request (subset of fields).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PullRequest {
    pub number: u64,
    pub html_url: String,
    pub title: String,
    pub body: Option<String>,
    pub head: BranchRef,
    pub base: BranchRef,
}

/// Fields for opening a pull request.
#[derive(Debug, Clone, Serialize)]
pub struct NewPullRequest {
    pub title: String,
    pub body: String,
    pub head: String,
    pub base: String,
}

/// An issue (subset of fields).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Issue {
    pub number: u64,
    pub title: String,
    pub body: Option<String>,
    pub state: String,
    pub html_url: String,
    #[serde(default)]
    pub labels: Vec<Label>,
    /// Pull requests also come through the issues endpoint; filter them out.
    #[serde(default, skip_serializing)]
    pub pull_request: Option<serde_json::Value>,
}

impl Issue {
    pub fn label_names(&self) -> Vec<String> {
        self.labels.iter().map(|l| l.name.clone()).collect()
    }
}

/// Title, body and labels for creating or updating an issue.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct IssueDraft {
    pub title: String,
    pub body: String,
    pub labels: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_serializes_camel_case() {
        let repo = Repository::new("octo", "web", "main");
        let json = serde_json::to_value(&repo).unwrap();
        assert_eq!(json["fullName"], "octo/web");
        assert_eq!(json["defaultBranch"], "main");
    }

    #[test]
    fn test_search_repo_into_repository() {
        let json = r#"{
            "full_name": "owner/repo",
            "name": "repo",
            "owner": {"login": "owner"},
            "default_branch": "develop",
            "private": false
        }"#;
        let item: SearchRepo = serde_json::from_str(json).unwrap();
        let repo: Repository = item.into();
        assert_eq!(repo, Repository::new("owner", "repo", "develop"));
    }

    #[test]
    fn test_search_response_reads_items_only() {
        let page: SearchResponse =
            serde_json::from_str(r#"{"incomplete_results": false, "items": []}"#).unwrap();
        assert!(page.items.is_empty());
    }

    #[test]
    fn test_issue_deserialize_with_labels() {
        let json = r#"{
            "number": 42,
            "title": "Bug",
            "body": null,
            "state": "open",
            "html_url": "https://github.com/o/r/issues/42",
            "labels": [{"name": "bug", "color": "red"}]
        }"#;
        let issue: Issue = serde_json::from_str(json).unwrap();
        assert_eq!(issue.label_names(), vec!["bug".to_string()]);
        assert!(issue.pull_request.is_none());
    }

    #[test]
    fn test_pull_request_deserialize_refs() {
        let json = r#"{
            "number": 7,
            "html_url": "https://github.com/o/r/pull/7",
            "title": "t",
            "body": "b",
            "head": {"ref": "bulk/x-1234abcd", "sha": "abc"},
            "base": {"ref": "main"}
        }"#;
        let pr: PullRequest = serde_json::from_str(json).unwrap();
        assert_eq!(pr.head.ref_name, "bulk/x-1234abcd");
        assert_eq!(pr.base.ref_name, "main");
    }
}
