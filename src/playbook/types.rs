//! Playbook data model as it appears in the YAML file.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;

/// Top-level playbook.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Playbook {
    pub version: u32,
    /// Human-readable name, used for the report header and default branch name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub selector: Selector,
    #[serde(default)]
    pub strategy: Strategy,
    pub ops: Vec<OpStep>,
}

/// Which repositories a run targets.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Selector {
    /// Repository search query (GitHub search syntax)
    pub query: String,
    /// Allow-list of full names; empty means no restriction
    #[serde(default)]
    pub include: Vec<String>,
    /// Full names removed from the result
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Glob patterns; a repository is skipped unless one matches in its working copy
    #[serde(default)]
    pub has_files: Vec<String>,
}

/// How changes land in a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Push a work branch and open or update a pull request
    #[default]
    Pr,
    /// Push straight to the default branch
    Direct,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Pr => write!(f, "pr"),
            Mode::Direct => write!(f, "direct"),
        }
    }
}

impl std::str::FromStr for Mode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pr" => Ok(Mode::Pr),
            "direct" => Ok(Mode::Direct),
            _ => anyhow::bail!("Invalid mode '{}'. Valid values: pr, direct", s),
        }
    }
}

/// Which working-copy differences count as a change worth committing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiffPolicy {
    /// Any byte difference
    #[default]
    Strict,
    /// Ignore line-ending and trailing-whitespace differences
    IgnoreEol,
    /// Additionally ignore indentation and blank-line differences
    IgnoreWhitespace,
}

impl std::fmt::Display for DiffPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiffPolicy::Strict => write!(f, "strict"),
            DiffPolicy::IgnoreEol => write!(f, "ignore-eol"),
            DiffPolicy::IgnoreWhitespace => write!(f, "ignore-whitespace"),
        }
    }
}

impl std::str::FromStr for DiffPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "strict" => Ok(DiffPolicy::Strict),
            "ignore-eol" => Ok(DiffPolicy::IgnoreEol),
            "ignore-whitespace" => Ok(DiffPolicy::IgnoreWhitespace),
            _ => anyhow::bail!(
                "Invalid diff policy '{}'. Valid values: strict, ignore-eol, ignore-whitespace",
                s
            ),
        }
    }
}

/// Execution strategy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Strategy {
    #[serde(default)]
    pub mode: Mode,
    /// Plan only: report what would change, never push or call write APIs
    #[serde(default = "default_plan")]
    pub plan: bool,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default, rename = "failFast")]
    pub fail_fast: bool,
    #[serde(default, rename = "diffPolicy")]
    pub diff_policy: DiffPolicy,
    #[serde(default)]
    pub pr: PrStrategy,
}

fn default_plan() -> bool {
    true
}

fn default_concurrency() -> usize {
    4
}

impl Default for Strategy {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            plan: default_plan(),
            concurrency: default_concurrency(),
            fail_fast: false,
            diff_policy: DiffPolicy::default(),
            pr: PrStrategy::default(),
        }
    }
}

/// Pull request settings shared by every repository.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PrStrategy {
    /// Base name of the work branch; the playbook hash is appended
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub reviewers: Vec<String>,
    #[serde(default, rename = "bodyTemplate", skip_serializing_if = "Option::is_none")]
    pub body_template: Option<String>,
    #[serde(
        default,
        rename = "bodyTemplatePath",
        skip_serializing_if = "Option::is_none"
    )]
    pub body_template_path: Option<PathBuf>,
}

/// One entry of `ops`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct OpStep {
    /// Built-in operation id or script path
    #[serde(rename = "use")]
    pub uses: String,
    #[serde(default)]
    pub with: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pr: Option<StepPr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue: Option<StepIssue>,
}

/// Per-step fragment appended to the pull request body.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct StepPr {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

/// Per-step issue defaults, used where the step's inputs leave them out.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct StepIssue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
}

impl OpStep {
    /// The step's inputs with any `issue:` defaults filled in.
    pub fn effective_inputs(&self) -> Map<String, Value> {
        let mut inputs = self.with.clone();
        if let Some(issue) = &self.issue {
            if let Some(title) = &issue.title {
                inputs
                    .entry("title")
                    .or_insert_with(|| Value::String(title.clone()));
            }
            if let Some(body) = &issue.body
                && !inputs.contains_key("template")
            {
                inputs
                    .entry("body")
                    .or_insert_with(|| Value::String(body.clone()));
            }
            if let Some(labels) = &issue.labels {
                inputs.entry("labels").or_insert_with(|| {
                    Value::Array(labels.iter().cloned().map(Value::String).collect())
                });
            }
        }
        inputs
    }
}
