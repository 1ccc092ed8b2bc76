//! `issue.create`: open or refresh a tracking issue, matched by title.
//!
//! Plan lists open issues and compares against the one with the same trimmed
//! title. An identical trimmed body and label set is a noop so re-runs do not
//! re-notify watchers.

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use super::{
    ApplyResult, OpContext, Operation, PlanOutcome, PlanResult, contained_path, optional_string,
    string_list,
};
use crate::errors::OperationError;
use crate::github::{Issue, IssueDraft};
use crate::template::render;

const ACTION_CREATE: &str = "would_create";
const ACTION_UPDATE: &str = "would_update";
const ACTION_NOOP: &str = "noop";

/// Outcome of comparing the desired issue against what is open.
#[derive(Debug)]
enum Matched<'a> {
    Missing,
    Identical(&'a Issue),
    Differs(&'a Issue),
}

fn match_issue<'a>(open: &'a [Issue], draft: &IssueDraft) -> Matched<'a> {
    let title = draft.title.trim();
    let Some(existing) = open.iter().find(|i| i.title.trim() == title) else {
        return Matched::Missing;
    };
    let same_body = existing.body.as_deref().unwrap_or("").trim() == draft.body.trim();
    let want: BTreeSet<&str> = draft.labels.iter().map(String::as_str).collect();
    let have: BTreeSet<&str> = existing.labels.iter().map(|l| l.name.as_str()).collect();
    if same_body && want == have {
        Matched::Identical(existing)
    } else {
        Matched::Differs(existing)
    }
}

/// The template must live inside the working copy.
fn template_path(root: &Path, rel: &str) -> Result<PathBuf, OperationError> {
    contained_path(root, rel).ok_or_else(|| OperationError::InvalidInput {
        field: "template".into(),
        message: format!("`{}` must be a path inside the repository", rel),
    })
}

#[derive(Debug, Default)]
pub struct IssueCreate;

impl IssueCreate {
    /// Render the issue this step wants. `Ok(None)` means a template file must
    /// be read and there is no working copy yet.
    fn draft(&self, ctx: &OpContext<'_>) -> Result<Option<IssueDraft>, OperationError> {
        let template_ctx = ctx.template_context();
        let title = optional_string(ctx.inputs, "title")?
            .filter(|t| !t.trim().is_empty())
            .ok_or(OperationError::MissingInput("title"))?;
        let labels = string_list(ctx.inputs, "labels")?;

        let body_template = match optional_string(ctx.inputs, "template")? {
            Some(rel) => {
                let Some(root) = ctx.worktree else {
                    return Ok(None);
                };
                let path = template_path(root, &rel)?;
                std::fs::read_to_string(&path).map_err(|e| OperationError::InvalidInput {
                    field: "template".into(),
                    message: format!("cannot read {}: {}", rel, e),
                })?
            }
            None => optional_string(ctx.inputs, "body")?.unwrap_or_default(),
        };

        Ok(Some(IssueDraft {
            title: render(&title, &template_ctx),
            body: render(&body_template, &template_ctx),
            labels,
        }))
    }
}

#[async_trait]
impl Operation for IssueCreate {
    fn id(&self) -> &str {
        "issue.create"
    }

    fn describe(&self) -> &str {
        "Create or update an issue matched by title (body from `body` or a repo `template`)"
    }

    fn check_inputs(&self, inputs: &Map<String, Value>) -> Result<(), OperationError> {
        optional_string(inputs, "title")?
            .filter(|t| !t.trim().is_empty())
            .ok_or(OperationError::MissingInput("title"))?;
        string_list(inputs, "labels")?;
        let body = optional_string(inputs, "body")?;
        let template = optional_string(inputs, "template")?;
        if let Some(rel) = &template {
            template_path(Path::new("."), rel)?;
        }
        if body.is_some() && template.is_some() {
            return Err(OperationError::InvalidInput {
                field: "template".into(),
                message: "`body` and `template` are mutually exclusive".into(),
            });
        }
        Ok(())
    }

    async fn plan(&self, ctx: &OpContext<'_>) -> Result<PlanOutcome, OperationError> {
        let Some(draft) = self.draft(ctx)? else {
            return Ok(PlanOutcome::NeedsWorktree);
        };
        let open = ctx
            .host
            .list_open_issues(&ctx.repo.owner, &ctx.repo.name)
            .await?;

        let result = match match_issue(&open, &draft) {
            Matched::Missing => PlanResult::would_apply(json!({
                "action": ACTION_CREATE,
                "title": draft.title,
            })),
            Matched::Identical(issue) => PlanResult::noop(json!({
                "action": ACTION_NOOP,
                "number": issue.number,
                "url": issue.html_url,
            })),
            Matched::Differs(issue) => PlanResult::would_apply(json!({
                "action": ACTION_UPDATE,
                "number": issue.number,
                "url": issue.html_url,
            }))
            .with_message(format!("issue #{} differs", issue.number)),
        };
        Ok(PlanOutcome::Planned(result))
    }

    async fn apply(
        &self,
        ctx: &OpContext<'_>,
        plan: &PlanResult,
    ) -> Result<ApplyResult, OperationError> {
        let draft = self.draft(ctx)?.ok_or_else(|| {
            anyhow::anyhow!("issue template requires a working copy but none was cloned")
        })?;
        let (owner, repo) = (&ctx.repo.owner, &ctx.repo.name);

        let issue = match plan.details.get("action").and_then(Value::as_str) {
            Some(ACTION_CREATE) => ctx.host.create_issue(owner, repo, &draft).await?,
            Some(ACTION_UPDATE) => {
                let number = plan
                    .details
                    .get("number")
                    .and_then(Value::as_u64)
                    .ok_or_else(|| anyhow::anyhow!("plan is missing the issue number"))?;
                ctx.host.update_issue(owner, repo, number, &draft).await?
            }
            _ => return Ok(ApplyResult::noop()),
        };
        Ok(ApplyResult::applied(json!({
            "number": issue.number,
            "url": issue.html_url,
        })))
    }
}
