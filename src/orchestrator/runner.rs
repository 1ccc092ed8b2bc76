//! Per-repository pipeline.
//!
//! `start -> steps -> has_files check (on first clone) -> change evaluation -> commit/push/PR -> record`
//!
//! Every call to [`RepoRunner::run`] yields exactly one [`OutcomeRecord`];
//! anything that goes wrong inside the pipeline is folded into an `error` record.

use anyhow::{Context, Result, anyhow};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::state::{ChangeStatus, OutcomeRecord};
use crate::errors::PlaybookError;
use crate::github::{PrRequest, RepoHost, Repository, create_or_update_pr};
use crate::ops::{
    ApplyStatus, OpContext, Operation, OperationRegistry, PlanOutcome, PlanResult, PlanStatus,
    run_apply, run_plan,
};
use crate::playbook::{DiffPolicy, Mode, OpStep, Playbook};
use crate::selector;
use crate::template::{context, render};
use crate::worktree::WorkingCopies;

/// Strategy after CLI overrides, fixed for the run.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub plan_only: bool,
    pub mode: Mode,
    pub diff_policy: DiffPolicy,
    pub concurrency: usize,
    pub fail_fast: bool,
}

impl RunSettings {
    pub fn from_playbook(playbook: &Playbook) -> Self {
        let strategy = &playbook.strategy;
        Self {
            plan_only: strategy.plan,
            mode: strategy.mode,
            diff_policy: strategy.diff_policy,
            concurrency: strategy.concurrency.max(1),
            fail_fast: strategy.fail_fast,
        }
    }

    pub fn phase(&self) -> &'static str {
        if self.plan_only { "plan" } else { "apply" }
    }
}

/// A playbook step with its operation resolved and inputs merged.
struct Step {
    id: String,
    op: Arc<dyn Operation>,
    inputs: Map<String, Value>,
    pr_fragment: Option<String>,
}

/// Runs one repository at a time through the playbook's steps.
pub struct RepoRunner {
    playbook: Arc<Playbook>,
    settings: RunSettings,
    steps: Vec<Step>,
    host: Arc<dyn RepoHost>,
    worktrees: Arc<dyn WorkingCopies>,
    branch: String,
    op_label: String,
}

impl RepoRunner {
    pub fn new(
        playbook: Arc<Playbook>,
        settings: RunSettings,
        registry: &OperationRegistry,
        host: Arc<dyn RepoHost>,
        worktrees: Arc<dyn WorkingCopies>,
    ) -> Result<Self, PlaybookError> {
        let steps = playbook
            .ops
            .iter()
            .enumerate()
            .map(|(index, step)| resolve_step(registry, index, step))
            .collect::<Result<Vec<_>, _>>()?;
        let branch = playbook.work_branch();
        let op_label = playbook.op_ids().join(",");
        Ok(Self {
            playbook,
            settings,
            steps,
            host,
            worktrees,
            branch,
            op_label,
        })
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    /// Run the full pipeline for `repo`. Never fails; errors land in the record.
    pub async fn run(&self, repo: &Repository) -> OutcomeRecord {
        let mut record = OutcomeRecord::new(repo, &self.op_label);
        if let Err(e) = self.pipeline(repo, &mut record).await {
            warn!(repo = %repo.full_name, error = %format!("{:#}", e), "Repository failed");
            record.fail(format!("{:#}", e));
        }
        record
    }

    async fn pipeline(&self, repo: &Repository, record: &mut OutcomeRecord) -> Result<()> {
        let mut worktree: Option<PathBuf> = None;
        let mut fragments: Vec<String> = Vec::new();
        // A step without file changes would act through the API (issue, ...)
        let mut remote_change = false;

        for step in &self.steps {
            let mut outcome = self.plan_step(step, repo, worktree.as_deref()).await;

            if outcome == PlanOutcome::NeedsWorktree && worktree.is_none() {
                let path = self
                    .worktrees
                    .clone_repo(repo)
                    .await
                    .context("Clone failed")?;
                if !selector::has_files(&path, &self.playbook.selector.has_files)? {
                    info!(repo = %repo.full_name, "No file matches has_files; skipping");
                    record.skip("has_files: no matching files");
                    return Ok(());
                }
                worktree = Some(path);
                outcome = self.plan_step(step, repo, worktree.as_deref()).await;
            }

            let plan = match outcome {
                PlanOutcome::Planned(plan) => plan,
                PlanOutcome::NeedsWorktree => {
                    return Err(anyhow!(
                        "{}: still needs a working copy after cloning",
                        step.id
                    ));
                }
            };
            self.absorb_plan(step, &plan, record);

            if plan.status == PlanStatus::Error {
                record.fail(format!(
                    "{}: {}",
                    step.id,
                    plan.message.as_deref().unwrap_or("plan failed")
                ));
                return Ok(());
            }
            if plan.status == PlanStatus::Noop {
                continue;
            }
            remote_change |= plan.details.get("changedFiles").is_none();
            if let Some(fragment) = &step.pr_fragment {
                let ctx = context(repo, &step.inputs, self.playbook.display_name(), &self.branch);
                fragments.push(format!("### {}\n\n{}", step.id, render(fragment, &ctx).trim()));
            }

            if !self.settings.plan_only {
                let ctx = self.op_context(step, repo, worktree.as_deref());
                let applied = run_apply(step.op.as_ref(), &ctx, &plan).await;
                if applied.status == ApplyStatus::Error {
                    record.fail(format!(
                        "{}: {}",
                        step.id,
                        applied.message.as_deref().unwrap_or("apply failed")
                    ));
                    return Ok(());
                }
                if let Some(url) = applied.details.get("url").and_then(Value::as_str) {
                    record.issue_url = Some(url.to_string());
                }
            }
        }

        if let Some(path) = worktree {
            self.finish_changes(repo, &path, &fragments, record).await?;
        }
        if remote_change && record.change == ChangeStatus::NoChanges {
            record.change = if self.settings.plan_only {
                ChangeStatus::WouldApply
            } else {
                ChangeStatus::Applied
            };
        }
        Ok(())
    }

    async fn plan_step(
        &self,
        step: &Step,
        repo: &Repository,
        worktree: Option<&Path>,
    ) -> PlanOutcome {
        let ctx = self.op_context(step, repo, worktree);
        debug!(repo = %repo.full_name, op = %step.id, "Planning");
        run_plan(step.op.as_ref(), &ctx).await
    }

    fn op_context<'a>(
        &'a self,
        step: &'a Step,
        repo: &'a Repository,
        worktree: Option<&'a Path>,
    ) -> OpContext<'a> {
        OpContext {
            repo,
            inputs: &step.inputs,
            worktree,
            host: self.host.as_ref(),
            playbook_name: self.playbook.display_name(),
            branch: &self.branch,
        }
    }

    fn absorb_plan(&self, step: &Step, plan: &PlanResult, record: &mut OutcomeRecord) {
        if let Some(n) = plan.details.get("changedFiles").and_then(Value::as_u64) {
            record.changed_files += n as usize;
        }
        if let Some(url) = plan.details.get("url").and_then(Value::as_str) {
            record.issue_url = Some(url.to_string());
        }
        if plan.status == PlanStatus::WouldApply {
            let what = plan
                .details
                .get("action")
                .and_then(Value::as_str)
                .unwrap_or("would_apply");
            match &plan.message {
                Some(message) => record.note(format!("{}: {} ({})", step.id, what, message)),
                None => record.note(format!("{}: {}", step.id, what)),
            }
        }
        record.notes.extend(plan.notes.iter().cloned());
        record.rows.extend(plan.rows.iter().cloned());
    }

    /// Decide and perform the commit/push/PR for a repository with a working copy.
    async fn finish_changes(
        &self,
        repo: &Repository,
        path: &Path,
        fragments: &[String],
        record: &mut OutcomeRecord,
    ) -> Result<()> {
        let policy = self.settings.diff_policy;
        if !self.worktrees.has_changes(path).await? {
            record.change = ChangeStatus::NoChanges;
            return Ok(());
        }
        if !self.worktrees.has_meaningful_changes(path, policy).await? {
            record.change = ChangeStatus::Skipped(policy.to_string());
            return Ok(());
        }
        if self.settings.plan_only {
            record.change = ChangeStatus::WouldApply;
            return Ok(());
        }

        let title = self.playbook.pr_title();
        let (target, force) = match self.settings.mode {
            Mode::Pr => {
                self.worktrees.create_branch(path, &self.branch).await?;
                (self.branch.clone(), true)
            }
            Mode::Direct => (repo.default_branch.clone(), false),
        };
        let Some(commit) = self.worktrees.commit_all(path, &title).await? else {
            record.change = ChangeStatus::NoChanges;
            return Ok(());
        };
        self.worktrees
            .push(path, &target, repo, force)
            .await
            .with_context(|| format!("Push to {} failed", target))?;
        info!(repo = %repo.full_name, branch = %target, commit = %commit, "Pushed");

        if self.settings.mode == Mode::Pr {
            let strategy = &self.playbook.strategy.pr;
            let request = PrRequest {
                head: self.branch.clone(),
                base: repo.default_branch.clone(),
                title,
                body: self.pr_body(repo, fragments),
                labels: strategy.labels.clone(),
                reviewers: strategy.reviewers.clone(),
            };
            let pr = create_or_update_pr(self.host.as_ref(), &repo.owner, &repo.name, &request)
                .await
                .context("Pull request failed")?;
            record.pr_url = Some(pr.url);
        }
        record.change = ChangeStatus::Applied;
        Ok(())
    }

    /// Global body followed by each contributing step's fragment, divided by `---`.
    fn pr_body(&self, repo: &Repository, fragments: &[String]) -> String {
        let ctx = context(repo, &Map::new(), self.playbook.display_name(), &self.branch);
        let base = match &self.playbook.strategy.pr.body_template {
            Some(template) => render(template, &ctx),
            None => format!(
                "Automated change from bulk playbook `{}`.",
                self.playbook.display_name()
            ),
        };
        let mut parts = vec![base.trim().to_string()];
        parts.extend(fragments.iter().cloned());
        parts.join("\n\n---\n\n")
    }
}

fn resolve_step(
    registry: &OperationRegistry,
    index: usize,
    step: &OpStep,
) -> Result<Step, PlaybookError> {
    let op = registry
        .resolve(&step.uses)
        .ok_or_else(|| PlaybookError::UnknownOperation {
            index,
            id: step.uses.clone(),
        })?;
    Ok(Step {
        id: step.uses.clone(),
        op,
        inputs: step.effective_inputs(),
        pr_fragment: step.pr.as_ref().and_then(|pr| pr.body.clone()),
    })
}
