//! `files.patch`: ordered literal text replacements over globbed files.
//!
//! Replacements are written to the working copy during plan, so the diff seen
//! by the scheduler is identical in plan and apply runs and a second plan over
//! patched content finds nothing to do.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::path::Path;
use tracing::debug;

use super::{ApplyResult, OpContext, Operation, PlanOutcome, PlanResult, string_list};
use crate::errors::OperationError;
use crate::util::glob_files;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct Replacement {
    from: String,
    to: String,
}

#[derive(Debug, Clone)]
struct PatchInputs {
    files: Vec<String>,
    replace: Vec<Replacement>,
}

impl PatchInputs {
    fn parse(inputs: &Map<String, Value>) -> Result<Self, OperationError> {
        let files = string_list(inputs, "files")?;
        if files.is_empty() {
            return Err(OperationError::MissingInput("files"));
        }
        let replace: Vec<Replacement> = match inputs.get("replace") {
            None | Some(Value::Null) => return Err(OperationError::MissingInput("replace")),
            Some(value) => serde_json::from_value(value.clone()).map_err(|e| {
                OperationError::InvalidInput {
                    field: "replace".into(),
                    message: format!("expected a list of {{from, to}}: {}", e),
                }
            })?,
        };
        if replace.is_empty() {
            return Err(OperationError::MissingInput("replace"));
        }
        if let Some(index) = replace.iter().position(|r| r.from.is_empty()) {
            return Err(OperationError::InvalidInput {
                field: format!("replace[{}].from", index),
                message: "must not be empty".into(),
            });
        }
        Ok(Self { files, replace })
    }
}

/// Apply every replacement in order to `text`.
fn patch_text(text: &str, replace: &[Replacement]) -> String {
    replace
        .iter()
        .fold(text.to_string(), |acc, r| acc.replace(&r.from, &r.to))
}

fn patch_tree(root: &Path, inputs: &PatchInputs) -> Result<Vec<String>, OperationError> {
    let mut changed = Vec::new();
    for path in glob_files(root, &inputs.files)? {
        let Ok(original) = std::fs::read_to_string(&path) else {
            debug!(path = %path.display(), "Skipping non-UTF-8 file");
            continue;
        };
        let patched = patch_text(&original, &inputs.replace);
        if patched != original {
            std::fs::write(&path, patched).map_err(|e| {
                anyhow::Error::new(e).context(format!("Failed to write {}", path.display()))
            })?;
            let rel = path.strip_prefix(root).unwrap_or(&path);
            changed.push(rel.to_string_lossy().to_string());
        }
    }
    Ok(changed)
}

#[derive(Debug, Default)]
pub struct FilesPatch;

#[async_trait]
impl Operation for FilesPatch {
    fn id(&self) -> &str {
        "files.patch"
    }

    fn describe(&self) -> &str {
        "Literal from/to replacements over files matching globs"
    }

    fn check_inputs(&self, inputs: &Map<String, Value>) -> Result<(), OperationError> {
        PatchInputs::parse(inputs).map(|_| ())
    }

    async fn plan(&self, ctx: &OpContext<'_>) -> Result<PlanOutcome, OperationError> {
        let Some(root) = ctx.worktree else {
            return Ok(PlanOutcome::NeedsWorktree);
        };
        let inputs = PatchInputs::parse(ctx.inputs)?;
        let changed = patch_tree(root, &inputs)?;
        let details = json!({ "changedFiles": changed.len(), "files": changed });
        let result = if changed.is_empty() {
            PlanResult::noop(details)
        } else {
            PlanResult::would_apply(details)
                .with_message(format!("{} file(s) patched", changed.len()))
        };
        Ok(PlanOutcome::Planned(result))
    }

    async fn apply(
        &self,
        _ctx: &OpContext<'_>,
        _plan: &PlanResult,
    ) -> Result<ApplyResult, OperationError> {
        // Plan already wrote the files.
        Ok(ApplyResult::noop())
    }
}
