//! Playbook loading, identity and validation.
//!
//! A playbook is read once per run and is immutable afterwards. Loading fails
//! on unknown fields or values outside the schema; `validate` adds the semantic
//! checks that need the operation registry.
//!
//! ```yaml
//! version: 1
//! name: setup-node-v4
//! selector:
//!   query: "org:octo-org topic:frontend"
//!   exclude: [octo-org/legacy]
//!   has_files: [".github/workflows/*.yml"]
//! strategy:
//!   mode: pr
//!   plan: false
//!   concurrency: 8
//!   diffPolicy: ignore-eol
//!   pr:
//!     branch: chore/setup-node-v4
//!     title: "ci: bump actions/setup-node to v4"
//!     labels: [automated]
//! ops:
//!   - use: files.patch
//!     with:
//!       files: [".github/workflows/*.yml"]
//!       replace:
//!         - { from: "actions/setup-node@v3", to: "actions/setup-node@v4" }
//! ```

mod types;
mod validate;

pub use types::{
    DiffPolicy, Mode, OpStep, Playbook, PrStrategy, Selector, StepIssue, StepPr, Strategy,
};
pub use validate::validate;

use crate::errors::PlaybookError;
use crate::util::{short_hash, slugify};
use std::path::Path;

impl Playbook {
    /// Parse a playbook from YAML text.
    pub fn from_yaml(text: &str) -> Result<Self, PlaybookError> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Load a playbook from disk. A relative `bodyTemplatePath` is read relative
    /// to the playbook's directory and inlined as `bodyTemplate`.
    pub fn load(path: &Path) -> Result<Self, PlaybookError> {
        let text = std::fs::read_to_string(path).map_err(|source| PlaybookError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut playbook = Self::from_yaml(&text)?;
        if playbook.name.is_none() {
            playbook.name = path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string());
        }
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        playbook.inline_body_template(base_dir)?;
        Ok(playbook)
    }

    fn inline_body_template(&mut self, base_dir: &Path) -> Result<(), PlaybookError> {
        let pr = &mut self.strategy.pr;
        let Some(rel) = pr.body_template_path.as_ref() else {
            return Ok(());
        };
        if pr.body_template.is_some() {
            return Err(PlaybookError::invalid(
                "strategy.pr",
                "bodyTemplate and bodyTemplatePath are mutually exclusive",
            ));
        }
        let path = if rel.is_absolute() {
            rel.clone()
        } else {
            base_dir.join(rel)
        };
        let text = std::fs::read_to_string(&path)
            .map_err(|source| PlaybookError::Read { path, source })?;
        pr.body_template = Some(text);
        Ok(())
    }

    /// Display name for reports.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("playbook")
    }

    /// Short hash of the serialized playbook. Same playbook, same hash.
    pub fn identity_hash(&self) -> String {
        let canonical = serde_json::to_vec(self).unwrap_or_default();
        short_hash(&canonical, 8)
    }

    /// Deterministic work branch: `<base>-<hash>`.
    pub fn work_branch(&self) -> String {
        let base = match &self.strategy.pr.branch {
            Some(branch) => branch.trim().to_string(),
            None => format!("bulk/{}", slugify(self.display_name(), 40)),
        };
        format!("{}-{}", base, self.identity_hash())
    }

    /// Pull request title, falling back to the playbook name.
    pub fn pr_title(&self) -> String {
        self.strategy
            .pr
            .title
            .clone()
            .unwrap_or_else(|| format!("bulk: {}", self.display_name()))
    }

    /// Operation ids in playbook order.
    pub fn op_ids(&self) -> Vec<&str> {
        self.ops.iter().map(|op| op.uses.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const SAMPLE: &str = r#"
version: 1
name: setup-node-v4
selector:
  query: "org:octo-org"
  include: [octo-org/a, octo-org/b]
  exclude: [octo-org/b]
strategy:
  mode: pr
  plan: false
  concurrency: 8
  failFast: true
  diffPolicy: ignore-eol
  pr:
    branch: chore/setup-node
    title: "ci: bump setup-node"
    labels: [automated]
    reviewers: [alice, octo-org/platform]
ops:
  - use: files.patch
    with:
      files: [".github/workflows/*.yml"]
      replace:
        - { from: "actions/setup-node@v3", to: "actions/setup-node@v4" }
    pr:
      body: "Bumps setup-node."
"#;

    #[test]
    fn test_parse_full_playbook() {
        let pb = Playbook::from_yaml(SAMPLE).unwrap();
        assert_eq!(pb.version, 1);
        assert_eq!(pb.selector.include.len(), 2);
        assert_eq!(pb.strategy.mode, Mode::Pr);
        assert!(!pb.strategy.plan);
        assert_eq!(pb.strategy.concurrency, 8);
        assert!(pb.strategy.fail_fast);
        assert_eq!(pb.strategy.diff_policy, DiffPolicy::IgnoreEol);
        assert_eq!(pb.ops[0].uses, "files.patch");
        assert_eq!(pb.ops[0].pr.as_ref().unwrap().body.as_deref(), Some("Bumps setup-node."));
    }

    #[test]
    fn test_defaults_are_dry_run() {
        let pb = Playbook::from_yaml(
            "version: 1\nselector:\n  query: x\nops:\n  - use: files.patch\n",
        )
        .unwrap();
        assert!(pb.strategy.plan);
        assert_eq!(pb.strategy.concurrency, 4);
        assert_eq!(pb.strategy.diff_policy, DiffPolicy::Strict);
        assert_eq!(pb.strategy.mode, Mode::Pr);
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let err = Playbook::from_yaml(
            "version: 1\nselector:\n  query: x\n  bogus: 1\nops: []\n",
        )
        .unwrap_err();
        assert!(matches!(err, PlaybookError::Parse(_)));
    }

    #[test]
    fn test_bad_diff_policy_is_rejected() {
        let err = Playbook::from_yaml(
            "version: 1\nselector:\n  query: x\nstrategy:\n  diffPolicy: fuzzy\nops: []\n",
        )
        .unwrap_err();
        assert!(matches!(err, PlaybookError::Parse(_)));
    }

    #[test]
    fn test_work_branch_is_deterministic_and_distinct() {
        let a = Playbook::from_yaml(SAMPLE).unwrap();
        let b = Playbook::from_yaml(SAMPLE).unwrap();
        assert_eq!(a.work_branch(), b.work_branch());
        assert!(a.work_branch().starts_with("chore/setup-node-"));

        let mut c = Playbook::from_yaml(SAMPLE).unwrap();
        c.ops[0].with.insert("extra".into(), serde_json::json!(true));
        assert_ne!(a.work_branch(), c.work_branch());
    }

    #[test]
    fn test_default_branch_uses_name_slug() {
        let pb = Playbook::from_yaml(
            "version: 1\nname: My Fancy Change\nselector:\n  query: x\nops: []\n",
        )
        .unwrap();
        assert!(pb.work_branch().starts_with("bulk/my-fancy-change-"));
    }

    #[test]
    fn test_load_inlines_body_template_path() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("body.md"), "Hello {{ repo.name }}").unwrap();
        let pb_path = dir.path().join("change.yml");
        std::fs::write(
            &pb_path,
            "version: 1\nselector:\n  query: x\nstrategy:\n  pr:\n    bodyTemplatePath: body.md\nops: []\n",
        )
        .unwrap();
        let pb = Playbook::load(&pb_path).unwrap();
        assert_eq!(pb.name.as_deref(), Some("change"));
        assert_eq!(
            pb.strategy.pr.body_template.as_deref(),
            Some("Hello {{ repo.name }}")
        );
    }

    #[test]
    fn test_load_missing_file_is_read_error() {
        let err = Playbook::load(Path::new("/nonexistent/playbook.yml")).unwrap_err();
        assert!(matches!(err, PlaybookError::Read { .. }));
    }

    #[test]
    fn test_effective_inputs_fill_from_issue_block() {
        let pb = Playbook::from_yaml(
            r#"
version: 1
selector: { query: x }
ops:
  - use: issue.create
    with:
      title: "From inputs"
    issue:
      title: "From issue block"
      labels: [triage]
"#,
        )
        .unwrap();
        let inputs = pb.ops[0].effective_inputs();
        assert_eq!(inputs["title"], "From inputs");
        assert_eq!(inputs["labels"], serde_json::json!(["triage"]));
    }

    #[test]
    fn test_cli_strings_parse_to_strategy_values() {
        assert_eq!("Direct".parse::<Mode>().unwrap(), Mode::Direct);
        assert_eq!(
            "ignore-whitespace".parse::<DiffPolicy>().unwrap(),
            DiffPolicy::IgnoreWhitespace
        );
        assert!("merge".parse::<Mode>().is_err());
        assert!("loose".parse::<DiffPolicy>().is_err());
    }
}
