//! Semantic checks run before any repository is touched.

use super::Playbook;
use crate::errors::PlaybookError;
use crate::ops::OperationRegistry;

/// Validate a parsed playbook against the operation registry.
///
/// Structural problems (unknown fields, bad enum values) are already rejected
/// by parsing; this covers what the schema cannot express.
pub fn validate(playbook: &Playbook, registry: &OperationRegistry) -> Result<(), PlaybookError> {
    if playbook.version != 1 {
        return Err(PlaybookError::UnsupportedVersion(playbook.version));
    }
    if playbook.selector.query.trim().is_empty() {
        return Err(PlaybookError::invalid("selector.query", "must not be empty"));
    }
    if playbook.strategy.concurrency < 1 {
        return Err(PlaybookError::invalid(
            "strategy.concurrency",
            "must be at least 1",
        ));
    }
    let pr = &playbook.strategy.pr;
    if pr.body_template.is_some() && pr.body_template_path.is_some() {
        return Err(PlaybookError::invalid(
            "strategy.pr",
            "bodyTemplate and bodyTemplatePath are mutually exclusive",
        ));
    }
    if let Some(branch) = &pr.branch
        && (branch.trim().is_empty() || branch.contains(char::is_whitespace))
    {
        return Err(PlaybookError::invalid(
            "strategy.pr.branch",
            "must be a non-empty branch name without whitespace",
        ));
    }
    if playbook.ops.is_empty() {
        return Err(PlaybookError::invalid("ops", "at least one operation is required"));
    }

    for (index, step) in playbook.ops.iter().enumerate() {
        let op = registry
            .resolve(&step.uses)
            .ok_or_else(|| PlaybookError::UnknownOperation {
                index,
                id: step.uses.clone(),
            })?;
        op.check_inputs(&step.effective_inputs())
            .map_err(|e| PlaybookError::invalid(format!("ops[{}].with", index), e.to_string()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> OperationRegistry {
        OperationRegistry::builtin(".")
    }

    fn parse(yaml: &str) -> Playbook {
        Playbook::from_yaml(yaml).unwrap()
    }

    const VALID: &str = r#"
version: 1
selector: { query: "org:octo" }
ops:
  - use: files.patch
    with:
      files: ["*.md"]
      replace: [{ from: a, to: b }]
  - use: issue.create
    with: { title: "Track rollout" }
"#;

    #[test]
    fn test_valid_playbook_passes() {
        validate(&parse(VALID), &registry()).unwrap();
    }

    #[test]
    fn test_version_must_be_one() {
        let pb = parse(&VALID.replace("version: 1", "version: 2"));
        assert!(matches!(
            validate(&pb, &registry()),
            Err(PlaybookError::UnsupportedVersion(2))
        ));
    }

    #[test]
    fn test_unknown_operation_reports_index() {
        let pb = parse(&VALID.replace("use: issue.create", "use: issue.close"));
        match validate(&pb, &registry()) {
            Err(PlaybookError::UnknownOperation { index, id }) => {
                assert_eq!(index, 1);
                assert_eq!(id, "issue.close");
            }
            other => panic!("expected UnknownOperation, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_script_is_unknown_operation() {
        let pb = parse(&VALID.replace("use: issue.create", "use: ops/nope.py"));
        assert!(matches!(
            validate(&pb, &registry()),
            Err(PlaybookError::UnknownOperation { .. })
        ));
    }

    #[test]
    fn test_bad_inputs_are_rejected() {
        let pb = parse(&VALID.replace("with: { title: \"Track rollout\" }", "with: {}"));
        match validate(&pb, &registry()) {
            Err(PlaybookError::Invalid { field, .. }) => assert_eq!(field, "ops[1].with"),
            other => panic!("expected Invalid, got {:?}", other),
        }
    }

    #[test]
    fn test_issue_block_supplies_title() {
        let pb = parse(
            r#"
version: 1
selector: { query: "org:octo" }
ops:
  - use: issue.create
    issue: { title: "From block" }
"#,
        );
        validate(&pb, &registry()).unwrap();
    }

    #[test]
    fn test_zero_concurrency_and_empty_ops() {
        let pb = parse(&VALID.replace("ops:", "strategy: { concurrency: 0 }\nops:"));
        assert!(validate(&pb, &registry()).is_err());

        let pb = parse("version: 1\nselector: { query: x }\nops: []\n");
        assert!(matches!(
            validate(&pb, &registry()),
            Err(PlaybookError::Invalid { .. })
        ));
    }

    #[test]
    fn test_empty_query_is_rejected() {
        let pb = parse(&VALID.replace("\"org:octo\"", "\"  \""));
        assert!(validate(&pb, &registry()).is_err());
    }
}
