//! Repository selection.
//!
//! `select` resolves the candidate list from the search API plus exact-name
//! include/exclude sets. The `has_files` filter needs file content, so it is
//! checked later by the scheduler once a working copy exists.

use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

use crate::errors::GatewayError;
use crate::github::{RepoHost, Repository};
use crate::playbook::Selector;
use crate::util::glob_files;

const PAGE_SIZE: u32 = 100;
/// The search API never returns more than this many results for a query.
const SEARCH_RESULT_CAP: usize = 1000;

/// Resolve the target repositories, most recently updated first.
pub async fn select(
    host: &dyn RepoHost,
    selector: &Selector,
) -> Result<Vec<Repository>, GatewayError> {
    let mut found = Vec::new();
    let mut page = 1;
    loop {
        let batch = host
            .search_repositories(&selector.query, page, PAGE_SIZE)
            .await?;
        let short = batch.len() < PAGE_SIZE as usize;
        debug!(page, count = batch.len(), "Search page");
        found.extend(batch);
        if short || found.len() >= SEARCH_RESULT_CAP {
            break;
        }
        page += 1;
    }
    found.truncate(SEARCH_RESULT_CAP);

    let selected = filter(found, &selector.include, &selector.exclude);
    info!(query = %selector.query, count = selected.len(), "Selected repositories");
    Ok(selected)
}

/// Apply include (intersection) then exclude (subtraction), keeping search order.
pub fn filter(repos: Vec<Repository>, include: &[String], exclude: &[String]) -> Vec<Repository> {
    let include: HashSet<&str> = include.iter().map(String::as_str).collect();
    let exclude: HashSet<&str> = exclude.iter().map(String::as_str).collect();
    repos
        .into_iter()
        .filter(|r| include.is_empty() || include.contains(r.full_name.as_str()))
        .filter(|r| !exclude.contains(r.full_name.as_str()))
        .collect()
}

/// True if the working copy has a file matching any pattern (or there are none).
pub fn has_files(root: &Path, patterns: &[String]) -> anyhow::Result<bool> {
    if patterns.is_empty() {
        return Ok(true);
    }
    Ok(!glob_files(root, patterns)?.is_empty())
}
