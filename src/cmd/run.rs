//! Playbook execution: `bulk run <playbook>`.

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, warn};

use bulk::config::RunConfig;
use bulk::github::{GitHubClient, RepoHost};
use bulk::orchestrator::{RepoRunner, RunResult, RunSettings, run_all};
use bulk::playbook::{DiffPolicy, Mode};
use bulk::report::{MARKDOWN_FILE, Reporter, RunHeader};
use bulk::selector;
use bulk::ui::icons::{CHECK, CROSS, PROGRESS, ROCKET, STOP};
use bulk::worktree::GitWorktrees;

use super::{EXIT_FAILURES, config_error, load_playbook};

/// Command-line overrides of the playbook strategy.
#[derive(Debug, Clone, Default)]
pub struct RunOverrides {
    pub plan: bool,
    pub apply: bool,
    pub concurrency: Option<usize>,
    pub fail_fast: bool,
    pub mode: Option<Mode>,
    pub diff_policy: Option<DiffPolicy>,
}

impl RunOverrides {
    fn apply_to(&self, settings: &mut RunSettings) {
        if self.plan {
            settings.plan_only = true;
        } else if self.apply {
            settings.plan_only = false;
        }
        if let Some(n) = self.concurrency {
            settings.concurrency = n;
        }
        if self.fail_fast {
            settings.fail_fast = true;
        }
        if let Some(mode) = self.mode {
            settings.mode = mode;
        }
        if let Some(policy) = self.diff_policy {
            settings.diff_policy = policy;
        }
    }
}

pub async fn cmd_run(path: &Path, out_dir: PathBuf, overrides: &RunOverrides) -> Result<ExitCode> {
    let (playbook, registry) = match load_playbook(path) {
        Ok(loaded) => loaded,
        Err(e) => return Ok(config_error(e)),
    };
    if overrides.concurrency == Some(0) {
        return Ok(config_error("--concurrency must be at least 1"));
    }

    let mut settings = RunSettings::from_playbook(&playbook);
    overrides.apply_to(&mut settings);

    let config = RunConfig::from_env(&out_dir);
    config.ensure_directories()?;
    if config.token.is_none() {
        warn!("No GITHUB_TOKEN or GH_TOKEN set; API calls are unauthenticated");
    }

    let host: Arc<dyn RepoHost> = Arc::new(GitHubClient::new(
        config.api_url.clone(),
        config.token.clone(),
    ));
    let repos = match selector::select(host.as_ref(), &playbook.selector).await {
        Ok(repos) => repos,
        Err(e) => return Ok(config_error(format!("Repository selection failed: {}", e))),
    };

    let header = RunHeader {
        playbook: playbook.display_name().to_string(),
        hash: playbook.identity_hash(),
        phase: settings.phase().to_string(),
        mode: settings.mode.to_string(),
        repo_count: repos.len(),
        concurrency: settings.concurrency,
        ops: playbook.op_ids().iter().map(|id| id.to_string()).collect(),
    };
    println!(
        "{}{} ({}) {} on {} repositories, mode {}",
        ROCKET,
        header.playbook,
        header.hash,
        header.phase,
        header.repo_count,
        header.mode
    );

    let reporter = Arc::new(Reporter::create(&config.out_dir, &header, true)?);
    let playbook = Arc::new(playbook);
    let runner = match RepoRunner::new(
        playbook,
        settings,
        &registry,
        host,
        Arc::new(GitWorktrees::from_config(&config)),
    ) {
        Ok(runner) => runner,
        Err(e) => return Ok(config_error(e)),
    };

    let result = run_all(Arc::new(runner), Arc::new(repos), Arc::clone(&reporter)).await?;
    reporter.finish()?;
    print_summary(&result, reporter.out_dir());

    if result.success() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(EXIT_FAILURES))
    }
}

fn print_summary(result: &RunResult, out_dir: &Path) {
    let s = &result.summary;
    println!();
    println!(
        "{}{} total, {} ok, {} failed, {} skipped",
        PROGRESS, s.total, s.success, s.failed, s.skipped
    );
    if result.aborted {
        println!("{}Stopped early: fail-fast after the first error", STOP);
    }
    let icon = if result.success() { &CHECK } else { &CROSS };
    println!(
        "{}Report: {}",
        icon,
        out_dir.join(MARKDOWN_FILE).display()
    );
    info!(
        total = s.total,
        failed = s.failed,
        aborted = result.aborted,
        "Run finished"
    );
}
