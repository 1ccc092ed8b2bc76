//! Bounded worker pool over the resolved repository list.
//!
//! Workers share an atomic cursor into the list and report back over a
//! channel. With fail-fast on, the first `error` record stops new work and
//! `run_all` returns as soon as that record is flushed; in-flight workers are
//! left to finish on their own.

use anyhow::Result;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::mpsc;
use tracing::{Instrument, info, info_span};

use super::runner::RepoRunner;
use super::state::RunSummary;
use crate::github::Repository;
use crate::report::Reporter;

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunResult {
    pub summary: RunSummary,
    /// Fail-fast tripped before every repository was processed
    pub aborted: bool,
}

impl RunResult {
    pub fn success(&self) -> bool {
        !self.aborted && !self.summary.has_failures()
    }
}

enum WorkerEvent {
    /// A repository failed with fail-fast on
    Tripped,
    Finished(Result<()>),
}

struct Shared {
    runner: Arc<RepoRunner>,
    repos: Arc<Vec<Repository>>,
    reporter: Arc<Reporter>,
    cursor: AtomicUsize,
    stop: AtomicBool,
    fail_fast: bool,
}

impl Shared {
    fn next(&self) -> Option<&Repository> {
        if self.stop.load(Ordering::SeqCst) {
            return None;
        }
        let index = self.cursor.fetch_add(1, Ordering::SeqCst);
        self.repos.get(index)
    }
}

async fn worker(id: usize, shared: Arc<Shared>, events: mpsc::Sender<WorkerEvent>) -> Result<()> {
    while let Some(repo) = shared.next() {
        let span = info_span!("repo", worker = id, repo = %repo.full_name);
        let record = shared.runner.run(repo).instrument(span).await;
        shared.reporter.record(&record)?;
        if record.is_error() && shared.fail_fast {
            shared.stop.store(true, Ordering::SeqCst);
            let _ = events.send(WorkerEvent::Tripped).await;
            break;
        }
    }
    Ok(())
}

/// Process every repository with `runner`, recording each outcome.
pub async fn run_all(
    runner: Arc<RepoRunner>,
    repos: Arc<Vec<Repository>>,
    reporter: Arc<Reporter>,
) -> Result<RunResult> {
    let settings = runner.settings().clone();
    let workers = settings.concurrency.max(1).min(repos.len().max(1));
    info!(repos = repos.len(), workers, phase = settings.phase(), "Starting run");

    let shared = Arc::new(Shared {
        runner,
        repos,
        reporter: Arc::clone(&reporter),
        cursor: AtomicUsize::new(0),
        stop: AtomicBool::new(false),
        fail_fast: settings.fail_fast,
    });

    let (event_tx, mut event_rx) = mpsc::channel::<WorkerEvent>(workers * 2);
    for id in 0..workers {
        let shared = Arc::clone(&shared);
        let tx = event_tx.clone();
        tokio::spawn(async move {
            let result = worker(id, shared, tx.clone()).await;
            let _ = tx.send(WorkerEvent::Finished(result)).await;
        });
    }
    // The loop below ends once every worker has dropped its sender.
    drop(event_tx);

    while let Some(event) = event_rx.recv().await {
        match event {
            WorkerEvent::Tripped => {
                info!("Fail-fast tripped; not waiting for in-flight repositories");
                break;
            }
            WorkerEvent::Finished(Err(e)) => return Err(e),
            WorkerEvent::Finished(Ok(())) => {}
        }
    }

    Ok(RunResult {
        summary: reporter.summary()?,
        aborted: shared.stop.load(Ordering::SeqCst),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::OperationError;
    use crate::github::testing::FakeHost;
    use crate::ops::{
        ApplyResult, OpContext, Operation, OperationRegistry, PlanOutcome, PlanResult,
    };
    use crate::orchestrator::runner::RunSettings;
    use crate::playbook::Playbook;
    use crate::report::{JSONL_FILE, RunHeader};
    use crate::worktree::testing::RecordingWorktrees;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::time::Duration;
    use tempfile::TempDir;

    /// API-only op that fails for one repository name and tracks concurrency.
    #[derive(Default)]
    struct Tracker {
        fail_on: Option<String>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        started: std::sync::Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Operation for Tracker {
        fn id(&self) -> &str {
            "test.tracker"
        }
        fn describe(&self) -> &str {
            "records starts and concurrency"
        }
        async fn plan(&self, ctx: &OpContext<'_>) -> Result<PlanOutcome, OperationError> {
            self.started.lock().unwrap().push(ctx.repo.name.clone());
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            if self.fail_on.as_deref() == Some(ctx.repo.name.as_str()) {
                return Err(anyhow!("tracker failure").into());
            }
            Ok(PlanOutcome::Planned(PlanResult::noop(Value::Null)))
        }
        async fn apply(
            &self,
            _ctx: &OpContext<'_>,
            _plan: &PlanResult,
        ) -> Result<ApplyResult, OperationError> {
            Ok(ApplyResult::noop())
        }
    }

    struct Run {
        result: RunResult,
        records: Vec<Value>,
        tracker: Arc<Tracker>,
        _dirs: (TempDir, TempDir),
    }

    async fn run(names: &[&str], tracker: Tracker, concurrency: usize, fail_fast: bool) -> Run {
        let out = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        let tracker = Arc::new(tracker);
        let mut registry = OperationRegistry::builtin(".");
        registry.register(tracker.clone());

        let playbook = Arc::new(
            Playbook::from_yaml("version: 1\nselector: { query: x }\nops:\n  - use: test.tracker\n")
                .unwrap(),
        );
        let mut settings = RunSettings::from_playbook(&playbook);
        settings.concurrency = concurrency;
        settings.fail_fast = fail_fast;
        let runner = RepoRunner::new(
            playbook,
            settings,
            &registry,
            Arc::new(FakeHost::default()),
            Arc::new(RecordingWorktrees::new(work.path(), work.path())),
        )
        .unwrap();

        let repos: Vec<_> = names
            .iter()
            .map(|n| Repository::new("octo", n, "main"))
            .collect();
        let header = RunHeader {
            playbook: "tracker".into(),
            hash: "00000000".into(),
            phase: "plan".into(),
            mode: "pr".into(),
            repo_count: repos.len(),
            concurrency,
            ops: vec!["test.tracker".into()],
        };
        let reporter = Arc::new(Reporter::create(out.path(), &header, false).unwrap());
        let result = run_all(Arc::new(runner), Arc::new(repos), reporter)
            .await
            .unwrap();

        let records = std::fs::read_to_string(out.path().join(JSONL_FILE))
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        Run {
            result,
            records,
            tracker,
            _dirs: (out, work),
        }
    }

    #[tokio::test]
    async fn test_fail_fast_stops_new_work() {
        let tracker = Tracker {
            fail_on: Some("b".into()),
            ..Default::default()
        };
        let run = run(&["a", "b", "c"], tracker, 1, true).await;

        assert!(run.result.aborted);
        assert!(!run.result.success());
        assert_eq!(run.records.len(), 2);
        assert_eq!(run.records[0]["repo"], "octo/a");
        assert_eq!(run.records[0]["status"], "ok");
        assert_eq!(run.records[1]["repo"], "octo/b");
        assert_eq!(run.records[1]["status"], "error");
        assert!(run.records[1]["notes"][0].as_str().unwrap().contains("tracker failure"));
        assert_eq!(*run.tracker.started.lock().unwrap(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_errors_are_isolated_without_fail_fast() {
        let tracker = Tracker {
            fail_on: Some("b".into()),
            ..Default::default()
        };
        let run = run(&["a", "b", "c"], tracker, 2, false).await;

        assert!(!run.result.aborted);
        assert_eq!(run.result.summary.total, 3);
        assert_eq!(run.result.summary.failed, 1);
        assert_eq!(run.result.summary.success, 2);
        assert!(!run.result.success());
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded_and_every_repo_runs_once() {
        let names: Vec<String> = (0..12).map(|i| format!("r{}", i)).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let run = run(&refs, Tracker::default(), 4, false).await;

        assert!(run.result.success());
        assert_eq!(run.records.len(), 12);
        let max = run.tracker.max_in_flight.load(Ordering::SeqCst);
        assert!(max <= 4, "max in flight was {}", max);
        assert!(max > 1);
        let mut started = run.tracker.started.lock().unwrap().clone();
        started.sort();
        started.dedup();
        assert_eq!(started.len(), 12);
    }

    #[tokio::test]
    async fn test_empty_repository_list() {
        let run = run(&[], Tracker::default(), 4, false).await;
        assert!(run.result.success());
        assert_eq!(run.result.summary.total, 0);
        assert!(run.records.is_empty());
    }
}
