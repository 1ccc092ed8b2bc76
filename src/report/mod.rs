//! Run reporter.
//!
//! One process-wide sink shared by every worker. Each outcome record is
//! written to all three streams under one lock and flushed before the lock is
//! released, so no reader ever sees half a repository:
//!
//! | File | Content |
//! |------|---------|
//! | `results.jsonl` | one JSON object per repository |
//! | `results.csv` | the same records as a table |
//! | `report.md` | header, one emoji line per repository, final tally |

use anyhow::{Context, Result, anyhow};
use console::Emoji;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

use crate::orchestrator::state::{ChangeStatus, OutcomeRecord, RepoStatus, RunSummary};
use crate::ui::icons::{CHECK, CROSS, NOOP, PLAN, PROGRESS, SKIP};

pub const JSONL_FILE: &str = "results.jsonl";
pub const CSV_FILE: &str = "results.csv";
pub const MARKDOWN_FILE: &str = "report.md";

const CSV_HEADER: &str = "repo,op,status,change,changedFiles,prUrl,issueUrl,notes,timestamp";

/// Run identity printed at the top of the Markdown report.
#[derive(Debug, Clone)]
pub struct RunHeader {
    pub playbook: String,
    pub hash: String,
    /// `plan` or `apply`
    pub phase: String,
    /// `pr` or `direct`
    pub mode: String,
    pub repo_count: usize,
    pub concurrency: usize,
    pub ops: Vec<String>,
}

struct Sink {
    jsonl: BufWriter<File>,
    csv: BufWriter<File>,
    markdown: BufWriter<File>,
    summary: RunSummary,
    /// Set by `finish`; later records are dropped so the tally stays last.
    closed: bool,
}

pub struct Reporter {
    sink: Mutex<Sink>,
    out_dir: PathBuf,
    /// Echo each Markdown line to stdout as it is written
    echo: bool,
}

fn create(path: &Path) -> Result<BufWriter<File>> {
    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    Ok(BufWriter::new(file))
}

/// Quote a CSV field when it contains a delimiter, quote or newline.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn csv_row(record: &OutcomeRecord) -> String {
    [
        record.repo.clone(),
        record.op.clone(),
        record.status.to_string(),
        record.change.to_string(),
        record.changed_files.to_string(),
        record.pr_url.clone().unwrap_or_default(),
        record.issue_url.clone().unwrap_or_default(),
        record.notes_line(),
        record.timestamp.to_rfc3339(),
    ]
    .iter()
    .map(|field| csv_field(field))
    .collect::<Vec<_>>()
    .join(",")
}

fn icon_for(record: &OutcomeRecord) -> &'static Emoji<'static, 'static> {
    match (record.status, &record.change) {
        (RepoStatus::Error, _) => &CROSS,
        (RepoStatus::Skipped, _) => &SKIP,
        (RepoStatus::Ok, ChangeStatus::WouldApply) => &PLAN,
        (RepoStatus::Ok, ChangeStatus::NoChanges | ChangeStatus::Skipped(_))
            if record.pr_url.is_none() && record.issue_url.is_none() =>
        {
            &NOOP
        }
        (RepoStatus::Ok, _) => &CHECK,
    }
}

/// One Markdown list line for a repository.
pub fn markdown_line(record: &OutcomeRecord) -> String {
    format!("- {}{}", icon_for(record).0, describe(record))
}

/// Terminal line for a repository, with plain-text icon fallback.
pub fn console_line(record: &OutcomeRecord) -> String {
    format!("{}{}", icon_for(record), describe(record))
}

fn describe(record: &OutcomeRecord) -> String {
    let mut line = format!(
        "**{}**: {} ({})",
        record.repo,
        record.status,
        record.change
    );
    if record.changed_files > 0 {
        line.push_str(&format!(", {} file(s)", record.changed_files));
    }
    if let Some(url) = &record.pr_url {
        line.push_str(&format!(", PR {}", url));
    }
    if let Some(url) = &record.issue_url {
        line.push_str(&format!(", issue {}", url));
    }
    if !record.notes.is_empty() {
        line.push_str(&format!(": {}", record.notes_line()));
    }
    line
}

fn markdown_header(header: &RunHeader) -> String {
    format!(
        "# Bulk run: {}\n\n\
         - Playbook hash: `{}`\n\
         - Phase: {}\n\
         - Mode: {}\n\
         - Repositories: {}\n\
         - Concurrency: {}\n\
         - Operations: {}\n\n\
         ## Repositories\n\n",
        header.playbook,
        header.hash,
        header.phase,
        header.mode,
        header.repo_count,
        header.concurrency,
        header.ops.join(", "),
    )
}

fn markdown_summary(summary: &RunSummary) -> String {
    format!(
        "\n## {}Summary\n\n| Total | Success | Failed | Skipped |\n|---|---|---|---|\n| {} | {} | {} | {} |\n",
        PROGRESS.0, summary.total, summary.success, summary.failed, summary.skipped
    )
}

impl Reporter {
    /// Create the three report files in `out_dir` and write their headers.
    pub fn create(out_dir: &Path, header: &RunHeader, echo: bool) -> Result<Self> {
        std::fs::create_dir_all(out_dir).context("Failed to create output directory")?;
        let jsonl = create(&out_dir.join(JSONL_FILE))?;
        let mut csv = create(&out_dir.join(CSV_FILE))?;
        let mut markdown = create(&out_dir.join(MARKDOWN_FILE))?;

        writeln!(csv, "{}", CSV_HEADER)?;
        csv.flush()?;
        markdown.write_all(markdown_header(header).as_bytes())?;
        markdown.flush()?;

        Ok(Self {
            sink: Mutex::new(Sink {
                jsonl,
                csv,
                markdown,
                summary: RunSummary::default(),
                closed: false,
            }),
            out_dir: out_dir.to_path_buf(),
            echo,
        })
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Append one repository's record to every stream.
    pub fn record(&self, record: &OutcomeRecord) -> Result<()> {
        let json = serde_json::to_string(record).context("Failed to serialize outcome record")?;
        let line = markdown_line(record);

        let mut sink = self
            .sink
            .lock()
            .map_err(|_| anyhow!("report sink lock poisoned"))?;
        if sink.closed {
            warn!(repo = %record.repo, status = %record.status, "Report already finished; dropping record");
            return Ok(());
        }
        writeln!(sink.jsonl, "{}", json)?;
        writeln!(sink.csv, "{}", csv_row(record))?;
        writeln!(sink.markdown, "{}", line)?;
        sink.jsonl.flush()?;
        sink.csv.flush()?;
        sink.markdown.flush()?;
        sink.summary.add(record);
        if self.echo {
            println!("{}", console_line(record).replace("**", ""));
        }
        Ok(())
    }

    pub fn summary(&self) -> Result<RunSummary> {
        let sink = self
            .sink
            .lock()
            .map_err(|_| anyhow!("report sink lock poisoned"))?;
        Ok(sink.summary)
    }

    /// Write the final tally and return it. The report accepts no records afterwards.
    pub fn finish(&self) -> Result<RunSummary> {
        let mut sink = self
            .sink
            .lock()
            .map_err(|_| anyhow!("report sink lock poisoned"))?;
        if sink.closed {
            return Ok(sink.summary);
        }
        sink.closed = true;
        let summary = sink.summary;
        let tally = markdown_summary(&summary);
        sink.markdown.write_all(tally.as_bytes())?;
        sink.markdown.flush()?;
        Ok(summary)
    }
}
