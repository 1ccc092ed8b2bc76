use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use bulk::playbook::{DiffPolicy, Mode};

mod cmd;

#[derive(Parser)]
#[command(name = "bulk")]
#[command(version, about = "Apply one playbook of changes across many repositories")]
pub struct Cli {
    /// Debug-level logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Diagnostic log format on stderr
    #[arg(long, value_enum, default_value = "text", global = true)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a playbook against every selected repository
    Run {
        /// Path to the playbook YAML file
        playbook: PathBuf,

        /// Plan only: report what would change without pushing
        #[arg(long, conflicts_with = "apply")]
        plan: bool,

        /// Apply changes (overrides `strategy.plan: true`)
        #[arg(long)]
        apply: bool,

        /// Maximum repositories processed at once
        #[arg(short, long)]
        concurrency: Option<usize>,

        /// Stop scheduling new repositories after the first error
        #[arg(long)]
        fail_fast: bool,

        /// Change landing mode: pr or direct
        #[arg(long)]
        mode: Option<Mode>,

        /// Diff policy: strict, ignore-eol or ignore-whitespace
        #[arg(long)]
        diff_policy: Option<DiffPolicy>,

        /// Directory for results.jsonl, results.csv and report.md
        #[arg(short, long, default_value = "bulk-out", env = "BULK_OUT_DIR")]
        out_dir: PathBuf,
    },
    /// Validate a playbook without touching any repository
    Validate {
        /// Path to the playbook YAML file
        playbook: PathBuf,
    },
    /// List built-in operations
    Ops,
}

fn init_tracing(verbose: bool, format: LogFormat) {
    let fallback = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    let _ = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_format);

    let result = match cli.command {
        Commands::Run {
            playbook,
            plan,
            apply,
            concurrency,
            fail_fast,
            mode,
            diff_policy,
            out_dir,
        } => {
            let overrides = cmd::RunOverrides {
                plan,
                apply,
                concurrency,
                fail_fast,
                mode,
                diff_policy,
            };
            cmd::cmd_run(&playbook, out_dir, &overrides).await
        }
        Commands::Validate { playbook } => Ok(cmd::cmd_validate(&playbook)),
        Commands::Ops => {
            cmd::cmd_ops();
            Ok(ExitCode::SUCCESS)
        }
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(cmd::EXIT_FAILURES)
        }
    }
}
