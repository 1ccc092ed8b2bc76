//! CLI command implementations.
//!
//! | Module     | Commands handled |
//! |------------|------------------|
//! | `run`      | `Run`            |
//! | `validate` | `Validate`       |
//! | `ops`      | `Ops`            |
//!
//! Commands return the process exit code; `Err` is reserved for failures
//! outside the playbook's control (unwritable output directory and the like).

pub mod ops;
pub mod run;
pub mod validate;

pub use ops::cmd_ops;
pub use run::{RunOverrides, cmd_run};
pub use validate::cmd_validate;

use std::fmt::Display;
use std::path::Path;
use std::process::ExitCode;

use bulk::errors::PlaybookError;
use bulk::ops::OperationRegistry;
use bulk::playbook::{self, Playbook};
use bulk::ui::icons::CROSS;

/// Any repository errored, or fail-fast stopped the run.
pub const EXIT_FAILURES: u8 = 1;
/// Invalid playbook or repository selection failed; nothing was touched.
pub const EXIT_CONFIG: u8 = 2;

/// Load and validate a playbook. Script operations resolve relative to its directory.
pub fn load_playbook(path: &Path) -> Result<(Playbook, OperationRegistry), PlaybookError> {
    let playbook = Playbook::load(path)?;
    let base = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let registry = OperationRegistry::builtin(base);
    playbook::validate(&playbook, &registry)?;
    Ok((playbook, registry))
}

pub fn config_error(err: impl Display) -> ExitCode {
    eprintln!("{}{}", CROSS, err);
    ExitCode::from(EXIT_CONFIG)
}
