//! Playbook check without touching any repository: `bulk validate`.

use std::path::Path;
use std::process::ExitCode;

use bulk::orchestrator::RunSettings;
use bulk::ui::icons::CHECK;

use super::{config_error, load_playbook};

pub fn cmd_validate(path: &Path) -> ExitCode {
    let (playbook, _) = match load_playbook(path) {
        Ok(loaded) => loaded,
        Err(e) => return config_error(e),
    };
    let settings = RunSettings::from_playbook(&playbook);

    println!("{}{} is valid", CHECK, path.display());
    println!("  name:        {}", playbook.display_name());
    println!("  hash:        {}", playbook.identity_hash());
    println!("  query:       {}", playbook.selector.query);
    println!("  phase:       {}", settings.phase());
    println!("  mode:        {}", settings.mode);
    println!("  diff policy: {}", settings.diff_policy);
    println!("  concurrency: {}", settings.concurrency);
    if settings.mode == bulk::playbook::Mode::Pr {
        println!("  branch:      {}", playbook.work_branch());
    }
    println!("  ops:         {}", playbook.op_ids().join(", "));
    ExitCode::SUCCESS
}
