pub mod config;
pub mod errors;
pub mod github;
pub mod ops;
pub mod orchestrator;
pub mod playbook;
pub mod report;
pub mod selector;
pub mod template;
pub mod ui;
pub mod util;
pub mod worktree;
