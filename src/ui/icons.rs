//! Shared UI icons and emojis.
//!
//! Each constant falls back to a plain-text tag on terminals without emoji
//! support. The Markdown report always uses the emoji form.

use console::Emoji;

// Repository outcome indicators
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK]");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[ERR]");
pub static SKIP: Emoji<'_, '_> = Emoji("⏭️  ", "[SKIP]");
pub static PLAN: Emoji<'_, '_> = Emoji("📝 ", "[PLAN]");
pub static NOOP: Emoji<'_, '_> = Emoji("➖ ", "[--]");

// Run indicators
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", ">>");
pub static PROGRESS: Emoji<'_, '_> = Emoji("📊 ", "[SUM]");
pub static STOP: Emoji<'_, '_> = Emoji("🛑 ", "[STOP]");
