//! Shared UI icons and emojis.

use console::Emoji;

// Step status
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK]");
pub static PENDING: Emoji<'_, '_> = Emoji("⏳ ", "[..]");
pub static RUNNING: Emoji<'_, '_> = Emoji("▶️  ", "[>]");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[ERR]");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "[!]");

// Tree entries
pub static FOLDER: Emoji<'_, '_> = Emoji("📁 ", "");
pub static FILE: Emoji<'_, '_> = Emoji("📄 ", "");
pub static SHELL: Emoji<'_, '_> = Emoji("💻 ", "$");

// Preview
pub static GLOBE: Emoji<'_, '_> = Emoji("🌐 ", "");
pub static SPARKLE: Emoji<'_, '_> = Emoji("✨ ", "*");
