//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module     | Commands handled   |
//! |------------|--------------------|
//! | `inspect`  | `Decode`, `Tree`   |
//! | `preview`  | `Preview`          |
//! | `chat`     | `Chat`             |
//! | `config`   | `Config`           |

pub mod chat;
pub mod config;
pub mod inspect;
pub mod preview;

pub use chat::cmd_chat;
pub use config::cmd_config;
pub use inspect::{cmd_decode, cmd_tree};
pub use preview::cmd_preview;

use anyhow::{Context, Result};
use std::io::Read;
use std::path::Path;

/// Read an action log from a file, or from stdin when the path is `-`.
pub fn read_log(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read action log from stdin")?;
        return Ok(text);
    }
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}
