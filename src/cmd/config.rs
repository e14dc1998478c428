//! Configuration view: `sitecraft config`.

use anyhow::Result;
use sitecraft::config::SessionConfig;
use std::path::Path;

pub fn cmd_config(project_dir: &Path) -> Result<()> {
    let path = SessionConfig::path(project_dir);
    if path.exists() {
        println!("# Config file: {}", path.display());
    } else {
        println!("# No config file at {}, using defaults", path.display());
    }
    let config = SessionConfig::load(project_dir)?;
    print!("{}", config.to_toml()?);
    Ok(())
}
