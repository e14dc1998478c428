//! Project configuration from `.sitecraft/sitecraft.toml`.

use crate::sandbox::{CommandSpec, DEFAULT_MAX_RETRIES, LifecyclePolicy};
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_DIR: &str = ".sitecraft";
pub const CONFIG_FILE: &str = "sitecraft.toml";
pub const DEFAULT_API_URL: &str = "http://localhost:3000";

/// Effective configuration for a build session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionConfig {
    pub sandbox: SandboxSettings,
    pub backend: BackendSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SandboxSettings {
    pub max_retries: u32,
    pub install_command: Vec<String>,
    pub dev_command: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ready_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackendSettings {
    pub api_url: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sandbox: SandboxSettings {
                max_retries: DEFAULT_MAX_RETRIES,
                install_command: argv(&CommandSpec::npm_install()),
                dev_command: argv(&CommandSpec::npm_run_dev()),
                ready_timeout_secs: None,
            },
            backend: BackendSettings {
                api_url: DEFAULT_API_URL.to_string(),
            },
        }
    }
}

fn argv(spec: &CommandSpec) -> Vec<String> {
    std::iter::once(spec.program.clone())
        .chain(spec.args.iter().cloned())
        .collect()
}

/// Raw TOML structure for `.sitecraft/sitecraft.toml`
#[derive(Debug, Deserialize)]
struct ConfigToml {
    sandbox: Option<SandboxSection>,
    backend: Option<BackendSection>,
}

#[derive(Debug, Deserialize)]
struct SandboxSection {
    max_retries: Option<u32>,
    install_command: Option<Vec<String>>,
    dev_command: Option<Vec<String>>,
    ready_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct BackendSection {
    api_url: Option<String>,
}

impl SessionConfig {
    pub fn path(project_dir: &Path) -> PathBuf {
        project_dir.join(CONFIG_DIR).join(CONFIG_FILE)
    }

    /// Load config from `.sitecraft/sitecraft.toml` in the project directory.
    /// Returns defaults if the file doesn't exist.
    pub fn load(project_dir: &Path) -> Result<Self> {
        let config_path = Self::path(project_dir);
        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;
        Self::parse(&content).with_context(|| format!("Failed to parse {}", config_path.display()))
    }

    /// Parse TOML text, filling unset keys with defaults.
    pub fn parse(content: &str) -> Result<Self> {
        let toml: ConfigToml = toml::from_str(content)?;

        let mut config = Self::default();
        if let Some(section) = toml.sandbox {
            if let Some(max_retries) = section.max_retries {
                config.sandbox.max_retries = max_retries;
            }
            if let Some(install) = section.install_command {
                if install.is_empty() {
                    bail!("sandbox.install_command must not be empty");
                }
                config.sandbox.install_command = install;
            }
            if let Some(dev) = section.dev_command {
                if dev.is_empty() {
                    bail!("sandbox.dev_command must not be empty");
                }
                config.sandbox.dev_command = dev;
            }
            if let Some(secs) = section.ready_timeout_secs {
                config.sandbox.ready_timeout_secs = Some(secs);
            }
        }
        if let Some(section) = toml.backend
            && let Some(api_url) = section.api_url
        {
            config.backend.api_url = api_url;
        }

        Ok(config)
    }

    /// Orchestrator policy for this configuration.
    pub fn lifecycle_policy(&self) -> LifecyclePolicy {
        let defaults = LifecyclePolicy::default();
        LifecyclePolicy {
            max_retries: self.sandbox.max_retries,
            install: CommandSpec::from_argv(&self.sandbox.install_command)
                .unwrap_or(defaults.install),
            dev_server: CommandSpec::from_argv(&self.sandbox.dev_command)
                .unwrap_or(defaults.dev_server),
            ready_timeout: self.sandbox.ready_timeout_secs.map(Duration::from_secs),
        }
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }
}
