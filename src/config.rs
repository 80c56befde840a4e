//! Agent configuration
//!
//! Stored in `~/.config/task-agent/config.toml`.
//!
//! ## Priority Order (highest to lowest)
//!
//! 1. Command-line flags
//! 2. Environment variables (`TASK_AGENT_LOG_LEVEL`, `TASK_AGENT_LOG_JSON`, `TASK_AGENT_SHELL`)
//! 3. Config file
//! 4. Defaults

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TaskError};

pub const ENV_LOG_LEVEL: &str = "TASK_AGENT_LOG_LEVEL";
pub const ENV_LOG_JSON: &str = "TASK_AGENT_LOG_JSON";
pub const ENV_SHELL: &str = "TASK_AGENT_SHELL";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AgentConfig {
    #[serde(default)]
    pub log: LogConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub exec: ExecConfig,
}

/// Process logging
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogConfig {
    /// Default filter directive when RUST_LOG is unset (error, warn, info, debug, trace)
    #[serde(default = "default_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OutputConfig {
    /// Pretty-print JSON response bodies
    #[serde(default)]
    pub pretty: bool,
}

/// Settings for the sample exec handler
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecConfig {
    /// Shell used to run scripts, invoked as `<shell> -c <script>`
    #[serde(default = "default_shell")]
    pub shell: String,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            shell: default_shell(),
        }
    }
}

fn default_shell() -> String {
    "sh".to_string()
}

impl AgentConfig {
    /// `~/.config/task-agent/` on Unix, `%APPDATA%/task-agent/` on Windows
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("task-agent")
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load from the default location; a missing file yields defaults.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load from `path`. Missing file = defaults, malformed file = error.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| TaskError::Config {
            reason: format!("Failed to read {}: {}", path.display(), e),
        })?;

        toml::from_str(&content).map_err(|e| TaskError::Config {
            reason: format!("Failed to parse {}: {}", path.display(), e),
        })
    }

    /// Apply environment overrides. Empty variables are ignored.
    pub fn with_env(self) -> Self {
        self.with_env_from(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn with_env_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(level) = var(ENV_LOG_LEVEL) {
            self.log.level = level;
        }
        if let Some(json) = var(ENV_LOG_JSON) {
            self.log.json = parse_flag(&json);
        }
        if let Some(shell) = var(ENV_SHELL) {
            self.exec.shell = shell;
        }

        self
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn config_path_contains_crate_dir() {
        let path = AgentConfig::config_path();
        assert!(path.to_string_lossy().contains("task-agent"));
        assert!(path.to_string_lossy().ends_with("config.toml"));
        assert_eq!(path.parent().unwrap(), AgentConfig::config_dir());
    }

    #[test]
    fn defaults() {
        let config = AgentConfig::default();
        assert_eq!(config.log.level, "info");
        assert!(!config.log.json);
        assert!(!config.output.pretty);
        assert_eq!(config.exec.shell, "sh");
    }

    #[test]
    fn missing_file_is_default() {
        let dir = TempDir::new().unwrap();
        let config = AgentConfig::load_from(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config, AgentConfig::default());
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[log]\njson = true\n\n[exec]\nshell = \"bash\"\n").unwrap();

        let config = AgentConfig::load_from(&path).unwrap();
        assert_eq!(config.log.level, "info");
        assert!(config.log.json);
        assert_eq!(config.exec.shell, "bash");
        assert!(!config.output.pretty);
    }

    #[test]
    fn malformed_file_is_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[log\nlevel = ").unwrap();

        let err = AgentConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, TaskError::Config { .. }));
        assert!(err.to_string().starts_with("invalid configuration"));
    }

    #[test]
    fn env_overrides_file() {
        let env = HashMap::from([
            (ENV_LOG_LEVEL, "debug"),
            (ENV_LOG_JSON, "true"),
            (ENV_SHELL, "bash"),
        ]);
        let config = AgentConfig::default().with_env_from(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.log.level, "debug");
        assert!(config.log.json);
        assert_eq!(config.exec.shell, "bash");
    }

    #[test]
    fn empty_env_does_not_override() {
        let mut config = AgentConfig::default();
        config.exec.shell = "zsh".into();
        let config = config.with_env_from(|_| Some(String::new()));
        assert_eq!(config.exec.shell, "zsh");
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn toml_round_trip() {
        let config = AgentConfig {
            log: LogConfig {
                level: "warn".into(),
                json: true,
            },
            output: OutputConfig { pretty: true },
            exec: ExecConfig {
                shell: "bash".into(),
            },
        };
        let text = toml::to_string_pretty(&config).unwrap();
        assert!(text.contains("[log]"));
        assert!(text.contains("[exec]"));
        assert_eq!(toml::from_str::<AgentConfig>(&text).unwrap(), config);
    }

    #[test]
    fn flag_parsing() {
        assert!(parse_flag("1"));
        assert!(parse_flag("TRUE"));
        assert!(parse_flag(" yes "));
        assert!(!parse_flag("0"));
        assert!(!parse_flag("off"));
    }
}
