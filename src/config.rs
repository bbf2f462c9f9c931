//! Configuration
//!
//! TOML, every field optional. Lookup order: an explicit `--config` path,
//! `./sous.toml`, then `<config_dir>/sous/config.toml`; otherwise defaults.
//! `SOUS_MAX_DEPTH`, `SOUS_SHELL` and `NO_COLOR` override the file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::errors::{RecipeError, Result};

pub const LOCAL_CONFIG: &str = "sous.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub ui: UiConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Operation nesting limit; catches cyclic handler graphs
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    /// Seconds an interrupted interactive command gets before it is killed
    #[serde(default = "default_interrupt_grace")]
    pub interrupt_grace_secs: u64,
    /// Iteration cap for `while` loops (0 = unlimited)
    #[serde(default = "default_max_while_iterations")]
    pub max_while_iterations: usize,
    #[serde(default = "default_shell")]
    pub shell: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            interrupt_grace_secs: default_interrupt_grace(),
            max_while_iterations: default_max_while_iterations(),
            shell: default_shell(),
        }
    }
}

fn default_max_depth() -> usize {
    50
}
fn default_interrupt_grace() -> u64 {
    2
}
fn default_max_while_iterations() -> usize {
    10_000
}
fn default_shell() -> String {
    "sh".to_string()
}

/// Directories scanned for component files
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default)]
    pub components: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiConfig {
    #[serde(default = "default_true")]
    pub color: bool,
    /// Draw progress bars for loops that ask for one
    #[serde(default = "default_true")]
    pub progress: bool,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            color: true,
            progress: true,
        }
    }
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => {
                let mut candidates = vec![PathBuf::from(LOCAL_CONFIG)];
                if let Some(dir) = dirs::config_dir() {
                    candidates.push(dir.join("sous").join("config.toml"));
                }
                match candidates.iter().find(|p| p.is_file()) {
                    Some(p) => Self::from_file(p)?,
                    None => {
                        debug!("No config file found, using defaults");
                        Self::default()
                    }
                }
            }
        };
        config.apply_env();
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RecipeError::Config(format!("Failed to read config from {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml(&content)
            .map_err(|e| RecipeError::Config(format!("{}: {}", path.display(), e)))?;
        debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| RecipeError::Config(e.to_string()))
    }

    fn apply_env(&mut self) {
        if let Ok(depth) = std::env::var("SOUS_MAX_DEPTH") {
            if let Ok(n) = depth.parse::<usize>() {
                self.engine.max_depth = n;
            }
        }
        if let Ok(shell) = std::env::var("SOUS_SHELL") {
            if !shell.trim().is_empty() {
                self.engine.shell = shell;
            }
        }
        if std::env::var_os("NO_COLOR").is_some() {
            self.ui.color = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.engine.max_depth, 50);
        assert_eq!(config.engine.interrupt_grace_secs, 2);
        assert_eq!(config.engine.max_while_iterations, 10_000);
        assert_eq!(config.engine.shell, "sh");
        assert!(config.ui.progress);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
[engine]
max_while_iterations = 0

[paths]
components = ["components", "/opt/sous/components"]
"#,
        )
        .unwrap();
        assert_eq!(config.engine.max_while_iterations, 0);
        assert_eq!(config.engine.max_depth, 50);
        assert_eq!(config.paths.components.len(), 2);
        assert!(config.ui.color);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = Config::from_toml("[engine\nmax_depth = ").unwrap_err();
        assert!(matches!(err, RecipeError::Config(_)));
    }

    #[test]
    fn test_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "[engine]\nshell = \"bash\"\n").unwrap();
        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.engine.shell, "bash");

        let missing = Config::from_file(&dir.path().join("nope.toml"));
        assert!(matches!(missing, Err(RecipeError::Config(_))));
    }
}
