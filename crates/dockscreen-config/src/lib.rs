//! Configuration loading for dockscreen.
//! Reads dockscreen.toml from the current directory or the path in the DOCKSCREEN_CONFIG env var.

use dockscreen_common::{TargetCatalog, TargetEntry};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const CONFIG_ENV_VAR: &str = "DOCKSCREEN_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "dockscreen.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub tool: ToolConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default = "default_targets")]
    pub targets: Vec<TargetEntry>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tool: ToolConfig::default(),
            paths: PathsConfig::default(),
            execution: ExecutionConfig::default(),
            targets: default_targets(),
        }
    }
}

fn default_targets() -> Vec<TargetEntry> { TargetCatalog::default().targets }

// ── Scoring tool ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolConfig {
    /// Scoring executable, either a path or a bare name looked up on PATH.
    #[serde(default = "default_executable")]
    pub executable: PathBuf,
    /// Arguments placed before the docking flags (e.g. a container runtime invocation).
    #[serde(default)]
    pub launcher: Vec<String>,
    #[serde(default = "default_cpu_per_job")]
    pub cpu_per_job: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_executable()   -> PathBuf { PathBuf::from("vina") }
fn default_cpu_per_job()  -> u32     { 2 }
fn default_timeout_secs() -> u64     { 3600 }

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            executable: default_executable(),
            launcher: Vec::new(),
            cpu_per_job: default_cpu_per_job(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ToolConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ── Local directories ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_receptor_dir")]
    pub receptor_dir: PathBuf,
    #[serde(default = "default_config_dir")]
    pub config_dir: PathBuf,
    #[serde(default = "default_ligand_dir")]
    pub ligand_dir: PathBuf,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// YAML or JSON target catalog used instead of `[[targets]]`.
    #[serde(default)]
    pub catalog_file: Option<PathBuf>,
}

fn default_receptor_dir() -> PathBuf { PathBuf::from("workspace/receptors") }
fn default_config_dir()   -> PathBuf { PathBuf::from("workspace/configs") }
fn default_ligand_dir()   -> PathBuf { PathBuf::from("workspace/ligands") }
fn default_output_dir()   -> PathBuf { PathBuf::from("workspace/docking_output") }

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            receptor_dir: default_receptor_dir(),
            config_dir: default_config_dir(),
            ligand_dir: default_ligand_dir(),
            output_dir: default_output_dir(),
            catalog_file: None,
        }
    }
}

// ── Execution ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Overrides the pool size derived from CPU count and `tool.cpu_per_job`.
    #[serde(default)]
    pub max_workers: Option<usize>,
    #[serde(default = "default_output_extension")]
    pub output_extension: String,
}

fn default_output_extension() -> String { "pdbqt".to_string() }

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_workers: None,
            output_extension: default_output_extension(),
        }
    }
}

impl Config {
    /// Load configuration from dockscreen.toml.
    /// Checks DOCKSCREEN_CONFIG env var first, then current directory.
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_ENV_VAR)
            .unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::from_file(path)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.tool.cpu_per_job == 0 {
            return Err(ConfigError::Invalid("tool.cpu_per_job must be at least 1".to_string()));
        }
        if self.tool.timeout_secs == 0 {
            return Err(ConfigError::Invalid("tool.timeout_secs must be at least 1".to_string()));
        }
        if self.execution.max_workers == Some(0) {
            return Err(ConfigError::Invalid("execution.max_workers must be at least 1".to_string()));
        }
        TargetCatalog::new(self.targets.clone())
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Target catalog: `paths.catalog_file` when set, otherwise `[[targets]]`.
    pub fn catalog(&self) -> Result<TargetCatalog> {
        let Some(path) = &self.paths.catalog_file else {
            return Ok(TargetCatalog::new(self.targets.clone()));
        };
        let path_str = path.to_string_lossy();
        let loaded = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => TargetCatalog::from_yaml(&path_str),
            Some("json") => TargetCatalog::from_json(&path_str),
            _ => {
                return Err(ConfigError::Invalid(format!(
                    "paths.catalog_file must end in .yaml, .yml or .json: {}",
                    path.display()
                )))
            }
        };
        loaded.map_err(|e| ConfigError::Invalid(format!("{}: {}", path.display(), e)))
    }
}
