use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Why a target could not be used for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetDiagnostic {
    pub target_id: String,
    pub missing: Vec<PathBuf>,
}

impl fmt::Display for AssetDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let paths: Vec<String> = self.missing.iter().map(|p| p.display().to_string()).collect();
        write!(f, "{} (missing: {})", self.target_id, paths.join(", "))
    }
}

fn join_diagnostics(diags: &[AssetDiagnostic]) -> String {
    diags.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

/// Batch-level failures. Per-job failures are never reported through this type.
#[derive(Debug, Error)]
pub enum ScreenError {
    #[error("Nothing to screen: {ligands} ligand(s), {targets} target(s) selected")]
    EmptyInput { ligands: usize, targets: usize },

    #[error("Target not found: {0}")]
    TargetNotFound(String),

    #[error("Target assets not ready: {}", join_diagnostics(.0))]
    AssetNotReady(Vec<AssetDiagnostic>),

    #[error("Docking tool not available: {0}")]
    ToolUnavailable(String),

    #[error("Not a usable ligand file: {0}")]
    InvalidLigand(PathBuf),

    #[error("Duplicate ligand identifier: {0}")]
    DuplicateLigand(String),

    #[error("Duplicate target identifier: {0}")]
    DuplicateTarget(String),

    #[error("Jobs {first} and {second} would both write {}", .output.display())]
    OutputCollision { output: PathBuf, first: String, second: String },

    #[error("Cell already recorded for ligand {ligand} / target {target}")]
    CellAlreadyRecorded { ligand: String, target: String },

    #[error("No cell for ligand {ligand} / target {target}")]
    UnknownCell { ligand: String, target: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, ScreenError>;
