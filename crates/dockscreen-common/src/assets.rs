//! Ligand and target value types.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A receptor plus the search-space box it is docked in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetDefinition {
    /// Stable identifier, unique within a registry.
    pub id: String,
    /// Display text, e.g. "PTP1B (1X70)".
    pub label: String,
    pub receptor: PathBuf,
    pub config: PathBuf,
    pub description: String,
}

impl TargetDefinition {
    /// Receptor filename without its extension, used in output naming.
    pub fn structure_stem(&self) -> String {
        self.receptor
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.id.clone())
    }
}

/// A prepared ligand structure file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LigandAsset {
    /// Derived from the filename stem.
    pub id: String,
    pub path: PathBuf,
}

impl LigandAsset {
    /// Build a ligand from its file path. Returns `None` for paths without a usable stem.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Self> {
        let path = path.as_ref();
        let id = path.file_stem()?.to_string_lossy().into_owned();
        if id.is_empty() {
            return None;
        }
        Some(Self {
            id,
            path: path.to_path_buf(),
        })
    }
}
