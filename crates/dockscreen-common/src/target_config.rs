//! Static target catalog.
//!
//! Each entry maps a stable target id to the receptor and search-space files
//! a run needs. The catalog can be loaded from YAML or JSON; when none is
//! given the built-in type-2 diabetes panel is used.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{Result, ScreenError};

/// One catalog row: identity, filenames and display text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetEntry {
    /// Stable identifier (e.g., "ptp1b")
    pub id: String,

    /// Display label (e.g., "PTP1B (1X70)")
    #[serde(default)]
    pub label: String,

    /// Receptor structure filename, relative to the receptor directory
    pub receptor_file: String,

    /// Search-space configuration filename, relative to the config directory
    pub config_file: String,

    #[serde(default)]
    pub description: String,
}

impl TargetEntry {
    pub fn new(id: &str, label: &str, receptor_file: &str, config_file: &str, description: &str) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            receptor_file: receptor_file.to_string(),
            config_file: config_file.to_string(),
            description: description.to_string(),
        }
    }

    /// Label to show, falling back to the id.
    pub fn display_label(&self) -> &str {
        if self.label.is_empty() { &self.id } else { &self.label }
    }
}

/// Ordered list of catalog entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetCatalog {
    pub targets: Vec<TargetEntry>,
}

impl Default for TargetCatalog {
    fn default() -> Self {
        Self { targets: builtin_targets() }
    }
}

// ── Built-in panel ────────────────────────────────────────────────────────────

/// The type-2 diabetes target panel.
pub fn builtin_targets() -> Vec<TargetEntry> {
    vec![
        TargetEntry::new(
            "ptp1b",
            "PTP1B (1X70)",
            "3duy.pdbqt",
            "3duy.txt",
            "Protein Tyrosine Phosphatase 1B - Insulin signaling regulation",
        ),
        TargetEntry::new(
            "dpp4",
            "DPP-4 (4A5S)",
            "3ine.pdbqt",
            "3ine.txt",
            "Dipeptidyl peptidase-4 - Glucose homeostasis",
        ),
        TargetEntry::new(
            "alpha-glucosidase",
            "Alpha-Glucosidase (3A4A)",
            "3inf.pdbqt",
            "3inf.txt",
            "Alpha-Glucosidase - Carbohydrate digestion",
        ),
        TargetEntry::new(
            "alpha-amylase",
            "Alpha-Amylase (1B2Y)",
            "3inh.pdbqt",
            "3inh.txt",
            "Alpha-Amylase - Starch hydrolysis",
        ),
        TargetEntry::new(
            "ppar-gamma",
            "PPAR-gamma (2PRG)",
            "3ooz.pdbqt",
            "3ooz.txt",
            "Peroxisome proliferator-activated receptor gamma - Insulin sensitization",
        ),
    ]
}

// ── Helper Methods ─────────────────────────────────────────────────────────────

impl TargetCatalog {
    pub fn new(targets: Vec<TargetEntry>) -> Self {
        Self { targets }
    }

    /// Load from YAML file
    pub fn from_yaml(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let catalog: Self = serde_yaml::from_str(&content)?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Load from JSON file
    pub fn from_json(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let catalog: Self = serde_json::from_str(&content)?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Ids must be non-empty and unique.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for entry in &self.targets {
            if entry.id.trim().is_empty() {
                return Err(ScreenError::Config(format!(
                    "target with receptor '{}' has an empty id",
                    entry.receptor_file
                )));
            }
            if !seen.insert(entry.id.as_str()) {
                return Err(ScreenError::DuplicateTarget(entry.id.clone()));
            }
        }
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&TargetEntry> {
        self.targets.iter().find(|t| t.id == id)
    }

    pub fn ids(&self) -> Vec<&str> {
        self.targets.iter().map(|t| t.id.as_str()).collect()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
