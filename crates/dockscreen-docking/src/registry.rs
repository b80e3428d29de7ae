//! Asset registry: target id -> receptor and search-space files on local storage.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use dockscreen_common::{AssetDiagnostic, Result, ScreenError, TargetCatalog, TargetDefinition};
use tracing::debug;

/// Immutable catalog of resolved targets. Order follows the catalog.
#[derive(Debug, Clone)]
pub struct AssetRegistry {
    targets: Vec<TargetDefinition>,
    index: HashMap<String, usize>,
}

impl AssetRegistry {
    /// Resolve every catalog entry against the receptor and config directories.
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(
        catalog: &TargetCatalog,
        receptor_dir: P,
        config_dir: Q,
    ) -> Result<Self> {
        catalog.validate()?;
        let targets = catalog
            .targets
            .iter()
            .map(|entry| TargetDefinition {
                id: entry.id.clone(),
                label: entry.display_label().to_string(),
                receptor: receptor_dir.as_ref().join(&entry.receptor_file),
                config: config_dir.as_ref().join(&entry.config_file),
                description: entry.description.clone(),
            })
            .collect();
        Self::from_definitions(targets)
    }

    pub fn from_definitions(targets: Vec<TargetDefinition>) -> Result<Self> {
        let mut index = HashMap::with_capacity(targets.len());
        for (i, target) in targets.iter().enumerate() {
            if index.insert(target.id.clone(), i).is_some() {
                return Err(ScreenError::DuplicateTarget(target.id.clone()));
            }
        }
        Ok(Self { targets, index })
    }

    pub fn resolve(&self, target_id: &str) -> Result<&TargetDefinition> {
        self.index
            .get(target_id)
            .map(|&i| &self.targets[i])
            .ok_or_else(|| ScreenError::TargetNotFound(target_id.to_string()))
    }

    /// True iff both the receptor and the config file exist.
    pub fn is_ready(&self, target_id: &str) -> bool {
        match self.resolve(target_id) {
            Ok(target) => missing_files(target).is_empty(),
            Err(_) => false,
        }
    }

    /// `None` when the target is ready.
    pub fn diagnose(&self, target_id: &str) -> Option<AssetDiagnostic> {
        let target = self.resolve(target_id).ok()?;
        let missing = missing_files(target);
        if missing.is_empty() {
            None
        } else {
            debug!(target = %target_id, ?missing, "Target assets missing");
            Some(AssetDiagnostic {
                target_id: target_id.to_string(),
                missing,
            })
        }
    }

    pub fn targets(&self) -> &[TargetDefinition] {
        &self.targets
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

fn missing_files(target: &TargetDefinition) -> Vec<PathBuf> {
    [&target.receptor, &target.config]
        .into_iter()
        .filter(|p| !p.is_file())
        .cloned()
        .collect()
}
