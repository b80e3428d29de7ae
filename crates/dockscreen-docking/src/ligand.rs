//! Ligand set for a run.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use dockscreen_common::{LigandAsset, Result, ScreenError};
use tracing::{debug, info};
use walkdir::WalkDir;

pub const LIGAND_EXTENSION: &str = "pdbqt";

/// Ordered ligands with unique ids. Row order of the result matrix follows insertion order.
#[derive(Debug, Clone, Default)]
pub struct LigandSet {
    ligands: Vec<LigandAsset>,
    by_id: HashMap<String, usize>,
}

impl LigandSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a ligand file.
    ///
    /// Returns `Ok(false)` when the same path is already present. A different
    /// path whose stem collides with an existing id is rejected.
    pub fn add<P: AsRef<Path>>(&mut self, path: P) -> Result<bool> {
        let path = path.as_ref();
        let ligand = LigandAsset::from_path(path)
            .ok_or_else(|| ScreenError::InvalidLigand(path.to_path_buf()))?;

        if let Some(&i) = self.by_id.get(&ligand.id) {
            if self.ligands[i].path == ligand.path {
                return Ok(false);
            }
            return Err(ScreenError::DuplicateLigand(ligand.id));
        }

        self.by_id.insert(ligand.id.clone(), self.ligands.len());
        self.ligands.push(ligand);
        Ok(true)
    }

    /// Add several files; returns how many were new.
    pub fn add_all<I, P>(&mut self, paths: I) -> Result<usize>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut added = 0;
        for path in paths {
            if self.add(path)? {
                added += 1;
            }
        }
        Ok(added)
    }

    /// Recursively collect `.pdbqt` files under `dir`, in path order.
    pub fn scan_dir<P: AsRef<Path>>(&mut self, dir: P) -> Result<usize> {
        let dir = dir.as_ref();
        let mut found: Vec<PathBuf> = Vec::new();
        for entry in WalkDir::new(dir) {
            let entry = entry.map_err(std::io::Error::from)?;
            if entry.file_type().is_file() && has_ligand_extension(entry.path()) {
                found.push(entry.into_path());
            }
        }
        found.sort();
        debug!("Found {} ligand files under {:?}", found.len(), dir);

        let added = self.add_all(found)?;
        info!("Added {} ligands from {:?}", added, dir);
        Ok(added)
    }

    pub fn clear(&mut self) {
        self.ligands.clear();
        self.by_id.clear();
    }

    pub fn get(&self, id: &str) -> Option<&LigandAsset> {
        self.by_id.get(id).map(|&i| &self.ligands[i])
    }

    pub fn as_slice(&self) -> &[LigandAsset] {
        &self.ligands
    }

    pub fn iter(&self) -> impl Iterator<Item = &LigandAsset> {
        self.ligands.iter()
    }

    pub fn len(&self) -> usize {
        self.ligands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ligands.is_empty()
    }
}

fn has_ligand_extension(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case(LIGAND_EXTENSION))
        .unwrap_or(false)
}
