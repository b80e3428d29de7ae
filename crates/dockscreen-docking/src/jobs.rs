//! Job matrix: the ordered ligand x target cross-product.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use dockscreen_common::{LigandAsset, Result, ScreenError, TargetDefinition};
use serde::Serialize;

/// One (ligand, target) docking task and the file its poses are written to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DockingJob {
    pub ligand: LigandAsset,
    pub target: TargetDefinition,
    pub output: PathBuf,
}

/// Builds jobs and derives output locations.
#[derive(Debug, Clone)]
pub struct JobMatrixBuilder {
    output_dir: PathBuf,
    extension: String,
}

impl JobMatrixBuilder {
    pub fn new<P: AsRef<Path>>(output_dir: P, extension: &str) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            extension: extension.trim_start_matches('.').to_string(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// `<ligand-id>_<receptor-stem>_out.<ext>`
    pub fn output_file_name(&self, ligand_id: &str, target: &TargetDefinition) -> String {
        let stem = format!("{}_{}_out", ligand_id, target.structure_stem());
        if self.extension.is_empty() {
            stem
        } else {
            format!("{}.{}", stem, self.extension)
        }
    }

    /// Re-derivable after the run, e.g. to open a pose for viewing.
    pub fn output_path(&self, ligand_id: &str, target: &TargetDefinition) -> PathBuf {
        self.output_dir.join(self.output_file_name(ligand_id, target))
    }

    /// Row-major cross-product: outer loop over ligands, inner loop over targets.
    ///
    /// Fails with `OutputCollision` when two pairs derive the same output path,
    /// e.g. two targets sharing a receptor file.
    pub fn build(&self, ligands: &[LigandAsset], targets: &[TargetDefinition]) -> Result<Vec<DockingJob>> {
        if ligands.is_empty() || targets.is_empty() {
            return Err(ScreenError::EmptyInput {
                ligands: ligands.len(),
                targets: targets.len(),
            });
        }

        let mut jobs = Vec::with_capacity(ligands.len() * targets.len());
        let mut owners: HashMap<PathBuf, String> = HashMap::with_capacity(jobs.capacity());
        for ligand in ligands {
            for target in targets {
                let output = self.output_path(&ligand.id, target);
                let pair = format!("{}/{}", ligand.id, target.id);
                if let Some(first) = owners.insert(output.clone(), pair.clone()) {
                    return Err(ScreenError::OutputCollision {
                        output,
                        first,
                        second: pair,
                    });
                }
                jobs.push(DockingJob {
                    ligand: ligand.clone(),
                    target: target.clone(),
                    output,
                });
            }
        }
        Ok(jobs)
    }
}
