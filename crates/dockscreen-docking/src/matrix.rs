//! Ligand x target score matrix.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use dockscreen_common::{Result, ScreenError};
use serde::{Serialize, Serializer};

use crate::docking::DockingOutcome;

/// Which failure produced an error cell. All kinds render as "Error".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    ToolFailed,
    OutputMissing,
    ScoreAbsent,
}

/// What a cell shows to the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CellValue {
    NotRun,
    Score(f64),
    Error(FailureKind),
}

impl CellValue {
    fn from_outcome(outcome: &DockingOutcome) -> Self {
        match outcome {
            DockingOutcome::Scored(v) => CellValue::Score(*v),
            DockingOutcome::ToolFailed(_) => CellValue::Error(FailureKind::ToolFailed),
            DockingOutcome::OutputMissing => CellValue::Error(FailureKind::OutputMissing),
            DockingOutcome::ScoreAbsent => CellValue::Error(FailureKind::ScoreAbsent),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, CellValue::Error(_))
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::NotRun => f.write_str("-"),
            CellValue::Score(v) => write!(f, "{v:.2}"),
            CellValue::Error(_) => f.write_str("Error"),
        }
    }
}

/// Numbers stay numbers, errors become the string "Error", not-run cells become null.
impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            CellValue::NotRun => serializer.serialize_none(),
            CellValue::Score(v) => serializer.serialize_f64(*v),
            CellValue::Error(_) => serializer.serialize_str("Error"),
        }
    }
}

/// Export row: one ligand and its value per target.
#[derive(Debug, Clone, Serialize)]
pub struct MatrixRow {
    pub ligand: String,
    pub cells: BTreeMap<String, CellValue>,
}

/// Rows keyed by ligand id, columns by target id.
///
/// Append-only: a cell, once recorded, cannot be overwritten.
#[derive(Debug, Clone, Default)]
pub struct ResultMatrix {
    ligands: Vec<String>,
    targets: Vec<String>,
    ligand_index: HashMap<String, usize>,
    target_index: HashMap<String, usize>,
    cells: HashMap<(usize, usize), DockingOutcome>,
}

impl ResultMatrix {
    pub fn new<L, T>(ligand_ids: L, target_ids: T) -> Self
    where
        L: IntoIterator<Item = String>,
        T: IntoIterator<Item = String>,
    {
        let ligands: Vec<String> = ligand_ids.into_iter().collect();
        let targets: Vec<String> = target_ids.into_iter().collect();
        let ligand_index = ligands.iter().enumerate().map(|(i, id)| (id.clone(), i)).collect();
        let target_index = targets.iter().enumerate().map(|(i, id)| (id.clone(), i)).collect();
        Self {
            ligands,
            targets,
            ligand_index,
            target_index,
            cells: HashMap::new(),
        }
    }

    fn position(&self, ligand: &str, target: &str) -> Result<(usize, usize)> {
        match (self.ligand_index.get(ligand), self.target_index.get(target)) {
            (Some(&row), Some(&col)) => Ok((row, col)),
            _ => Err(ScreenError::UnknownCell {
                ligand: ligand.to_string(),
                target: target.to_string(),
            }),
        }
    }

    pub fn record(&mut self, ligand: &str, target: &str, outcome: DockingOutcome) -> Result<()> {
        let key = self.position(ligand, target)?;
        if self.cells.contains_key(&key) {
            return Err(ScreenError::CellAlreadyRecorded {
                ligand: ligand.to_string(),
                target: target.to_string(),
            });
        }
        self.cells.insert(key, outcome);
        Ok(())
    }

    pub fn get(&self, ligand: &str, target: &str) -> Option<&DockingOutcome> {
        let key = self.position(ligand, target).ok()?;
        self.cells.get(&key)
    }

    pub fn value(&self, ligand: &str, target: &str) -> CellValue {
        self.get(ligand, target)
            .map(CellValue::from_outcome)
            .unwrap_or(CellValue::NotRun)
    }

    /// Values of one row in column order; empty for an unknown ligand.
    pub fn row(&self, ligand: &str) -> Vec<(&str, CellValue)> {
        if !self.ligand_index.contains_key(ligand) {
            return Vec::new();
        }
        self.targets
            .iter()
            .map(|t| (t.as_str(), self.value(ligand, t)))
            .collect()
    }

    /// Target with the lowest score in the row. Error and not-run cells are ignored.
    pub fn best_target(&self, ligand: &str) -> Option<(&str, f64)> {
        self.row(ligand)
            .into_iter()
            .filter_map(|(t, v)| match v {
                CellValue::Score(s) => Some((t, s)),
                _ => None,
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }

    pub fn to_rows(&self) -> Vec<MatrixRow> {
        self.ligands
            .iter()
            .map(|l| MatrixRow {
                ligand: l.clone(),
                cells: self
                    .row(l)
                    .into_iter()
                    .map(|(t, v)| (t.to_string(), v))
                    .collect(),
            })
            .collect()
    }

    pub fn ligand_ids(&self) -> &[String] {
        &self.ligands
    }

    pub fn target_ids(&self) -> &[String] {
        &self.targets
    }

    /// Number of recorded cells.
    pub fn recorded(&self) -> usize {
        self.cells.len()
    }

    pub fn capacity(&self) -> usize {
        self.ligands.len() * self.targets.len()
    }

    pub fn is_complete(&self) -> bool {
        self.recorded() == self.capacity()
    }

    pub fn scored(&self) -> usize {
        self.cells.values().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.recorded() - self.scored()
    }
}
