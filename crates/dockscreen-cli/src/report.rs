//! Plain-text and JSON rendering of a finished run.

use chrono::{DateTime, Utc};
use dockscreen_docking::{MatrixRow, RunReport, RunStatus};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct JsonReport {
    pub run_id: Uuid,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total_jobs: usize,
    pub scored: usize,
    pub failed: usize,
    pub rows: Vec<MatrixRow>,
}

impl From<&RunReport> for JsonReport {
    fn from(report: &RunReport) -> Self {
        Self {
            run_id: report.run_id,
            status: report.status,
            started_at: report.started_at,
            finished_at: report.finished_at,
            total_jobs: report.total_jobs,
            scored: report.scored(),
            failed: report.failed(),
            rows: report.matrix.to_rows(),
        }
    }
}

/// Score table (kcal/mol), one row per ligand, with the best target last.
pub fn render_table(report: &RunReport) -> String {
    let matrix = &report.matrix;
    let ligand_width = matrix
        .ligand_ids()
        .iter()
        .map(String::len)
        .chain(std::iter::once("Ligand".len()))
        .max()
        .unwrap_or(6);
    let widths: Vec<usize> = matrix.target_ids().iter().map(|t| t.len().max(8)).collect();

    let mut out = String::new();
    out.push_str(&format!("{:<ligand_width$}", "Ligand"));
    for (target, w) in matrix.target_ids().iter().zip(&widths) {
        out.push_str(&format!("  {:>w$}", target, w = *w));
    }
    out.push_str("  Best\n");

    for ligand in matrix.ligand_ids() {
        out.push_str(&format!("{:<ligand_width$}", ligand));
        for ((_, value), w) in matrix.row(ligand).into_iter().zip(&widths) {
            out.push_str(&format!("  {:>w$}", value.to_string(), w = *w));
        }
        match matrix.best_target(ligand) {
            Some((target, _)) => out.push_str(&format!("  {target}\n")),
            None => out.push_str("  -\n"),
        }
    }
    out
}
