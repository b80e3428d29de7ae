//! dockscreen-docking — Ligand x target virtual screening with AutoDock Vina.
//!
//! This crate handles one screening run end to end:
//! 1. Resolving target receptor/config files (asset registry)
//! 2. Collecting ligands
//! 3. Enumerating the ligand x target job matrix
//! 4. Running AutoDock Vina per job on a bounded worker pool
//! 5. Parsing the best affinity from each output file
//! 6. Assembling the score matrix, with failures kept as error cells

pub mod registry;
pub mod ligand;
pub mod jobs;
pub mod parser;
pub mod docking;
pub mod matrix;
pub mod events;
pub mod pipeline;

pub use docking::{DockingEngine, DockingOutcome, ExitInfo, VinaRunner};
pub use events::{CancelSignal, JobProgress, RunEvent, RunState};
pub use jobs::{DockingJob, JobMatrixBuilder};
pub use ligand::LigandSet;
pub use matrix::{CellValue, FailureKind, MatrixRow, ResultMatrix};
pub use parser::parse_best_affinity;
pub use pipeline::{default_pool_size, BatchRunner, RunContext, RunReport, RunStatus};
pub use registry::AssetRegistry;

pub type Result<T> = dockscreen_common::Result<T>;
