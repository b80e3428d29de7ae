//! Batch runner: drives the ligand x target job matrix to a complete score matrix.
//!
//! Lifecycle per run: `Idle -> Validating -> Executing -> Completed`.
//! Validation failures (empty selection, unavailable tool, unknown or
//! incomplete targets) return the run to `Idle` before any job starts.
//! Once executing, a run always ends with a matrix; individual failures are
//! recorded as error cells.
//!
//! Jobs are dispatched in job-matrix order onto a bounded pool of workers.
//! Workers hand their outcomes to a single collector, which is the only
//! writer of the matrix and the only emitter of progress events.
//!
//! Cancellation is checked before every dispatch. In-flight jobs are allowed
//! to finish, but outcomes received after cancellation are discarded and
//! their cells stay "not run". The signal is cleared when `run` returns, so
//! the same runner can start a fresh run afterwards.

use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dockscreen_common::{Result, ScreenError, TargetDefinition};
use futures::FutureExt;
use serde::Serialize;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::docking::{DockingEngine, DockingOutcome, ExitInfo};
use crate::events::{CancelSignal, JobProgress, RunEvent, RunState};
use crate::jobs::{DockingJob, JobMatrixBuilder};
use crate::ligand::LigandSet;
use crate::matrix::ResultMatrix;
use crate::registry::AssetRegistry;

/// Worker count for a given per-job CPU budget.
pub fn default_pool_size(cpu_per_job: u32) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(1);
    (cores / cpu_per_job.max(1) as usize).max(1)
}

// ── Run context ───────────────────────────────────────────────────────────────

/// Caller-owned state for screening runs: the ligand set, the selected
/// targets and the outcome of the most recent run.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub ligands: LigandSet,
    pub selected_targets: Vec<String>,
    state: RunState,
    last_report: Option<RunReport>,
}

impl RunContext {
    pub fn new(ligands: LigandSet, selected_targets: Vec<String>) -> Self {
        Self {
            ligands,
            selected_targets,
            state: RunState::Idle,
            last_report: None,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn report(&self) -> Option<&RunReport> {
        self.last_report.as_ref()
    }

    pub fn take_report(&mut self) -> Option<RunReport> {
        self.last_report.take()
    }
}

// ── Result summary ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: RunStatus,
    pub total_jobs: usize,
    pub matrix: ResultMatrix,
}

impl RunReport {
    pub fn completed_jobs(&self) -> usize {
        self.matrix.recorded()
    }

    pub fn scored(&self) -> usize {
        self.matrix.scored()
    }

    pub fn failed(&self) -> usize {
        self.matrix.failed()
    }

    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

// ── Runner ────────────────────────────────────────────────────────────────────

pub struct BatchRunner {
    registry: AssetRegistry,
    engine: Arc<dyn DockingEngine>,
    builder: JobMatrixBuilder,
    workers: usize,
    events: Option<mpsc::UnboundedSender<RunEvent>>,
    cancel: CancelSignal,
}

impl BatchRunner {
    pub fn new(registry: AssetRegistry, engine: Arc<dyn DockingEngine>, builder: JobMatrixBuilder) -> Self {
        let workers = default_pool_size(engine.cpu_per_job());
        Self {
            registry,
            engine,
            builder,
            workers,
            events: None,
            cancel: CancelSignal::new(),
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_events(mut self, tx: mpsc::UnboundedSender<RunEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_signal(&self) -> CancelSignal {
        self.cancel.clone()
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn registry(&self) -> &AssetRegistry {
        &self.registry
    }

    pub fn builder(&self) -> &JobMatrixBuilder {
        &self.builder
    }

    fn emit(&self, event: RunEvent) {
        if let Some(ref tx) = self.events {
            let _ = tx.send(event);
        }
    }

    fn transition(&self, ctx: &mut RunContext, state: RunState) {
        debug!("Run state {:?} -> {:?}", ctx.state, state);
        ctx.state = state;
        self.emit(RunEvent::StateChanged { state });
    }

    /// Check every batch precondition and resolve the selected targets in selection order.
    pub fn validate(&self, ctx: &RunContext) -> Result<Vec<TargetDefinition>> {
        if ctx.ligands.is_empty() || ctx.selected_targets.is_empty() {
            return Err(ScreenError::EmptyInput {
                ligands: ctx.ligands.len(),
                targets: ctx.selected_targets.len(),
            });
        }

        if !self.engine.is_available() {
            return Err(ScreenError::ToolUnavailable(self.engine.describe()));
        }

        let mut seen = HashSet::new();
        let mut targets = Vec::with_capacity(ctx.selected_targets.len());
        for id in &ctx.selected_targets {
            if !seen.insert(id.as_str()) {
                return Err(ScreenError::DuplicateTarget(id.clone()));
            }
            targets.push(self.registry.resolve(id)?.clone());
        }

        let diagnostics: Vec<_> = targets
            .iter()
            .filter_map(|t| self.registry.diagnose(&t.id))
            .collect();
        if !diagnostics.is_empty() {
            return Err(ScreenError::AssetNotReady(diagnostics));
        }

        Ok(targets)
    }

    /// Run every job for the context's ligands and selected targets.
    ///
    /// The report of the run is stored in `ctx`, replacing any earlier one.
    #[instrument(skip(self, ctx), fields(ligands = ctx.ligands.len(), targets = ctx.selected_targets.len()))]
    pub async fn run<'a>(&self, ctx: &'a mut RunContext) -> Result<&'a RunReport> {
        self.transition(ctx, RunState::Validating);

        let prepared = self.prepare(ctx).await;
        let (targets, jobs) = match prepared {
            Ok(p) => p,
            Err(e) => {
                warn!("Run rejected: {}", e);
                self.cancel.reset();
                self.transition(ctx, RunState::Idle);
                return Err(e);
            }
        };

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let total = jobs.len();
        info!(run_id = %run_id, jobs = total, workers = self.workers, "Starting docking run");

        let matrix = ResultMatrix::new(
            ctx.ligands.iter().map(|l| l.id.clone()),
            targets.iter().map(|t| t.id.clone()),
        );

        self.transition(ctx, RunState::Executing);
        let matrix = self.execute(jobs, matrix).await;

        let status = if matrix.is_complete() {
            RunStatus::Completed
        } else {
            RunStatus::Cancelled
        };
        let report = RunReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            status,
            total_jobs: total,
            matrix,
        };
        info!(
            run_id = %run_id,
            scored = report.scored(),
            failed = report.failed(),
            "Docking run finished ({:?}) in {} ms",
            status,
            report.duration_ms()
        );

        let terminal = match status {
            RunStatus::Completed => RunState::Completed,
            RunStatus::Cancelled => RunState::Cancelled,
        };
        self.cancel.reset();
        self.transition(ctx, terminal);
        let report = ctx.last_report.insert(report);
        Ok(&*report)
    }

    async fn prepare(&self, ctx: &RunContext) -> Result<(Vec<TargetDefinition>, Vec<DockingJob>)> {
        let targets = self.validate(ctx)?;
        let jobs = self.builder.build(ctx.ligands.as_slice(), &targets)?;
        tokio::fs::create_dir_all(self.builder.output_dir()).await?;
        Ok((targets, jobs))
    }

    async fn execute(&self, jobs: Vec<DockingJob>, mut matrix: ResultMatrix) -> ResultMatrix {
        let total = jobs.len();
        let (tx, mut rx) = mpsc::unbounded_channel::<(DockingJob, DockingOutcome)>();

        let dispatcher = {
            let engine = self.engine.clone();
            let cancel = self.cancel.clone();
            let permits = Arc::new(Semaphore::new(self.workers));
            tokio::spawn(async move {
                let mut dispatched = 0usize;
                for job in jobs {
                    if cancel.is_cancelled() {
                        break;
                    }
                    let permit = match permits.clone().acquire_owned().await {
                        Ok(p) => p,
                        Err(_) => break,
                    };
                    // The wait for a free worker may have outlasted a cancellation.
                    if cancel.is_cancelled() {
                        break;
                    }

                    let engine = engine.clone();
                    let tx = tx.clone();
                    tokio::spawn(async move {
                        let outcome = AssertUnwindSafe(engine.run(&job))
                            .catch_unwind()
                            .await
                            .unwrap_or_else(|_| {
                                DockingOutcome::ToolFailed(ExitInfo::Crashed {
                                    message: "docking engine panicked".to_string(),
                                })
                            });
                        drop(permit);
                        let _ = tx.send((job, outcome));
                    });
                    dispatched += 1;
                }
                dispatched
            })
        };

        let mut completed = 0usize;
        while let Some((job, outcome)) = rx.recv().await {
            if self.cancel.is_cancelled() {
                debug!(ligand = %job.ligand.id, target = %job.target.id, "Discarding outcome received after cancellation");
                continue;
            }

            match &outcome {
                DockingOutcome::Scored(v) => {
                    debug!(ligand = %job.ligand.id, target = %job.target.id, affinity = *v, "Job scored")
                }
                DockingOutcome::ToolFailed(exit) => {
                    warn!(ligand = %job.ligand.id, target = %job.target.id, "Docking failed: {}", exit)
                }
                DockingOutcome::OutputMissing => {
                    warn!(ligand = %job.ligand.id, target = %job.target.id, "Docking reported success but wrote no output {:?}", job.output)
                }
                DockingOutcome::ScoreAbsent => {
                    warn!(ligand = %job.ligand.id, target = %job.target.id, "No result record in {:?}", job.output)
                }
            }

            let success = outcome.is_success();
            if let Err(e) = matrix.record(&job.ligand.id, &job.target.id, outcome) {
                warn!("Dropping outcome: {}", e);
                continue;
            }
            completed += 1;
            self.emit(RunEvent::JobFinished(JobProgress {
                completed,
                total,
                ligand_id: job.ligand.id,
                target_id: job.target.id,
                success,
            }));
        }

        match dispatcher.await {
            Ok(dispatched) => debug!("Dispatched {} of {} jobs", dispatched, total),
            Err(e) => warn!("Dispatcher task failed: {}", e),
        }
        matrix
    }
}
