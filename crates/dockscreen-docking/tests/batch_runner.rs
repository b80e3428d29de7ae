//! Batch runner behaviour with a scripted docking engine.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use dockscreen_common::{ScreenError, TargetCatalog, TargetEntry};
use dockscreen_docking::{
    AssetRegistry, BatchRunner, CancelSignal, CellValue, DockingEngine, DockingJob, DockingOutcome,
    ExitInfo, FailureKind, JobMatrixBuilder, LigandSet, RunContext, RunEvent, RunState, RunStatus,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;
use tokio::sync::mpsc;

/// Engine that answers from a table, optionally after a per-pair delay.
#[derive(Default)]
struct ScriptedEngine {
    outcomes: HashMap<(String, String), DockingOutcome>,
    delays: HashMap<(String, String), Duration>,
    calls: AtomicUsize,
    order: Mutex<Vec<(String, String)>>,
    cancel_on_call: Option<(usize, CancelSignal)>,
    available: bool,
}

impl ScriptedEngine {
    fn new() -> Self {
        Self { available: true, ..Default::default() }
    }

    fn outcome(mut self, ligand: &str, target: &str, outcome: DockingOutcome) -> Self {
        self.outcomes.insert((ligand.to_string(), target.to_string()), outcome);
        self
    }

    fn delay(mut self, ligand: &str, target: &str, delay: Duration) -> Self {
        self.delays.insert((ligand.to_string(), target.to_string()), delay);
        self
    }
}

#[async_trait]
impl DockingEngine for ScriptedEngine {
    async fn run(&self, job: &DockingJob) -> DockingOutcome {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let key = (job.ligand.id.clone(), job.target.id.clone());
        self.order.lock().unwrap().push(key.clone());
        if let Some((n, signal)) = &self.cancel_on_call {
            if call == *n {
                signal.cancel();
            }
        }
        if let Some(delay) = self.delays.get(&key) {
            tokio::time::sleep(*delay).await;
        }
        self.outcomes
            .get(&key)
            .cloned()
            .unwrap_or(DockingOutcome::Scored(-5.0))
    }

    fn is_available(&self) -> bool {
        self.available
    }
}

struct Fixture {
    dir: TempDir,
    registry: AssetRegistry,
}

impl Fixture {
    /// Targets whose files are written to disk; `missing` ones are catalogued only.
    fn new(ready: &[&str], missing: &[&str]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let receptors = dir.path().join("receptors");
        let configs = dir.path().join("configs");
        std::fs::create_dir_all(&receptors).unwrap();
        std::fs::create_dir_all(&configs).unwrap();

        let mut entries = Vec::new();
        for id in ready.iter().chain(missing) {
            let stem = id.to_lowercase();
            entries.push(TargetEntry::new(id, id, &format!("{stem}.pdbqt"), &format!("{stem}.txt"), ""));
        }
        for id in ready {
            let stem = id.to_lowercase();
            std::fs::write(receptors.join(format!("{stem}.pdbqt")), "ATOM").unwrap();
            std::fs::write(configs.join(format!("{stem}.txt")), "size_x = 20").unwrap();
        }

        let registry = AssetRegistry::new(&TargetCatalog::new(entries), &receptors, &configs).unwrap();
        Self { dir, registry }
    }

    fn output_dir(&self) -> std::path::PathBuf {
        self.dir.path().join("docking_output")
    }

    fn runner(&self, engine: Arc<dyn DockingEngine>) -> BatchRunner {
        BatchRunner::new(
            self.registry.clone(),
            engine,
            JobMatrixBuilder::new(self.output_dir(), "pdbqt"),
        )
    }
}

fn ligands(ids: &[&str]) -> LigandSet {
    let mut set = LigandSet::new();
    for id in ids {
        set.add(Path::new("/ligands").join(format!("{id}.pdbqt"))).unwrap();
    }
    set
}

fn drain(rx: &mut mpsc::UnboundedReceiver<RunEvent>) -> Vec<RunEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn progress_counts(events: &[RunEvent]) -> Vec<usize> {
    events
        .iter()
        .filter_map(|e| match e {
            RunEvent::JobFinished(p) => Some(p.completed),
            _ => None,
        })
        .collect()
}

fn states(events: &[RunEvent]) -> Vec<RunState> {
    events
        .iter()
        .filter_map(|e| match e {
            RunEvent::StateChanged { state } => Some(*state),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn two_ligands_one_target_with_one_failure() {
    let fx = Fixture::new(&["T1"], &[]);
    let engine = ScriptedEngine::new()
        .outcome("lig_a", "T1", DockingOutcome::Scored(-8.3))
        .outcome(
            "lig_b",
            "T1",
            DockingOutcome::ToolFailed(ExitInfo::Exited { code: Some(1), stderr: "Parse error".to_string() }),
        );
    let (tx, mut rx) = mpsc::unbounded_channel();
    let runner = fx.runner(Arc::new(engine)).with_events(tx);

    let mut ctx = RunContext::new(ligands(&["lig_a", "lig_b"]), vec!["T1".to_string()]);
    let report = runner.run(&mut ctx).await.unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.matrix.value("lig_a", "T1"), CellValue::Score(-8.3));
    assert_eq!(report.matrix.value("lig_b", "T1"), CellValue::Error(FailureKind::ToolFailed));
    assert_eq!(report.matrix.value("lig_b", "T1").to_string(), "Error");
    assert_eq!((report.scored(), report.failed()), (1, 1));

    let events = drain(&mut rx);
    assert_eq!(progress_counts(&events), vec![1, 2]);
    assert_eq!(
        states(&events),
        vec![RunState::Validating, RunState::Executing, RunState::Completed]
    );
    assert_eq!(ctx.state(), RunState::Completed);
    assert!(fx.output_dir().is_dir());
}

#[tokio::test]
async fn failures_do_not_stop_later_jobs() {
    let fx = Fixture::new(&["T1", "T2"], &[]);
    let engine = Arc::new(
        ScriptedEngine::new()
            .outcome("a", "T1", DockingOutcome::ToolFailed(ExitInfo::TimedOut { after_secs: 1 }))
            .outcome("a", "T2", DockingOutcome::OutputMissing)
            .outcome("b", "T1", DockingOutcome::ScoreAbsent)
            .outcome("b", "T2", DockingOutcome::Scored(-9.1)),
    );
    let runner = fx.runner(engine.clone()).with_workers(1);

    let mut ctx = RunContext::new(ligands(&["a", "b"]), vec!["T1".to_string(), "T2".to_string()]);
    let report = runner.run(&mut ctx).await.unwrap();

    assert_eq!(engine.calls.load(Ordering::SeqCst), 4);
    assert!(report.matrix.is_complete());
    assert_eq!(report.matrix.value("a", "T2"), CellValue::Error(FailureKind::OutputMissing));
    assert_eq!(report.matrix.value("b", "T1"), CellValue::Error(FailureKind::ScoreAbsent));
    assert_eq!(report.matrix.value("b", "T2"), CellValue::Score(-9.1));
    assert_eq!(report.matrix.best_target("b"), Some(("T2", -9.1)));
}

#[tokio::test]
async fn single_worker_dispatches_in_row_major_order() {
    let fx = Fixture::new(&["T1", "T2"], &[]);
    let engine = Arc::new(ScriptedEngine::new());
    let runner = fx.runner(engine.clone()).with_workers(1);

    let mut ctx = RunContext::new(ligands(&["a", "b"]), vec!["T2".to_string(), "T1".to_string()]);
    let report = runner.run(&mut ctx).await.unwrap();

    let order = engine.order.lock().unwrap().clone();
    let expected: Vec<(String, String)> = [("a", "T2"), ("a", "T1"), ("b", "T2"), ("b", "T1")]
        .iter()
        .map(|(l, t)| (l.to_string(), t.to_string()))
        .collect();
    assert_eq!(order, expected);
    assert_eq!(report.matrix.target_ids(), &["T2".to_string(), "T1".to_string()]);
}

#[tokio::test]
async fn parallel_completion_keeps_cells_and_monotonic_progress() {
    let fx = Fixture::new(&["T1", "T2"], &[]);
    // Early jobs are slow so completions arrive out of dispatch order.
    let engine = ScriptedEngine::new()
        .outcome("a", "T1", DockingOutcome::Scored(-1.0))
        .delay("a", "T1", Duration::from_millis(120))
        .outcome("a", "T2", DockingOutcome::Scored(-2.0))
        .delay("a", "T2", Duration::from_millis(80))
        .outcome("b", "T1", DockingOutcome::Scored(-3.0))
        .delay("b", "T1", Duration::from_millis(40))
        .outcome("b", "T2", DockingOutcome::OutputMissing)
        .outcome("c", "T1", DockingOutcome::Scored(-5.0))
        .outcome("c", "T2", DockingOutcome::Scored(-6.0));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let runner = fx.runner(Arc::new(engine)).with_workers(4).with_events(tx);

    let mut ctx = RunContext::new(ligands(&["a", "b", "c"]), vec!["T1".to_string(), "T2".to_string()]);
    let report = runner.run(&mut ctx).await.unwrap();

    let m = &report.matrix;
    assert_eq!(m.ligand_ids().len(), 3);
    assert_eq!(m.target_ids().len(), 2);
    assert!(m.is_complete());
    assert_eq!(m.value("a", "T1"), CellValue::Score(-1.0));
    assert_eq!(m.value("a", "T2"), CellValue::Score(-2.0));
    assert_eq!(m.value("b", "T1"), CellValue::Score(-3.0));
    assert_eq!(m.value("b", "T2"), CellValue::Error(FailureKind::OutputMissing));
    assert_eq!(m.value("c", "T1"), CellValue::Score(-5.0));
    assert_eq!(m.value("c", "T2"), CellValue::Score(-6.0));

    let events = drain(&mut rx);
    assert_eq!(progress_counts(&events), (1..=6).collect::<Vec<_>>());
    for event in &events {
        if let RunEvent::JobFinished(p) = event {
            assert_eq!(p.total, 6);
        }
    }
}

#[tokio::test]
async fn not_ready_target_rejects_run_before_any_job() {
    let fx = Fixture::new(&["T1"], &["T2"]);
    let engine = Arc::new(ScriptedEngine::new());
    let (tx, mut rx) = mpsc::unbounded_channel();
    let runner = fx.runner(engine.clone()).with_events(tx);

    let mut ctx = RunContext::new(ligands(&["a"]), vec!["T1".to_string(), "T2".to_string()]);
    let err = runner.run(&mut ctx).await.unwrap_err();

    match err {
        ScreenError::AssetNotReady(diags) => {
            assert_eq!(diags.len(), 1);
            assert_eq!(diags[0].target_id, "T2");
            assert_eq!(diags[0].missing.len(), 2);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
    assert_eq!(ctx.state(), RunState::Idle);
    assert!(ctx.report().is_none());
    assert_eq!(states(&drain(&mut rx)), vec![RunState::Validating, RunState::Idle]);
}

#[tokio::test]
async fn empty_selection_is_rejected() {
    let fx = Fixture::new(&["T1"], &[]);
    let runner = fx.runner(Arc::new(ScriptedEngine::new()));

    let mut no_ligands = RunContext::new(LigandSet::new(), vec!["T1".to_string()]);
    assert!(matches!(
        runner.run(&mut no_ligands).await,
        Err(ScreenError::EmptyInput { ligands: 0, targets: 1 })
    ));

    let mut no_targets = RunContext::new(ligands(&["a"]), Vec::new());
    assert!(matches!(
        runner.run(&mut no_targets).await,
        Err(ScreenError::EmptyInput { ligands: 1, targets: 0 })
    ));
}

#[tokio::test]
async fn unknown_and_duplicate_targets_are_rejected() {
    let fx = Fixture::new(&["T1"], &[]);
    let runner = fx.runner(Arc::new(ScriptedEngine::new()));

    let mut unknown = RunContext::new(ligands(&["a"]), vec!["T9".to_string()]);
    assert!(matches!(runner.run(&mut unknown).await, Err(ScreenError::TargetNotFound(id)) if id == "T9"));

    let mut duplicate = RunContext::new(ligands(&["a"]), vec!["T1".to_string(), "T1".to_string()]);
    assert!(matches!(runner.run(&mut duplicate).await, Err(ScreenError::DuplicateTarget(_))));
}

#[tokio::test]
async fn unavailable_tool_is_rejected() {
    let fx = Fixture::new(&["T1"], &[]);
    let mut engine = ScriptedEngine::new();
    engine.available = false;
    let runner = fx.runner(Arc::new(engine));

    let mut ctx = RunContext::new(ligands(&["a"]), vec!["T1".to_string()]);
    assert!(matches!(runner.run(&mut ctx).await, Err(ScreenError::ToolUnavailable(_))));
}

#[tokio::test]
async fn cancelled_before_start_runs_nothing() {
    let fx = Fixture::new(&["T1"], &[]);
    let engine = Arc::new(ScriptedEngine::new());
    let cancel = CancelSignal::new();
    cancel.cancel();
    let runner = fx.runner(engine.clone()).with_cancel(cancel);

    let mut ctx = RunContext::new(ligands(&["a", "b"]), vec!["T1".to_string()]);
    let report = runner.run(&mut ctx).await.unwrap();

    assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
    assert_eq!(report.status, RunStatus::Cancelled);
    assert_eq!(report.completed_jobs(), 0);
    assert_eq!(report.matrix.value("a", "T1"), CellValue::NotRun);
    assert_eq!(ctx.state(), RunState::Cancelled);
}

#[tokio::test]
async fn cancellation_stops_dispatch() {
    let fx = Fixture::new(&["T1"], &[]);
    let cancel = CancelSignal::new();
    let mut engine = ScriptedEngine::new();
    engine.cancel_on_call = Some((2, cancel.clone()));
    let engine = Arc::new(engine);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let runner = fx
        .runner(engine.clone())
        .with_workers(1)
        .with_cancel(cancel)
        .with_events(tx);

    let mut ctx = RunContext::new(ligands(&["a", "b", "c", "d"]), vec!["T1".to_string()]);
    let report = runner.run(&mut ctx).await.unwrap();

    assert_eq!(engine.calls.load(Ordering::SeqCst), 2);
    assert_eq!(report.status, RunStatus::Cancelled);
    assert!(report.completed_jobs() < 2);
    assert_eq!(report.matrix.value("c", "T1"), CellValue::NotRun);
    assert_eq!(report.matrix.value("d", "T1"), CellValue::NotRun);

    let events = drain(&mut rx);
    let counts = progress_counts(&events);
    assert_eq!(counts.len(), report.completed_jobs());
    assert_eq!(states(&events).last(), Some(&RunState::Cancelled));
}

#[tokio::test]
async fn cancelled_runner_can_run_again() {
    let fx = Fixture::new(&["T1"], &[]);
    let engine = Arc::new(ScriptedEngine::new());
    let runner = fx.runner(engine.clone());
    runner.cancel_signal().cancel();

    let mut ctx = RunContext::new(ligands(&["a", "b"]), vec!["T1".to_string()]);
    assert_eq!(runner.run(&mut ctx).await.unwrap().status, RunStatus::Cancelled);
    assert!(!runner.cancel_signal().is_cancelled());

    let mut ctx = RunContext::new(ligands(&["a", "b"]), vec!["T1".to_string()]);
    let report = runner.run(&mut ctx).await.unwrap();
    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.completed_jobs(), 2);
    assert_eq!(engine.calls.load(Ordering::SeqCst), 2);
    assert_eq!(ctx.state(), RunState::Completed);
}

#[tokio::test]
async fn colliding_output_paths_reject_run() {
    let fx = Fixture::new(&["T1"], &[]);
    let entries = vec![
        TargetEntry::new("site1", "site1", "t1.pdbqt", "t1.txt", ""),
        TargetEntry::new("site2", "site2", "t1.pdbqt", "t1.txt", ""),
    ];
    let registry = AssetRegistry::new(
        &TargetCatalog::new(entries),
        fx.dir.path().join("receptors"),
        fx.dir.path().join("configs"),
    )
    .unwrap();
    let engine = Arc::new(ScriptedEngine::new());
    let runner = BatchRunner::new(
        registry,
        engine.clone(),
        JobMatrixBuilder::new(fx.output_dir(), "pdbqt"),
    );

    let mut ctx = RunContext::new(ligands(&["a"]), vec!["site1".to_string(), "site2".to_string()]);
    let err = runner.run(&mut ctx).await.unwrap_err();

    assert!(matches!(err, ScreenError::OutputCollision { .. }), "unexpected error: {err}");
    assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
    assert_eq!(ctx.state(), RunState::Idle);
}

#[tokio::test]
async fn new_run_replaces_previous_report() {
    let fx = Fixture::new(&["T1"], &[]);
    let runner = fx.runner(Arc::new(ScriptedEngine::new()));

    let mut ctx = RunContext::new(ligands(&["a"]), vec!["T1".to_string()]);
    let first = runner.run(&mut ctx).await.unwrap().run_id;
    ctx.ligands.add("/ligands/b.pdbqt").unwrap();
    let second = runner.run(&mut ctx).await.unwrap();

    assert_ne!(first, second.run_id);
    assert_eq!(second.matrix.ligand_ids().len(), 2);
    assert!(second.matrix.is_complete());
}

/// Engine that panics for one pair.
struct PanickyEngine;

#[async_trait]
impl DockingEngine for PanickyEngine {
    async fn run(&self, job: &DockingJob) -> DockingOutcome {
        if job.ligand.id == "boom" {
            panic!("engine bug");
        }
        DockingOutcome::Scored(-4.2)
    }
}

#[tokio::test]
async fn engine_panic_becomes_error_cell() {
    let fx = Fixture::new(&["T1"], &[]);
    let runner = fx.runner(Arc::new(PanickyEngine));

    let mut ctx = RunContext::new(ligands(&["boom", "fine"]), vec!["T1".to_string()]);
    let report = runner.run(&mut ctx).await.unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.matrix.value("boom", "T1"), CellValue::Error(FailureKind::ToolFailed));
    assert_eq!(report.matrix.value("fine", "T1"), CellValue::Score(-4.2));
}
