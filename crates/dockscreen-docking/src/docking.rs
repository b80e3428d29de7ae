//! Molecular docking using AutoDock Vina.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use dockscreen_config::ToolConfig;
use serde::Serialize;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::jobs::DockingJob;
use crate::parser::parse_best_affinity;

pub const DEFAULT_CPU_PER_JOB: u32 = 2;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3600);

/// How an invocation of the scoring tool failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExitInfo {
    /// The process ran and exited unsuccessfully. `code` is `None` when killed by a signal.
    Exited { code: Option<i32>, stderr: String },
    TimedOut { after_secs: u64 },
    SpawnFailed { message: String },
    /// The engine itself panicked while handling the job.
    Crashed { message: String },
}

impl std::fmt::Display for ExitInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitInfo::Exited { code: Some(code), stderr } => write!(f, "exit code {code}: {}", stderr.trim()),
            ExitInfo::Exited { code: None, stderr } => write!(f, "terminated by signal: {}", stderr.trim()),
            ExitInfo::TimedOut { after_secs } => write!(f, "timed out after {after_secs}s"),
            ExitInfo::SpawnFailed { message } => write!(f, "could not start: {message}"),
            ExitInfo::Crashed { message } => write!(f, "crashed: {message}"),
        }
    }
}

/// Result of one docking job.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum DockingOutcome {
    Scored(f64),
    ToolFailed(ExitInfo),
    /// The tool reported success but wrote no output file.
    OutputMissing,
    /// The output file exists but holds no parseable result record.
    ScoreAbsent,
}

impl DockingOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, DockingOutcome::Scored(_))
    }

    pub fn score(&self) -> Option<f64> {
        match self {
            DockingOutcome::Scored(v) => Some(*v),
            _ => None,
        }
    }
}

/// Runs one docking job to completion.
#[async_trait]
pub trait DockingEngine: Send + Sync {
    async fn run(&self, job: &DockingJob) -> DockingOutcome;

    /// Whether the engine can be invoked at all.
    fn is_available(&self) -> bool {
        true
    }

    /// CPU cores each job may use.
    fn cpu_per_job(&self) -> u32 {
        DEFAULT_CPU_PER_JOB
    }

    fn describe(&self) -> String {
        "docking engine".to_string()
    }
}

/// Wrapper for AutoDock Vina execution.
#[derive(Debug, Clone)]
pub struct VinaRunner {
    executable_path: PathBuf,
    launcher: Vec<String>,
    cpu_budget: u32,
    timeout: Duration,
}

impl VinaRunner {
    /// Create a new VinaRunner.
    pub fn new<P: AsRef<Path>>(executable_path: P) -> Self {
        Self {
            executable_path: executable_path.as_ref().to_path_buf(),
            launcher: Vec::new(),
            cpu_budget: DEFAULT_CPU_PER_JOB,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn from_config(config: &ToolConfig) -> Self {
        Self::new(&config.executable)
            .with_launcher(config.launcher.clone())
            .with_cpu_budget(config.cpu_per_job)
            .with_timeout(config.timeout())
    }

    /// Arguments placed between the executable and the docking flags.
    pub fn with_launcher(mut self, launcher: Vec<String>) -> Self {
        self.launcher = launcher;
        self
    }

    pub fn with_cpu_budget(mut self, cpus: u32) -> Self {
        self.cpu_budget = cpus.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn executable(&self) -> &Path {
        &self.executable_path
    }

    /// Full argument list after the executable.
    pub fn args(&self, job: &DockingJob) -> Vec<OsString> {
        let mut args: Vec<OsString> = self.launcher.iter().map(OsString::from).collect();
        args.extend([
            OsString::from("--receptor"),
            job.target.receptor.clone().into_os_string(),
            OsString::from("--ligand"),
            job.ligand.path.clone().into_os_string(),
            OsString::from("--config"),
            job.target.config.clone().into_os_string(),
            OsString::from("--out"),
            job.output.clone().into_os_string(),
            OsString::from("--cpu"),
            OsString::from(self.cpu_budget.to_string()),
        ]);
        args
    }
}

#[async_trait]
impl DockingEngine for VinaRunner {
    /// Run AutoDock Vina for one job. Never retries.
    async fn run(&self, job: &DockingJob) -> DockingOutcome {
        info!(ligand = %job.ligand.id, target = %job.target.id, "Running AutoDock Vina");

        // A file left by an earlier run must not pass for this run's output.
        let _ = tokio::fs::remove_file(&job.output).await;

        let child = Command::new(&self.executable_path)
            .args(self.args(job))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let child = match child {
            Ok(c) => c,
            Err(e) => {
                return DockingOutcome::ToolFailed(ExitInfo::SpawnFailed {
                    message: format!("{:?}: {}", self.executable_path, e),
                });
            }
        };

        // Dropping the wait future on timeout drops the child, which kills it.
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return DockingOutcome::ToolFailed(ExitInfo::SpawnFailed { message: e.to_string() });
            }
            Err(_) => {
                warn!(ligand = %job.ligand.id, target = %job.target.id, "AutoDock Vina timed out after {:?}", self.timeout);
                return DockingOutcome::ToolFailed(ExitInfo::TimedOut {
                    after_secs: self.timeout.as_secs(),
                });
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            return DockingOutcome::ToolFailed(ExitInfo::Exited {
                code: output.status.code(),
                stderr,
            });
        }

        if !job.output.exists() {
            return DockingOutcome::OutputMissing;
        }

        match parse_best_affinity(&job.output).await {
            Some(affinity) => {
                debug!("AutoDock Vina completed. Best affinity {} in {:?}", affinity, job.output);
                DockingOutcome::Scored(affinity)
            }
            None => DockingOutcome::ScoreAbsent,
        }
    }

    /// The executable exists, or a bare name resolves on PATH.
    fn is_available(&self) -> bool {
        resolve_executable(&self.executable_path).is_some()
    }

    fn cpu_per_job(&self) -> u32 {
        self.cpu_budget
    }

    fn describe(&self) -> String {
        format!("AutoDock Vina at {:?}", self.executable_path)
    }
}

/// Locate an executable: explicit paths must be files, bare names are searched on PATH.
pub fn resolve_executable(executable: &Path) -> Option<PathBuf> {
    if executable.components().count() != 1 || executable.is_absolute() {
        return executable.is_file().then(|| executable.to_path_buf());
    }
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(executable))
        .find(|candidate| candidate.is_file())
}
