//! Query progress reporting and cancellation.
//!
//! [`Orchestrator::answer_with_progress`](crate::orchestrator::Orchestrator::answer_with_progress)
//! advances through explicit [`QueryStage`]s and reports each one. Progress
//! is emitted on **stderr** so stdout remains parseable for scripts.

use clap::ValueEnum;
use serde::Serialize;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Stage of the query pipeline, in execution order.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryStage {
    /// Ranking vector nodes of ready documents.
    SemanticSearch,
    /// Auditing the ledger chain.
    LedgerVerify,
    /// Waiting on the generation gateway.
    Synthesizing,
}

impl QueryStage {
    pub const ALL: [QueryStage; 3] = [
        QueryStage::SemanticSearch,
        QueryStage::LedgerVerify,
        QueryStage::Synthesizing,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            QueryStage::SemanticSearch => "semantic search",
            QueryStage::LedgerVerify => "ledger verify",
            QueryStage::Synthesizing => "synthesizing",
        }
    }

    /// 1-based position within [`QueryStage::ALL`].
    pub fn step(&self) -> usize {
        match self {
            QueryStage::SemanticSearch => 1,
            QueryStage::LedgerVerify => 2,
            QueryStage::Synthesizing => 3,
        }
    }
}

/// Receives a call as each query stage begins.
pub trait QueryProgressReporter: Send + Sync {
    fn report(&self, stage: QueryStage);
}

/// Human-friendly progress on stderr: "query  [2/3] ledger verify".
pub struct StderrProgress;

impl QueryProgressReporter for StderrProgress {
    fn report(&self, stage: QueryStage) {
        let line = format!(
            "query  [{}/{}] {}\n",
            stage.step(),
            QueryStage::ALL.len(),
            stage.label()
        );
        let mut err = std::io::stderr().lock();
        let _ = err.write_all(line.as_bytes());
        let _ = err.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl QueryProgressReporter for JsonProgress {
    fn report(&self, stage: QueryStage) {
        let obj = serde_json::json!({
            "event": "progress",
            "stage": stage,
            "step": stage.step(),
            "total": QueryStage::ALL.len(),
        });
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut err = std::io::stderr().lock();
            let _ = writeln!(err, "{}", line);
            let _ = err.flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl QueryProgressReporter for NoProgress {
    fn report(&self, _stage: QueryStage) {}
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn QueryProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

/// Shared cancellation signal for an in-flight query.
///
/// Honored up to the moment the generation gateway call is dispatched.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
