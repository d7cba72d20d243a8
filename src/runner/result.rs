//! Verification results and non-fatal diagnostics.

use serde::{Deserialize, Serialize};

use crate::storage::store::null_as_default;

/// Pass/fail record of one solution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolutionResult {
    /// Solution directory name.
    pub name: String,
    /// Whether the captured output contained the flag.
    pub result: bool,
}

impl SolutionResult {
    /// Creates a solution record.
    pub fn new(name: impl Into<String>, result: bool) -> Self {
        Self {
            name: name.into(),
            result,
        }
    }
}

/// Results of every runnable solution of one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResult {
    /// Task name from the manifest.
    pub name: String,
    /// Solutions in the order they were run.
    #[serde(default, deserialize_with = "null_as_default")]
    pub solutions: Vec<SolutionResult>,
}

impl TaskResult {
    /// Creates a result with no solutions.
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            solutions: Vec::new(),
        }
    }

    /// Number of passing solutions.
    pub fn passed(&self) -> usize {
        self.solutions.iter().filter(|s| s.result).count()
    }

    /// Number of failing solutions.
    pub fn failed(&self) -> usize {
        self.solutions.len() - self.passed()
    }
}

/// Environment or cleanup step that can degrade without failing the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticStage {
    NetworkCreate,
    OverrideWrite,
    ComposeUp,
    NetworkRemove,
    ComposeDown,
    OverrideRemove,
    ImageRemove,
    ContainerRemove,
    SolutionOverrideRemove,
}

impl std::fmt::Display for DiagnosticStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiagnosticStage::NetworkCreate => write!(f, "network create"),
            DiagnosticStage::OverrideWrite => write!(f, "override write"),
            DiagnosticStage::ComposeUp => write!(f, "compose up"),
            DiagnosticStage::NetworkRemove => write!(f, "network remove"),
            DiagnosticStage::ComposeDown => write!(f, "compose down"),
            DiagnosticStage::OverrideRemove => write!(f, "override remove"),
            DiagnosticStage::ImageRemove => write!(f, "image remove"),
            DiagnosticStage::ContainerRemove => write!(f, "container remove"),
            DiagnosticStage::SolutionOverrideRemove => write!(f, "solution override remove"),
        }
    }
}

/// A non-fatal problem observed while verifying a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Task the problem belongs to.
    pub task: String,
    /// Where it happened.
    pub stage: DiagnosticStage,
    /// Underlying error text.
    pub message: String,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.task, self.stage, self.message)
    }
}

/// Collected diagnostics for one task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    task: String,
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Creates an empty list for `task`.
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            entries: Vec::new(),
        }
    }

    /// Records a problem and logs it.
    pub fn push(&mut self, stage: DiagnosticStage, message: impl std::fmt::Display) {
        let diagnostic = Diagnostic {
            task: self.task.clone(),
            stage,
            message: message.to_string(),
        };
        tracing::warn!(task = %diagnostic.task, stage = %stage, "{}", diagnostic.message);
        self.entries.push(diagnostic);
    }

    /// Recorded problems in order.
    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    /// Number of recorded problems.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether a problem was recorded at `stage`.
    pub fn has_stage(&self, stage: DiagnosticStage) -> bool {
        self.entries.iter().any(|d| d.stage == stage)
    }
}

/// Lifecycle of one task verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStage {
    Discovered,
    EnvironmentReady,
    PerSolutionLoop,
    EnvironmentTornDown,
    Done,
}

impl std::fmt::Display for TaskStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskStage::Discovered => "discovered",
            TaskStage::EnvironmentReady => "environment ready",
            TaskStage::PerSolutionLoop => "verifying solutions",
            TaskStage::EnvironmentTornDown => "environment torn down",
            TaskStage::Done => "done",
        };
        write!(f, "{}", s)
    }
}

/// What verifying one task produced.
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    /// Result to merge into the store.
    pub result: TaskResult,
    /// Environment and cleanup problems observed along the way.
    pub diagnostics: Diagnostics,
    /// Stages the task went through, in order.
    pub stages: Vec<TaskStage>,
}
