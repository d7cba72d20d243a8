//! Task runner - verifies every solution of one task.

use std::path::Path;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::config::RunConfig;
use super::result::{Diagnostics, SolutionResult, TaskOutcome, TaskResult, TaskStage};
use super::verifier::{Verifier, VerifyContext};
use crate::docker::{DockerCli, EnvironmentManager};
use crate::error::TaskError;
use crate::task::{discover_solutions, has_solutions, SolutionSpec, Task};

/// Runs the solutions of a task against its environment.
#[derive(Debug, Clone)]
pub struct TaskRunner {
    cli: DockerCli,
    env: EnvironmentManager,
    timeout: Duration,
}

impl TaskRunner {
    /// Creates a runner giving every solution `timeout`.
    pub fn new(cli: DockerCli, network: impl Into<String>, timeout: Duration) -> Self {
        Self {
            env: EnvironmentManager::new(cli.clone(), network),
            cli,
            timeout,
        }
    }

    /// Creates a runner from run settings.
    pub fn from_config(config: &RunConfig) -> Self {
        Self::new(config.docker_cli(), config.network(), config.timeout)
    }

    /// Per-solution budget.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Verifies the task in `task_dir`.
    ///
    /// Errors abort this task only. Solution failures and timeouts are
    /// results; environment and cleanup problems end up in the outcome's
    /// diagnostics.
    pub async fn run(&self, task_dir: &Path) -> Result<TaskOutcome, TaskError> {
        let task = Task::load(task_dir)?;
        if !has_solutions(task_dir) {
            return Err(TaskError::MissingSolutions(task.solutions_dir()));
        }
        let solutions = discover_solutions(task_dir)?;
        let mut diagnostics = Diagnostics::new(task.name());
        let mut stages = Vec::new();
        transition(&task, &mut stages, TaskStage::Discovered);

        if task.has_environment() && task.manifest.service_endpoint().is_none() {
            warn!(
                task = %task.name(),
                "Environment declared without main and local-port, refusing setup"
            );
            transition(&task, &mut stages, TaskStage::Done);
            return Ok(TaskOutcome {
                result: TaskResult::empty(task.name()),
                diagnostics,
                stages,
            });
        }

        let handle = if task.has_environment() {
            let handle = self.env.setup(&task, &mut diagnostics).await;
            transition(&task, &mut stages, TaskStage::EnvironmentReady);
            Some(handle)
        } else {
            None
        };

        transition(&task, &mut stages, TaskStage::PerSolutionLoop);
        let network = handle.as_ref().map(|h| h.network());
        let results = self
            .verify_solutions(&task, &solutions, network, &mut diagnostics)
            .await;

        if let Some(handle) = handle {
            self.env.teardown(handle, &mut diagnostics).await;
            transition(&task, &mut stages, TaskStage::EnvironmentTornDown);
        }

        let result = TaskResult {
            name: task.name().to_string(),
            solutions: results,
        };
        info!(
            task = %task.name(),
            passed = result.passed(),
            failed = result.failed(),
            diagnostics = diagnostics.len(),
            "Task verified"
        );
        transition(&task, &mut stages, TaskStage::Done);

        Ok(TaskOutcome {
            result,
            diagnostics,
            stages,
        })
    }

    async fn verify_solutions(
        &self,
        task: &Task,
        solutions: &[SolutionSpec],
        network: Option<&str>,
        diagnostics: &mut Diagnostics,
    ) -> Vec<SolutionResult> {
        let ctx = VerifyContext {
            task,
            cli: &self.cli,
            network,
        };

        let mut results = Vec::with_capacity(solutions.len());
        for spec in solutions {
            info!(task = %task.name(), solution = %spec.name, kind = %spec.kind, "Verifying solution");
            let deadline = Instant::now() + self.timeout;
            let passed = Verifier::for_solution(spec)
                .verify(&ctx, deadline, diagnostics)
                .await;

            if passed {
                info!(task = %task.name(), solution = %spec.name, "Solution passed");
            } else {
                warn!(task = %task.name(), solution = %spec.name, "Solution failed");
            }
            results.push(SolutionResult::new(spec.name.clone(), passed));
        }
        results
    }
}

fn transition(task: &Task, stages: &mut Vec<TaskStage>, stage: TaskStage) {
    debug!(task = %task.name(), stage = %stage, "Task stage");
    stages.push(stage);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::DiagnosticStage;
    use std::fs;
    use tempfile::TempDir;

    fn write_task(root: &Path, dir: &str, manifest: &str) -> std::path::PathBuf {
        let task_dir = root.join(dir);
        fs::create_dir_all(&task_dir).unwrap();
        fs::write(task_dir.join("task.yml"), manifest).unwrap();
        task_dir
    }

    fn write_script(task_dir: &Path, solution: &str, body: &str) {
        let dir = task_dir.join("solution").join(solution);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("solve.bash"), body).unwrap();
    }

    fn runner(timeout: Duration) -> TaskRunner {
        TaskRunner::new(
            DockerCli::new("/nonexistent/docker", "/nonexistent/compose"),
            "verify-test",
            timeout,
        )
    }

    #[tokio::test]
    async fn test_script_solutions_in_order() {
        let temp = TempDir::new().unwrap();
        let task_dir = write_task(temp.path(), "static", "name: Static\nflag: FLAG{qrs}\n");
        write_script(&task_dir, "b-wrong", "echo FLAG{nope}\n");
        write_script(&task_dir, "a-right", "echo noise FLAG{qrs} noise\n");
        fs::create_dir_all(task_dir.join("solution").join("c-empty")).unwrap();

        let outcome = runner(Duration::from_secs(30)).run(&task_dir).await.unwrap();

        assert_eq!(outcome.result.name, "Static");
        assert_eq!(
            outcome.result.solutions,
            vec![
                SolutionResult::new("a-right", true),
                SolutionResult::new("b-wrong", false),
            ]
        );
        assert!(outcome.diagnostics.is_empty());
        assert_eq!(
            outcome.stages,
            vec![TaskStage::Discovered, TaskStage::PerSolutionLoop, TaskStage::Done]
        );
    }

    #[tokio::test]
    async fn test_timeout_does_not_abort_task() {
        let temp = TempDir::new().unwrap();
        let task_dir = write_task(temp.path(), "slow", "name: Slow\nflag: FLAG{s}\n");
        write_script(&task_dir, "sol1", "sleep 30\necho FLAG{s}\n");
        write_script(&task_dir, "sol2", "echo FLAG{s}\n");

        let outcome = runner(Duration::from_millis(500)).run(&task_dir).await.unwrap();

        assert_eq!(
            outcome.result.solutions,
            vec![
                SolutionResult::new("sol1", false),
                SolutionResult::new("sol2", true),
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_endpoint_refuses_setup() {
        let temp = TempDir::new().unwrap();
        let task_dir = write_task(temp.path(), "echo", "name: Echo\nflag: FLAG{x}\n");
        fs::write(task_dir.join("docker-compose.yml"), "services: {}\n").unwrap();
        write_script(&task_dir, "sol1", "echo FLAG{x}\n");

        // The docker binaries do not exist, so any environment call would fail.
        let outcome = runner(Duration::from_secs(5)).run(&task_dir).await.unwrap();

        assert_eq!(outcome.result, TaskResult::empty("Echo"));
        assert!(outcome.diagnostics.is_empty());
        assert_eq!(outcome.stages, vec![TaskStage::Discovered, TaskStage::Done]);
    }

    #[tokio::test]
    async fn test_missing_solutions_is_error() {
        let temp = TempDir::new().unwrap();
        let task_dir = write_task(temp.path(), "bare", "name: Bare\nflag: FLAG{b}\n");

        let err = runner(Duration::from_secs(5)).run(&task_dir).await.unwrap_err();
        assert!(matches!(err, TaskError::MissingSolutions(_)));
    }

    #[tokio::test]
    async fn test_bad_manifest_is_error() {
        let temp = TempDir::new().unwrap();
        let task_dir = write_task(temp.path(), "broken", "name: [unclosed\n");
        write_script(&task_dir, "sol1", "true\n");

        let err = runner(Duration::from_secs(5)).run(&task_dir).await.unwrap_err();
        assert!(matches!(err, TaskError::Manifest(_)));
    }

    #[tokio::test]
    async fn test_failed_environment_still_runs_solutions() {
        let temp = TempDir::new().unwrap();
        let task_dir = write_task(
            temp.path(),
            "svc",
            "name: Svc\nflag: FLAG{v}\nmain: svc\nlocal-port: 80\n",
        );
        fs::write(task_dir.join("docker-compose.yml"), "services: {}\n").unwrap();
        write_script(&task_dir, "sol1", "echo FLAG{wrong}\n");
        write_script(&task_dir, "sol2", "echo FLAG{v}\n");

        // The docker binaries do not exist, so every environment step fails.
        let outcome = runner(Duration::from_secs(30)).run(&task_dir).await.unwrap();

        assert_eq!(
            outcome.result.solutions,
            vec![
                SolutionResult::new("sol1", false),
                SolutionResult::new("sol2", true),
            ]
        );
        assert!(outcome.diagnostics.has_stage(DiagnosticStage::ComposeUp));
        assert!(outcome.diagnostics.has_stage(DiagnosticStage::ComposeDown));
        assert_eq!(
            outcome.stages,
            vec![
                TaskStage::Discovered,
                TaskStage::EnvironmentReady,
                TaskStage::PerSolutionLoop,
                TaskStage::EnvironmentTornDown,
                TaskStage::Done,
            ]
        );
        assert!(!task_dir.join("docker-compose.override.yml").exists());
    }
}
