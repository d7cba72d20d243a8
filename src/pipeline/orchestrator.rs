//! Run orchestrator: discovery, change detection, verification and merging.

use std::collections::HashSet;
use std::path::Path;

use thiserror::Error;
use tracing::{error, info, warn};

use crate::change::{ChangeDetector, ChangeStatus};
use crate::error::{ConfigError, StoreError};
use crate::runner::{RunConfig, TaskOutcome, TaskResult, TaskRunner};
use crate::storage::{is_stdout, PersistedStore};
use crate::task::{discover_task_dirs, has_solutions};

/// Errors that abort a whole run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Prior store could not be loaded or saved.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Root directory could not be walked.
    #[error("Discovery error: {0}")]
    Discovery(#[from] walkdir::Error),
}

/// Counters of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Task directories found under the root.
    pub discovered: usize,
    /// Tasks whose digest matched the stored one.
    pub unchanged: usize,
    /// Tasks verified to completion.
    pub verified: usize,
    /// Tasks aborted by a per-task error.
    pub failed: usize,
    /// Task directories without a solutions folder.
    pub without_solutions: usize,
    /// Tasks skipped because their name was already taken.
    pub duplicates: usize,
    /// Passing solutions across verified tasks.
    pub solutions_passed: usize,
    /// Failing solutions across verified tasks.
    pub solutions_failed: usize,
    /// Non-fatal environment and cleanup problems.
    pub diagnostics: usize,
}

impl RunSummary {
    fn record_outcome(&mut self, outcome: &TaskOutcome) {
        self.verified += 1;
        self.solutions_passed += outcome.result.passed();
        self.solutions_failed += outcome.result.failed();
        self.diagnostics += outcome.diagnostics.len();
    }

    /// Logs the counters.
    pub fn log(&self) {
        info!(
            discovered = self.discovered,
            unchanged = self.unchanged,
            verified = self.verified,
            failed = self.failed,
            without_solutions = self.without_solutions,
            duplicates = self.duplicates,
            "Run complete"
        );
        info!(
            passed = self.solutions_passed,
            failed = self.solutions_failed,
            diagnostics = self.diagnostics,
            "Solutions"
        );
    }
}

/// Drives one verification run over a task tree.
pub struct Orchestrator {
    config: RunConfig,
    runner: TaskRunner,
}

impl Orchestrator {
    /// Creates an orchestrator for `config`.
    pub fn new(config: RunConfig) -> Self {
        let runner = TaskRunner::from_config(&config);
        Self { config, runner }
    }

    /// Returns the run settings.
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Runs verification and writes the store.
    ///
    /// Fails before touching any task when the root is missing, the prior
    /// store is unreadable or the tree cannot be walked. Per-task errors are
    /// logged and the run moves on.
    pub async fn run(&self) -> Result<RunSummary, PipelineError> {
        let (store, summary) = self.verify_all().await?;
        store.save(&self.config.store_path)?;
        summary.log();
        Ok(summary)
    }

    /// Runs verification and returns the updated store without the final save.
    ///
    /// The store is still saved after each task when it is backed by a file.
    pub async fn verify_all(&self) -> Result<(PersistedStore, RunSummary), PipelineError> {
        let root = &self.config.root;
        if !root.is_dir() {
            return Err(ConfigError::MissingRoot(root.clone()).into());
        }

        let mut store = PersistedStore::load(&self.config.store_path)?;
        let task_dirs = discover_task_dirs(root)?;
        info!(
            root = %root.display(),
            tasks = task_dirs.len(),
            network = %self.config.network(),
            "Discovered tasks"
        );

        let mut summary = RunSummary {
            discovered: task_dirs.len(),
            ..Default::default()
        };
        let mut seen = HashSet::new();

        for dir in &task_dirs {
            if !has_solutions(dir) {
                warn!(dir = %dir.display(), "No solution directory, skipping task");
                summary.without_solutions += 1;
                continue;
            }

            let status = ChangeDetector::new(&store.hashes)
                .with_force(self.config.force)
                .check(dir);

            if let Some(digest) = status.digest() {
                if !seen.insert(digest.name.clone()) {
                    error!(
                        task = %digest.name,
                        dir = %dir.display(),
                        "Duplicate task name, skipping"
                    );
                    summary.duplicates += 1;
                    continue;
                }
            }

            let name = status.digest().map(|d| d.name.clone());
            match status {
                ChangeStatus::Unchanged(digest) => {
                    info!(task = %digest.name, "Unchanged, skipping");
                    summary.unchanged += 1;
                    continue;
                }
                ChangeStatus::Changed(digest) => {
                    store.record_digest(&digest.name, &digest.digest);
                }
                ChangeStatus::Unknown(_) => {}
            }

            self.verify_one(dir, name.as_deref(), &mut store, &mut summary)
                .await;

            if !is_stdout(&self.config.store_path) {
                store.save(&self.config.store_path)?;
            }
        }

        Ok((store, summary))
    }

    async fn verify_one(
        &self,
        dir: &Path,
        name: Option<&str>,
        store: &mut PersistedStore,
        summary: &mut RunSummary,
    ) {
        info!(dir = %dir.display(), "Verifying task");
        match self.runner.run(dir).await {
            Ok(outcome) => {
                summary.record_outcome(&outcome);
                store.merge(outcome.result, None);
            }
            Err(e) => {
                error!(dir = %dir.display(), error = %e, "Task verification failed");
                summary.failed += 1;
                record_failure(store, name);
            }
        }
    }
}

/// Drops the stale result of a task that failed once its name was known, so
/// the new digest is never stored next to an outdated result.
fn record_failure(store: &mut PersistedStore, name: Option<&str>) {
    if let Some(name) = name {
        store.merge(TaskResult::empty(name), None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::SolutionResult;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    fn write_task(root: &Path, dir: &str, name: &str, flag: &str, output: &str) {
        let task_dir = root.join(dir);
        let sol = task_dir.join("solution").join("sol1");
        fs::create_dir_all(&sol).unwrap();
        fs::write(
            task_dir.join("task.yml"),
            format!("name: {}\nflag: {}\n", name, flag),
        )
        .unwrap();
        fs::write(sol.join("solve.bash"), format!("echo '{}'\n", output)).unwrap();
    }

    fn config(root: &Path, store: &Path) -> RunConfig {
        RunConfig::new(root)
            .with_store_path(store)
            .with_timeout(Duration::from_secs(30))
            .with_docker_bin("/nonexistent/docker")
            .with_compose_bin("/nonexistent/compose")
    }

    #[tokio::test]
    async fn test_missing_root_is_fatal() {
        let temp = TempDir::new().unwrap();
        let orchestrator = Orchestrator::new(config(
            &temp.path().join("nope"),
            &temp.path().join("out.json"),
        ));

        let err = orchestrator.run().await.unwrap_err();
        assert!(matches!(err, PipelineError::Config(ConfigError::MissingRoot(_))));
    }

    #[tokio::test]
    async fn test_corrupt_store_is_fatal() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("tasks");
        write_task(&root, "a", "A", "FLAG{a}", "FLAG{a}");
        let store_path = temp.path().join("out.json");
        fs::write(&store_path, "{ not json").unwrap();

        let err = Orchestrator::new(config(&root, &store_path))
            .run()
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Store(StoreError::Corrupt { .. })));
        assert_eq!(fs::read_to_string(&store_path).unwrap(), "{ not json");
    }

    #[tokio::test]
    async fn test_duplicates_and_missing_solutions() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("tasks");
        write_task(&root, "a-first", "Same", "FLAG{1}", "FLAG{1}");
        write_task(&root, "b-second", "Same", "FLAG{2}", "FLAG{2}");
        fs::create_dir_all(root.join("c-bare")).unwrap();
        fs::write(root.join("c-bare").join("task.yml"), "name: Bare\nflag: F\n").unwrap();
        let store_path = temp.path().join("out.json");

        let (store, summary) = Orchestrator::new(config(&root, &store_path))
            .verify_all()
            .await
            .unwrap();

        assert_eq!(summary.discovered, 3);
        assert_eq!(summary.verified, 1);
        assert_eq!(summary.duplicates, 1);
        assert_eq!(summary.without_solutions, 1);
        assert_eq!(
            store.results,
            vec![TaskResult {
                name: "Same".to_string(),
                solutions: vec![SolutionResult::new("sol1", true)],
            }]
        );
        assert!(!store.hashes.contains_key("Bare"));
    }

    #[tokio::test]
    async fn test_force_reverifies() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("tasks");
        write_task(&root, "a", "A", "FLAG{a}", "FLAG{a}");
        let store_path = temp.path().join("out.json");

        Orchestrator::new(config(&root, &store_path)).run().await.unwrap();
        let again = Orchestrator::new(config(&root, &store_path)).run().await.unwrap();
        assert_eq!(again.unchanged, 1);
        assert_eq!(again.verified, 0);

        let forced = Orchestrator::new(config(&root, &store_path).with_force(true))
            .run()
            .await
            .unwrap();
        assert_eq!(forced.unchanged, 0);
        assert_eq!(forced.verified, 1);
    }

    #[tokio::test]
    async fn test_failed_environment_replaces_stale_result() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("tasks");
        let task_dir = root.join("svc");
        let sol = task_dir.join("solution").join("sol1");
        fs::create_dir_all(&sol).unwrap();
        fs::write(
            task_dir.join("task.yml"),
            "name: Svc\nflag: FLAG{v}\nmain: svc\nlocal-port: 80\n",
        )
        .unwrap();
        fs::write(task_dir.join("docker-compose.yml"), "services: {}\n").unwrap();
        fs::write(sol.join("solve.bash"), "echo 'connection refused'\n").unwrap();

        let store_path = temp.path().join("out.json");
        let mut prior = PersistedStore::new();
        prior.merge(
            TaskResult {
                name: "Svc".to_string(),
                solutions: vec![SolutionResult::new("sol1", true)],
            },
            Some("h1:old"),
        );
        prior.save(&store_path).unwrap();

        let summary = Orchestrator::new(config(&root, &store_path)).run().await.unwrap();
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.verified, 1);
        assert!(summary.diagnostics > 0);

        let store = PersistedStore::load(&store_path).unwrap();
        assert_eq!(
            store.result("Svc").unwrap().solutions,
            vec![SolutionResult::new("sol1", false)]
        );
        assert_ne!(store.hashes["Svc"], "h1:old");
    }

    #[test]
    fn test_record_failure_clears_stale_result() {
        let mut store = PersistedStore::new();
        store.merge(
            TaskResult {
                name: "Svc".to_string(),
                solutions: vec![SolutionResult::new("sol1", true)],
            },
            Some("h1:old"),
        );
        store.record_digest("Svc", "h1:new");

        record_failure(&mut store, Some("Svc"));
        record_failure(&mut store, None);

        assert_eq!(store.results, vec![TaskResult::empty("Svc")]);
        assert_eq!(store.hashes["Svc"], "h1:new");
    }
}
