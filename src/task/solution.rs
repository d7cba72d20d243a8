//! Discovery of candidate solutions under a task's `solution/` folder.

use std::fs;
use std::path::{Path, PathBuf};

/// Name of the folder holding one subdirectory per solution.
pub const SOLUTIONS_DIR: &str = "solution";
/// Build recipe that marks a container solution.
pub const DOCKERFILE: &str = "Dockerfile";
/// Entry point that marks a script solution.
pub const SOLVE_SCRIPT: &str = "solve.bash";

/// How a solution is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolutionKind {
    /// Build the solution's Dockerfile and run the image.
    Container,
    /// Run `bash solve.bash` in the solution directory.
    Script,
}

impl SolutionKind {
    /// Picks the kind from the artifacts present in `dir`.
    ///
    /// A Dockerfile takes precedence over a script.
    pub fn detect(dir: &Path) -> Option<Self> {
        if dir.join(DOCKERFILE).is_file() {
            Some(SolutionKind::Container)
        } else if dir.join(SOLVE_SCRIPT).is_file() {
            Some(SolutionKind::Script)
        } else {
            None
        }
    }
}

impl std::fmt::Display for SolutionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SolutionKind::Container => write!(f, "container"),
            SolutionKind::Script => write!(f, "script"),
        }
    }
}

/// A runnable candidate solution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolutionSpec {
    /// Directory name of the solution.
    pub name: String,
    /// Absolute or root-relative path of the solution directory.
    pub dir: PathBuf,
    /// Execution strategy.
    pub kind: SolutionKind,
}

/// Path of the solutions folder for a task directory.
pub fn solutions_dir(task_dir: &Path) -> PathBuf {
    task_dir.join(SOLUTIONS_DIR)
}

/// Lists the runnable solutions of a task in file-name order.
///
/// Entries that are not directories, or carry neither a Dockerfile nor a
/// solve script, are skipped.
pub fn discover_solutions(task_dir: &Path) -> std::io::Result<Vec<SolutionSpec>> {
    let mut entries: Vec<_> = fs::read_dir(solutions_dir(task_dir))?
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .collect();
    entries.sort_by_key(|entry| entry.file_name());

    let mut solutions = Vec::with_capacity(entries.len());
    for entry in entries {
        let dir = entry.path();
        let name = entry.file_name().to_string_lossy().to_string();
        match SolutionKind::detect(&dir) {
            Some(kind) => solutions.push(SolutionSpec { name, dir, kind }),
            None => tracing::debug!(solution = %name, "No Dockerfile or solve.bash, skipping"),
        }
    }
    Ok(solutions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn make_solution(task: &Path, name: &str, files: &[&str]) {
        let dir = task.join(SOLUTIONS_DIR).join(name);
        fs::create_dir_all(&dir).unwrap();
        for file in files {
            fs::write(dir.join(file), "").unwrap();
        }
    }

    #[test]
    fn test_detect_kind() {
        let temp = TempDir::new().unwrap();
        make_solution(temp.path(), "both", &[DOCKERFILE, SOLVE_SCRIPT]);
        make_solution(temp.path(), "script", &[SOLVE_SCRIPT]);
        make_solution(temp.path(), "empty", &["README.md"]);

        let base = temp.path().join(SOLUTIONS_DIR);
        assert_eq!(
            SolutionKind::detect(&base.join("both")),
            Some(SolutionKind::Container)
        );
        assert_eq!(
            SolutionKind::detect(&base.join("script")),
            Some(SolutionKind::Script)
        );
        assert_eq!(SolutionKind::detect(&base.join("empty")), None);
    }

    #[test]
    fn test_discover_skips_unrunnable_and_files() {
        let temp = TempDir::new().unwrap();
        make_solution(temp.path(), "b-script", &[SOLVE_SCRIPT]);
        make_solution(temp.path(), "a-docker", &[DOCKERFILE]);
        make_solution(temp.path(), "c-notes", &["notes.txt"]);
        fs::write(temp.path().join(SOLUTIONS_DIR).join("stray.txt"), "").unwrap();

        let solutions = discover_solutions(temp.path()).unwrap();
        let names: Vec<_> = solutions.iter().map(|s| s.name.as_str()).collect();

        assert_eq!(names, vec!["a-docker", "b-script"]);
        assert_eq!(solutions[0].kind, SolutionKind::Container);
        assert_eq!(solutions[1].kind, SolutionKind::Script);
    }

    #[test]
    fn test_discover_missing_folder() {
        let temp = TempDir::new().unwrap();
        assert!(discover_solutions(temp.path()).is_err());
    }
}
