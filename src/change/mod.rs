//! Change detection: decides which tasks need re-verification.
//!
//! A task is skipped only when a digest is stored for its name and equals the
//! freshly computed one. Anything that prevents computing the digest counts
//! as a change, so a broken task is never silently skipped.

pub mod digest;

use std::collections::BTreeMap;
use std::path::Path;

use tracing::{debug, warn};

pub use digest::{dir_files, hash_dir, DIGEST_PREFIX};

use crate::error::DigestError;
use crate::task::TaskManifest;

/// Name and content digest of a task directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDigest {
    /// Task name from the manifest.
    pub name: String,
    /// `h1:` digest of the directory contents.
    pub digest: String,
}

/// Reads the manifest name of `task_dir` and digests its contents.
pub fn task_digest(task_dir: &Path) -> Result<TaskDigest, DigestError> {
    let manifest = TaskManifest::load(task_dir)?;
    let digest = hash_dir(task_dir)?;
    Ok(TaskDigest {
        name: manifest.name,
        digest,
    })
}

/// Outcome of checking one task directory against the stored digests.
#[derive(Debug)]
pub enum ChangeStatus {
    /// Stored digest matches; the task can be skipped.
    Unchanged(TaskDigest),
    /// No stored digest, or it differs. The new digest becomes the baseline.
    Changed(TaskDigest),
    /// The digest could not be computed. Treated as changed.
    Unknown(DigestError),
}

impl ChangeStatus {
    /// Whether the task must be verified.
    pub fn needs_verification(&self) -> bool {
        !matches!(self, ChangeStatus::Unchanged(_))
    }

    /// The freshly computed digest, if any.
    pub fn digest(&self) -> Option<&TaskDigest> {
        match self {
            ChangeStatus::Unchanged(d) | ChangeStatus::Changed(d) => Some(d),
            ChangeStatus::Unknown(_) => None,
        }
    }
}

/// Compares task directories against a map of previously stored digests.
pub struct ChangeDetector<'a> {
    hashes: &'a BTreeMap<String, String>,
    force: bool,
}

impl<'a> ChangeDetector<'a> {
    /// Creates a detector over the stored `hashes`.
    pub fn new(hashes: &'a BTreeMap<String, String>) -> Self {
        Self {
            hashes,
            force: false,
        }
    }

    /// Treats every task as changed while still computing digests.
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Checks a single task directory.
    pub fn check(&self, task_dir: &Path) -> ChangeStatus {
        let computed = match task_digest(task_dir) {
            Ok(computed) => computed,
            Err(e) => {
                warn!(
                    path = %task_dir.display(),
                    error = %e,
                    "Cannot determine change status, verifying anyway"
                );
                return ChangeStatus::Unknown(e);
            }
        };

        let unchanged = !self.force
            && self
                .hashes
                .get(&computed.name)
                .is_some_and(|previous| previous == &computed.digest);

        if unchanged {
            debug!(task = %computed.name, "Digest unchanged");
            ChangeStatus::Unchanged(computed)
        } else {
            ChangeStatus::Changed(computed)
        }
    }
}
