//! Content digests over task directories.
//!
//! The format matches the `h1:` directory hash used by Go module tooling,
//! so stores written by earlier versions of this tool stay valid:
//!
//! ```text
//! h1:base64(sha256("<sha256 hex of file>  <relative/path>\n" for each file, sorted))
//! ```

use std::fs::File;
use std::io;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::error::DigestError;

/// Prefix identifying the digest scheme.
pub const DIGEST_PREFIX: &str = "h1:";

/// Lists the regular files under `dir` as sorted `/`-separated relative paths.
pub fn dir_files(dir: &Path) -> Result<Vec<String>, DigestError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).follow_links(false) {
        let entry = entry.map_err(|e| DigestError::Walk {
            path: dir.to_path_buf(),
            message: e.to_string(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let rel = entry
            .path()
            .strip_prefix(dir)
            .map_err(|e| DigestError::Walk {
                path: entry.path().to_path_buf(),
                message: e.to_string(),
            })?;
        let rel = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        files.push(rel);
    }
    files.sort();
    Ok(files)
}

/// Computes the `h1:` digest of every regular file under `dir`.
pub fn hash_dir(dir: &Path) -> Result<String, DigestError> {
    let files = dir_files(dir)?;

    let mut summary = Sha256::new();
    for rel in &files {
        if rel.contains('\n') {
            return Err(DigestError::NewlineInName(rel.clone()));
        }
        let file_hash = hash_file(&dir.join(rel))?;
        summary.update(format!("{}  {}\n", file_hash, rel).as_bytes());
    }

    Ok(format!("{}{}", DIGEST_PREFIX, STANDARD.encode(summary.finalize())))
}

fn hash_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}
