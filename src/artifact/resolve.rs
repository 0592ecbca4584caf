//! Search-path resolution of artifact files

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Locate `filename` in the first search path that has it and link it into
/// `work_dir`.
///
/// Returns the absolute located path, or `None` when no search path contains the
/// file. A miss is not an error here: the file is then expected to exist
/// in `work_dir` already, and hashing reports it if it does not. An
/// existing link at the destination is left in place.
pub fn resolve(filename: &str, search_paths: &[PathBuf], work_dir: &Path) -> io::Result<Option<PathBuf>> {
    for dir in search_paths {
        let candidate = dir.join(filename);
        if !candidate.is_file() {
            continue;
        }
        // The link lives in `work_dir`; a relative target would dangle.
        let candidate = if candidate.is_absolute() {
            candidate
        } else {
            env::current_dir()?.join(candidate)
        };

        let link = work_dir.join(filename);
        link_into(&candidate, &link)?;
        tracing::debug!(
            filename,
            resolved = %candidate.display(),
            "resolved artifact"
        );
        return Ok(Some(candidate));
    }

    tracing::debug!(filename, "artifact not in any search path, using working directory");
    Ok(None)
}

fn link_into(target: &Path, link: &Path) -> io::Result<()> {
    if let Some(parent) = link.parent() {
        fs::create_dir_all(parent)?;
    }
    match make_link(target, link) {
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(()),
        other => other,
    }
}

#[cfg(unix)]
fn make_link(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(not(unix))]
fn make_link(target: &Path, link: &Path) -> io::Result<()> {
    if link.exists() {
        return Err(io::Error::from(io::ErrorKind::AlreadyExists));
    }
    fs::copy(target, link).map(|_| ())
}
