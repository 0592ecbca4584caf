//! Enriching artifact entries with integrity and size metadata

use std::io;
use std::path::{Path, PathBuf};

use swu_libconfig::{Group, Value};
use thiserror::Error;

use super::digest::{gzip_uncompressed_size, sha256_file};
use super::resolve::resolve;
use super::ArtifactClass;
use crate::summary::{ArtifactRecord, Warning, WarningLog};

/// Entry key holding the content digest
pub const SHA256_KEY: &str = "sha256";

/// Entry key holding the free-form property group
pub const PROPERTIES_KEY: &str = "properties";

/// Property set for compressed volume images
pub const DECOMPRESSED_SIZE_KEY: &str = "decompressed-size";

/// Fatal errors while processing an artifact entry
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("cannot link {filename} into the working directory: {source}")]
    Link {
        filename: String,
        #[source]
        source: io::Error,
    },

    #[error("cannot hash {filename} ({}): {source}", path.display())]
    Hash {
        filename: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Resolves, hashes and annotates artifact entries for one run
pub struct Annotator<'a> {
    search_paths: &'a [PathBuf],
    work_dir: &'a Path,
}

impl<'a> Annotator<'a> {
    pub fn new(search_paths: &'a [PathBuf], work_dir: &'a Path) -> Self {
        Self {
            search_paths,
            work_dir,
        }
    }

    /// Process one entry of an `images`, `scripts` or `files` list.
    ///
    /// Entries without a string `filename` are informational and skipped
    /// (`Ok(None)`). Otherwise the file is resolved and hashed, and the
    /// digest stored under `sha256`. Images targeting a volume with gzip
    /// compression also get `properties.decompressed-size`, unless they are
    /// pre-encrypted.
    pub fn annotate(
        &self,
        class: ArtifactClass,
        entry: &mut Value,
        warnings: &mut WarningLog,
    ) -> Result<Option<ArtifactRecord>, ArtifactError> {
        let group = match entry.as_group_mut() {
            Some(group) => group,
            None => return Ok(None),
        };
        let filename = match group.get("filename").and_then(Value::as_str) {
            Some(filename) => filename.to_string(),
            None => return Ok(None),
        };

        let resolved = resolve(&filename, self.search_paths, self.work_dir).map_err(|source| {
            ArtifactError::Link {
                filename: filename.clone(),
                source,
            }
        })?;

        let local = self.work_dir.join(&filename);
        let sha256 = sha256_file(&local).map_err(|source| ArtifactError::Hash {
            filename: filename.clone(),
            path: local.clone(),
            source,
        })?;
        group.insert(SHA256_KEY, sha256.clone());
        tracing::debug!(filename = %filename, sha256 = %sha256, "hashed artifact");

        let decompressed_size = match class {
            ArtifactClass::Images => {
                let payload = resolved.as_deref().unwrap_or(&local);
                derive_decompressed_size(group, &filename, payload, warnings)
            }
            ArtifactClass::Scripts | ArtifactClass::Files => None,
        };

        Ok(Some(ArtifactRecord {
            class,
            filename,
            resolved,
            sha256,
            decompressed_size,
        }))
    }
}

/// Inject `properties.decompressed-size` when the entry qualifies.
///
/// Never fails: every reason for not setting the size is either silent
/// (entry does not qualify) or a warning.
fn derive_decompressed_size(
    group: &mut Group,
    filename: &str,
    payload: &Path,
    warnings: &mut WarningLog,
) -> Option<u32> {
    if !group.contains("volume") || !has_gzip_trailer(group.get("compressed")) {
        return None;
    }

    if group.contains("encrypted") {
        warnings.push(Warning::EncryptedSizeSkipped {
            filename: filename.to_string(),
        });
        return None;
    }

    let size = match gzip_uncompressed_size(payload) {
        Ok(size) => size,
        Err(e) => {
            warnings.push(Warning::SizeUnavailable {
                filename: filename.to_string(),
                reason: e.to_string(),
            });
            return None;
        }
    };

    let properties = group.get_or_insert_with(PROPERTIES_KEY, || Value::Group(Group::new()));
    match properties.as_group_mut() {
        Some(properties) => {
            properties.insert(DECOMPRESSED_SIZE_KEY, size.to_string());
            tracing::debug!(filename, size, "derived decompressed size");
            Some(size)
        }
        None => {
            warnings.push(Warning::PropertiesNotGroup {
                filename: filename.to_string(),
            });
            None
        }
    }
}

/// `compressed = true` or `compressed = "zlib"`; other codecs carry no
/// usable size trailer.
fn has_gzip_trailer(compressed: Option<&Value>) -> bool {
    match compressed {
        Some(Value::Bool(flag)) => *flag,
        Some(Value::Str(codec)) => codec == "zlib",
        _ => false,
    }
}
