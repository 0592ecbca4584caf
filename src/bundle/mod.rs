//! SWU container assembly
//!
//! The container is a cpio archive in CRC ("newc" with checksum) format,
//! produced by an external cpio implementation reading member paths from
//! stdin. `paxcpio` is preferred; GNU `cpio` is the fallback, whose CRC
//! is wrong for members above 2 GiB.

mod members;

pub use members::MemberList;

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use tempfile::NamedTempFile;
use thiserror::Error;

use crate::summary::Warning;
use crate::tool::ToolCommand;

/// Largest member the legacy archiver checksums correctly (2 GiB)
pub const LEGACY_SIZE_LIMIT: u64 = 2 << 30;

/// Errors for archive assembly
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("no archiver found (tried {preferred} and {legacy})")]
    NoArchiver { preferred: String, legacy: String },

    #[error("cannot stat archive member {member}: {source}")]
    Member {
        member: String,
        #[source]
        source: io::Error,
    },

    #[error("cannot create output {}: {source}", path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot run archiver {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("archiver {program} exited with {status}")]
    ArchiverFailed { program: String, status: ExitStatus },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Which archiver family is in use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// paxcpio: correct CRC for all sizes, `-L` to follow links
    Modern,
    /// GNU cpio: `--dereference`, CRC broken above 2 GiB
    Legacy,
}

/// The archiver selected for a run
#[derive(Debug, Clone)]
pub struct ArchiverBackend {
    tool: ToolCommand,
    kind: BackendKind,
}

impl ArchiverBackend {
    pub fn new(tool: ToolCommand, kind: BackendKind) -> Self {
        Self { tool, kind }
    }

    /// Use `preferred` if it can be found, otherwise `legacy`.
    pub fn detect(preferred: &ToolCommand, legacy: &ToolCommand) -> Result<Self, ArchiveError> {
        if preferred.locate().is_some() {
            return Ok(Self::new(preferred.clone(), BackendKind::Modern));
        }
        if legacy.locate().is_some() {
            tracing::debug!(
                preferred = %preferred,
                legacy = %legacy,
                "preferred archiver not found, falling back"
            );
            return Ok(Self::new(legacy.clone(), BackendKind::Legacy));
        }
        Err(ArchiveError::NoArchiver {
            preferred: preferred.to_string(),
            legacy: legacy.to_string(),
        })
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    pub fn tool(&self) -> &ToolCommand {
        &self.tool
    }

    /// Arguments following the tool command
    pub fn args(&self) -> Vec<&'static str> {
        let dereference = match self.kind {
            BackendKind::Modern => "-L",
            BackendKind::Legacy => "--dereference",
        };
        vec!["-ov", "-H", "crc", dereference]
    }
}

/// Streams a member list through the archiver into the output file
pub struct ArchiveAssembler {
    backend: ArchiverBackend,
}

impl ArchiveAssembler {
    pub fn new(backend: ArchiverBackend) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &ArchiverBackend {
        &self.backend
    }

    /// Check members the legacy archiver cannot checksum correctly.
    pub fn check_sizes(&self, work_dir: &Path, members: &MemberList) -> Result<Vec<Warning>, ArchiveError> {
        let mut warnings = Vec::new();
        if self.backend.kind != BackendKind::Legacy {
            return Ok(warnings);
        }

        for member in members.iter() {
            // Follows the resolver's symlinks, as the archiver will.
            let size = fs::metadata(work_dir.join(member))
                .map_err(|source| ArchiveError::Member {
                    member: member.clone(),
                    source,
                })?
                .len();
            if size > LEGACY_SIZE_LIMIT {
                warnings.push(Warning::LegacyArchiverOversize {
                    member: member.clone(),
                    size,
                });
            }
        }
        Ok(warnings)
    }

    /// Write `members` (relative to `work_dir`) into the archive at `output`.
    ///
    /// Returns size warnings for the legacy archiver. A non-zero archiver
    /// exit is an error, and `output` is only replaced once the archiver
    /// has succeeded.
    pub fn assemble(
        &self,
        work_dir: &Path,
        members: &MemberList,
        output: &Path,
    ) -> Result<Vec<Warning>, ArchiveError> {
        let warnings = self.check_sizes(work_dir, members)?;

        // Staged next to the output; dropped (and removed) on any failure.
        let output_error = |source: io::Error| ArchiveError::Output {
            path: output.to_path_buf(),
            source,
        };
        let staging_dir = match output.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let staged = NamedTempFile::new_in(staging_dir).map_err(output_error)?;
        let out = staged.as_file().try_clone().map_err(output_error)?;

        let program = self.backend.tool.to_string();
        tracing::info!(archiver = %program, members = members.len(), output = %output.display(), "assembling archive");
        let mut child = self
            .backend
            .tool
            .command()
            .args(self.backend.args())
            .current_dir(work_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::from(out))
            .spawn()
            .map_err(|source| ArchiveError::Spawn {
                program: program.clone(),
                source,
            })?;

        let written = match child.stdin.take() {
            Some(mut stdin) => {
                let mut list = String::new();
                for member in members.iter() {
                    list.push_str(member);
                    list.push('\n');
                }
                // Dropping stdin closes the pipe so the archiver sees EOF.
                stdin.write_all(list.as_bytes())
            }
            None => Ok(()),
        };

        let status = child.wait()?;
        if !status.success() {
            return Err(ArchiveError::ArchiverFailed { program, status });
        }
        written?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(staged.path(), fs::Permissions::from_mode(0o644)).map_err(output_error)?;
        }
        staged
            .persist(output)
            .map_err(|e| output_error(e.error))?;
        Ok(warnings)
    }
}
