//! Run summary and non-fatal warnings
//!
//! Fatal conditions abort a run through [`crate::pipeline::PipelineError`].
//! Everything else the user should know about is a [`Warning`], logged when
//! it happens and returned in the [`RunSummary`].

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::artifact::ArtifactClass;
use crate::config::ConfigSource;

/// Schema version for the JSON run summary
pub const SCHEMA_VERSION: u32 = 1;

/// Schema identifier
pub const SCHEMA_ID: &str = "swu-gen/run_summary@1";

/// A non-fatal condition encountered during a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    /// Compressed, volume-targeted image that is also pre-encrypted
    EncryptedSizeSkipped { filename: String },

    /// Trailer could not be read; no size was injected
    SizeUnavailable { filename: String, reason: String },

    /// `properties` exists but is not a group
    PropertiesNotGroup { filename: String },

    /// Signing with a key file rather than a token URI
    KeyFileSigning { key: PathBuf },

    /// External signer failed; the run continued unsigned
    SigningFailed { diagnostic: String },

    /// Member too large for the legacy archiver's checksum
    LegacyArchiverOversize { member: String, size: u64 },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::EncryptedSizeSkipped { filename } => write!(
                f,
                "{}: the decompressed-size cannot be calculated for pre-encrypted volumes",
                filename
            ),
            Warning::SizeUnavailable { filename, reason } => {
                write!(f, "{}: decompressed-size not derived: {}", filename, reason)
            }
            Warning::PropertiesNotGroup { filename } => write!(
                f,
                "{}: 'properties' is not a group, decompressed-size not set",
                filename
            ),
            Warning::KeyFileSigning { key } => write!(
                f,
                "signing with key file {}; please consider providing a pkcs11 uri instead",
                key.display()
            ),
            Warning::SigningFailed { diagnostic } => {
                write!(f, "failed to sign sw-description: {}", diagnostic)
            }
            Warning::LegacyArchiverOversize { member, size } => write!(
                f,
                "{} is {} bytes, greater than 2GiB; the archive will have a bad checksum with GNU cpio. \
                 Install paxcpio or configure SWUpdate with DISABLE_CPIO_CRC",
                member, size
            ),
        }
    }
}

/// Accumulates warnings, logging each one as it is recorded
#[derive(Debug, Default)]
pub struct WarningLog {
    warnings: Vec<Warning>,
}

impl WarningLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, warning: Warning) {
        tracing::warn!("{}", warning);
        self.warnings.push(warning);
    }

    pub fn extend(&mut self, warnings: impl IntoIterator<Item = Warning>) {
        for warning in warnings {
            self.push(warning);
        }
    }

    pub fn as_slice(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn into_vec(self) -> Vec<Warning> {
        self.warnings
    }
}

/// What was computed for one artifact entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactRecord {
    pub class: ArtifactClass,

    /// Filename as declared in the template
    pub filename: String,

    /// Where the file was found, if a search path had it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved: Option<PathBuf>,

    pub sha256: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub decompressed_size: Option<u32>,
}

/// Summary of a completed run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub schema_version: u32,
    pub schema_id: String,
    pub created_at: DateTime<Utc>,

    pub template: PathBuf,
    pub output: PathBuf,

    /// Explicit working directory; absent when an ephemeral one was used
    #[serde(skip_serializing_if = "Option::is_none")]
    pub work_dir: Option<PathBuf>,

    /// Archiver program that produced the container
    pub archiver: String,

    /// Whether a signature sidecar was included
    pub signed: bool,

    /// Archive members in the order they were written
    pub members: Vec<String>,

    pub artifacts: Vec<ArtifactRecord>,

    pub warnings: Vec<Warning>,

    pub config_sources: Vec<ConfigSource>,
}

impl RunSummary {
    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
