//! Generator run orchestration
//!
//! One run, strictly sequential:
//! - Load the template
//! - Resolve, hash and annotate images, then scripts, then files
//! - Write sw-description into the working directory
//! - Sign it when a key is configured
//! - Build the member list and stream it through the archiver
//!
//! Fatal conditions are [`PipelineError`]s; everything else is a warning in
//! the returned [`RunSummary`].

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use swu_libconfig::{parse_file, write_file, Document, ParseError, Value};
use tempfile::TempDir;
use thiserror::Error;

use crate::artifact::{Annotator, ArtifactClass, ArtifactError};
use crate::bundle::{ArchiveAssembler, ArchiveError, ArchiverBackend, MemberList};
use crate::config::{ConfigError, ConfigSource, GeneratorConfig};
use crate::signing::{Signer, SigningError, SigningKey, DESCRIPTION_FILE};
use crate::summary::{ArtifactRecord, RunSummary, Warning, WarningLog, SCHEMA_ID, SCHEMA_VERSION};
use crate::tool::ToolStatus;
use crate::walker::try_for_each_by_key_mut;

/// Root setting every template must carry
pub const SOFTWARE_KEY: &str = "software";

/// Pipeline errors
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("template error: {0}")]
    Template(#[from] ParseError),

    #[error("template {} has no 'software' group", path.display())]
    MissingSoftware { path: PathBuf },

    #[error("artifact error: {0}")]
    Artifact(#[from] ArtifactError),

    #[error("signing error: {0}")]
    Signing(#[from] SigningError),

    #[error("signing failed: {diagnostic}")]
    SignerFailed { diagnostic: String },

    #[error("archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl PipelineError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            PipelineError::Config(_) => 1,
            PipelineError::Template(_) => 1,
            PipelineError::MissingSoftware { .. } => 1,
            PipelineError::Artifact(_) => 2,
            PipelineError::Io(_) => 2,
            PipelineError::Signing(_) => 3,
            PipelineError::SignerFailed { .. } => 3,
            PipelineError::Archive(_) => 4,
        }
    }
}

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

/// A configured generator run
pub struct Pipeline {
    config: GeneratorConfig,
    template: PathBuf,
    sources: Vec<ConfigSource>,
}

impl Pipeline {
    pub fn new(config: GeneratorConfig, template: impl Into<PathBuf>, sources: Vec<ConfigSource>) -> Self {
        Self {
            config,
            template: template.into(),
            sources,
        }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Run the whole pipeline and produce the output archive.
    pub fn run(&self) -> PipelineResult<RunSummary> {
        // Template problems abort before anything touches the filesystem.
        let mut document = parse_file(&self.template)?;
        if document.get(SOFTWARE_KEY).and_then(Value::as_group).is_none() {
            return Err(PipelineError::MissingSoftware {
                path: self.template.clone(),
            });
        }

        // Keeps an ephemeral directory alive until the run ends.
        let _scratch;
        let work_dir = match &self.config.work_dir {
            Some(dir) => {
                fs::create_dir_all(dir)?;
                dir.clone()
            }
            None => {
                let scratch = TempDir::new()?;
                let dir = scratch.path().to_path_buf();
                _scratch = scratch;
                dir
            }
        };
        tracing::debug!(work_dir = %work_dir.display(), "working directory");

        let mut warnings = WarningLog::new();

        tracing::info!(template = %self.template.display(), "annotating artifacts");
        let artifacts = self.annotate(&mut document, &work_dir, &mut warnings)?;

        let description = work_dir.join(DESCRIPTION_FILE);
        write_file(&document, &description)?;
        tracing::info!(path = %description.display(), "wrote {}", DESCRIPTION_FILE);

        let signed = match &self.config.key {
            Some(key) => {
                self.sign(key, &work_dir, &mut warnings)?;
                true
            }
            None => false,
        };

        let software = document
            .get(SOFTWARE_KEY)
            .ok_or_else(|| PipelineError::MissingSoftware {
                path: self.template.clone(),
            })?;
        let members = MemberList::for_software(software, signed);

        let tools = &self.config.tools;
        let backend = ArchiverBackend::detect(&tools.archiver, &tools.legacy_archiver)?;
        let archiver = backend.tool().to_string();
        let assembler = ArchiveAssembler::new(backend);
        warnings.extend(assembler.assemble(&work_dir, &members, &self.config.output)?);
        tracing::info!(output = %self.config.output.display(), "archive written");

        Ok(RunSummary {
            schema_version: SCHEMA_VERSION,
            schema_id: SCHEMA_ID.to_string(),
            created_at: Utc::now(),
            template: self.template.clone(),
            output: self.config.output.clone(),
            work_dir: self.config.work_dir.clone(),
            archiver,
            signed,
            members: members.into_vec(),
            artifacts,
            warnings: warnings.into_vec(),
            config_sources: self.sources.clone(),
        })
    }

    fn annotate(
        &self,
        document: &mut Document,
        work_dir: &Path,
        warnings: &mut WarningLog,
    ) -> PipelineResult<Vec<ArtifactRecord>> {
        let software = document
            .get_mut(SOFTWARE_KEY)
            .ok_or_else(|| PipelineError::MissingSoftware {
                path: self.template.clone(),
            })?;

        let annotator = Annotator::new(&self.config.search_paths, work_dir);
        let mut records = Vec::new();
        for class in ArtifactClass::ORDER {
            try_for_each_by_key_mut(class.key(), software, &mut |entry: &mut Value| {
                if let Some(record) = annotator.annotate(class, entry, warnings)? {
                    records.push(record);
                }
                Ok::<(), ArtifactError>(())
            })?;
        }
        Ok(records)
    }

    fn sign(&self, key: &str, work_dir: &Path, warnings: &mut WarningLog) -> PipelineResult<()> {
        let key = SigningKey::from_reference(key, work_dir);
        if let SigningKey::KeyFile(path) = &key {
            warnings.push(Warning::KeyFileSigning { key: path.clone() });
        }

        let outcome = Signer::new(self.config.tools.signer.clone()).sign(work_dir, &key)?;
        match outcome.status {
            ToolStatus::Succeeded => {
                tracing::info!(signature = %outcome.signature.display(), "signed {}", DESCRIPTION_FILE);
            }
            ToolStatus::Failed { diagnostic } if self.config.strict_signing => {
                return Err(PipelineError::SignerFailed { diagnostic });
            }
            ToolStatus::Failed { diagnostic } => {
                warnings.push(Warning::SigningFailed { diagnostic });
            }
        }
        Ok(())
    }
}
