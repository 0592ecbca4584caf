//! swu-gen - SWUpdate image generator
//!
//! Turns a `sw-description` template into a signed, checksummed `.swu`
//! container: artifacts are located across search paths, hashed and
//! annotated in the description, the description is optionally signed, and
//! everything is packed into a CRC cpio archive by an external archiver.

pub mod artifact;
pub mod bundle;
pub mod config;
pub mod pipeline;
pub mod signing;
pub mod summary;
pub mod tool;
pub mod walker;

pub use artifact::{Annotator, ArtifactClass, ArtifactError};
pub use bundle::{ArchiveAssembler, ArchiveError, ArchiverBackend, BackendKind, MemberList};
pub use config::{ConfigError, ConfigOverrides, EffectiveConfig, GeneratorConfig};
pub use pipeline::{Pipeline, PipelineError, PipelineResult};
pub use signing::{Signer, SigningError, SigningKey};
pub use summary::{ArtifactRecord, RunSummary, Warning, WarningLog};
pub use tool::{ToolCommand, ToolStatus};
