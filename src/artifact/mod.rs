//! Artifact handling for sw-description entries
//!
//! Locating payload files across the search paths, hashing them, deriving
//! decompressed sizes and writing that metadata back into the entries.

mod annotate;
mod digest;
mod resolve;

pub use annotate::{Annotator, ArtifactError, DECOMPRESSED_SIZE_KEY, PROPERTIES_KEY, SHA256_KEY};
pub use digest::{gzip_uncompressed_size, sha256_file, HASH_CHUNK_SIZE};
pub use resolve::resolve;

use serde::Serialize;

/// The three kinds of artifact lists a sw-description can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactClass {
    Images,
    Scripts,
    Files,
}

impl ArtifactClass {
    /// Processing order for a run: images, then scripts, then files
    pub const ORDER: [ArtifactClass; 3] = [
        ArtifactClass::Images,
        ArtifactClass::Scripts,
        ArtifactClass::Files,
    ];

    /// Key name of the list in the configuration tree
    pub fn key(self) -> &'static str {
        match self {
            ArtifactClass::Images => "images",
            ArtifactClass::Scripts => "scripts",
            ArtifactClass::Files => "files",
        }
    }
}
