//! Detached signing of sw-description
//!
//! Signing is delegated to `openssl dgst`. A key reference that names an
//! existing file signs with that private key directly; anything else is
//! taken as a PKCS#11 URI and signed through the pkcs11 engine, which keeps
//! the key on a hardware token.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use thiserror::Error;

use crate::tool::{ToolCommand, ToolStatus};

/// Serialized description inside the working directory
pub const DESCRIPTION_FILE: &str = "sw-description";

/// Detached signature sidecar inside the working directory
pub const SIGNATURE_FILE: &str = "sw-description.sig";

/// Digest flag passed to the signer
pub const DIGEST_FLAG: &str = "-sha256";

/// Local errors around a signing invocation (not signer failures)
#[derive(Debug, Error)]
pub enum SigningError {
    #[error("cannot create signature file {}: {source}", path.display())]
    CreateSignature {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// How the description is signed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SigningKey {
    /// Private key file on disk
    KeyFile(PathBuf),
    /// Engine token identifier, e.g. a `pkcs11:` URI
    Token(String),
}

impl SigningKey {
    /// Classify a key reference. Relative paths are checked against `base`.
    pub fn from_reference(reference: &str, base: &Path) -> Self {
        let candidate = base.join(reference);
        if candidate.is_file() {
            SigningKey::KeyFile(candidate)
        } else {
            SigningKey::Token(reference.to_string())
        }
    }
}

/// Result of asking the external signer for a signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignOutcome {
    /// Sidecar path; it exists even when signing failed
    pub signature: PathBuf,
    pub status: ToolStatus,
}

/// Invokes the external signer
#[derive(Debug, Clone)]
pub struct Signer {
    tool: ToolCommand,
}

impl Signer {
    pub fn new(tool: ToolCommand) -> Self {
        Self { tool }
    }

    /// Arguments following the tool command for a given key.
    pub fn args(key: &SigningKey) -> Vec<String> {
        let mut args = vec!["dgst".to_string(), DIGEST_FLAG.to_string()];
        match key {
            SigningKey::KeyFile(path) => {
                args.push("-sign".to_string());
                args.push(path.to_string_lossy().into_owned());
            }
            SigningKey::Token(token) => {
                args.extend(
                    ["-engine", "pkcs11", "-keyform", "engine", "-sign"]
                        .iter()
                        .map(|s| s.to_string()),
                );
                args.push(token.clone());
            }
        }
        args.push(DESCRIPTION_FILE.to_string());
        args
    }

    /// Sign `work_dir/sw-description` into `work_dir/sw-description.sig`.
    ///
    /// The signer's own failure (spawn error or non-zero exit) is reported
    /// in the returned status rather than as an error.
    pub fn sign(&self, work_dir: &Path, key: &SigningKey) -> Result<SignOutcome, SigningError> {
        let signature = work_dir.join(SIGNATURE_FILE);
        let sidecar = File::create(&signature).map_err(|source| SigningError::CreateSignature {
            path: signature.clone(),
            source,
        })?;

        tracing::info!(signer = %self.tool, "signing {}", DESCRIPTION_FILE);
        let output = self
            .tool
            .command()
            .args(Self::args(key))
            .current_dir(work_dir)
            // Works around Debian bug #923333 in openssl's pkcs11 engine.
            .env("MALLOC_CHECK_", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::from(sidecar))
            .stderr(Stdio::piped())
            .output();

        let status = match output {
            Ok(output) => ToolStatus::from_exit(&self.tool, output.status, &output.stderr),
            Err(e) => ToolStatus::Failed {
                diagnostic: format!("cannot run {}: {}", self.tool, e),
            },
        };

        Ok(SignOutcome { signature, status })
    }
}
