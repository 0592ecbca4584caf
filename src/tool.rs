//! External tool invocation helpers
//!
//! Signing and archiving are delegated to external programs. A
//! [`ToolCommand`] names the program plus any leading arguments (so a
//! wrapper such as `["sh", "sign.sh"]` works as well as a bare `openssl`),
//! and [`ToolStatus`] carries the outcome of a best-effort invocation back to
//! the caller, which decides whether a failure aborts the run.

use std::env;
use std::ffi::OsStr;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

use serde::{Deserialize, Serialize};

/// A program to run, with arguments placed before the ones the caller adds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ToolRepr", into = "ToolRepr")]
pub struct ToolCommand {
    program: String,
    args: Vec<String>,
}

/// Accepted config spellings: `"openssl"` or `["sh", "wrapper.sh"]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum ToolRepr {
    Program(String),
    Argv(Vec<String>),
}

impl TryFrom<ToolRepr> for ToolCommand {
    type Error = String;

    fn try_from(repr: ToolRepr) -> Result<Self, Self::Error> {
        match repr {
            ToolRepr::Program(program) if !program.trim().is_empty() => Ok(Self::new(program)),
            ToolRepr::Argv(mut argv) if !argv.is_empty() && !argv[0].trim().is_empty() => {
                let program = argv.remove(0);
                Ok(Self { program, args: argv })
            }
            _ => Err("tool command must name a program".to_string()),
        }
    }
}

impl From<ToolCommand> for ToolRepr {
    fn from(tool: ToolCommand) -> Self {
        if tool.args.is_empty() {
            ToolRepr::Program(tool.program)
        } else {
            let mut argv = vec![tool.program];
            argv.extend(tool.args);
            ToolRepr::Argv(argv)
        }
    }
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Add leading arguments
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Locate the program, either as a literal path or on `PATH`.
    pub fn locate(&self) -> Option<PathBuf> {
        find_program(&self.program)
    }

    /// Build a `Command` with the leading arguments already applied.
    pub fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        command
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Find an executable by name.
///
/// Names containing a path separator are checked as paths; bare names are
/// searched for in each `PATH` entry.
pub fn find_program(name: &str) -> Option<PathBuf> {
    let candidate = Path::new(name);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }

    let path = env::var_os("PATH")?;
    env::split_paths(&path)
        .map(|dir| dir.join(OsStr::new(name)))
        .find(|p| p.is_file())
}

/// Outcome of a best-effort external invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolStatus {
    Succeeded,
    Failed { diagnostic: String },
}

impl ToolStatus {
    /// Build a status from a finished process and its captured stderr.
    pub fn from_exit(tool: &ToolCommand, status: ExitStatus, stderr: &[u8]) -> Self {
        if status.success() {
            return ToolStatus::Succeeded;
        }
        let stderr = String::from_utf8_lossy(stderr);
        let stderr = stderr.trim();
        let diagnostic = if stderr.is_empty() {
            format!("{} exited with {}", tool.program, status)
        } else {
            format!("{} exited with {}: {}", tool.program, status, stderr)
        };
        ToolStatus::Failed { diagnostic }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ToolStatus::Succeeded)
    }
}
