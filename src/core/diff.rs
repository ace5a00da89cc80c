use similar::TextDiff;
use std::io::Write;
use std::process::Command;
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::config::DiffEngine;

/// A failed comparison. Identical inputs are never an error; they yield an
/// empty diff.
#[derive(Debug, Error)]
pub enum DiffError {
    #[error("failed to prepare scratch file: {0}")]
    Scratch(#[source] std::io::Error),

    #[error("diff command '{command}' could not be run: {source}")]
    ToolUnavailable {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("diff command failed ({}): {stderr}", describe_status(.status))]
    ToolFailed { status: Option<i32>, stderr: String },

    #[error("invalid diff command '{0}'")]
    InvalidCommand(String),
}

fn describe_status(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("exit status {code}"),
        None => "terminated by signal".to_string(),
    }
}

/// Produces unified diffs, either in-process or through an external `diff -u`.
#[derive(Debug, Clone)]
pub struct DiffGenerator {
    engine: DiffEngine,
    command: String,
}

impl Default for DiffGenerator {
    fn default() -> Self {
        Self::builtin()
    }
}

impl DiffGenerator {
    pub fn new(engine: DiffEngine, command: impl Into<String>) -> Self {
        Self {
            engine,
            command: command.into(),
        }
    }

    pub fn builtin() -> Self {
        Self::new(DiffEngine::Builtin, "diff")
    }

    pub fn diff(
        &self,
        before: &str,
        after: &str,
        before_label: &str,
        after_label: &str,
    ) -> Result<String, DiffError> {
        if before == after {
            return Ok(String::new());
        }

        match self.engine {
            DiffEngine::Builtin => Ok(builtin_diff(before, after, before_label, after_label)),
            DiffEngine::External => {
                self.external_diff(before, after, before_label, after_label)
            }
        }
    }

    fn external_diff(
        &self,
        before: &str,
        after: &str,
        before_label: &str,
        after_label: &str,
    ) -> Result<String, DiffError> {
        let mut argv = shell_words::split(&self.command)
            .map_err(|_| DiffError::InvalidCommand(self.command.clone()))?;
        if argv.is_empty() {
            return Err(DiffError::InvalidCommand(self.command.clone()));
        }
        let program = argv.remove(0);

        // Both scratch files are removed when dropped, whichever way we return.
        let source_file = scratch_file("source-", before)?;
        let target_file = scratch_file("target-", after)?;

        let output = Command::new(&program)
            .args(&argv)
            .arg("-u")
            .arg("--label")
            .arg(before_label)
            .arg("--label")
            .arg(after_label)
            .arg(source_file.path())
            .arg(target_file.path())
            .output()
            .map_err(|source| DiffError::ToolUnavailable {
                command: program.clone(),
                source,
            })?;

        match output.status.code() {
            Some(0) | Some(1) => Ok(String::from_utf8_lossy(&output.stdout).into_owned()),
            status => Err(DiffError::ToolFailed {
                status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }),
        }
    }
}

fn builtin_diff(before: &str, after: &str, before_label: &str, after_label: &str) -> String {
    TextDiff::from_lines(before, after)
        .unified_diff()
        .context_radius(3)
        .header(before_label, after_label)
        .to_string()
}

fn scratch_file(prefix: &str, content: &str) -> Result<NamedTempFile, DiffError> {
    let mut file = tempfile::Builder::new()
        .prefix(prefix)
        .tempfile()
        .map_err(DiffError::Scratch)?;
    file.write_all(content.as_bytes())
        .and_then(|_| file.flush())
        .map_err(DiffError::Scratch)?;
    Ok(file)
}
