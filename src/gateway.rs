//! Remote command execution and file transfer.
//!
//! Production implementations shell out to `ssh` and `scp` via
//! `std::process::Command`, always in batch mode so a missing key fails
//! instead of prompting. Local copies go through the filesystem.
//!
//! [`fake`] holds scripted in-memory implementations for tests.

use crate::location::Target;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("failed to execute {program}: {source}")]
    Spawn {
        program: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} {host} failed ({status}): {stderr}")]
    Exit {
        program: &'static str,
        host: String,
        status: String,
        stderr: String,
    },
    #[error("{program} output was not valid UTF-8")]
    Utf8 { program: &'static str },
    #[error("copy of {} failed: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{0}")]
    Rejected(String),
}

/// Runs a shell command on a named host.
pub trait RemoteExecutor {
    /// Run `command` on `host` and return its trimmed stdout.
    ///
    /// A non-zero exit status is an error carrying the captured stderr.
    fn run(&self, host: &str, command: &str) -> Result<String, GatewayError>;
}

/// Copies a file into a local directory, preserving its timestamps.
pub trait FileTransfer {
    /// Copy `source` (local, or on the remote host) into `dest_dir`.
    ///
    /// Returns the path of the copy.
    fn copy(&self, target: &Target, source: &Path, dest_dir: &Path)
    -> Result<PathBuf, GatewayError>;
}

// ---------------------------------------------------------------------------
// ssh / scp
// ---------------------------------------------------------------------------

const BATCH_MODE: [&str; 2] = ["-o", "BatchMode=yes"];

/// Gateway backed by the system `ssh`/`scp` binaries and the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct SshGateway;

impl SshGateway {
    fn output(program: &'static str, host: &str, args: &[&str]) -> Result<String, GatewayError> {
        tracing::debug!(program, host, ?args, "running remote command");
        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|source| GatewayError::Spawn { program, source })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(GatewayError::Exit {
                program,
                host: host.to_string(),
                status: output.status.to_string(),
                stderr: stderr.trim().to_string(),
            });
        }

        let stdout = String::from_utf8(output.stdout).map_err(|_| GatewayError::Utf8 { program })?;
        Ok(stdout.trim().to_string())
    }
}

impl RemoteExecutor for SshGateway {
    fn run(&self, host: &str, command: &str) -> Result<String, GatewayError> {
        let mut args: Vec<&str> = BATCH_MODE.to_vec();
        args.extend([host, command]);
        Self::output("ssh", host, &args)
    }
}

impl FileTransfer for SshGateway {
    fn copy(
        &self,
        target: &Target,
        source: &Path,
        dest_dir: &Path,
    ) -> Result<PathBuf, GatewayError> {
        let file_name = source.file_name().ok_or_else(|| {
            GatewayError::Rejected(format!("{} has no file name", source.display()))
        })?;
        let dest = dest_dir.join(file_name);

        match target {
            Target::Local => copy_local(source, &dest)?,
            Target::Remote(host) => {
                let remote = format!("{host}:{}", source.display());
                let dest_arg = dest_dir.to_string_lossy();
                let mut args: Vec<&str> = vec!["-q", "-p"];
                args.extend(BATCH_MODE);
                args.extend([remote.as_str(), &*dest_arg]);
                Self::output("scp", host, &args)?;
            }
        }
        Ok(dest)
    }
}

/// Copy a local file, carrying over permissions and access/modification times.
fn copy_local(source: &Path, dest: &Path) -> Result<(), GatewayError> {
    tracing::debug!(source = %source.display(), dest = %dest.display(), "copying local file");
    let io_err = |source_err| GatewayError::Io {
        path: source.to_path_buf(),
        source: source_err,
    };

    let metadata = std::fs::metadata(source).map_err(io_err)?;
    std::fs::copy(source, dest).map_err(io_err)?;
    filetime::set_file_times(
        dest,
        filetime::FileTime::from_last_access_time(&metadata),
        filetime::FileTime::from_last_modification_time(&metadata),
    )
    .map_err(io_err)?;
    Ok(())
}

/// Quote a value for a POSIX shell. Plain path-like values pass through.
pub fn shell_quote(input: &str) -> String {
    if input.is_empty() {
        return "''".to_string();
    }
    if input
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "-_./".contains(c))
    {
        return input.to_string();
    }
    format!("'{}'", input.replace('\'', "'\"'\"'"))
}

// ---------------------------------------------------------------------------
// Scripted implementations
// ---------------------------------------------------------------------------

pub mod fake {
    //! In-memory gateway doubles: remote commands are answered from a table,
    //! transfers are recorded.

    use super::{FileTransfer, GatewayError, RemoteExecutor};
    use crate::location::Target;
    use std::cell::RefCell;
    use std::collections::{HashMap, HashSet};
    use std::path::{Path, PathBuf};

    /// Answers `(host, command)` pairs from a script. Unscripted commands fail.
    #[derive(Debug, Default)]
    pub struct ScriptedRemote {
        responses: HashMap<(String, String), Result<String, String>>,
        calls: RefCell<Vec<(String, String)>>,
    }

    impl ScriptedRemote {
        pub fn new() -> Self {
            Self::default()
        }

        /// Script a successful command with the given stdout.
        pub fn respond(mut self, host: &str, command: &str, stdout: &str) -> Self {
            self.responses.insert(
                (host.to_string(), command.to_string()),
                Ok(stdout.trim().to_string()),
            );
            self
        }

        /// Script a command that exits non-zero with the given stderr.
        pub fn fail(mut self, host: &str, command: &str, stderr: &str) -> Self {
            self.responses.insert(
                (host.to_string(), command.to_string()),
                Err(stderr.to_string()),
            );
            self
        }

        /// Every `(host, command)` pair run so far, in order.
        pub fn calls(&self) -> Vec<(String, String)> {
            self.calls.borrow().clone()
        }
    }

    impl RemoteExecutor for ScriptedRemote {
        fn run(&self, host: &str, command: &str) -> Result<String, GatewayError> {
            self.calls
                .borrow_mut()
                .push((host.to_string(), command.to_string()));
            match self.responses.get(&(host.to_string(), command.to_string())) {
                Some(Ok(stdout)) => Ok(stdout.clone()),
                Some(Err(stderr)) => Err(GatewayError::Exit {
                    program: "ssh",
                    host: host.to_string(),
                    status: "exit status: 1".to_string(),
                    stderr: stderr.clone(),
                }),
                None => Err(GatewayError::Rejected(format!(
                    "no scripted response for {host}: {command}"
                ))),
            }
        }
    }

    /// Records copies without touching the filesystem.
    #[derive(Debug, Default)]
    pub struct RecordingTransfer {
        failing: HashSet<PathBuf>,
        copies: RefCell<Vec<(Target, PathBuf, PathBuf)>>,
    }

    impl RecordingTransfer {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make every copy of `source` fail.
        pub fn fail_on(mut self, source: impl Into<PathBuf>) -> Self {
            self.failing.insert(source.into());
            self
        }

        /// Every successful `(target, source, dest_dir)` copy, in order.
        pub fn copies(&self) -> Vec<(Target, PathBuf, PathBuf)> {
            self.copies.borrow().clone()
        }
    }

    impl FileTransfer for RecordingTransfer {
        fn copy(
            &self,
            target: &Target,
            source: &Path,
            dest_dir: &Path,
        ) -> Result<PathBuf, GatewayError> {
            if self.failing.contains(source) {
                return Err(GatewayError::Rejected(format!(
                    "scripted copy failure for {}",
                    source.display()
                )));
            }
            self.copies.borrow_mut().push((
                target.clone(),
                source.to_path_buf(),
                dest_dir.to_path_buf(),
            ));
            let name = source.file_name().unwrap_or_default();
            Ok(dest_dir.join(name))
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
