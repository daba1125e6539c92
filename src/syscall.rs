// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! External process invocation.
//!
//! Every external tool (apt-get, dpkg-deb, dpkg-query) is invoked as one
//! blocking call. Its standard output and error are read in full after the
//! process exits.

use std::{
    ffi::OsStr,
    process::{Command, ExitStatus},
};
use tracing::debug;

/// Captured result of an external process.
#[derive(Debug, Clone)]
pub struct Syscall {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl Syscall {
    /// Merge stdout and stderr into one message for error reports.
    pub fn message(&self) -> String {
        let mut message = String::new();

        if !self.stdout.is_empty() {
            message.push_str(format!("stdout: {}", self.stdout).as_str());
        }

        if !self.stderr.is_empty() {
            message.push_str(format!("stderr: {}", self.stderr).as_str());
        }

        // INVARIANT: Chomp trailing newlines.
        message
            .strip_suffix("\r\n")
            .or(message.strip_suffix('\n'))
            .map(ToString::to_string)
            .unwrap_or(message)
    }
}

/// Run command and capture its output regardless of exit status.
///
/// # Errors
///
/// - Return [`SyscallError::Spawn`] if the command cannot be started.
pub fn syscall_capture(
    cmd: impl AsRef<OsStr>,
    args: impl IntoIterator<Item = impl AsRef<OsStr>>,
) -> Result<Syscall> {
    let mut command = Command::new(cmd.as_ref());
    command.args(args);
    debug!("run {command:?}");

    let output = command.output().map_err(|err| SyscallError::Spawn {
        source: err,
        cmd: cmd.as_ref().to_string_lossy().into_owned(),
    })?;

    Ok(Syscall {
        status: output.status,
        stdout: String::from_utf8_lossy(output.stdout.as_slice()).into_owned(),
        stderr: String::from_utf8_lossy(output.stderr.as_slice()).into_owned(),
    })
}

/// Run command and fail on non-zero exit status.
///
/// # Errors
///
/// - Return [`SyscallError::Spawn`] if the command cannot be started.
/// - Return [`SyscallError::Failed`] if the command exits unsuccessfully.
pub fn syscall_non_interactive(
    cmd: impl AsRef<OsStr>,
    args: impl IntoIterator<Item = impl AsRef<OsStr>>,
) -> Result<Syscall> {
    let syscall = syscall_capture(cmd.as_ref(), args)?;
    if !syscall.status.success() {
        return Err(SyscallError::Failed {
            cmd: cmd.as_ref().to_string_lossy().into_owned(),
            message: syscall.message(),
        });
    }

    Ok(syscall)
}

/// External process error types.
#[derive(Debug, thiserror::Error)]
pub enum SyscallError {
    /// Process could not be started at all.
    #[error("failed to run command {cmd:?}")]
    Spawn {
        #[source]
        source: std::io::Error,
        cmd: String,
    },

    /// Process exited with a failure status.
    #[error("command {cmd:?} failed:\n{message}")]
    Failed { cmd: String, message: String },
}

/// Friendly result alias :3
pub type Result<T, E = SyscallError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn capture_keeps_failing_output() -> anyhow::Result<()> {
        let syscall = syscall_capture("sh", ["-c", "echo out; echo err >&2; exit 3"])?;

        assert_eq!(syscall.status.code(), Some(3));
        assert_eq!(syscall.stdout, "out\n");
        assert_eq!(syscall.message(), "stdout: out\nstderr: err");

        Ok(())
    }

    #[test]
    fn non_zero_status_is_an_error() {
        let result = syscall_non_interactive("sh", ["-c", "echo broken >&2; exit 1"]);

        assert!(matches!(
            result,
            Err(SyscallError::Failed { message, .. }) if message == "stderr: broken"
        ));
    }

    #[test]
    fn missing_program_fails_to_spawn() {
        let result = syscall_capture("appdir-bundler-no-such-program", ["--help"]);

        assert!(matches!(result, Err(SyscallError::Spawn { .. })));
    }
}
