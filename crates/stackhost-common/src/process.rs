//! ---
//! sh_section: "01-core-functionality"
//! sh_subsection: "module"
//! sh_type: "source"
//! sh_scope: "code"
//! sh_description: "Blocking subprocess seam for external collaborators."
//! sh_version: "v0.0.0-prealpha"
//! sh_owner: "tbd"
//! ---
use std::fmt;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::debug;

use crate::error::{InstallerError, Result};

/// A single external command to execute.
#[derive(Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    /// Payload written to the child's stdin. Never logged.
    pub stdin: Option<String>,
    /// Capture stdout and stderr instead of inheriting the terminal.
    pub capture: bool,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            stdin: None,
            capture: false,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn stdin(mut self, payload: impl Into<String>) -> Self {
        self.stdin = Some(payload.into());
        self
    }

    pub fn capture(mut self) -> Self {
        self.capture = true;
        self
    }

    /// Shell-like rendering used in logs and error messages.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("program", &self.program)
            .field("args", &self.args)
            .field("cwd", &self.cwd)
            .field("stdin", &self.stdin.as_ref().map(|_| "<redacted>"))
            .field("capture", &self.capture)
            .finish()
    }
}

/// Outcome of a finished subprocess. A non-zero exit is the only failure signal.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Completion {
    pub code: Option<i32>,
    pub stdout: String,
    /// Only populated for captured invocations.
    pub stderr: String,
}

impl Completion {
    pub fn ok() -> Self {
        Self {
            code: Some(0),
            ..Self::default()
        }
    }

    pub fn ok_with_output(stdout: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            ..Self::default()
        }
    }

    pub fn failed(code: i32) -> Self {
        Self {
            code: Some(code),
            ..Self::default()
        }
    }

    pub fn failed_with_stderr(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stderr: stderr.into(),
            ..Self::default()
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    pub fn status_text(&self) -> String {
        match self.code {
            Some(code) => format!("exit status {code}"),
            None => "terminated by signal".to_owned(),
        }
    }
}

/// Host access used by every component that touches the outside world.
pub trait CommandRunner {
    /// Locate an executable on the search path.
    fn locate(&self, program: &str) -> Option<PathBuf>;

    /// Run to completion, blocking. `Err` means the process could not be
    /// spawned at all; a non-zero exit is reported through [`Completion`].
    fn run(&self, invocation: &Invocation) -> Result<Completion>;

    /// Run and convert a non-zero exit into [`InstallerError::ExternalTool`].
    fn run_checked(&self, step: &str, invocation: &Invocation) -> Result<Completion> {
        let completion = self.run(invocation)?;
        if completion.success() {
            Ok(completion)
        } else {
            Err(InstallerError::external(step, completion.status_text()))
        }
    }
}

/// [`CommandRunner`] backed by real processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn locate(&self, program: &str) -> Option<PathBuf> {
        which::which(program).ok()
    }

    fn run(&self, invocation: &Invocation) -> Result<Completion> {
        debug!(command = %invocation.command_line(), "spawning");
        let mut command = Command::new(&invocation.program);
        command.args(&invocation.args);
        if let Some(dir) = &invocation.cwd {
            command.current_dir(dir);
        }
        command.stdin(if invocation.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::inherit()
        });
        if invocation.capture {
            command.stdout(Stdio::piped()).stderr(Stdio::piped());
        } else {
            command.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        }

        let spawn_context = || format!("unable to run `{}`", invocation.program);
        let mut child = command
            .spawn()
            .map_err(|err| InstallerError::io(spawn_context(), err))?;
        if let Some(payload) = &invocation.stdin {
            if let Some(mut pipe) = child.stdin.take() {
                match pipe.write_all(payload.as_bytes()) {
                    Ok(()) => {}
                    // The child exited without reading; its exit status decides.
                    Err(err) if err.kind() == ErrorKind::BrokenPipe => {
                        debug!(command = %invocation.command_line(), "child closed stdin early");
                    }
                    Err(err) => return Err(InstallerError::io(spawn_context(), err)),
                }
            }
        }
        let output = child
            .wait_with_output()
            .map_err(|err| InstallerError::io(spawn_context(), err))?;
        Ok(Completion {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_line_joins_program_and_args() {
        let invocation = Invocation::new("docker-compose").args(["up", "-d"]);
        assert_eq!(invocation.command_line(), "docker-compose up -d");
    }

    #[test]
    fn debug_output_redacts_stdin() {
        let invocation = Invocation::new("docker").arg("login").stdin("s3cret");
        let rendered = format!("{invocation:?}");
        assert!(!rendered.contains("s3cret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[cfg(unix)]
    #[test]
    fn system_runner_reports_exit_codes() {
        let runner = SystemRunner;
        let done = runner
            .run(&Invocation::new("sh").args(["-c", "echo hi"]).capture())
            .unwrap();
        assert!(done.success());
        assert_eq!(done.stdout.trim(), "hi");

        let failed = runner
            .run(&Invocation::new("sh").args(["-c", "exit 3"]))
            .unwrap();
        assert_eq!(failed.code, Some(3));
        let err = runner
            .run_checked("listing", &Invocation::new("sh").args(["-c", "exit 3"]))
            .unwrap_err();
        assert_eq!(err.to_string(), "listing failed (exit status 3)");
    }

    #[cfg(unix)]
    #[test]
    fn captured_stderr_is_returned() {
        let done = SystemRunner
            .run(&Invocation::new("sh").args(["-c", "echo oops >&2; exit 1"]).capture())
            .unwrap();
        assert_eq!(done.code, Some(1));
        assert_eq!(done.stderr.trim(), "oops");
        assert!(done.stdout.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn child_closing_stdin_early_reports_its_exit_status() {
        // Larger than any pipe buffer, so the write cannot complete before the child exits.
        let payload = "x".repeat(4 * 1024 * 1024);
        let done = SystemRunner
            .run(&Invocation::new("sh").args(["-c", "exec 0<&-; exit 7"]).stdin(payload))
            .unwrap();
        assert_eq!(done.code, Some(7));
    }
}
