//! External command execution.
//!
//! Every side effect outside the version store (git, the build, `gh`) goes
//! through a [`CommandRunner`]. Production code uses [`SystemRunner`];
//! tests substitute a [`RecordingRunner`] and assert on the exact invocation
//! sequence without touching a real repository or toolchain.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::process::Command;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::{debug, instrument};

/// A single external command: program, arguments, working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Program name or path.
    pub program: String,
    /// Arguments, already split.
    pub args: Vec<String>,
    /// Working directory.
    pub cwd: Utf8PathBuf,
}

impl Invocation {
    /// Build an invocation from a program and arguments.
    pub fn new<I, S>(program: impl Into<String>, args: I, cwd: &Utf8Path) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            cwd: cwd.to_path_buf(),
        }
    }

    /// Split a configured command line on whitespace.
    ///
    /// Returns `None` for an empty command line. No shell quoting is
    /// interpreted.
    pub fn from_command_line(line: &str, cwd: &Utf8Path) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let program = parts.next()?;
        Some(Self::new(program, parts, cwd))
    }

    /// The full argv, program first.
    pub fn argv(&self) -> Vec<&str> {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect()
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.argv().join(" "))
    }
}

/// What a finished command produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; `None` when terminated by a signal.
    pub code: Option<i32>,
    /// Captured stdout.
    pub stdout: String,
    /// Captured stderr.
    pub stderr: String,
}

impl CommandOutput {
    /// A successful, silent result.
    pub fn ok() -> Self {
        Self {
            code: Some(0),
            ..Self::default()
        }
    }

    /// A successful result with stdout.
    pub fn ok_with_stdout(stdout: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// A failed result with an exit code and stderr.
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Whether the command exited with status 0.
    pub const fn success(&self) -> bool {
        matches!(self.code, Some(0))
    }

    /// What the command said about itself, for error reports.
    ///
    /// Prefers stderr; falls back to stdout for tools that print their
    /// failure reason there (`git commit` with nothing staged, Gradle).
    pub fn diagnostic(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim().to_string()
        } else {
            stderr.to_string()
        }
    }
}

/// Capability to run external commands, blocking until they exit.
pub trait CommandRunner {
    /// Run `invocation` to completion.
    ///
    /// An `Err` means the command could not be started at all; a non-zero
    /// exit is reported through [`CommandOutput::code`].
    fn run(&self, invocation: &Invocation) -> std::io::Result<CommandOutput>;
}

/// Runs commands as real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    #[instrument(skip(self), fields(command = %invocation, cwd = %invocation.cwd))]
    fn run(&self, invocation: &Invocation) -> std::io::Result<CommandOutput> {
        let output = Command::new(&invocation.program)
            .args(&invocation.args)
            .current_dir(invocation.cwd.as_std_path())
            .output()?;

        let result = CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };
        debug!(code = ?result.code, "command finished");
        Ok(result)
    }
}

/// Test double that records invocations and replays scripted results.
///
/// Commands succeed silently unless a response was scripted for their
/// program. Responses are keyed by program name, or by `program subcommand`
/// (e.g. `"git push"`) when the more specific key is present.
#[derive(Debug, Default)]
pub struct RecordingRunner {
    calls: RefCell<Vec<Invocation>>,
    responses: HashMap<String, CommandOutput>,
}

impl RecordingRunner {
    /// A runner where every command succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the result for a program, or for `program subcommand`.
    #[must_use]
    pub fn respond(mut self, key: impl Into<String>, output: CommandOutput) -> Self {
        self.responses.insert(key.into(), output);
        self
    }

    /// Everything run so far, in order.
    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.borrow().clone()
    }

    /// Every invocation rendered as a single command line.
    pub fn command_lines(&self) -> Vec<String> {
        self.calls.borrow().iter().map(ToString::to_string).collect()
    }

    fn response_for(&self, invocation: &Invocation) -> CommandOutput {
        let specific = invocation
            .args
            .first()
            .map(|sub| format!("{} {sub}", invocation.program));

        specific
            .and_then(|key| self.responses.get(&key))
            .or_else(|| self.responses.get(&invocation.program))
            .cloned()
            .unwrap_or_else(CommandOutput::ok)
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&self, invocation: &Invocation) -> std::io::Result<CommandOutput> {
        self.calls.borrow_mut().push(invocation.clone());
        Ok(self.response_for(invocation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_command_line_splits_whitespace() {
        let inv =
            Invocation::from_command_line("flutter  build apk --release", Utf8Path::new("/p"))
                .unwrap();
        assert_eq!(inv.program, "flutter");
        assert_eq!(inv.args, vec!["build", "apk", "--release"]);
        assert_eq!(inv.to_string(), "flutter build apk --release");
    }

    #[test]
    fn from_command_line_empty() {
        assert!(Invocation::from_command_line("   ", Utf8Path::new("/p")).is_none());
    }

    #[test]
    fn output_success() {
        assert!(CommandOutput::ok().success());
        assert!(!CommandOutput::failed(2, "boom").success());
        assert!(!CommandOutput::default().success());
    }

    #[test]
    fn diagnostic_falls_back_to_stdout() {
        assert_eq!(CommandOutput::failed(1, " denied \n").diagnostic(), "denied");

        let quiet_stderr = CommandOutput {
            code: Some(1),
            stdout: "nothing to commit, working tree clean\n".into(),
            stderr: "\n".into(),
        };
        assert_eq!(
            quiet_stderr.diagnostic(),
            "nothing to commit, working tree clean"
        );
        assert_eq!(CommandOutput::default().diagnostic(), "");
    }

    #[test]
    fn recording_runner_records_in_order() {
        let runner = RecordingRunner::new();
        let cwd = Utf8Path::new("/repo");
        runner.run(&Invocation::new("git", ["add", "x"], cwd)).unwrap();
        runner.run(&Invocation::new("git", ["push"], cwd)).unwrap();
        assert_eq!(runner.command_lines(), vec!["git add x", "git push"]);
    }

    #[test]
    fn recording_runner_prefers_specific_response() {
        let runner = RecordingRunner::new()
            .respond("git", CommandOutput::failed(1, "generic"))
            .respond("git push", CommandOutput::failed(128, "rejected"));
        let cwd = Utf8Path::new("/repo");

        let push = runner.run(&Invocation::new("git", ["push"], cwd)).unwrap();
        assert_eq!(push.code, Some(128));

        let add = runner.run(&Invocation::new("git", ["add"], cwd)).unwrap();
        assert_eq!(add.stderr, "generic");

        let gh = runner.run(&Invocation::new("gh", ["release"], cwd)).unwrap();
        assert!(gh.success());
    }

    #[test]
    fn system_runner_captures_output() {
        let tmp = tempfile::TempDir::new().unwrap();
        let cwd = Utf8Path::from_path(tmp.path()).unwrap();
        let out = SystemRunner
            .run(&Invocation::new("sh", ["-c", "echo hi; echo err >&2; exit 3"], cwd))
            .unwrap();
        assert_eq!(out.code, Some(3));
        assert_eq!(out.stdout.trim(), "hi");
        assert_eq!(out.stderr.trim(), "err");
    }

    #[test]
    fn system_runner_missing_program_is_err() {
        let tmp = tempfile::TempDir::new().unwrap();
        let cwd = Utf8Path::from_path(tmp.path()).unwrap();
        let result = SystemRunner.run(&Invocation::new(
            "pubship-definitely-not-a-program",
            Vec::<String>::new(),
            cwd,
        ));
        assert!(result.is_err());
    }
}
