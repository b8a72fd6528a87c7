//! Git operations for the release workflow.
//!
//! Shells out to `git` through a [`CommandRunner`] so the user's SSH keys,
//! signing setup and hooks apply, and so tests can swap in a fake runner.
//! Every function takes the repository root explicitly; nothing depends on
//! the process working directory.

use camino::Utf8Path;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::runner::{CommandRunner, Invocation};

/// Errors from git operations.
#[derive(Error, Debug)]
pub enum GitError {
    /// Failed to execute the `git` command.
    #[error("failed to run git: {0}")]
    Exec(#[from] std::io::Error),

    /// `git` returned a non-zero exit code.
    #[error("git {command} failed: {output}")]
    Command {
        /// The git subcommand that failed (e.g., "push").
        command: String,
        /// Exit code, if the process exited normally.
        code: Option<i32>,
        /// What git printed: stderr, or stdout when stderr was empty.
        output: String,
    },

    /// Not inside a git repository.
    #[error("not a git repository (or any parent up to mount point)")]
    NotARepo,
}

/// Result alias for git operations.
pub type GitResult<T> = Result<T, GitError>;

/// Stage `paths` for commit.
#[instrument(skip(runner))]
pub fn add(runner: &dyn CommandRunner, root: &Utf8Path, paths: &[&str]) -> GitResult<()> {
    let mut args = vec!["add"];
    args.extend_from_slice(paths);
    git(runner, root, &args)?;
    Ok(())
}

/// Create a commit with `message` from the staged changes.
#[instrument(skip(runner))]
pub fn commit(runner: &dyn CommandRunner, root: &Utf8Path, message: &str) -> GitResult<()> {
    git(runner, root, &["commit", "-m", message])?;
    Ok(())
}

/// Push the current branch.
///
/// With no remote, runs a plain `git push` and lets the upstream
/// configuration decide where it goes.
#[instrument(skip(runner))]
pub fn push(runner: &dyn CommandRunner, root: &Utf8Path, remote: Option<&str>) -> GitResult<()> {
    match remote {
        Some(remote) => git(runner, root, &["push", remote, "HEAD"])?,
        None => git(runner, root, &["push"])?,
    };
    Ok(())
}

/// Check if `root` is inside a git work tree.
#[instrument(skip(runner))]
pub fn is_inside_repo(runner: &dyn CommandRunner, root: &Utf8Path) -> GitResult<bool> {
    match git(runner, root, &["rev-parse", "--is-inside-work-tree"]) {
        Ok(output) => Ok(output.trim() == "true"),
        Err(GitError::Command { .. } | GitError::NotARepo) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Get the current branch name.
///
/// Returns `None` if in a detached HEAD state.
#[instrument(skip(runner))]
pub fn current_branch(runner: &dyn CommandRunner, root: &Utf8Path) -> GitResult<Option<String>> {
    let output = git(runner, root, &["rev-parse", "--abbrev-ref", "HEAD"])?;
    let branch = output.trim().to_string();
    if branch == "HEAD" {
        debug!("detached HEAD");
        Ok(None)
    } else {
        debug!(%branch, "current branch");
        Ok(Some(branch))
    }
}

/// Get the URL of a named remote.
#[instrument(skip(runner))]
pub fn remote_url(
    runner: &dyn CommandRunner,
    root: &Utf8Path,
    remote: &str,
) -> GitResult<Option<String>> {
    match git(runner, root, &["remote", "get-url", remote]) {
        Ok(url) => {
            let url = url.trim().to_string();
            debug!(%remote, %url, "remote URL");
            Ok(Some(url))
        }
        Err(GitError::Command { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Parse owner and repo from a git remote URL.
///
/// Handles both HTTPS and SSH formats:
/// - `https://github.com/owner/repo.git`
/// - `git@github.com:owner/repo.git`
pub fn parse_owner_repo(url: &str) -> Option<(String, String)> {
    let path = url.strip_prefix("git@").map_or_else(
        || {
            url.split("//")
                .nth(1)
                .and_then(|after_scheme| after_scheme.split_once('/').map(|(_, path)| path))
        },
        |rest| rest.split_once(':').map(|(_, path)| path),
    )?;

    let path = path.strip_suffix(".git").unwrap_or(path);
    let (owner, repo) = path.split_once('/')?;

    if owner.is_empty() || repo.is_empty() || repo.contains('/') {
        return None;
    }

    Some((owner.to_string(), repo.to_string()))
}

/// Run a git command in `root` and return its stdout.
fn git(runner: &dyn CommandRunner, root: &Utf8Path, args: &[&str]) -> GitResult<String> {
    let output = runner.run(&Invocation::new("git", args.iter().copied(), root))?;

    if output.success() {
        return Ok(output.stdout);
    }

    if output.stderr.contains("not a git repository") {
        return Err(GitError::NotARepo);
    }

    Err(GitError::Command {
        command: args.first().copied().unwrap_or_default().to_string(),
        code: output.code,
        output: output.diagnostic(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{CommandOutput, RecordingRunner, SystemRunner};

    const ROOT: &str = "/work/slides";

    fn root() -> &'static Utf8Path {
        Utf8Path::new(ROOT)
    }

    #[test]
    fn add_commit_push_argv() {
        let runner = RecordingRunner::new();
        add(&runner, root(), &["pubspec.yaml"]).unwrap();
        commit(&runner, root(), "v1.2.4").unwrap();
        push(&runner, root(), None).unwrap();

        let calls = runner.calls();
        assert_eq!(calls[0].argv(), vec!["git", "add", "pubspec.yaml"]);
        assert_eq!(calls[1].argv(), vec!["git", "commit", "-m", "v1.2.4"]);
        assert_eq!(calls[2].argv(), vec!["git", "push"]);
        assert!(calls.iter().all(|c| c.cwd == ROOT));
    }

    #[test]
    fn push_to_named_remote() {
        let runner = RecordingRunner::new();
        push(&runner, root(), Some("upstream")).unwrap();
        assert_eq!(runner.command_lines(), vec!["git push upstream HEAD"]);
    }

    #[test]
    fn failed_command_carries_code_and_stderr() {
        let runner =
            RecordingRunner::new().respond("git push", CommandOutput::failed(128, "rejected\n"));
        let err = push(&runner, root(), None).unwrap_err();
        assert!(matches!(err, GitError::Command { code: Some(128), .. }));
        assert_eq!(err.to_string(), "git push failed: rejected");
    }

    #[test]
    fn commit_with_nothing_staged_reports_git_stdout() {
        let tmp = tempfile::TempDir::new().unwrap();
        let repo = Utf8Path::from_path(tmp.path()).unwrap();
        for args in [
            &["init", "-q"][..],
            &["config", "user.name", "Release Bot"],
            &["config", "user.email", "release@example.com"],
            &["commit", "-q", "--allow-empty", "-m", "init"],
        ] {
            let out = SystemRunner
                .run(&Invocation::new("git", args.iter().copied(), repo))
                .unwrap();
            assert!(out.success(), "git {args:?}: {}", out.diagnostic());
        }

        let err = commit(&SystemRunner, repo, "v1.2.4").unwrap_err();
        assert!(
            err.to_string().contains("nothing to commit"),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn not_a_repo_detected() {
        let runner = RecordingRunner::new().respond(
            "git",
            CommandOutput::failed(128, "fatal: not a git repository"),
        );
        assert!(matches!(
            commit(&runner, root(), "v1"),
            Err(GitError::NotARepo)
        ));
        assert!(!is_inside_repo(&runner, root()).unwrap());
    }

    #[test]
    fn is_inside_repo_true() {
        let runner =
            RecordingRunner::new().respond("git rev-parse", CommandOutput::ok_with_stdout("true\n"));
        assert!(is_inside_repo(&runner, root()).unwrap());
    }

    #[test]
    fn current_branch_detached() {
        let runner =
            RecordingRunner::new().respond("git rev-parse", CommandOutput::ok_with_stdout("HEAD\n"));
        assert_eq!(current_branch(&runner, root()).unwrap(), None);
    }

    #[test]
    fn remote_url_missing_remote() {
        let runner = RecordingRunner::new()
            .respond("git remote", CommandOutput::failed(2, "error: No such remote"));
        assert_eq!(remote_url(&runner, root(), "origin").unwrap(), None);
    }

    #[test]
    fn parse_owner_repo_https() {
        let result = parse_owner_repo("https://github.com/psallite/slides.git");
        assert_eq!(result, Some(("psallite".into(), "slides".into())));
    }

    #[test]
    fn parse_owner_repo_ssh() {
        let result = parse_owner_repo("git@github.com:psallite/slides");
        assert_eq!(result, Some(("psallite".into(), "slides".into())));
    }

    #[test]
    fn parse_owner_repo_invalid() {
        assert!(parse_owner_repo("not-a-url").is_none());
        assert!(parse_owner_repo("").is_none());
    }
}
