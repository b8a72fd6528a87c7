//! Preflight checks for release readiness.
//!
//! Read-only: validates the repository, the version store, and tool
//! availability before anything is written. The store is checked from the
//! document planning already read; it is never read a second time. Returns
//! structured results that the CLI formats.

use camino::Utf8Path;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::config::Config;
use crate::git;
use crate::runner::CommandRunner;
use crate::store::StoreDocument;

/// A single preflight check result.
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    /// Human-readable name of the check.
    pub name: String,
    /// Whether the check passed.
    pub passed: bool,
    /// Description of the result (reason for failure, or confirmation).
    pub message: String,
}

impl CheckResult {
    fn pass(name: &str, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: true,
            message: message.into(),
        }
    }

    fn fail(name: &str, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: false,
            message: message.into(),
        }
    }
}

/// Full preflight report.
#[derive(Debug, Clone, Serialize)]
pub struct PreflightReport {
    /// Individual check results.
    pub checks: Vec<CheckResult>,
    /// Whether all checks passed.
    pub all_passed: bool,
}

impl PreflightReport {
    /// Messages of the failed checks, in order.
    pub fn failures(&self) -> Vec<&str> {
        self.checks
            .iter()
            .filter(|c| !c.passed)
            .map(|c| c.message.as_str())
            .collect()
    }
}

/// Run all preflight checks.
///
/// `push` is whether this run will push; branch and remote checks only
/// apply when it does.
#[instrument(skip(config, store, runner), fields(root = %project_root))]
pub fn run_preflight(
    project_root: &Utf8Path,
    config: &Config,
    push: bool,
    store: &StoreDocument,
    runner: &dyn CommandRunner,
) -> PreflightReport {
    let has_program = |bin: &str| which::which(bin).is_ok();
    run_checks(project_root, config, push, store, runner, has_program)
}

fn run_checks(
    project_root: &Utf8Path,
    config: &Config,
    push: bool,
    store: &StoreDocument,
    runner: &dyn CommandRunner,
    has_program: impl Fn(&str) -> bool,
) -> PreflightReport {
    let mut checks = Vec::new();

    // Tools first: without git, the repository checks below are meaningless.
    checks.push(check_required_tools(config, &has_program));

    let in_repo = check_git_repo(runner, project_root);
    let is_repo = in_repo.passed;
    checks.push(in_repo);

    if is_repo && push {
        checks.push(check_branch(runner, project_root));
        checks.push(check_remote(runner, project_root, config.git.remote.as_deref()));
    }

    checks.push(check_store(&config.store.path, store));

    let all_passed = checks.iter().all(|c| c.passed);
    debug!(all_passed, check_count = checks.len(), "preflight complete");

    PreflightReport { checks, all_passed }
}

fn check_required_tools(config: &Config, has_program: impl Fn(&str) -> bool) -> CheckResult {
    let mut wanted = vec!["git"];
    if let Some(build) = config.build.command.split_whitespace().next() {
        wanted.push(build);
    }
    wanted.push("gh");
    wanted.dedup();

    let missing: Vec<&str> = wanted.into_iter().filter(|bin| !has_program(bin)).collect();
    if missing.is_empty() {
        CheckResult::pass("Required tools", "All required tools are installed")
    } else {
        CheckResult::fail(
            "Required tools",
            format!("Missing tools: {}", missing.join(", ")),
        )
    }
}

fn check_git_repo(runner: &dyn CommandRunner, root: &Utf8Path) -> CheckResult {
    match git::is_inside_repo(runner, root) {
        Ok(true) => CheckResult::pass("Git repository", "Inside a git repository"),
        Ok(false) => CheckResult::fail("Git repository", "Not inside a git repository"),
        Err(e) => CheckResult::fail("Git repository", format!("Failed to check: {e}")),
    }
}

fn check_branch(runner: &dyn CommandRunner, root: &Utf8Path) -> CheckResult {
    match git::current_branch(runner, root) {
        Ok(Some(branch)) => CheckResult::pass("Branch", format!("On branch '{branch}'")),
        Ok(None) => CheckResult::fail("Branch", "Detached HEAD, nothing to push"),
        Err(e) => CheckResult::fail("Branch", format!("Failed to check: {e}")),
    }
}

fn check_remote(runner: &dyn CommandRunner, root: &Utf8Path, remote: Option<&str>) -> CheckResult {
    let name = remote.unwrap_or("origin");
    match git::remote_url(runner, root, name) {
        Ok(Some(url)) if !url.is_empty() => {
            let target = git::parse_owner_repo(&url)
                .map_or(url, |(owner, repo)| format!("{owner}/{repo}"));
            CheckResult::pass("Remote", format!("Remote '{name}' points at {target}"))
        }
        Ok(_) => CheckResult::fail("Remote", format!("No remote named '{name}'")),
        Err(e) => CheckResult::fail("Remote", format!("Failed to check: {e}")),
    }
}

fn check_store(path: &Utf8Path, store: &StoreDocument) -> CheckResult {
    let line = store.field().line;
    match store.current_version() {
        Ok(version) => CheckResult::pass(
            "Version store",
            format!("{path} is at {version} (line {line})"),
        ),
        Err(e) => CheckResult::fail("Version store", format!("{path}:{line}: {e}")),
    }
}
