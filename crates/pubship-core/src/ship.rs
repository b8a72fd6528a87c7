//! Ship orchestrator: the full release workflow.
//!
//! Wires together version resolution, the version store, git, the release
//! build, the artifact rename and GitHub release creation.
//!
//! # Two-phase workflow
//!
//! 1. **Plan** ([`plan_ship`]): parse the bump instruction, read the store,
//!    run preflight checks and resolve the next version. Nothing is
//!    written.
//! 2. **Execute** ([`ReadyShip::execute`]): run the phases in order with
//!    event callbacks for progress display. The first failure stops the
//!    run; completed phases are not rolled back.

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::artifact::ArtifactError;
use crate::config::Config;
use crate::git::{self, GitError};
use crate::preflight;
use crate::release::{self, ReleaseError, ReleaseRequest};
use crate::runner::{CommandRunner, Invocation};
use crate::store::{StoreError, VersionStore};
use crate::version::{self, AppVersion, BumpInstruction, VersionError};

// ──────────────────────────────────────────────
// Errors
// ──────────────────────────────────────────────

/// Errors from the ship workflow.
#[derive(Error, Debug)]
pub enum ShipError {
    /// The bump instruction was not recognized.
    #[error("Invalid version argument: {argument}")]
    Usage {
        /// What the user passed.
        argument: String,
        /// Usage line listing the accepted instructions.
        usage: &'static str,
    },

    /// Preflight checks failed.
    #[error("preflight checks failed: {0}")]
    Preflight(String),

    /// Reading or writing the version store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The next version could not be resolved.
    #[error(transparent)]
    Version(#[from] VersionError),

    /// Git failed without a usable exit status.
    #[error(transparent)]
    Git(#[from] GitError),

    /// The build output could not be found or renamed.
    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    /// `gh` could not be started.
    #[error(transparent)]
    Release(#[from] ReleaseError),

    /// An external command exited unsuccessfully.
    #[error("{phase} phase failed: `{command}` {}", exit_detail(.code, .output))]
    CommandFailed {
        /// Which phase failed.
        phase: ShipPhase,
        /// The command line that failed.
        command: String,
        /// Exit code, if the process exited normally.
        code: Option<i32>,
        /// What the command printed: stderr, or stdout when stderr was empty.
        output: String,
    },

    /// An external command could not be started.
    #[error("failed to run `{command}`: {source}")]
    Exec {
        /// The command line.
        command: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

impl ShipError {
    /// Process exit code for this failure.
    ///
    /// A failed external command passes its own exit code through. A
    /// command killed by a signal, a usage error and every internal failure
    /// exit with 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::CommandFailed { code, .. } => code.filter(|c| *c != 0).unwrap_or(1),
            _ => 1,
        }
    }

    fn from_git(phase: ShipPhase, err: GitError) -> Self {
        match err {
            GitError::Command {
                command,
                code,
                output,
            } => Self::CommandFailed {
                phase,
                command: format!("git {command}"),
                code,
                output,
            },
            other => Self::Git(other),
        }
    }

    fn from_release(err: ReleaseError) -> Self {
        match err {
            ReleaseError::Command { code, output } => Self::CommandFailed {
                phase: ShipPhase::Release,
                command: "gh release create".into(),
                code,
                output,
            },
            other => Self::Release(other),
        }
    }
}

fn exit_detail(code: &Option<i32>, output: &str) -> String {
    let status = code.map_or_else(
        || "exited with a signal".to_string(),
        |c| format!("exited with status {c}"),
    );
    if output.is_empty() {
        status
    } else {
        format!("{status}: {output}")
    }
}

/// Result alias for ship operations.
pub type ShipResult<T> = Result<T, ShipError>;

// ──────────────────────────────────────────────
// Options
// ──────────────────────────────────────────────

/// Per-run options, usually from the command line.
#[derive(Debug, Clone, Default)]
pub struct ShipOptions {
    /// The bump instruction: `major`, `minor`, `patch` or `X.Y.Z`.
    pub instruction: String,
    /// Preview what would happen without making changes.
    pub dry_run: bool,
    /// Override `release.draft`.
    pub draft: Option<bool>,
    /// Skip git push (still commits locally).
    pub no_push: bool,
    /// Skip preflight checks.
    pub skip_preflight: bool,
}

// ──────────────────────────────────────────────
// Phases and events
// ──────────────────────────────────────────────

/// Phases of the ship workflow, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShipPhase {
    /// Write the new version to the store.
    Store,
    /// Stage, commit and push the version change.
    Git,
    /// Run the release build.
    Build,
    /// Rename the build output.
    Artifact,
    /// Create the GitHub release.
    Release,
}

impl std::fmt::Display for ShipPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store => write!(f, "store"),
            Self::Git => write!(f, "git"),
            Self::Build => write!(f, "build"),
            Self::Artifact => write!(f, "artifact"),
            Self::Release => write!(f, "release"),
        }
    }
}

/// Events emitted during the ship workflow for progress reporting.
#[derive(Debug, Clone)]
pub enum ShipEvent {
    /// A phase has started.
    PhaseStarted(ShipPhase),
    /// A phase has completed.
    PhaseCompleted(ShipPhase, PhaseOutcome),
}

/// Outcome of a single phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum PhaseOutcome {
    /// Phase completed successfully.
    Success {
        /// Description of what happened.
        message: String,
    },
    /// Dry run: what the phase would have done.
    Planned {
        /// Description of the action.
        message: String,
    },
}

impl PhaseOutcome {
    fn success(message: impl Into<String>) -> Self {
        Self::Success {
            message: message.into(),
        }
    }

    fn planned(message: impl Into<String>) -> Self {
        Self::Planned {
            message: message.into(),
        }
    }

    /// The human-readable description.
    pub fn message(&self) -> &str {
        match self {
            Self::Success { message } | Self::Planned { message } => message,
        }
    }
}

/// Outcome of the full ship workflow.
#[derive(Debug, Clone, Serialize)]
pub struct ShipOutcome {
    /// The version before the bump.
    pub previous: AppVersion,
    /// The version that was shipped, as written to the store.
    pub version: AppVersion,
    /// The release tag.
    pub tag: String,
    /// The commit message used for the version change.
    pub commit_message: String,
    /// The renamed artifact.
    pub artifact: Utf8PathBuf,
    /// Release URL reported by `gh`, if any.
    pub release_url: Option<String>,
    /// Whether the release was created as a draft.
    pub draft: bool,
    /// Results of each phase.
    pub phases: Vec<(ShipPhase, PhaseOutcome)>,
    /// Whether this was a dry run.
    pub dry_run: bool,
}

// ──────────────────────────────────────────────
// Plan
// ──────────────────────────────────────────────

/// A ship plan that is ready to execute.
#[derive(Debug)]
pub struct ReadyShip {
    /// Project root all paths are relative to.
    pub root: Utf8PathBuf,
    /// The version currently in the store.
    pub previous: AppVersion,
    /// The version to ship.
    pub next: AppVersion,
    /// Whether the release will be a draft.
    pub draft: bool,
    /// Ship workflow options.
    pub options: ShipOptions,
    /// Loaded configuration.
    pub config: Config,
    store: VersionStore,
    rewritten: String,
}

impl ReadyShip {
    /// The release tag, `v<X.Y.Z>`.
    pub fn tag(&self) -> String {
        self.next.tag()
    }

    /// Whether the push step will run.
    pub const fn will_push(&self) -> bool {
        self.config.git.push && !self.options.no_push
    }
}

/// Plan the ship workflow.
///
/// The instruction is checked before anything else, so a bad argument
/// never touches the repository or the store.
#[instrument(skip(config, options, runner), fields(%project_root, instruction = %options.instruction))]
pub fn plan_ship(
    project_root: &Utf8Path,
    config: &Config,
    options: ShipOptions,
    runner: &dyn CommandRunner,
) -> ShipResult<ReadyShip> {
    let policy = config.version;
    let instruction = BumpInstruction::parse(&options.instruction, policy).map_err(|_| {
        ShipError::Usage {
            argument: options.instruction.clone(),
            usage: policy.usage(),
        }
    })?;

    let store = VersionStore::new(project_root.join(&config.store.path));
    let doc = store.read()?;

    if config.ship.preflight && !options.skip_preflight {
        let push = config.git.push && !options.no_push;
        let report = preflight::run_preflight(project_root, config, push, &doc, runner);
        if !report.all_passed {
            return Err(ShipError::Preflight(report.failures().join("; ")));
        }
    }

    let previous = doc.current_version()?;
    debug!(path = %store.path(), %previous, "read version store");
    let next = version::resolve(&previous, &instruction, policy)?;
    let rewritten = doc.with_version(&next);
    let draft = options.draft.unwrap_or(config.release.draft);

    info!(%previous, %next, draft, "planned release");
    Ok(ReadyShip {
        root: project_root.to_path_buf(),
        previous,
        next,
        draft,
        options,
        config: config.clone(),
        store,
        rewritten,
    })
}

// ──────────────────────────────────────────────
// Execute
// ──────────────────────────────────────────────

/// Emits events around each phase and records its outcome.
struct Progress<F> {
    phases: Vec<(ShipPhase, PhaseOutcome)>,
    on_event: F,
}

impl<F: FnMut(ShipEvent)> Progress<F> {
    fn run(
        &mut self,
        phase: ShipPhase,
        body: impl FnOnce() -> ShipResult<PhaseOutcome>,
    ) -> ShipResult<()> {
        (self.on_event)(ShipEvent::PhaseStarted(phase));
        let outcome = body()?;
        debug!(%phase, ?outcome, "phase complete");
        (self.on_event)(ShipEvent::PhaseCompleted(phase, outcome.clone()));
        self.phases.push((phase, outcome));
        Ok(())
    }
}

impl ReadyShip {
    /// Execute the release.
    ///
    /// Calls `on_event` at phase boundaries so the CLI can update
    /// progress display.
    #[instrument(skip(self, runner, on_event), fields(
        version = %self.next,
        dry_run = self.options.dry_run
    ))]
    pub fn execute(
        self,
        runner: &dyn CommandRunner,
        on_event: impl FnMut(ShipEvent),
    ) -> ShipResult<ShipOutcome> {
        let is_dry = self.options.dry_run;
        let root = self.root.as_path();
        let release = self.next.release();
        let tag = self.next.tag();
        let commit_message = tag.clone();
        let product = self.config.release.product.as_str();
        let layout = self.config.build.layout();
        let store_path = self.config.store.path.as_str();

        let mut progress = Progress {
            phases: Vec::new(),
            on_event,
        };

        // ── Store ──
        progress.run(ShipPhase::Store, || {
            if is_dry {
                return Ok(PhaseOutcome::planned(format!(
                    "Would write {} to {store_path}",
                    self.next
                )));
            }
            self.store.write(&self.rewritten)?;
            info!(previous = %self.previous, next = %self.next, "version written");
            Ok(PhaseOutcome::success(format!(
                "{store_path}: {} → {}",
                self.previous, self.next
            )))
        })?;

        // ── Git (add + commit + push) ──
        let push = self.will_push();
        progress.run(ShipPhase::Git, || {
            if is_dry {
                let push_msg = if push { " and push" } else { " (no push)" };
                return Ok(PhaseOutcome::planned(format!(
                    "Would commit {store_path} as '{commit_message}'{push_msg}"
                )));
            }
            let git_err = |e: GitError| ShipError::from_git(ShipPhase::Git, e);
            git::add(runner, root, &[store_path]).map_err(git_err)?;
            git::commit(runner, root, &commit_message).map_err(git_err)?;
            if !push {
                return Ok(PhaseOutcome::success(format!(
                    "Committed '{commit_message}' (push skipped)"
                )));
            }
            git::push(runner, root, self.config.git.remote.as_deref()).map_err(git_err)?;
            Ok(PhaseOutcome::success(format!(
                "Committed and pushed '{commit_message}'"
            )))
        })?;

        // ── Build ──
        let build_command = self.config.build.command.as_str();
        progress.run(ShipPhase::Build, || {
            if is_dry {
                return Ok(PhaseOutcome::planned(format!("Would run: {build_command}")));
            }
            run_build(runner, root, build_command)?;
            Ok(PhaseOutcome::success(format!("Ran: {build_command}")))
        })?;

        // ── Artifact ──
        let mut artifact = layout.versioned_path(root, product, &release);
        progress.run(ShipPhase::Artifact, || {
            let original = layout.expected_path(root);
            if is_dry {
                return Ok(PhaseOutcome::planned(format!(
                    "Would rename {original} to {artifact}"
                )));
            }
            artifact = layout.rename(root, product, &release)?;
            Ok(PhaseOutcome::success(format!("Renamed to {artifact}")))
        })?;

        // ── Release ──
        let request = ReleaseRequest {
            tag: tag.clone(),
            title: release::render_title(
                &self.config.release.title,
                &release.to_string(),
                &tag,
                product,
            ),
            asset: artifact.clone(),
            draft: self.draft,
            notes: self.config.release.notes.clone(),
        };
        let mut release_url = None;
        progress.run(ShipPhase::Release, || {
            let kind = if request.draft { "draft release" } else { "release" };
            if is_dry {
                return Ok(PhaseOutcome::planned(format!(
                    "Would create GitHub {kind} {tag}"
                )));
            }
            release_url =
                release::publish(runner, &request, root).map_err(ShipError::from_release)?;
            Ok(PhaseOutcome::success(release_url.as_ref().map_or_else(
                || format!("Created GitHub {kind} {tag}"),
                |url| format!("Created GitHub {kind}: {url}"),
            )))
        })?;

        info!(%tag, dry_run = is_dry, "ship complete");
        Ok(ShipOutcome {
            previous: self.previous,
            version: self.next,
            tag,
            commit_message,
            artifact,
            release_url,
            draft: self.draft,
            phases: progress.phases,
            dry_run: is_dry,
        })
    }
}

/// Run the configured build command to completion.
fn run_build(runner: &dyn CommandRunner, root: &Utf8Path, command: &str) -> ShipResult<()> {
    let invocation =
        Invocation::from_command_line(command, root).ok_or_else(|| ShipError::Exec {
            command: command.to_string(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command"),
        })?;

    let output = runner.run(&invocation).map_err(|source| ShipError::Exec {
        command: invocation.to_string(),
        source,
    })?;
    debug!(code = ?output.code, stdout_len = output.stdout.len(), "build finished");

    if output.success() {
        Ok(())
    } else {
        Err(ShipError::CommandFailed {
            phase: ShipPhase::Build,
            command: invocation.to_string(),
            code: output.code,
            output: output.diagnostic(),
        })
    }
}
