//! GitHub release publishing via `gh release create`.

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::runner::{CommandRunner, Invocation};

/// Errors from publishing a release.
#[derive(Error, Debug)]
pub enum ReleaseError {
    /// Failed to execute `gh`.
    #[error("failed to execute gh: {0}")]
    Exec(#[from] std::io::Error),

    /// `gh` returned a non-zero exit code.
    #[error("gh release create failed: {output}")]
    Command {
        /// Exit code, if the process exited normally.
        code: Option<i32>,
        /// What `gh` printed: stderr, or stdout when stderr was empty.
        output: String,
    },
}

/// Result alias for release operations.
pub type ReleaseResult<T> = Result<T, ReleaseError>;

/// Everything `gh release create` needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseRequest {
    /// Tag to create or attach to (e.g. `v1.2.4`).
    pub tag: String,
    /// Release title.
    pub title: String,
    /// File to attach.
    pub asset: Utf8PathBuf,
    /// Create the release as a draft.
    pub draft: bool,
    /// Release notes; `gh` prompts or leaves them empty when unset.
    pub notes: Option<String>,
}

impl ReleaseRequest {
    /// The `gh` invocation for this request.
    pub fn invocation(&self, root: &Utf8Path) -> Invocation {
        let mut args = vec!["release".to_string(), "create".to_string()];
        if self.draft {
            args.push("--draft".into());
        }
        args.push(self.tag.clone());
        args.push("--title".into());
        args.push(self.title.clone());
        if let Some(ref notes) = self.notes {
            args.push("--notes".into());
            args.push(notes.clone());
        }
        args.push(self.asset.to_string());
        Invocation::new("gh", args, root)
    }
}

/// Render a release title template.
///
/// Supports `{version}`, `{tag}` and `{product}`.
pub fn render_title(template: &str, version: &str, tag: &str, product: &str) -> String {
    template
        .replace("{version}", version)
        .replace("{tag}", tag)
        .replace("{product}", product)
}

/// Create the release. Returns the release URL if `gh` printed one.
#[instrument(skip(runner, request), fields(tag = %request.tag, draft = request.draft))]
pub fn publish(
    runner: &dyn CommandRunner,
    request: &ReleaseRequest,
    root: &Utf8Path,
) -> ReleaseResult<Option<String>> {
    let invocation = request.invocation(root);
    debug!(command = %invocation, "creating GitHub release");

    let output = runner.run(&invocation)?;
    if !output.success() {
        return Err(ReleaseError::Command {
            code: output.code,
            output: output.diagnostic(),
        });
    }

    let url = output
        .stdout
        .lines()
        .map(str::trim)
        .rfind(|line| line.starts_with("https://"))
        .map(ToString::to_string);
    Ok(url)
}
