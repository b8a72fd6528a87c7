//! Ship command: thin CLI layer over `pubship_core::ship`.

use std::time::Duration;

use anyhow::Context;
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use inquire::Confirm;
use owo_colors::OwoColorize;
use tracing::{debug, instrument};

use pubship_core::config::Config;
use pubship_core::runner::CommandRunner;
use pubship_core::ship::{self, PhaseOutcome, ReadyShip, ShipEvent, ShipOptions, ShipOutcome};

const SPINNER_TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// Arguments for a release run.
#[derive(Args, Debug, Default)]
pub struct ShipArgs {
    /// Version bump: major, minor or patch (X.Y.Z when enabled in config)
    #[arg(value_name = "INSTRUCTION")]
    pub instruction: String,

    /// Preview what would happen without making changes
    #[arg(long)]
    pub dry_run: bool,

    /// Create release as draft (overrides config)
    #[arg(long, conflicts_with = "no_draft")]
    pub draft: bool,

    /// Create release as published, not draft (overrides config)
    #[arg(long, conflicts_with = "draft")]
    pub no_draft: bool,

    /// Skip git push (still commits locally)
    #[arg(long)]
    pub no_push: bool,

    /// Skip preflight checks
    #[arg(long)]
    pub no_preflight: bool,

    /// Skip confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,
}

impl ShipArgs {
    /// The draft setting requested on the command line, if any.
    pub const fn draft_override(&self) -> Option<bool> {
        if self.draft {
            Some(true)
        } else if self.no_draft {
            Some(false)
        } else {
            None
        }
    }
}

/// Execute a release run.
#[instrument(name = "cmd_ship", skip_all, fields(instruction = %args.instruction))]
pub fn cmd_ship(
    args: ShipArgs,
    global_json: bool,
    config: &Config,
    cwd: &camino::Utf8Path,
    runner: &dyn CommandRunner,
) -> anyhow::Result<()> {
    debug!(
        json_output = global_json,
        dry_run = args.dry_run,
        "executing ship command"
    );

    let skip_confirm = args.yes;
    let options = ShipOptions {
        draft: args.draft_override(),
        instruction: args.instruction,
        dry_run: args.dry_run,
        no_push: args.no_push,
        skip_preflight: args.no_preflight,
    };
    let is_dry = options.dry_run;

    // Usage errors surface unwrapped so main can print the usage line.
    let ready = ship::plan_ship(cwd, config, options, runner)?;

    if !global_json {
        print_plan(&ready);
    }

    if !is_dry && !global_json && config.ship.confirm && !skip_confirm {
        let confirmed = Confirm::new(&format!("Release {}?", ready.tag()))
            .with_default(true)
            .prompt()
            .context("confirmation prompt failed")?;
        if !confirmed {
            println!("{}", "Ship cancelled.".yellow());
            return Ok(());
        }
        println!();
    }

    let mut spinner: Option<ProgressBar> = None;
    let result = ready.execute(runner, |event| {
        if !global_json {
            handle_event(event, &mut spinner);
        }
    });
    if let Some(spinner) = spinner.take() {
        spinner.finish_and_clear();
    }
    let outcome = result?;

    if global_json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_summary(&outcome);
    }

    Ok(())
}

fn print_plan(ready: &ReadyShip) {
    if ready.options.dry_run {
        println!("\n{}", "DRY RUN: no changes will be made".yellow().bold());
    }
    println!(
        "\n{}: {} → {}",
        "Ship".bold(),
        ready.previous.to_string().dimmed(),
        ready.next.to_string().green().bold(),
    );
    println!(
        "{}: {} | {}: {} | {}: {}",
        "Tag".dimmed(),
        ready.tag(),
        "Release".dimmed(),
        if ready.draft { "draft" } else { "published" },
        "Push".dimmed(),
        if ready.will_push() { "yes" } else { "no" },
    );
    println!();
}

/// Handle a ship event for terminal progress display.
///
/// The spinner ticks on its own thread while the phase runs.
fn handle_event(event: ShipEvent, spinner: &mut Option<ProgressBar>) {
    match event {
        ShipEvent::PhaseStarted(phase) => {
            let bar = ProgressBar::new_spinner();
            bar.set_style(
                ProgressStyle::with_template("  {spinner:.cyan} {msg}").map_or_else(
                    |_| ProgressStyle::default_spinner(),
                    |style| style.tick_strings(SPINNER_TICKS),
                ),
            );
            bar.set_message(format!("{phase}..."));
            bar.enable_steady_tick(Duration::from_millis(80));
            *spinner = Some(bar);
        }
        ShipEvent::PhaseCompleted(phase, outcome) => {
            if let Some(bar) = spinner.take() {
                bar.finish_and_clear();
            }
            let prefix = match outcome {
                PhaseOutcome::Success { .. } => "✓",
                PhaseOutcome::Planned { .. } => "○",
            };
            println!(
                "  {} {} {}",
                prefix.green(),
                format!("{phase}").bold(),
                outcome.message().dimmed(),
            );
        }
    }
}

fn print_summary(outcome: &ShipOutcome) {
    println!();
    if outcome.dry_run {
        println!(
            "{} Dry run complete: {} phases previewed",
            "✓".green(),
            outcome.phases.len(),
        );
        return;
    }

    println!(
        "{} Shipped {} ({})",
        "✓".green().bold(),
        outcome.tag.green().bold(),
        if outcome.draft {
            "draft release"
        } else {
            "published release"
        },
    );
    println!("  {}: {}", "Artifact".dimmed(), outcome.artifact);
    if let Some(ref url) = outcome.release_url {
        println!("  {}: {}", "Release".dimmed(), url.cyan());
    }
    if outcome.draft {
        println!(
            "  {}",
            format!(
                "Publish with: gh release edit {} --draft=false",
                outcome.tag
            )
            .dimmed()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pubship_core::runner::RecordingRunner;
    use std::fs;

    fn project(version: &str) -> (tempfile::TempDir, camino::Utf8PathBuf) {
        let tmp = tempfile::TempDir::new().unwrap();
        let root = camino::Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap();
        fs::write(
            root.join("pubspec.yaml"),
            format!("name: slides\nversion: {version}\n"),
        )
        .unwrap();
        let apk_dir = root.join("build/app/outputs/flutter-apk");
        fs::create_dir_all(&apk_dir).unwrap();
        fs::write(apk_dir.join("app-release.apk"), b"apk").unwrap();
        (tmp, root)
    }

    fn args(instruction: &str) -> ShipArgs {
        ShipArgs {
            instruction: instruction.into(),
            no_preflight: true,
            ..ShipArgs::default()
        }
    }

    #[test]
    fn draft_override_from_flags() {
        let mut a = args("patch");
        assert_eq!(a.draft_override(), None);
        a.draft = true;
        assert_eq!(a.draft_override(), Some(true));
        a.draft = false;
        a.no_draft = true;
        assert_eq!(a.draft_override(), Some(false));
    }

    #[test]
    fn ship_runs_every_step() {
        let (_tmp, root) = project("1.2.3+40");
        let runner = RecordingRunner::new();
        cmd_ship(args("patch"), true, &Config::default(), &root, &runner).unwrap();

        let lines = runner.command_lines();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], "git add pubspec.yaml");
        assert!(lines[4].starts_with("gh release create --draft v1.2.4"));
        assert_eq!(
            fs::read_to_string(root.join("pubspec.yaml")).unwrap(),
            "name: slides\nversion: 1.2.4+41\n"
        );
    }

    #[test]
    fn usage_error_is_not_wrapped() {
        let (_tmp, root) = project("1.2.3+40");
        let err = cmd_ship(
            args("banana"),
            true,
            &Config::default(),
            &root,
            &RecordingRunner::new(),
        )
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ship::ShipError>(),
            Some(ship::ShipError::Usage { .. })
        ));
    }

    #[test]
    fn confirm_skipped_with_yes() {
        let (_tmp, root) = project("1.2.3+40");
        let mut config = Config::default();
        config.ship.confirm = true;
        let mut a = args("patch");
        a.yes = true;
        cmd_ship(a, false, &config, &root, &RecordingRunner::new()).unwrap();
    }
}
