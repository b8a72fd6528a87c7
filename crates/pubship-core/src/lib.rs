//! Core library for pubship.
//!
//! Release automation for Flutter apps: bump the version in
//! `pubspec.yaml`, commit and push it, build the release APK, give the APK a
//! versioned name and attach it to a GitHub release.
//!
//! # Modules
//!
//! - [`artifact`] - Locating and renaming the build output
//! - [`config`] - Configuration loading and management
//! - [`error`] - Configuration error types and result aliases
//! - [`git`] - Git operations for the release workflow
//! - [`preflight`] - Release readiness checks
//! - [`release`] - GitHub release creation via `gh`
//! - [`runner`] - External command execution
//! - [`ship`] - The release orchestrator
//! - [`store`] - Reading and rewriting the `version:` field
//! - [`version`] - Version model and bump resolution
//!
//! # Quick Start
//!
//! ```no_run
//! use camino::Utf8Path;
//! use pubship_core::runner::SystemRunner;
//! use pubship_core::ship::{plan_ship, ShipOptions};
//! use pubship_core::ConfigLoader;
//!
//! let root = Utf8Path::new(".");
//! let config = ConfigLoader::new().with_project_search(root).load()?;
//! let options = ShipOptions {
//!     instruction: "patch".into(),
//!     dry_run: true,
//!     ..ShipOptions::default()
//! };
//! let outcome = plan_ship(root, &config, options, &SystemRunner)?
//!     .execute(&SystemRunner, |_| {})?;
//! println!("would ship {}", outcome.tag);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
#![deny(unsafe_code)]

pub mod artifact;

pub mod config;

pub mod error;

pub mod git;

pub mod preflight;

pub mod release;

pub mod runner;

pub mod ship;

pub mod store;

pub mod version;

pub use config::{Config, ConfigLoader, LogLevel};

pub use error::{ConfigError, ConfigResult};

pub use version::{AppVersion, BumpInstruction, BumpLevel, VersionPolicy};

// Re-export semver so downstream crates don't need a direct dependency.
pub use semver;
