//! Version model and next-version resolution.
//!
//! A pubspec version is a semver core (`X.Y.Z`) optionally followed by an
//! integer build number (`X.Y.Z+B`). Which of the two shapes a project uses
//! is fixed by [`VersionPolicy`]; a run never mixes them.
//!
//! Everything in this module is pure. Resolving a bump never touches the
//! version store or the repository, so a rejected instruction leaves no
//! trace.

pub mod explicit;

use std::fmt;
use std::str::FromStr;

use semver::Version;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use tracing::{debug, instrument};

/// Errors from version operations.
#[derive(Error, Debug)]
pub enum VersionError {
    /// Failed to parse a semver string.
    #[error("invalid semver: {0}")]
    InvalidSemver(#[from] semver::Error),

    /// The string is not shaped like `X.Y.Z` or `X.Y.Z+B`.
    #[error("invalid version `{version}`: {reason}")]
    Malformed {
        /// The rejected input.
        version: String,
        /// What was wrong with it.
        reason: &'static str,
    },

    /// The bump argument is neither a level nor an accepted literal.
    #[error("invalid version argument: {0}")]
    InvalidInstruction(String),

    /// Build numbers are tracked but the current version has none.
    #[error("current version {0} has no build number (expected X.Y.Z+B)")]
    MissingBuildNumber(AppVersion),

    /// Build numbers are not tracked but the current version carries one.
    #[error("current version {0} has a build number, but build numbers are not tracked")]
    UnexpectedBuildNumber(AppVersion),

    /// An explicit version was requested while build numbers are tracked.
    #[error("explicit versions are not accepted while build numbers are tracked")]
    ExplicitWithBuildNumber,

    /// A version segment is already at its maximum.
    #[error("{segment} {value} cannot be incremented")]
    Overflow {
        /// Which segment overflowed (`major`, `minor`, `patch`, `build number`).
        segment: &'static str,
        /// Its current value.
        value: u64,
    },
}

/// Result alias for version operations.
pub type VersionResult<T> = Result<T, VersionError>;

/// An application version: `X.Y.Z` with an optional build number.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AppVersion {
    core: Version,
    build: Option<u64>,
}

impl AppVersion {
    /// Create a version without a build number.
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            core: Version::new(major, minor, patch),
            build: None,
        }
    }

    /// Attach a build number.
    #[must_use]
    pub fn with_build(mut self, build: u64) -> Self {
        self.build = Some(build);
        self
    }

    /// Parse `X.Y.Z` or `X.Y.Z+B`.
    ///
    /// Pre-release identifiers and non-numeric build metadata are rejected:
    /// the build suffix is a counter, not free-form metadata.
    pub fn parse(s: &str) -> VersionResult<Self> {
        let (core, build) = match s.split_once('+') {
            Some((core, build)) => (core, Some(build)),
            None => (s, None),
        };

        let core = Version::parse(core)?;
        if !core.pre.is_empty() {
            return Err(VersionError::Malformed {
                version: s.to_owned(),
                reason: "pre-release identifiers are not supported",
            });
        }

        let build = match build {
            Some(b) if !b.is_empty() && b.bytes().all(|c| c.is_ascii_digit()) => {
                Some(b.parse().map_err(|_| VersionError::Malformed {
                    version: s.to_owned(),
                    reason: "build number out of range",
                })?)
            }
            Some(_) => {
                return Err(VersionError::Malformed {
                    version: s.to_owned(),
                    reason: "build number must be a non-negative integer",
                });
            }
            None => None,
        };

        Ok(Self { core, build })
    }

    /// The `X.Y.Z` part.
    pub const fn core(&self) -> &Version {
        &self.core
    }

    /// The build number, if tracked.
    pub const fn build(&self) -> Option<u64> {
        self.build
    }

    /// The version with the build suffix stripped.
    ///
    /// This is the form used for commit messages, tags and artifact names.
    pub fn release(&self) -> Version {
        self.core.clone()
    }

    /// The git tag for this version (`v` + release version).
    pub fn tag(&self) -> String {
        format!("v{}", self.core)
    }
}

impl fmt::Display for AppVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.build {
            Some(build) => write!(f, "{}+{build}", self.core),
            None => write!(f, "{}", self.core),
        }
    }
}

impl FromStr for AppVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for AppVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AppVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Semver bump level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BumpLevel {
    /// Patch release (x.y.Z).
    Patch,
    /// Minor release (x.Y.0).
    Minor,
    /// Major release (X.0.0).
    Major,
}

impl fmt::Display for BumpLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Patch => write!(f, "patch"),
            Self::Minor => write!(f, "minor"),
            Self::Major => write!(f, "major"),
        }
    }
}

/// Which of the two version shapes a project uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VersionPolicy {
    /// Track a `+B` build number that increments on every bump.
    pub build_number: bool,
    /// Accept a literal `X.Y.Z` as the bump instruction.
    ///
    /// Only meaningful when `build_number` is off.
    pub allow_explicit: bool,
}

impl Default for VersionPolicy {
    fn default() -> Self {
        Self {
            build_number: true,
            allow_explicit: false,
        }
    }
}

impl VersionPolicy {
    /// One-line usage hint listing the accepted instructions.
    pub const fn usage(&self) -> &'static str {
        if self.allow_explicit {
            "pubship [major|minor|patch|X.Y.Z]"
        } else {
            "pubship [major|minor|patch]"
        }
    }
}

/// What the user asked for: a segment to bump, or a literal version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BumpInstruction {
    /// Bump one segment.
    Level(BumpLevel),
    /// Replace the version outright.
    Explicit(Version),
}

impl BumpInstruction {
    /// Parse a command-line bump argument under the given policy.
    pub fn parse(arg: &str, policy: VersionPolicy) -> VersionResult<Self> {
        match arg {
            "major" => Ok(Self::Level(BumpLevel::Major)),
            "minor" => Ok(Self::Level(BumpLevel::Minor)),
            "patch" => Ok(Self::Level(BumpLevel::Patch)),
            _ if policy.allow_explicit => explicit::validate_explicit(arg)
                .map(Self::Explicit)
                .map_err(|_| VersionError::InvalidInstruction(arg.to_owned())),
            _ => Err(VersionError::InvalidInstruction(arg.to_owned())),
        }
    }
}

impl fmt::Display for BumpInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Level(level) => write!(f, "{level}"),
            Self::Explicit(version) => write!(f, "explicit ({version})"),
        }
    }
}

/// Compute the next version by applying a bump level.
pub fn next_version(current: &Version, level: BumpLevel) -> VersionResult<Version> {
    Ok(match level {
        BumpLevel::Patch => Version::new(
            current.major,
            current.minor,
            increment("patch", current.patch)?,
        ),
        BumpLevel::Minor => Version::new(current.major, increment("minor", current.minor)?, 0),
        BumpLevel::Major => Version::new(increment("major", current.major)?, 0, 0),
    })
}

fn increment(segment: &'static str, value: u64) -> VersionResult<u64> {
    value
        .checked_add(1)
        .ok_or(VersionError::Overflow { segment, value })
}

/// Resolve the next version from the current one and an instruction.
#[instrument(fields(%current, %instruction))]
pub fn resolve(
    current: &AppVersion,
    instruction: &BumpInstruction,
    policy: VersionPolicy,
) -> VersionResult<AppVersion> {
    match (policy.build_number, current.build) {
        (true, None) => return Err(VersionError::MissingBuildNumber(current.clone())),
        (false, Some(_)) => return Err(VersionError::UnexpectedBuildNumber(current.clone())),
        _ => {}
    }

    let next = match instruction {
        BumpInstruction::Level(level) => {
            let core = next_version(&current.core, *level)?;
            let build = current
                .build
                .map(|b| increment("build number", b))
                .transpose()?;
            AppVersion { core, build }
        }
        BumpInstruction::Explicit(version) => {
            if policy.build_number {
                return Err(VersionError::ExplicitWithBuildNumber);
            }
            AppVersion {
                core: version.clone(),
                build: None,
            }
        }
    };

    debug!(%next, "resolved next version");
    Ok(next)
}
