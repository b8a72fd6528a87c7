//! Explicit version mode: validate a user-supplied `X.Y.Z`.

use semver::Version;
use tracing::{debug, instrument};

use crate::version::{VersionError, VersionResult};

/// Validate and parse an explicit version string.
///
/// Only bare `X.Y.Z` is accepted: no `v` prefix, no pre-release, no build
/// suffix.
#[instrument]
pub fn validate_explicit(version_str: &str) -> VersionResult<Version> {
    let segments: Vec<&str> = version_str.split('.').collect();
    let well_formed = segments.len() == 3
        && segments
            .iter()
            .all(|s| !s.is_empty() && s.bytes().all(|c| c.is_ascii_digit()));

    if !well_formed {
        return Err(VersionError::Malformed {
            version: version_str.to_owned(),
            reason: "expected X.Y.Z",
        });
    }

    let version = Version::parse(version_str)?;
    debug!(%version, "validated explicit version");
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_explicit() {
        assert_eq!(validate_explicit("1.2.3").unwrap(), Version::new(1, 2, 3));
    }

    #[test]
    fn rejects_prefix_and_suffixes() {
        assert!(validate_explicit("v2.0.0").is_err());
        assert!(validate_explicit("2.0.0-rc.1").is_err());
        assert!(validate_explicit("2.0.0+7").is_err());
    }

    #[test]
    fn rejects_wrong_segment_count() {
        assert!(validate_explicit("2.0").is_err());
        assert!(validate_explicit("2.0.0.1").is_err());
        assert!(validate_explicit("").is_err());
    }

    #[test]
    fn rejects_leading_zero() {
        // Digits only, but not valid semver.
        assert!(matches!(
            validate_explicit("01.2.3"),
            Err(VersionError::InvalidSemver(_))
        ));
    }
}
