//! The release artifact produced by the build.
//!
//! The build tool drops its output at a fixed path. Before publishing, the
//! file is renamed in place to embed the product name and release version,
//! e.g. `build/app/outputs/flutter-apk/slides-android-v1.2.4.apk`.

use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use semver::Version;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

/// Errors from locating or renaming the artifact.
#[derive(Error, Debug)]
pub enum ArtifactError {
    /// The build finished but its output is not where it should be.
    #[error("build artifact not found at {0}")]
    Missing(Utf8PathBuf),

    /// Renaming failed.
    #[error("failed to rename {from} to {to}: {source}")]
    Rename {
        /// Original path.
        from: Utf8PathBuf,
        /// Target path.
        to: Utf8PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// Result alias for artifact operations.
pub type ArtifactResult<T> = Result<T, ArtifactError>;

/// Where the build tool writes its output, relative to the project root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactLayout {
    /// Output directory.
    pub dir: Utf8PathBuf,
    /// Output file name.
    pub file_name: String,
}

impl Default for ArtifactLayout {
    fn default() -> Self {
        Self {
            dir: Utf8PathBuf::from("build/app/outputs/flutter-apk"),
            file_name: "app-release.apk".into(),
        }
    }
}

impl ArtifactLayout {
    /// Absolute path of the untouched build output.
    pub fn expected_path(&self, root: &Utf8Path) -> Utf8PathBuf {
        root.join(&self.dir).join(&self.file_name)
    }

    /// Absolute path the artifact is renamed to.
    pub fn versioned_path(&self, root: &Utf8Path, product: &str, version: &Version) -> Utf8PathBuf {
        root.join(&self.dir).join(versioned_name(product, version))
    }

    /// Rename the build output to its version-qualified name.
    ///
    /// Returns the new path. The file stays in the same directory.
    #[instrument(skip(self), fields(dir = %self.dir))]
    pub fn rename(
        &self,
        root: &Utf8Path,
        product: &str,
        version: &Version,
    ) -> ArtifactResult<Utf8PathBuf> {
        let from = self.expected_path(root);
        if !from.is_file() {
            return Err(ArtifactError::Missing(from));
        }

        let to = self.versioned_path(root, product, version);
        fs::rename(&from, &to).map_err(|source| ArtifactError::Rename {
            from: from.clone(),
            to: to.clone(),
            source,
        })?;

        debug!(%from, %to, "renamed artifact");
        Ok(to)
    }
}

/// `<product>-android-v<version>.apk`
pub fn versioned_name(product: &str, version: &Version) -> String {
    format!("{product}-android-v{version}.apk")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versioned_name_format() {
        assert_eq!(
            versioned_name("slides", &Version::new(1, 2, 4)),
            "slides-android-v1.2.4.apk"
        );
    }

    #[test]
    fn paths_are_rooted() {
        let layout = ArtifactLayout::default();
        let root = Utf8Path::new("/work/slides");
        assert_eq!(
            layout.expected_path(root),
            "/work/slides/build/app/outputs/flutter-apk/app-release.apk"
        );
        assert_eq!(
            layout.versioned_path(root, "slides", &Version::new(1, 3, 0)),
            "/work/slides/build/app/outputs/flutter-apk/slides-android-v1.3.0.apk"
        );
    }

    #[test]
    fn rename_moves_within_directory() {
        let tmp = tempfile::TempDir::new().unwrap();
        let root = Utf8Path::from_path(tmp.path()).unwrap();
        let layout = ArtifactLayout::default();
        let original = layout.expected_path(root);
        fs::create_dir_all(original.parent().unwrap()).unwrap();
        fs::write(&original, b"apk bytes").unwrap();

        let renamed = layout
            .rename(root, "slides", &Version::new(1, 2, 4))
            .unwrap();

        assert!(!original.exists());
        assert_eq!(renamed.parent(), original.parent());
        assert_eq!(renamed.file_name(), Some("slides-android-v1.2.4.apk"));
        assert_eq!(fs::read(&renamed).unwrap(), b"apk bytes");
    }

    #[test]
    fn rename_reports_missing_output() {
        let tmp = tempfile::TempDir::new().unwrap();
        let root = Utf8Path::from_path(tmp.path()).unwrap();
        let err = ArtifactLayout::default()
            .rename(root, "slides", &Version::new(1, 0, 0))
            .unwrap_err();
        assert!(matches!(err, ArtifactError::Missing(_)));
    }
}
