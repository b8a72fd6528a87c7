//! Configuration loading and discovery.
//!
//! # Config file locations (in order of precedence, highest first):
//! - files passed explicitly (`--config`)
//! - `.pubship.<ext>` in the current directory or any parent
//! - `pubship.<ext>` in the current directory or any parent
//! - `~/.config/pubship/config.<ext>` (user config)
//!
//! Where `<ext>` is one of: `toml`, `yaml`, `yml`, `json`. The parent walk
//! stops at the first directory above the start that contains `.git`.
//!
//! # Example
//! ```no_run
//! use camino::Utf8PathBuf;
//! use pubship_core::config::ConfigLoader;
//!
//! let cwd = Utf8PathBuf::from("/work/slides");
//! let config = ConfigLoader::new()
//!     .with_project_search(&cwd)
//!     .load()
//!     .unwrap();
//! assert_eq!(config.store.path, "pubspec.yaml");
//! ```

use camino::{Utf8Path, Utf8PathBuf};
use figment::Figment;
use figment::providers::{Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};

use crate::artifact::ArtifactLayout;
use crate::error::{ConfigError, ConfigResult};
use crate::version::VersionPolicy;

/// The configuration for pubship.
///
/// Every section has defaults matching a stock Flutter project named
/// `slides`, so an empty config is a working config.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Log level for the application (e.g., "debug", "info", "warn", "error").
    pub log_level: LogLevel,
    /// Directory for JSONL log files (falls back to platform defaults if unset).
    pub log_dir: Option<Utf8PathBuf>,
    /// Where the version lives.
    pub store: StoreConfig,
    /// Version shape: build numbers and explicit versions.
    pub version: VersionPolicy,
    /// Source-control behavior.
    pub git: GitConfig,
    /// Build command and output location.
    pub build: BuildConfig,
    /// GitHub release settings.
    pub release: ReleaseConfig,
    /// Orchestrator behavior.
    pub ship: ShipConfig,
}

/// Version store settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct StoreConfig {
    /// Path of the file holding `version:`, relative to the project root.
    pub path: Utf8PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: Utf8PathBuf::from("pubspec.yaml"),
        }
    }
}

/// Source-control settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct GitConfig {
    /// Push the release commit (default: `true`).
    pub push: bool,
    /// Remote to push to. Plain `git push` when unset.
    pub remote: Option<String>,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            push: true,
            remote: None,
        }
    }
}

/// Build settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct BuildConfig {
    /// Release build command line (split on whitespace, no shell).
    pub command: String,
    /// Directory the build writes its artifact to.
    pub artifact_dir: Utf8PathBuf,
    /// File name of the artifact the build produces.
    pub artifact_name: String,
}

impl Default for BuildConfig {
    fn default() -> Self {
        let layout = ArtifactLayout::default();
        Self {
            command: "flutter build apk --release".into(),
            artifact_dir: layout.dir,
            artifact_name: layout.file_name,
        }
    }
}

impl BuildConfig {
    /// The artifact layout described by this section.
    pub fn layout(&self) -> ArtifactLayout {
        ArtifactLayout {
            dir: self.artifact_dir.clone(),
            file_name: self.artifact_name.clone(),
        }
    }
}

/// GitHub release settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReleaseConfig {
    /// Product name embedded in the artifact file name.
    pub product: String,
    /// Create the release as a draft (default: `true`).
    ///
    /// Review and publish with `gh release edit <tag> --draft=false`.
    pub draft: bool,
    /// Title template. Supports `{version}`, `{tag}` and `{product}`.
    pub title: String,
    /// Release notes passed to `gh`.
    pub notes: Option<String>,
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        Self {
            product: "slides".into(),
            draft: true,
            title: "v{version}".into(),
            notes: None,
        }
    }
}

/// Orchestrator behavior.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ShipConfig {
    /// Prompt for confirmation before executing (default: `false`).
    ///
    /// The `--yes`/`-y` CLI flag overrides this at runtime.
    pub confirm: bool,
    /// Run preflight checks before changing anything (default: `true`).
    pub preflight: bool,
}

impl Default for ShipConfig {
    fn default() -> Self {
        Self {
            confirm: false,
            preflight: true,
        }
    }
}

impl Config {
    /// Reject settings that cannot work together.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.version.build_number && self.version.allow_explicit {
            return Err(ConfigError::Invalid(
                "version.allow_explicit requires version.build_number = false".into(),
            ));
        }
        if self.build.command.trim().is_empty() {
            return Err(ConfigError::Invalid("build.command is empty".into()));
        }
        if self.release.product.trim().is_empty() {
            return Err(ConfigError::Invalid("release.product is empty".into()));
        }
        if self.store.path.as_str().is_empty() {
            return Err(ConfigError::Invalid("store.path is empty".into()));
        }
        Ok(())
    }
}

/// Log level configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Verbose output for debugging and development.
    Debug,
    /// Standard operational information (default).
    #[default]
    Info,
    /// Warnings about potential issues.
    Warn,
    /// Errors that indicate failures.
    Error,
}

impl LogLevel {
    /// Returns the log level as a lowercase string slice.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Supported configuration file extensions (in order of preference).
const CONFIG_EXTENSIONS: &[&str] = &["toml", "yaml", "yml", "json"];

/// Application name for XDG directory lookup and config file names.
const APP_NAME: &str = "pubship";

/// Builder for loading configuration from multiple sources.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    /// Starting directory for project config search.
    project_search_root: Option<Utf8PathBuf>,
    /// Whether to include user config from XDG directory.
    include_user_config: bool,
    /// Stop searching when we hit a directory containing this file/dir.
    boundary_marker: Option<String>,
    /// Explicit config files to load.
    explicit_files: Vec<Utf8PathBuf>,
}

impl ConfigLoader {
    /// Create a new config loader with default settings.
    pub fn new() -> Self {
        Self {
            project_search_root: None,
            include_user_config: true,
            boundary_marker: Some(".git".to_string()),
            explicit_files: Vec::new(),
        }
    }

    /// Set the starting directory for project config search.
    pub fn with_project_search<P: AsRef<Utf8Path>>(mut self, path: P) -> Self {
        self.project_search_root = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set whether to include user config from `~/.config/pubship/`.
    pub const fn with_user_config(mut self, include: bool) -> Self {
        self.include_user_config = include;
        self
    }

    /// Disable the boundary marker (search all the way to filesystem root).
    pub fn without_boundary_marker(mut self) -> Self {
        self.boundary_marker = None;
        self
    }

    /// Add an explicit config file to load.
    ///
    /// Later files take precedence over earlier ones and over discovered
    /// files.
    pub fn with_file<P: AsRef<Utf8Path>>(mut self, path: P) -> Self {
        self.explicit_files.push(path.as_ref().to_path_buf());
        self
    }

    /// Load and validate configuration, merging all discovered sources.
    #[tracing::instrument(skip(self), fields(search_root = ?self.project_search_root))]
    pub fn load(self) -> ConfigResult<Config> {
        tracing::debug!("loading configuration");
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        if self.include_user_config
            && let Some(user_config) = find_user_config()
        {
            figment = merge_file(figment, &user_config);
        }

        if let Some(ref root) = self.project_search_root
            && let Some(project_config) = self.find_project_config(root)
        {
            tracing::debug!(path = %project_config, "found project config");
            figment = merge_file(figment, &project_config);
        }

        for file in &self.explicit_files {
            figment = merge_file(figment, file);
        }

        let config: Config = figment
            .extract()
            .map_err(|e| ConfigError::Deserialize(Box::new(e)))?;
        config.validate()?;

        tracing::info!(
            log_level = config.log_level.as_str(),
            store = %config.store.path,
            build_number = config.version.build_number,
            draft = config.release.draft,
            "configuration loaded"
        );
        Ok(config)
    }

    /// Find project config by walking up from the given directory.
    fn find_project_config(&self, start: &Utf8Path) -> Option<Utf8PathBuf> {
        let mut current = Some(start.to_path_buf());

        while let Some(dir) = current {
            if let Some(ref marker) = self.boundary_marker
                && dir != start
                && dir.join(marker).exists()
            {
                break;
            }

            for ext in CONFIG_EXTENSIONS {
                let dotfile = dir.join(format!(".{APP_NAME}.{ext}"));
                if dotfile.is_file() {
                    return Some(dotfile);
                }

                let regular = dir.join(format!("{APP_NAME}.{ext}"));
                if regular.is_file() {
                    return Some(regular);
                }
            }

            current = dir.parent().map(Utf8Path::to_path_buf);
        }

        None
    }
}

/// Find the project config file that would be loaded from `start`.
pub fn find_project_config<P: AsRef<Utf8Path>>(start: P) -> Option<Utf8PathBuf> {
    ConfigLoader::new().find_project_config(start.as_ref())
}

/// Find user config in the XDG config directory.
fn find_user_config() -> Option<Utf8PathBuf> {
    let proj_dirs = directories::ProjectDirs::from("", "", APP_NAME)?;
    let config_dir = proj_dirs.config_dir();

    CONFIG_EXTENSIONS
        .iter()
        .map(|ext| config_dir.join(format!("config.{ext}")))
        .find(|path| path.is_file())
        .and_then(|path| Utf8PathBuf::from_path_buf(path).ok())
}

/// Merge a config file into the figment, detecting format from extension.
fn merge_file(figment: Figment, path: &Utf8Path) -> Figment {
    match path.extension() {
        Some("yaml" | "yml") => figment.merge(Yaml::file_exact(path.as_str())),
        Some("json") => figment.merge(Json::file_exact(path.as_str())),
        _ => figment.merge(Toml::file_exact(path.as_str())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_config(tmp: &TempDir, name: &str, body: &str) -> Utf8PathBuf {
        let path = tmp.path().join(name);
        fs::write(&path, body).unwrap();
        Utf8PathBuf::try_from(path).unwrap()
    }

    fn load_file(path: &Utf8Path) -> ConfigResult<Config> {
        ConfigLoader::new()
            .with_user_config(false)
            .with_file(path)
            .load()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.log_level, LogLevel::Info);
        assert_eq!(config.store.path, "pubspec.yaml");
        assert!(config.version.build_number);
        assert!(!config.version.allow_explicit);
        assert!(config.git.push);
        assert_eq!(config.build.command, "flutter build apk --release");
        assert_eq!(config.release.product, "slides");
        assert!(config.release.draft);
        assert!(!config.ship.confirm);
        assert!(config.ship.preflight);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_loader_builds_with_defaults() {
        let config = ConfigLoader::new()
            .with_user_config(false)
            .without_boundary_marker()
            .load()
            .unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_toml_sections() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(
            &tmp,
            "config.toml",
            r#"
log_level = "debug"

[version]
build_number = false
allow_explicit = true

[git]
remote = "origin"

[build]
command = "flutter build apk --release --flavor prod"
artifact_name = "app-prod-release.apk"

[release]
product = "psallite"
draft = false
title = "{product} {version}"
"#,
        );

        let config = load_file(&path).unwrap();
        assert_eq!(config.log_level, LogLevel::Debug);
        assert!(!config.version.build_number);
        assert!(config.version.allow_explicit);
        assert_eq!(config.git.remote.as_deref(), Some("origin"));
        assert!(config.git.push, "unset keys keep their defaults");
        assert_eq!(config.build.artifact_name, "app-prod-release.apk");
        assert_eq!(config.build.artifact_dir, "build/app/outputs/flutter-apk");
        assert_eq!(config.release.product, "psallite");
        assert!(!config.release.draft);
        assert_eq!(config.release.title, "{product} {version}");
    }

    #[test]
    fn test_yaml_config() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(
            &tmp,
            "config.yaml",
            "release:\n  draft: false\nship:\n  confirm: true\n",
        );
        let config = load_file(&path).unwrap();
        assert!(!config.release.draft);
        assert!(config.ship.confirm);
    }

    #[test]
    fn test_json_config() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(&tmp, "config.json", r#"{"store": {"path": "app/pubspec.yaml"}}"#);
        let config = load_file(&path).unwrap();
        assert_eq!(config.store.path, "app/pubspec.yaml");
    }

    #[test]
    fn test_later_file_overrides_earlier() {
        let tmp = TempDir::new().unwrap();
        let base = write_config(&tmp, "base.toml", "[release]\nproduct = \"a\"\n");
        let over = write_config(&tmp, "over.toml", "[release]\nproduct = \"b\"\n");

        let config = ConfigLoader::new()
            .with_user_config(false)
            .with_file(&base)
            .with_file(&over)
            .load()
            .unwrap();
        assert_eq!(config.release.product, "b");
    }

    #[test]
    fn test_project_config_discovery() {
        let tmp = TempDir::new().unwrap();
        let project = tmp.path().join("slides");
        let deep = project.join("lib").join("src");
        fs::create_dir_all(&deep).unwrap();
        fs::write(project.join(".pubship.toml"), "[git]\npush = false\n").unwrap();

        let deep = Utf8PathBuf::try_from(deep).unwrap();
        let config = ConfigLoader::new()
            .with_user_config(false)
            .without_boundary_marker()
            .with_project_search(&deep)
            .load()
            .unwrap();
        assert!(!config.git.push);
    }

    #[test]
    fn test_boundary_marker_stops_search() {
        let tmp = TempDir::new().unwrap();
        let parent = tmp.path().join("parent");
        let child = parent.join("child");
        let work = child.join("work");
        fs::create_dir_all(&work).unwrap();
        fs::write(parent.join(".pubship.toml"), "[git]\npush = false\n").unwrap();
        fs::create_dir(child.join(".git")).unwrap();

        let work = Utf8PathBuf::try_from(work).unwrap();
        let config = ConfigLoader::new()
            .with_user_config(false)
            .with_project_search(&work)
            .load()
            .unwrap();
        assert!(config.git.push);
    }

    #[test]
    fn test_find_project_config_prefers_dotfile() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(".pubship.toml"), "").unwrap();
        fs::write(tmp.path().join("pubship.toml"), "").unwrap();
        let root = Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap();
        let found = find_project_config(&root).unwrap();
        assert_eq!(found.file_name(), Some(".pubship.toml"));
    }

    #[test]
    fn test_explicit_with_build_number_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(&tmp, "config.toml", "[version]\nallow_explicit = true\n");
        assert!(matches!(load_file(&path), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_empty_build_command_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(&tmp, "config.toml", "[build]\ncommand = \"  \"\n");
        assert!(matches!(load_file(&path), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_bad_type_is_deserialize_error() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(&tmp, "config.toml", "[release]\ndraft = \"sometimes\"\n");
        assert!(matches!(load_file(&path), Err(ConfigError::Deserialize(_))));
    }

    #[test]
    fn test_build_layout() {
        let layout = BuildConfig::default().layout();
        assert_eq!(layout, ArtifactLayout::default());
    }
}
