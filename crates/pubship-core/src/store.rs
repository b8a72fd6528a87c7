//! Version store: the `version:` field of `pubspec.yaml`.
//!
//! The store is read once, edited once and written back. Editing is a
//! targeted splice: the top-level `version:` declaration is located, its
//! scalar value is replaced, and every other byte of the file (comments,
//! quoting, line endings, unrelated keys) is kept as it was. The document is
//! never re-serialized.
//!
//! The located line is cross-checked against a real YAML parse so that a
//! commented-out or nested `version:` key can never be mistaken for the
//! declaration.

use std::fs;
use std::io::Write;
use std::ops::Range;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::version::{AppVersion, VersionError};

/// Errors from reading or rewriting the version store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store file could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// Store path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The store file could not be written.
    #[error("failed to write {path}: {source}")]
    Write {
        /// Store path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// No top-level `version:` declaration exists.
    #[error("no top-level `version:` field found")]
    MissingVersion,

    /// The declaration exists but carries no value.
    #[error("`version:` on line {line} has no value")]
    EmptyVersion {
        /// 1-based line number.
        line: usize,
    },

    /// The document is not valid YAML.
    #[error("invalid YAML: {0}")]
    Yaml(String),

    /// The textual declaration disagrees with the parsed document.
    #[error("`version:` on line {line} reads `{found}` but the document parses to `{parsed}`")]
    Inconsistent {
        /// 1-based line number of the textual declaration.
        line: usize,
        /// Value found on that line.
        found: String,
        /// Value from the YAML parse.
        parsed: String,
    },

    /// The stored value is not a valid version.
    #[error(transparent)]
    Version(#[from] VersionError),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Location of the version value inside the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionField {
    /// 1-based line number of the declaration.
    pub line: usize,
    /// Byte range of the value, excluding quotes. Quotes stay outside the
    /// splice, so the source quoting survives a rewrite.
    pub span: Range<usize>,
}

/// A loaded store: the raw contents plus the located version field.
#[derive(Debug, Clone)]
pub struct StoreDocument {
    contents: String,
    field: VersionField,
}

#[derive(Deserialize)]
struct Manifest {
    version: Option<String>,
}

impl StoreDocument {
    /// Locate and validate the version field in `contents`.
    pub fn parse(contents: String) -> StoreResult<Self> {
        let located = locate_version_field(&contents)?;

        let manifest: Manifest =
            serde_saphyr::from_str(&contents).map_err(|e| StoreError::Yaml(e.to_string()))?;

        let field = match (located, manifest.version) {
            (Some(field), Some(parsed)) => {
                let found = &contents[field.span.clone()];
                if found != parsed {
                    return Err(StoreError::Inconsistent {
                        line: field.line,
                        found: found.to_owned(),
                        parsed,
                    });
                }
                field
            }
            (Some(field), None) => {
                return Err(StoreError::Inconsistent {
                    line: field.line,
                    found: contents[field.span.clone()].to_owned(),
                    parsed: "(no version key)".into(),
                });
            }
            (None, _) => return Err(StoreError::MissingVersion),
        };

        Ok(Self { contents, field })
    }

    /// The located field.
    pub const fn field(&self) -> &VersionField {
        &self.field
    }

    /// The raw version string as written.
    pub fn raw_version(&self) -> &str {
        &self.contents[self.field.span.clone()]
    }

    /// Parse the stored version.
    pub fn current_version(&self) -> StoreResult<AppVersion> {
        Ok(AppVersion::parse(self.raw_version())?)
    }

    /// The contents with the version value replaced, all else unchanged.
    pub fn with_version(&self, version: &AppVersion) -> String {
        let new_value = version.to_string();
        let mut out = String::with_capacity(self.contents.len() + new_value.len());
        out.push_str(&self.contents[..self.field.span.start]);
        out.push_str(&new_value);
        out.push_str(&self.contents[self.field.span.end..]);
        out
    }
}

/// Replace the version field of `contents` with `version`.
pub fn rewrite_version(contents: &str, version: &AppVersion) -> StoreResult<String> {
    Ok(StoreDocument::parse(contents.to_owned())?.with_version(version))
}

/// The version store file on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionStore {
    path: Utf8PathBuf,
}

impl VersionStore {
    /// A store at `path`.
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path to the store file.
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Read and parse the store.
    #[instrument(fields(path = %self.path))]
    pub fn read(&self) -> StoreResult<StoreDocument> {
        let contents = fs::read_to_string(&self.path).map_err(|source| StoreError::Read {
            path: self.path.clone(),
            source,
        })?;
        let doc = StoreDocument::parse(contents)?;
        debug!(
            line = doc.field.line,
            version = doc.raw_version(),
            "located version field"
        );
        Ok(doc)
    }

    /// Overwrite the store with `contents`.
    ///
    /// Writes to a temporary file next to the store and renames it over the
    /// original, so a crash never leaves a half-written file. The original
    /// permissions are carried over.
    #[instrument(skip(contents), fields(path = %self.path, bytes = contents.len()))]
    pub fn write(&self, contents: &str) -> StoreResult<()> {
        let write_err = |source| StoreError::Write {
            path: self.path.clone(),
            source,
        };

        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_str().is_empty())
            .unwrap_or_else(|| Utf8Path::new("."));

        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
        tmp.write_all(contents.as_bytes()).map_err(write_err)?;
        if let Ok(meta) = fs::metadata(&self.path) {
            tmp.as_file()
                .set_permissions(meta.permissions())
                .map_err(write_err)?;
        }
        tmp.persist(&self.path).map_err(|e| write_err(e.error))?;

        debug!("store written");
        Ok(())
    }
}

/// Find the first top-level `version:` declaration.
///
/// Returns `Ok(None)` when there is none. Indented keys belong to nested
/// mappings and are ignored.
fn locate_version_field(contents: &str) -> StoreResult<Option<VersionField>> {
    let mut offset = 0;

    for (idx, raw_line) in contents.split_inclusive('\n').enumerate() {
        let line_start = offset;
        offset += raw_line.len();

        let line = raw_line
            .strip_suffix('\n')
            .map_or(raw_line, |l| l.strip_suffix('\r').unwrap_or(l));

        let Some(rest) = line.strip_prefix("version") else {
            continue;
        };
        let after_key = rest.trim_start_matches([' ', '\t']);
        let Some(after_colon) = after_key.strip_prefix(':') else {
            continue;
        };

        let line_no = idx + 1;
        let value = after_colon.trim_start_matches([' ', '\t']);
        let value_start = line_start + (line.len() - value.len());

        let (start, len) = match value.chars().next() {
            Some(q @ ('"' | '\'')) => {
                let inner = &value[1..];
                let Some(end) = inner.find(q) else {
                    return Err(StoreError::Yaml(format!(
                        "unterminated quoted version on line {line_no}"
                    )));
                };
                (value_start + 1, end)
            }
            Some('#') | None => return Err(StoreError::EmptyVersion { line: line_no }),
            Some(_) => {
                let without_comment = value
                    .find(" #")
                    .or_else(|| value.find("\t#"))
                    .map_or(value, |i| &value[..i]);
                let plain = without_comment.trim_end_matches([' ', '\t']);
                (value_start, plain.len())
            }
        };

        if len == 0 {
            return Err(StoreError::EmptyVersion { line: line_no });
        }

        return Ok(Some(VersionField {
            line: line_no,
            span: start..start + len,
        }));
    }

    Ok(None)
}
