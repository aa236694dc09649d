//! Domain-specific errors.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Top-level error returned by every public pipeline entry point.
#[derive(Debug, Error)]
pub enum DocError {
    /// A required bundled resource is absent. This indicates a broken build.
    #[error("bundled resource '{name}' is missing from this build")]
    ResourceMissing { name: String },
    #[error(transparent)]
    Resolution(#[from] ResolveError),
    /// The template engine failed while running a driver.
    #[error("evaluating {driver} failed: {message}")]
    Evaluation { driver: String, message: String },
    #[error(transparent)]
    Transform(#[from] TransformError),
}

/// An import could not be satisfied.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("{location} does not exist (imported as '{requested}')")]
    MissingBundled { requested: String, location: String },
    #[error("couldn't find import '{requested}' (searched: {})", display_dirs(.searched))]
    NotFound {
        requested: String,
        searched: Vec<PathBuf>,
    },
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// The raw metadata tree could not be converted into the object model.
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("malformed raw metadata: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("{path}: package mapping lacks a '#' entry with package info")]
    MissingPackageInfo { path: String },
    #[error("{path}: unknown node kind (keys: {})", .keys.join(", "))]
    UnknownNodeKind { path: String, keys: Vec<String> },
    #[error("{path}: expected {expected}, found {found}")]
    UnexpectedShape {
        path: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("{path}: invalid {kind} documentation: {source}")]
    InvalidDoc {
        path: String,
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("{path}: '{name}' is documented more than once")]
    DuplicateField { path: String, name: String },
    #[error("{path}: {what} is not allowed here")]
    Misplaced { path: String, what: &'static str },
    #[error("rendered output lists '{0}' more than once")]
    DuplicateOutput(String),
}

fn display_dirs(dirs: &[PathBuf]) -> String {
    if dirs.is_empty() {
        return "<none>".to_owned();
    }
    dirs.iter()
        .map(|dir| dir.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
