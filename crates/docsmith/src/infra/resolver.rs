//! Import resolution for templates.
//!
//! Requests that start with one of the `doc-util` prefixes are served from the
//! bundled resource store. Everything else is looked up on disk, first next to
//! the importing file, then in each search path in order.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::domain::errors::ResolveError;
use crate::infra::resources::{INTERNAL_PREFIX, LIBRARY_DIR, ResourceStore};

/// Where a request is served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportSource {
    Bundled,
    Filesystem,
}

/// Ordered routing table; the first matching prefix wins.
const RULES: &[(&str, ImportSource)] = &[
    ("doc-util/", ImportSource::Bundled),
    ("github.com/docsmith-dev/docsmith/doc-util/", ImportSource::Bundled),
    ("./render.j2", ImportSource::Bundled),
    ("<internal>/doc-util/", ImportSource::Bundled),
];

/// A successfully resolved import.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub content: Arc<str>,
    /// Canonical location; bundled files are reported under `<internal>/`.
    pub location: String,
}

/// Resolves imports against the bundled library and the search paths.
#[derive(Debug, Clone)]
pub struct Resolver {
    search_paths: Vec<PathBuf>,
    resources: Arc<ResourceStore>,
}

impl Resolver {
    pub fn new(search_paths: Vec<PathBuf>, resources: Arc<ResourceStore>) -> Self {
        Self {
            search_paths,
            resources,
        }
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Decide which source serves `requested`.
    pub fn route(requested: &str) -> ImportSource {
        RULES
            .iter()
            .find(|(prefix, _)| requested.starts_with(prefix))
            .map(|(_, source)| *source)
            .unwrap_or(ImportSource::Filesystem)
    }

    /// Resolve `requested` as imported from `importer` (a location previously
    /// returned by this resolver, or `None` for the top level).
    pub fn resolve(
        &self,
        importer: Option<&str>,
        requested: &str,
    ) -> Result<Resolved, ResolveError> {
        match Self::route(requested) {
            ImportSource::Bundled => self.resolve_bundled(requested),
            ImportSource::Filesystem => self.resolve_file(importer, requested),
        }
    }

    fn resolve_bundled(&self, requested: &str) -> Result<Resolved, ResolveError> {
        let base = Path::new(requested)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let location = format!("{INTERNAL_PREFIX}{LIBRARY_DIR}/{base}");

        match self.resources.library(&base) {
            Some(content) => {
                tracing::trace!(requested, %location, "import served from bundle");
                Ok(Resolved {
                    content: Arc::clone(content),
                    location,
                })
            }
            None => Err(ResolveError::MissingBundled {
                requested: requested.to_owned(),
                location,
            }),
        }
    }

    fn resolve_file(
        &self,
        importer: Option<&str>,
        requested: &str,
    ) -> Result<Resolved, ResolveError> {
        let importer_dir = importer
            .filter(|location| !location.starts_with(INTERNAL_PREFIX))
            .and_then(|location| Path::new(location).parent())
            .unwrap_or_else(|| Path::new("."));

        let mut searched = Vec::with_capacity(self.search_paths.len() + 1);
        for dir in std::iter::once(importer_dir).chain(self.search_paths.iter().map(PathBuf::as_path))
        {
            let candidate = dir.join(requested);
            if candidate.is_file() {
                return read_candidate(candidate);
            }
            searched.push(dir.to_path_buf());
        }

        Err(ResolveError::NotFound {
            requested: requested.to_owned(),
            searched,
        })
    }
}

fn read_candidate(candidate: PathBuf) -> Result<Resolved, ResolveError> {
    let path = std::path::absolute(&candidate).unwrap_or(candidate);
    let content = fs::read_to_string(&path).map_err(|source| ResolveError::Read {
        path: path.clone(),
        source,
    })?;
    tracing::trace!(path = %path.display(), "import served from disk");
    Ok(Resolved {
        content: Arc::from(content),
        location: path.display().to_string(),
    })
}
