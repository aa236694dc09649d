//! Rendered documentation files and writing them to disk.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use serde::de::{Deserializer, MapAccess, Visitor};

use crate::domain::errors::TransformError;

/// Rendered text keyed by relative output path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedDocs(BTreeMap<String, String>);

impl RenderedDocs {
    /// Read the rendering driver's output. Paths listed twice are rejected.
    pub fn from_json(raw: &str) -> Result<Self, TransformError> {
        let listing: Listing = serde_json::from_str(raw).map_err(TransformError::Malformed)?;
        let mut files = BTreeMap::new();
        for (path, text) in listing.0 {
            if files.contains_key(&path) {
                return Err(TransformError::DuplicateOutput(path));
            }
            files.insert(path, text);
        }
        Ok(Self(files))
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.0.get(path).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(path, text)| (path.as_str(), text.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Every entry of a JSON object, duplicates included.
struct Listing(Vec<(String, String)>);

impl<'de> Deserialize<'de> for Listing {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ListingVisitor;

        impl<'de> Visitor<'de> for ListingVisitor {
            type Value = Listing;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a mapping of output path to text")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Listing, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some(entry) = access.next_entry::<String, String>()? {
                    entries.push(entry);
                }
                Ok(Listing(entries))
            }
        }

        deserializer.deserialize_map(ListingVisitor)
    }
}

/// Write every rendered file below `dir`, creating directories as needed.
/// Returns the written paths in path order.
pub fn write_rendered(docs: &RenderedDocs, dir: &Path) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(docs.len());
    for (relative, text) in docs.iter() {
        let target = dir.join(checked_relative(relative)?);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        fs::write(&target, text)
            .with_context(|| format!("failed to write {}", target.display()))?;
        tracing::info!(path = %target.display(), bytes = text.len(), "wrote documentation");
        written.push(target);
    }
    Ok(written)
}

fn checked_relative(relative: &str) -> Result<&Path> {
    let path = Path::new(relative);
    let escapes = path
        .components()
        .any(|part| !matches!(part, Component::Normal(_) | Component::CurDir));
    if relative.is_empty() || escapes {
        bail!("refusing to write outside the output directory: '{relative}'");
    }
    Ok(path)
}
