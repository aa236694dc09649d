//! Bundled template resources shipped inside the binary.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::domain::errors::DocError;

/// Logical directory of the bundled documentation library.
pub const LIBRARY_DIR: &str = "doc-util";

/// Prefix marking locations that are served from the bundle, never from disk.
pub const INTERNAL_PREFIX: &str = "<internal>/";

/// Embedded resources bundled with the binary.
static BUNDLED: &[(&str, &str)] = &[
    (
        "doc-util/main.j2",
        include_str!("../../assets/doc-util/main.j2"),
    ),
    (
        "doc-util/render.j2",
        include_str!("../../assets/doc-util/render.j2"),
    ),
    ("load.j2", include_str!("../../assets/load.j2")),
    ("render.j2", include_str!("../../assets/render.j2")),
];

/// Resources every store must provide.
const REQUIRED: &[&str] = &[
    "doc-util/main.j2",
    Driver::Extract.name(),
    Driver::Render.name(),
];

/// Driver scripts run by an evaluation session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Driver {
    /// Emits the raw documentation tree.
    Extract,
    /// Emits rendered Markdown keyed by output path.
    Render,
}

impl Driver {
    pub const fn name(&self) -> &'static str {
        match self {
            Driver::Extract => "load.j2",
            Driver::Render => "render.j2",
        }
    }

    /// Template name used for the driver inside a session.
    pub fn location(&self) -> String {
        format!("{INTERNAL_PREFIX}{}", self.name())
    }
}

/// Immutable set of named text resources.
#[derive(Debug, Clone)]
pub struct ResourceStore {
    entries: BTreeMap<String, Arc<str>>,
}

impl ResourceStore {
    /// The resources compiled into this binary.
    pub fn bundled() -> Result<Self, DocError> {
        Self::from_entries(BUNDLED.iter().copied())
    }

    /// Build a store from arbitrary entries, checking that every required
    /// resource is present.
    pub fn from_entries<I, K, V>(entries: I) -> Result<Self, DocError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<str>,
    {
        let entries: BTreeMap<String, Arc<str>> = entries
            .into_iter()
            .map(|(name, content)| (name.into(), Arc::from(content.as_ref())))
            .collect();

        if let Some(missing) = REQUIRED.iter().find(|name| !entries.contains_key(**name)) {
            return Err(DocError::ResourceMissing {
                name: (*missing).to_owned(),
            });
        }

        tracing::debug!(count = entries.len(), "resource store ready");
        Ok(Self { entries })
    }

    pub fn get(&self, name: &str) -> Option<&Arc<str>> {
        self.entries.get(name)
    }

    /// Look up a library file by base name.
    pub fn library(&self, base: &str) -> Option<&Arc<str>> {
        self.entries.get(&format!("{LIBRARY_DIR}/{base}"))
    }

    pub fn driver(&self, driver: Driver) -> Result<&Arc<str>, DocError> {
        self.get(driver.name())
            .ok_or_else(|| DocError::ResourceMissing {
                name: driver.name().to_owned(),
            })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}
