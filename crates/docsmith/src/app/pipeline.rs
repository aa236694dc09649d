//! Public entry points: extract, load and render an entry template.

use std::path::PathBuf;
use std::sync::Arc;

use crate::app::output::RenderedDocs;
use crate::app::session::Session;
use crate::app::transform::transform;
use crate::domain::errors::DocError;
use crate::domain::model::Package;
use crate::infra::config::Config;
use crate::infra::resolver::Resolver;
use crate::infra::resources::{Driver, ResourceStore};

/// Options shared by every pipeline call.
#[derive(Debug, Clone)]
pub struct Options {
    /// Import search paths; the first match wins.
    pub search_paths: Vec<PathBuf>,
    pub resources: Arc<ResourceStore>,
}

impl Options {
    pub fn new(resources: Arc<ResourceStore>) -> Self {
        Self {
            search_paths: Vec::new(),
            resources,
        }
    }

    pub fn with_search_paths(mut self, paths: impl IntoIterator<Item = PathBuf>) -> Self {
        self.search_paths = paths.into_iter().collect();
        self
    }

    pub fn from_config(config: &Config, resources: Arc<ResourceStore>) -> Self {
        Self::new(resources).with_search_paths(config.search.path_bufs())
    }

    /// A fresh resolver for one session.
    pub fn resolver(&self) -> Resolver {
        Resolver::new(self.search_paths.clone(), Arc::clone(&self.resources))
    }
}

/// Evaluate `entry` with the extraction driver and return the raw tree as
/// JSON text.
pub fn extract(entry: &str, opts: &Options) -> Result<String, DocError> {
    run_driver(entry, opts, Driver::Extract)
}

/// Extract and transform `entry` into the object model.
pub fn load(entry: &str, opts: &Options) -> Result<Package, DocError> {
    let raw = extract(entry, opts)?;
    let package = transform(&raw)?;
    tracing::debug!(
        entry,
        package = %package.name,
        fields = package.api.len(),
        subpackages = package.sub.len(),
        "loaded package"
    );
    Ok(package)
}

/// Evaluate `entry` with the rendering driver.
pub fn render(entry: &str, opts: &Options) -> Result<RenderedDocs, DocError> {
    let raw = run_driver(entry, opts, Driver::Render)?;
    let docs = RenderedDocs::from_json(&raw)?;
    tracing::debug!(entry, files = docs.len(), "rendered documentation");
    Ok(docs)
}

fn run_driver(entry: &str, opts: &Options, driver: Driver) -> Result<String, DocError> {
    let source = opts.resources.driver(driver)?;
    let session = Session::new(entry, opts.resolver())?;
    session.run(&driver.location(), source)
}
