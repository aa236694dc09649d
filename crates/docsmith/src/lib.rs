//! Extract documentation embedded in templates and render it as Markdown.
//!
//! Entry templates export a `package` mapping annotated with `#` keys. The
//! pipeline evaluates a driver against the entry, then either converts the
//! raw tree into a [`Package`] or returns the rendered files directly.

pub mod app;
pub mod cli;
pub mod domain;
pub mod infra;

pub use app::output::{RenderedDocs, write_rendered};
pub use app::pipeline::{Options, extract, load, render};
pub use app::transform::{to_raw, transform};
pub use domain::errors::{DocError, ResolveError, TransformError};
pub use domain::model::Package;
pub use infra::resources::ResourceStore;

/// Install the log subscriber. Logs go to stderr so stdout stays usable for
/// `--raw` and `--dump`.
pub fn init() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();
}
