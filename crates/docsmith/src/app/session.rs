//! Single-use evaluation sessions over the template engine.
//!
//! A session owns a fresh [`Environment`] whose only way to load templates is
//! the [`Resolver`]. The entry template's location is bound to the `main`
//! global so drivers can `{% import main as entry %}`.
//!
//! The engine reports a failed import as a missing template. The resolver's
//! own error is kept aside and returned instead, so callers see which
//! directories were searched.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::error::Error as _;
use std::sync::Arc;

use minijinja::{AutoEscape, Environment, Error, ErrorKind, UndefinedBehavior, Value, context};
use parking_lot::Mutex;

use crate::app::library;
use crate::domain::errors::{DocError, ResolveError};
use crate::infra::resolver::Resolver;

/// Global holding the location of the entry template.
pub const MAIN_BINDING: &str = "main";

const UNRESOLVED_PREFIX: &str = "<unresolved>/";

/// Evaluation context for one driver run.
pub struct Session {
    env: Environment<'static>,
    entry: String,
    bridge: Arc<ImportBridge>,
}

impl Session {
    /// Prepare a session for `entry`. The entry is resolved up front so a
    /// missing file is reported as a resolution error.
    pub fn new(entry: &str, resolver: Resolver) -> Result<Self, DocError> {
        let location = resolver.resolve(None, entry)?.location;
        tracing::debug!(
            entry = %location,
            search_paths = ?resolver.search_paths(),
            "evaluation session ready"
        );
        let bridge = Arc::new(ImportBridge::new(resolver));

        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_auto_escape_callback(|_| AutoEscape::None);
        library::register(&mut env);

        let joiner = Arc::clone(&bridge);
        env.set_path_join_callback(move |name, parent| Cow::Owned(joiner.join(name, parent)));
        let loader = Arc::clone(&bridge);
        env.set_loader(move |name| loader.load(name));
        env.add_global(MAIN_BINDING, Value::from(location.clone()));

        Ok(Self {
            env,
            entry: location,
            bridge,
        })
    }

    /// Canonical location of the entry template.
    pub fn entry(&self) -> &str {
        &self.entry
    }

    /// Evaluate `source` as the driver named `driver` and return its output.
    pub fn run(self, driver: &str, source: &str) -> Result<String, DocError> {
        tracing::debug!(driver, entry = %self.entry, "running driver");
        let Self { mut env, bridge, .. } = self;
        env.add_template_owned(driver.to_owned(), source.to_owned())
            .map_err(|err| evaluation_error(driver, &err))?;
        let result = env
            .get_template(driver)
            .and_then(|template| template.render(context! {}));
        result.map_err(|err| match bridge.take_failure() {
            Some(failure) if missing_template(&err) => DocError::Resolution(failure),
            _ => evaluation_error(driver, &err),
        })
    }
}

/// Connects the engine's join/load callbacks to the resolver. A join resolves
/// the import and parks the outcome under the returned name until the engine
/// asks the loader for it.
struct ImportBridge {
    resolver: Resolver,
    pending: Mutex<BTreeMap<String, Result<Arc<str>, ResolveError>>>,
    /// First import the resolver could not satisfy.
    failure: Mutex<Option<ResolveError>>,
}

impl ImportBridge {
    fn new(resolver: Resolver) -> Self {
        Self {
            resolver,
            pending: Mutex::new(BTreeMap::new()),
            failure: Mutex::new(None),
        }
    }

    fn take_failure(&self) -> Option<ResolveError> {
        self.failure.lock().take()
    }

    fn join(&self, requested: &str, importer: &str) -> String {
        let (name, outcome) = match self.resolver.resolve(Some(importer), requested) {
            Ok(resolved) => (resolved.location, Ok(resolved.content)),
            Err(err) => (format!("{UNRESOLVED_PREFIX}{requested}"), Err(err)),
        };
        self.pending.lock().insert(name.clone(), outcome);
        name
    }

    fn load(&self, name: &str) -> Result<Option<String>, Error> {
        match self.pending.lock().remove(name) {
            Some(Ok(content)) => Ok(Some(content.to_string())),
            Some(Err(err)) => {
                let message = err.to_string();
                tracing::debug!(name, %message, "import failed");
                self.failure.lock().get_or_insert(err);
                Err(Error::new(ErrorKind::TemplateNotFound, message))
            }
            None => Ok(None),
        }
    }
}

/// Whether `err`, or anything it wraps, is the engine's missing-template error.
fn missing_template(err: &Error) -> bool {
    let mut current: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(inner) = current {
        if let Some(engine) = inner.downcast_ref::<Error>() {
            if engine.kind() == ErrorKind::TemplateNotFound {
                return true;
            }
        }
        current = inner.source();
    }
    false
}

fn evaluation_error(driver: &str, err: &Error) -> DocError {
    let mut message = err.to_string();
    let mut cause = err.source();
    while let Some(inner) = cause {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        cause = inner.source();
    }
    tracing::debug!(driver, %message, "driver failed");
    DocError::Evaluation {
        driver: driver.to_owned(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::resources::ResourceStore;
    use anyhow::Result;
    use std::fs;

    fn resolver(paths: Vec<std::path::PathBuf>) -> Resolver {
        Resolver::new(paths, Arc::new(ResourceStore::bundled().expect("bundled store")))
    }

    #[test]
    fn main_binding_points_at_entry() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let entry = temp.path().join("entry.j2");
        fs::write(&entry, "{% set greeting = 'hello' %}")?;

        let session = Session::new(&entry.display().to_string(), resolver(Vec::new()))?;
        assert_eq!(session.entry(), entry.display().to_string());
        let output = session.run(
            "<internal>/driver.j2",
            "{% import main as entry %}{{ entry.greeting }}",
        )?;
        assert_eq!(output, "hello");
        Ok(())
    }

    #[test]
    fn bundled_library_is_importable() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let entry = temp.path().join("entry.j2");
        fs::write(&entry, "")?;

        let session = Session::new(&entry.display().to_string(), resolver(Vec::new()))?;
        let output = session.run(
            "<internal>/driver.j2",
            "{% import 'doc-util/main.j2' as d %}{{ d.T.boolean }}",
        )?;
        assert_eq!(output, "bool");
        Ok(())
    }

    #[test]
    fn missing_entry_is_a_resolution_error() {
        let result = Session::new("does/not/exist.j2", resolver(Vec::new()));
        assert!(matches!(result, Err(DocError::Resolution(_))));
    }

    #[test]
    fn failed_import_surfaces_resolver_message() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let entry = temp.path().join("entry.j2");
        fs::write(&entry, "{% import 'lib/absent.j2' as lib %}")?;

        let session = Session::new(&entry.display().to_string(), resolver(Vec::new()))?;
        let err = session
            .run("<internal>/driver.j2", "{% import main as entry %}")
            .unwrap_err();
        match &err {
            DocError::Resolution(ResolveError::NotFound { requested, searched }) => {
                assert_eq!(requested, "lib/absent.j2");
                assert_eq!(searched.first(), Some(&temp.path().to_path_buf()));
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
        assert!(
            err.to_string().starts_with("couldn't find import 'lib/absent.j2' (searched: "),
            "{err}"
        );
        Ok(())
    }

    #[test]
    fn nested_import_failure_keeps_resolver_error() -> Result<()> {
        let temp = tempfile::tempdir()?;
        fs::write(temp.path().join("middle.j2"), "{% import 'deeper/gone.j2' as gone %}")?;
        let entry = temp.path().join("entry.j2");
        fs::write(&entry, "{% import 'middle.j2' as middle %}")?;

        let session = Session::new(&entry.display().to_string(), resolver(Vec::new()))?;
        let err = session
            .run("<internal>/driver.j2", "{% import main as entry %}")
            .unwrap_err();
        assert!(
            matches!(&err, DocError::Resolution(ResolveError::NotFound { requested, .. }) if requested == "deeper/gone.j2"),
            "{err:?}"
        );
        Ok(())
    }

    #[test]
    fn syntax_errors_are_evaluation_errors() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let entry = temp.path().join("entry.j2");
        fs::write(&entry, "{% set broken = %}")?;

        let session = Session::new(&entry.display().to_string(), resolver(Vec::new()))?;
        let err = session
            .run("<internal>/driver.j2", "{% import main as entry %}")
            .unwrap_err();
        assert!(matches!(err, DocError::Evaluation { .. }));
        Ok(())
    }
}
