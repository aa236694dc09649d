use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use docsmith::domain::model::FieldKind;
use docsmith::{DocError, Options, ResourceStore, extract, load, render};

const ROOT: &str = r##"{% import "doc-util/main.j2" as d %}
{% import "./client.j2" as client %}
{% set package = {
  "#": {"info": {"name": "service", "import": "service/main.j2", "help": "Service settings."}},
  "#replicas": {"value": {"help": "Pod count.", "type": d.T.number, "default": 2}},
  "replicas": 2,
  "#scale": {"function": {"help": "Change the replica count.", "args": [{"name": "n", "type": d.T.number}]}},
  "#health": {"object": {"help": "Health checks."}},
  "settings": {"debug": true, "level": 3},
  "health": {
    "#path": {"value": {"type": d.T.string, "default": "/healthz"}},
    "path": "/healthz",
    "timeout": 5
  },
  "client": client.package
} %}
"##;

const CLIENT: &str = r##"{% set package = {
  "#": {"info": {"name": "client", "help": "Client helpers."}},
  "#retries": {"value": {"type": "number", "default": 3}}
} %}
"##;

fn options() -> Options {
    Options::new(Arc::new(ResourceStore::bundled().expect("bundled store")))
}

fn project(dir: &Path) -> Result<String> {
    fs::write(dir.join("main.j2"), ROOT)?;
    fs::write(dir.join("client.j2"), CLIENT)?;
    Ok(dir.join("main.j2").display().to_string())
}

#[test]
fn load_builds_the_full_tree() -> Result<()> {
    let temp = tempfile::tempdir()?;
    let entry = project(temp.path())?;

    let package = load(&entry, &options())?;
    assert_eq!(package.name, "service");
    assert_eq!(package.help, "Service settings.");

    let names: Vec<_> = package.api.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["replicas", "scale", "health"]);

    match &package.field("health").map(|f| &f.kind) {
        Some(FieldKind::Object(object)) => {
            assert_eq!(object.help, "Health checks.");
            assert_eq!(object.fields.len(), 1);
            assert_eq!(object.fields[0].name, "path");
        }
        other => panic!("expected object, got {other:?}"),
    }

    let client = package.subpackage("client").expect("client subpackage");
    assert_eq!(client.help, "Client helpers.");
    assert_eq!(client.api[0].name, "retries");
    Ok(())
}

#[test]
fn repeated_loads_are_identical() -> Result<()> {
    let temp = tempfile::tempdir()?;
    let entry = project(temp.path())?;
    let opts = options();
    assert_eq!(load(&entry, &opts)?, load(&entry, &opts)?);
    Ok(())
}

#[test]
fn render_emits_one_file_per_package() -> Result<()> {
    let temp = tempfile::tempdir()?;
    let entry = project(temp.path())?;

    let docs = render(&entry, &options())?;
    let paths: Vec<_> = docs.iter().map(|(path, _)| path).collect();
    assert_eq!(paths, vec!["README.md", "client.md"]);

    let readme = docs.get("README.md").unwrap_or_default();
    assert!(readme.contains("# package service"), "{readme}");
    assert!(readme.contains("Import: `service/main.j2`"), "{readme}");
    assert!(readme.contains("[client](client.md)"), "{readme}");
    assert!(readme.contains("fn scale"), "{readme}");
    assert!(readme.contains("scale(n)"), "{readme}");
    assert!(readme.contains("obj health"), "{readme}");
    assert!(readme.contains("val health.path"), "{readme}");
    assert!(readme.contains("* default: `\"/healthz\"`"), "{readme}");

    let client = docs.get("client.md").unwrap_or_default();
    assert!(client.contains("# package client"), "{client}");
    assert!(client.contains("val retries"), "{client}");
    Ok(())
}

#[test]
fn render_headings_follow_the_model() -> Result<()> {
    let temp = tempfile::tempdir()?;
    let entry = project(temp.path())?;

    let docs = render(&entry, &options())?;
    let readme = docs.get("README.md").unwrap_or_default();
    assert_eq!(readme.matches("obj health").count(), 1, "{readme}");
    assert!(!readme.contains("obj settings"), "{readme}");
    assert!(!readme.contains("timeout"), "{readme}");
    Ok(())
}

#[test]
fn minimal_package_renders() -> Result<()> {
    let temp = tempfile::tempdir()?;
    let entry = temp.path().join("main.j2");
    fs::write(
        &entry,
        r##"{% set package = {
  "#": {"info": {"name": "bare"}},
  "#flag": {"value": {}},
  "#run": {"function": {}},
  "#group": {"object": {}}
} %}
"##,
    )?;

    let docs = render(&entry.display().to_string(), &options())?;
    let readme = docs.get("README.md").unwrap_or_default();
    assert!(readme.starts_with("# package bare"), "{readme}");
    assert!(!readme.contains("Import:"), "{readme}");
    assert!(readme.contains("### val flag"), "{readme}");
    assert!(readme.contains("* type: `any`"), "{readme}");
    assert!(!readme.contains("* default:"), "{readme}");
    assert!(readme.contains("run()"), "{readme}");
    assert!(readme.contains("### obj group"), "{readme}");
    Ok(())
}

#[test]
fn repeated_extracts_are_byte_identical() -> Result<()> {
    let temp = tempfile::tempdir()?;
    let entry = project(temp.path())?;
    let opts = options();
    assert_eq!(extract(&entry, &opts)?, extract(&entry, &opts)?);
    Ok(())
}

#[test]
fn undefined_documentation_value_is_an_error() -> Result<()> {
    let temp = tempfile::tempdir()?;
    let entry = temp.path().join("main.j2");
    fs::write(
        &entry,
        r##"{% set package = {
  "#": {"info": {"name": "demo"}},
  "#port": {"value": {"default": missing_port}}
} %}
"##,
    )?;

    let err = extract(&entry.display().to_string(), &options()).unwrap_err();
    match err {
        DocError::Evaluation { message, .. } => {
            assert!(message.contains("package.#port.value.default is undefined"), "{message}");
        }
        other => panic!("expected Evaluation, got {other:?}"),
    }
    Ok(())
}

#[test]
fn evaluation_errors_carry_the_engine_message() -> Result<()> {
    let temp = tempfile::tempdir()?;
    let entry = temp.path().join("main.j2");
    fs::write(&entry, "{% set package = {\"#\": {\"info\": {\"name\": missing_name}}} %}")?;

    let err = load(&entry.display().to_string(), &options()).unwrap_err();
    match err {
        DocError::Evaluation { driver, message } => {
            assert_eq!(driver, "<internal>/load.j2");
            assert!(message.contains("undefined"), "{message}");
        }
        other => panic!("expected Evaluation, got {other:?}"),
    }
    Ok(())
}

#[test]
fn missing_import_names_the_request() -> Result<()> {
    let temp = tempfile::tempdir()?;
    let entry = temp.path().join("main.j2");
    fs::write(&entry, "{% import \"vendor/absent.j2\" as absent %}")?;

    let err = load(&entry.display().to_string(), &options()).unwrap_err();
    assert!(matches!(err, DocError::Resolution(_)), "{err:?}");
    assert!(
        err.to_string().contains("couldn't find import 'vendor/absent.j2'"),
        "{err}"
    );
    Ok(())
}

#[test]
fn missing_bundled_file_is_reported_as_internal() -> Result<()> {
    let temp = tempfile::tempdir()?;
    let entry = temp.path().join("main.j2");
    fs::write(&entry, "{% import \"doc-util/extra.j2\" as extra %}")?;

    let err = load(&entry.display().to_string(), &options()).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("<internal>/doc-util/extra.j2 does not exist"), "{message}");
    Ok(())
}

#[test]
fn template_without_docs_is_a_transform_error() -> Result<()> {
    let temp = tempfile::tempdir()?;
    let entry = temp.path().join("main.j2");
    fs::write(&entry, "{% set package = {\"replicas\": 2} %}")?;

    let err = load(&entry.display().to_string(), &options()).unwrap_err();
    assert!(matches!(err, DocError::Transform(_)), "{err:?}");
    Ok(())
}
