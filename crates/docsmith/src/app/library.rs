//! Host filters backing the bundled `doc-util` library.
//!
//! Walking documentation trees happens here rather than in template code so
//! that strict undefined handling, declaration order and the package model
//! stay the same for extraction and rendering.
//!
//! * `doc_tree` writes the raw documentation tree of a mapping as JSON;
//! * `doc_pages` converts the tree into the model and lays it out as
//!   Markdown pages, one per package.

use minijinja::value::{Value, ValueKind};
use minijinja::{Environment, Error, ErrorKind, context};
use once_cell::sync::Lazy;
use serde::Serialize;
use serde_json::{Map, Value as Json};

use crate::app::transform;
use crate::domain::model::{Argument, Field, FieldKind, Package};

/// The engine builds mapping literals back to front. Checked once against the
/// linked engine instead of assumed.
static LITERALS_REVERSED: Lazy<bool> = Lazy::new(literals_reversed);

fn literals_reversed() -> bool {
    let env = Environment::new();
    let Ok(literal) = env
        .compile_expression("{'first': 0, 'second': 1}")
        .and_then(|expr| expr.eval(context! {}))
    else {
        return false;
    };
    let Ok(mut keys) = literal.try_iter() else {
        return false;
    };
    let first = keys.next();
    matches!(first.as_ref().and_then(Value::as_str), Some("second"))
}

/// Register the library filters on `env`.
pub fn register(env: &mut Environment<'_>) {
    env.add_filter("doc_tree", doc_tree);
    env.add_filter("doc_pages", doc_pages);
}

fn doc_tree(node: Value) -> Result<String, Error> {
    let tree = raw_tree(&node, transform::ROOT)?;
    serde_json::to_string(&tree).map_err(|err| {
        Error::new(ErrorKind::BadSerialization, "documentation tree is not JSON").with_source(err)
    })
}

fn doc_pages(node: Value) -> Result<Value, Error> {
    let tree = raw_tree(&node, transform::ROOT)?;
    let package = transform::from_tree(&tree)
        .map_err(|err| Error::new(ErrorKind::InvalidOperation, err.to_string()))?;
    let mut pages = Vec::new();
    collect_pages(&package, "README.md".to_owned(), &mut pages);
    tracing::trace!(pages = pages.len(), root = %package.name, "pages laid out");
    Ok(Value::from_serialize(&pages))
}

/// Keep `#` keys and nested mappings; drop plain configuration values.
fn raw_tree(node: &Value, path: &str) -> Result<Json, Error> {
    if node.kind() != ValueKind::Map {
        return to_json(node, path);
    }
    let mut tree = Map::new();
    for (key, value) in entries(node)? {
        let here = format!("{path}.{key}");
        if key.starts_with('#') {
            let payload = to_json(&value, &here)?;
            tree.insert(key, payload);
        } else if value.kind() == ValueKind::Map {
            let nested = raw_tree(&value, &here)?;
            tree.insert(key, nested);
        } else if value.is_undefined() {
            return Err(undefined(&here));
        }
    }
    Ok(Json::Object(tree))
}

fn to_json(value: &Value, path: &str) -> Result<Json, Error> {
    match value.kind() {
        ValueKind::Undefined => Err(undefined(path)),
        ValueKind::None => Ok(Json::Null),
        ValueKind::Seq => {
            let items = value
                .try_iter()?
                .enumerate()
                .map(|(index, item)| to_json(&item, &format!("{path}[{index}]")))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Json::Array(items))
        }
        ValueKind::Map => {
            let mut map = Map::new();
            for (key, item) in entries(value)? {
                let converted = to_json(&item, &format!("{path}.{key}"))?;
                map.insert(key, converted);
            }
            Ok(Json::Object(map))
        }
        _ => serde_json::to_value(value).map_err(|err| {
            Error::new(
                ErrorKind::BadSerialization,
                format!("{path} cannot be written as JSON"),
            )
            .with_source(err)
        }),
    }
}

/// Entries of a mapping in declaration order.
fn entries(map: &Value) -> Result<Vec<(String, Value)>, Error> {
    let mut entries = Vec::new();
    for key in map.try_iter()? {
        let value = map.get_item(&key)?;
        let name = match key.as_str() {
            Some(name) => name.to_owned(),
            None => key.to_string(),
        };
        entries.push((name, value));
    }
    if *LITERALS_REVERSED {
        entries.reverse();
    }
    Ok(entries)
}

fn undefined(path: &str) -> Error {
    Error::new(ErrorKind::UndefinedError, format!("{path} is undefined"))
}

/// One output file. Every key is always present so templates never need to
/// test for definedness.
#[derive(Debug, Serialize)]
struct Page<'a> {
    path: String,
    package: PackageView<'a>,
}

#[derive(Debug, Serialize)]
struct PackageView<'a> {
    name: &'a str,
    import: &'a str,
    help: &'a str,
    url: Option<&'a str>,
    version: Option<&'a str>,
    subpackages: Vec<Link<'a>>,
    fields: Vec<FieldView<'a>>,
}

#[derive(Debug, Serialize)]
struct Link<'a> {
    name: &'a str,
    path: String,
}

#[derive(Debug, Serialize)]
struct FieldView<'a> {
    name: &'a str,
    path: String,
    kind: &'static str,
    help: &'a str,
    #[serde(rename = "type")]
    ty: &'static str,
    default: Option<String>,
    args: Vec<ArgView<'a>>,
    fields: Vec<FieldView<'a>>,
}

#[derive(Debug, Serialize)]
struct ArgView<'a> {
    name: &'a str,
    #[serde(rename = "type")]
    ty: &'static str,
    default: Option<String>,
}

fn page_path(package: &Package) -> String {
    format!("{}.md", package.name)
}

fn collect_pages<'a>(package: &'a Package, path: String, pages: &mut Vec<Page<'a>>) {
    pages.push(Page {
        path,
        package: package_view(package),
    });
    for sub in &package.sub {
        collect_pages(sub, page_path(sub), pages);
    }
}

fn package_view(package: &Package) -> PackageView<'_> {
    PackageView {
        name: &package.name,
        import: &package.import,
        help: &package.help,
        url: package.url.as_deref(),
        version: package.version.as_deref(),
        subpackages: package
            .sub
            .iter()
            .map(|sub| Link {
                name: &sub.name,
                path: page_path(sub),
            })
            .collect(),
        fields: package
            .api
            .iter()
            .map(|field| field_view(field, ""))
            .collect(),
    }
}

fn field_view<'a>(field: &'a Field, parent: &str) -> FieldView<'a> {
    let path = if parent.is_empty() {
        field.name.clone()
    } else {
        format!("{parent}.{}", field.name)
    };
    let mut view = FieldView {
        name: &field.name,
        path,
        kind: "",
        help: field.help(),
        ty: "",
        default: None,
        args: Vec::new(),
        fields: Vec::new(),
    };
    match &field.kind {
        FieldKind::Function(function) => {
            view.kind = "fn";
            view.ty = "function";
            view.args = function.args.iter().map(arg_view).collect();
        }
        FieldKind::Object(object) => {
            view.kind = "obj";
            view.ty = "object";
            view.fields = object
                .fields
                .iter()
                .map(|nested| field_view(nested, &view.path))
                .collect();
        }
        FieldKind::Value(value) => {
            view.kind = "val";
            view.ty = value.ty.as_str();
            view.default = value.default.as_ref().map(Json::to_string);
        }
    }
    view
}

fn arg_view(arg: &Argument) -> ArgView<'_> {
    ArgView {
        name: &arg.name,
        ty: arg.ty.as_str(),
        default: arg.default.as_ref().map(Json::to_string),
    }
}
