//! Conversion of the raw documentation tree into the object model.
//!
//! The raw tree is the JSON written by the extraction driver. Every mapping
//! is classified by its `#` keys:
//!
//! * `"#"` holds `{"info": ...}` and makes the mapping a package;
//! * `"#name"` holds exactly one of `function`, `object`, `value` or `meta`;
//! * a bare `"name"` mapping is either a nested package, the children of an
//!   `object` marker, or an undocumented object that may contain documented
//!   fields further down.
//!
//! Entries are visited in raw order, so identical input yields identical
//! output.

use serde::Deserialize;
use serde_json::{Map, Value as Json, json};

use crate::domain::errors::TransformError;
use crate::domain::model::{Argument, Field, FieldKind, Function, Object, Package, Value};

/// Path reported for the root of a tree.
pub(crate) const ROOT: &str = "package";

/// Parse and convert a raw documentation tree.
pub fn transform(raw: &str) -> Result<Package, TransformError> {
    let tree: Json = serde_json::from_str(raw).map_err(TransformError::Malformed)?;
    from_tree(&tree)
}

/// Convert an already parsed raw tree.
pub(crate) fn from_tree(tree: &Json) -> Result<Package, TransformError> {
    load_package(tree, ROOT)
}

/// Encode `package` back into the raw tree shape accepted by [`transform`].
pub fn to_raw(package: &Package) -> Json {
    let mut info = Map::new();
    info.insert("name".into(), Json::from(package.name.as_str()));
    insert_text(&mut info, "import", &package.import);
    insert_text(&mut info, "help", &package.help);
    if let Some(url) = &package.url {
        info.insert("url".into(), Json::from(url.as_str()));
    }
    if let Some(version) = &package.version {
        info.insert("version".into(), Json::from(version.as_str()));
    }

    let mut node = Map::new();
    node.insert("#".into(), json!({ "info": info }));
    for (name, payload) in &package.metadata {
        node.insert(format!("#{name}"), json!({ "meta": payload }));
    }
    encode_fields(&mut node, &package.api);
    for sub in &package.sub {
        node.insert(sub.name.clone(), to_raw(sub));
    }
    Json::Object(node)
}

/// Payload of the package marker.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Info {
    name: String,
    #[serde(default)]
    import: String,
    #[serde(default)]
    help: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    version: Option<String>,
}

/// Payload of the object marker; the fields live in the sibling mapping.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ObjectDoc {
    #[serde(default)]
    help: String,
}

enum Marker<'a> {
    Info(&'a Json),
    Function(&'a Json),
    Object(&'a Json),
    Value(&'a Json),
    Meta(&'a Json),
}

impl<'a> Marker<'a> {
    fn parse(node: &'a Json, path: &str) -> Result<Self, TransformError> {
        let map = expect_mapping(node, path, "documentation marker")?;
        let mut entries = map.iter();
        let (key, payload) = match (entries.next(), entries.next()) {
            (Some(entry), None) => entry,
            _ => return Err(unknown_kind(map, path)),
        };
        match key.as_str() {
            "info" => Ok(Marker::Info(payload)),
            "function" => Ok(Marker::Function(payload)),
            "object" => Ok(Marker::Object(payload)),
            "value" => Ok(Marker::Value(payload)),
            "meta" => Ok(Marker::Meta(payload)),
            _ => Err(unknown_kind(map, path)),
        }
    }
}

enum Entry<'a> {
    Field(Field),
    Meta(&'a str, &'a Json),
    Package(Package),
    Skip,
}

fn load_package(node: &Json, path: &str) -> Result<Package, TransformError> {
    let map = expect_mapping(node, path, "package mapping")?;
    let info = match map.get("#") {
        Some(doc) => match Marker::parse(doc, &child(path, "#"))? {
            Marker::Info(payload) => parse_doc::<Info>(payload, path, "package info")?,
            _ => {
                return Err(TransformError::MissingPackageInfo {
                    path: path.to_owned(),
                });
            }
        },
        None => {
            return Err(TransformError::MissingPackageInfo {
                path: path.to_owned(),
            });
        }
    };

    let mut package = Package::new(info.name);
    package.import = info.import;
    package.help = info.help;
    package.url = info.url;
    package.version = info.version;

    for (key, value) in map {
        if key == "#" {
            continue;
        }
        match classify(map, key, value, path)? {
            Entry::Field(field) => package.api.push(field),
            Entry::Meta(name, payload) => {
                package.metadata.insert(name.to_owned(), payload.clone());
            }
            Entry::Package(sub) => package.sub.push(sub),
            Entry::Skip => {}
        }
    }

    tracing::trace!(path, name = %package.name, "package converted");
    Ok(package)
}

fn load_fields(node: &Json, path: &str) -> Result<Vec<Field>, TransformError> {
    let map = expect_mapping(node, path, "object mapping")?;
    let mut fields = Vec::new();
    for (key, value) in map {
        match classify(map, key, value, path)? {
            Entry::Field(field) => fields.push(field),
            Entry::Meta(..) => {
                return Err(misplaced(&child(path, key), "metadata"));
            }
            Entry::Package(_) => {
                return Err(misplaced(&child(path, key), "nested package"));
            }
            Entry::Skip => {}
        }
    }
    Ok(fields)
}

fn classify<'a>(
    siblings: &'a Map<String, Json>,
    key: &'a str,
    value: &'a Json,
    path: &str,
) -> Result<Entry<'a>, TransformError> {
    let here = child(path, key);

    if let Some(name) = key.strip_prefix('#') {
        if name.is_empty() {
            return Err(misplaced(&here, "package info"));
        }
        return match Marker::parse(value, &here)? {
            Marker::Info(_) => Err(misplaced(&here, "package info")),
            Marker::Meta(payload) => Ok(Entry::Meta(name, payload)),
            Marker::Function(payload) => {
                let function = parse_doc::<Function>(payload, &here, "function")?;
                Ok(Entry::Field(Field::new(name, FieldKind::Function(function))))
            }
            Marker::Value(payload) => {
                let value = parse_doc::<Value>(payload, &here, "value")?;
                Ok(Entry::Field(Field::new(name, FieldKind::Value(value))))
            }
            Marker::Object(payload) => {
                let doc = parse_doc::<ObjectDoc>(payload, &here, "object")?;
                let fields = match siblings.get(name) {
                    Some(children) => load_fields(children, &child(path, name))?,
                    None => Vec::new(),
                };
                Ok(Entry::Field(Field::new(
                    name,
                    FieldKind::Object(Object {
                        help: doc.help,
                        fields,
                    }),
                )))
            }
        };
    }

    let map = expect_mapping(value, &here, "mapping")?;
    let is_package = map.contains_key("#");

    if let Some(doc) = siblings.get(&format!("#{key}")) {
        let documents_children =
            !is_package && matches!(Marker::parse(doc, &here), Ok(Marker::Object(_)));
        if documents_children {
            return Ok(Entry::Skip);
        }
        return Err(TransformError::DuplicateField {
            path: path.to_owned(),
            name: key.to_owned(),
        });
    }

    if is_package {
        return load_package(value, &here).map(Entry::Package);
    }

    let fields = load_fields(value, &here)?;
    if fields.is_empty() {
        tracing::debug!(path = %here, "skipping undocumented mapping");
        return Ok(Entry::Skip);
    }
    Ok(Entry::Field(Field::new(
        key,
        FieldKind::Object(Object {
            help: String::new(),
            fields,
        }),
    )))
}

fn parse_doc<'de, T: Deserialize<'de>>(
    payload: &'de Json,
    path: &str,
    kind: &'static str,
) -> Result<T, TransformError> {
    T::deserialize(payload).map_err(|source| TransformError::InvalidDoc {
        path: path.to_owned(),
        kind,
        source,
    })
}

fn expect_mapping<'a>(
    node: &'a Json,
    path: &str,
    expected: &'static str,
) -> Result<&'a Map<String, Json>, TransformError> {
    node.as_object()
        .ok_or_else(|| TransformError::UnexpectedShape {
            path: path.to_owned(),
            expected,
            found: kind_name(node),
        })
}

fn kind_name(node: &Json) -> &'static str {
    match node {
        Json::Null => "null",
        Json::Bool(_) => "bool",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "mapping",
    }
}

fn unknown_kind(map: &Map<String, Json>, path: &str) -> TransformError {
    TransformError::UnknownNodeKind {
        path: path.to_owned(),
        keys: map.keys().cloned().collect(),
    }
}

fn misplaced(path: &str, what: &'static str) -> TransformError {
    TransformError::Misplaced {
        path: path.to_owned(),
        what,
    }
}

fn child(path: &str, key: &str) -> String {
    format!("{path}.{key}")
}

fn insert_text(map: &mut Map<String, Json>, key: &str, text: &str) {
    if !text.is_empty() {
        map.insert(key.to_owned(), Json::from(text));
    }
}

fn encode_fields(node: &mut Map<String, Json>, fields: &[Field]) {
    for field in fields {
        let (marker, children) = match &field.kind {
            FieldKind::Function(function) => (json!({ "function": encode_function(function) }), None),
            FieldKind::Value(value) => (json!({ "value": encode_value(value) }), None),
            FieldKind::Object(object) => {
                let mut doc = Map::new();
                insert_text(&mut doc, "help", &object.help);
                let children = (!object.fields.is_empty()).then(|| {
                    let mut children = Map::new();
                    encode_fields(&mut children, &object.fields);
                    Json::Object(children)
                });
                (json!({ "object": doc }), children)
            }
        };
        node.insert(format!("#{}", field.name), marker);
        if let Some(children) = children {
            node.insert(field.name.clone(), children);
        }
    }
}

fn encode_function(function: &Function) -> Json {
    let mut doc = Map::new();
    insert_text(&mut doc, "help", &function.help);
    if !function.args.is_empty() {
        let args = function.args.iter().map(encode_argument).collect();
        doc.insert("args".into(), Json::Array(args));
    }
    Json::Object(doc)
}

fn encode_argument(arg: &Argument) -> Json {
    let mut doc = Map::new();
    doc.insert("name".into(), Json::from(arg.name.as_str()));
    doc.insert("type".into(), Json::from(arg.ty.as_str()));
    if let Some(default) = &arg.default {
        doc.insert("default".into(), default.clone());
    }
    if let Some(enums) = &arg.enums {
        doc.insert("enums".into(), Json::Array(enums.clone()));
    }
    Json::Object(doc)
}

fn encode_value(value: &Value) -> Json {
    let mut doc = Map::new();
    insert_text(&mut doc, "help", &value.help);
    doc.insert("type".into(), Json::from(value.ty.as_str()));
    if let Some(default) = &value.default {
        doc.insert("default".into(), default.clone());
    }
    Json::Object(doc)
}
