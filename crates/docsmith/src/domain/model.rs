//! Documentation object model produced by the transform stage.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

/// A documented package: the root of an entry template or a nested package.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Package {
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub import: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub help: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Documented fields, in declaration order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub api: Vec<Field>,
    /// Nested packages, in declaration order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sub: Vec<Package>,
    /// Free-form metadata attached with `meta` markers.
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Json>,
}

impl Package {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            import: String::new(),
            help: String::new(),
            url: None,
            version: None,
            api: Vec::new(),
            sub: Vec::new(),
            metadata: Map::new(),
        }
    }

    /// Look up a top-level field by name.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.api.iter().find(|field| field.name == name)
    }

    /// Look up a nested package by name.
    pub fn subpackage(&self, name: &str) -> Option<&Package> {
        self.sub.iter().find(|pkg| pkg.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    pub name: String,
    #[serde(flatten)]
    pub kind: FieldKind,
}

impl Field {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn help(&self) -> &str {
        match &self.kind {
            FieldKind::Function(function) => &function.help,
            FieldKind::Object(object) => &object.help,
            FieldKind::Value(value) => &value.help,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Function(Function),
    Object(Object),
    Value(Value),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Function {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub help: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<Argument>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Argument {
    pub name: String,
    #[serde(rename = "type", default)]
    pub ty: Type,
    /// `null` and a missing default are the same thing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Json>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enums: Option<Vec<Json>>,
}

/// Documentation for an object. Its fields come from the sibling mapping.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Object {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub help: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Value {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub help: String,
    #[serde(rename = "type", default)]
    pub ty: Type,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Json>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Type {
    #[default]
    Any,
    Array,
    #[serde(rename = "bool", alias = "boolean")]
    Boolean,
    Function,
    Number,
    Object,
    String,
    Null,
}

impl Type {
    pub fn as_str(&self) -> &'static str {
        match self {
            Type::Any => "any",
            Type::Array => "array",
            Type::Boolean => "bool",
            Type::Function => "function",
            Type::Number => "number",
            Type::Object => "object",
            Type::String => "string",
            Type::Null => "null",
        }
    }
}
