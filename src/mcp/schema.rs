//! Parameter schemas and argument validation.
//!
//! Every capability declares an ordered list of [`ParamSpec`]s. Incoming
//! arguments are checked against that list by [`validate`], which collects
//! every problem instead of stopping at the first one, so a caller can fix
//! all of them in a single round trip.
//!
//! Type checks are strict, with one exception: a numeric-looking string is
//! accepted where the schema asks for a number.

use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::mcp::error::HandlerError;

/// The type of a declared parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    /// A JSON string.
    String,
    /// A JSON number, or a string holding one.
    Number,
    /// A JSON boolean.
    Boolean,
    /// A JSON object.
    Object,
}

impl ParamType {
    /// Returns the JSON Schema type name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Object => "object",
        }
    }

    /// Checks a raw value against this type, returning the typed value.
    fn coerce(self, value: &Value) -> Option<ArgValue> {
        match (self, value) {
            (Self::String, Value::String(s)) => Some(ArgValue::String(s.clone())),
            (Self::Number, Value::Number(n)) => n.as_f64().map(ArgValue::Number),
            (Self::Number, Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .map(ArgValue::Number),
            (Self::Boolean, Value::Bool(b)) => Some(ArgValue::Boolean(*b)),
            (Self::Object, Value::Object(map)) => Some(ArgValue::Object(map.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single declared parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    /// Parameter name, as it appears in the arguments object.
    pub name: String,
    /// Expected type.
    pub ty: ParamType,
    /// Human-readable description shown during discovery.
    pub description: String,
    /// Whether the parameter must be present.
    pub required: bool,
}

impl ParamSpec {
    /// Declares a required parameter.
    #[must_use]
    pub fn required(name: impl Into<String>, ty: ParamType, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty,
            description: description.into(),
            required: true,
        }
    }

    /// Declares an optional parameter.
    #[must_use]
    pub fn optional(name: impl Into<String>, ty: ParamType, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty,
            description: description.into(),
            required: false,
        }
    }
}

/// Builds the JSON Schema object advertised for a parameter list.
#[must_use]
pub fn input_schema(params: &[ParamSpec]) -> Value {
    let properties: Map<String, Value> = params
        .iter()
        .map(|p| {
            (
                p.name.clone(),
                json!({
                    "type": p.ty.as_str(),
                    "description": p.description,
                }),
            )
        })
        .collect();

    let required: Vec<&str> = params
        .iter()
        .filter(|p| p.required)
        .map(|p| p.name.as_str())
        .collect();

    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

/// A validated, typed argument value.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    /// A string value.
    String(String),
    /// A numeric value.
    Number(f64),
    /// A boolean value.
    Boolean(bool),
    /// An object value.
    Object(Map<String, Value>),
}

/// Validated arguments, in declaration order.
///
/// Only declared parameters are kept; unknown fields are dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    values: IndexMap<String, ArgValue>,
}

impl Arguments {
    /// Returns a string parameter, if present and a string.
    #[must_use]
    pub fn str(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(ArgValue::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Returns a string parameter or fails with a handler error.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError::Failed`] if the parameter is absent or not a string.
    pub fn require_str(&self, name: &str) -> Result<&str, HandlerError> {
        self.str(name)
            .ok_or_else(|| HandlerError::Failed(format!("missing string argument '{name}'")))
    }

    /// Number of validated arguments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if no arguments were supplied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<(String, ArgValue)> for Arguments {
    fn from_iter<I: IntoIterator<Item = (String, ArgValue)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// What is wrong with a single field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "error")]
pub enum FieldErrorKind {
    /// A required field was absent.
    MissingRequired,
    /// A field was present with an incompatible type.
    TypeMismatch {
        /// The declared type.
        expected: ParamType,
        /// The JSON type that was supplied.
        found: &'static str,
    },
}

/// A field-level validation error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// The offending field.
    pub field: String,
    /// What is wrong with it.
    #[serde(flatten)]
    pub kind: FieldErrorKind,
}

impl FieldError {
    /// Creates a new field error.
    #[must_use]
    pub fn new(field: impl Into<String>, kind: FieldErrorKind) -> Self {
        Self {
            field: field.into(),
            kind,
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            FieldErrorKind::MissingRequired => {
                write!(f, "missing required field \"{}\"", self.field)
            }
            FieldErrorKind::TypeMismatch { expected, found } => write!(
                f,
                "field \"{}\" must be a {expected}, got {found}",
                self.field
            ),
        }
    }
}

/// Outcome of argument validation.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationResult {
    /// Every declared parameter checked out.
    Valid(Arguments),
    /// One entry per problem found.
    Invalid(Vec<FieldError>),
}

impl ValidationResult {
    /// Converts into a `Result`.
    ///
    /// # Errors
    ///
    /// Returns the field errors if validation failed.
    pub fn into_result(self) -> Result<Arguments, Vec<FieldError>> {
        match self {
            Self::Valid(args) => Ok(args),
            Self::Invalid(errors) => Err(errors),
        }
    }
}

const fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Validates raw arguments against a declared parameter list.
///
/// An explicit `null` counts as absent for optional parameters and as a type
/// mismatch for required ones.
#[must_use]
pub fn validate(params: &[ParamSpec], raw: &Map<String, Value>) -> ValidationResult {
    let mut values = IndexMap::with_capacity(params.len());
    let mut errors = Vec::new();

    for param in params {
        match raw.get(&param.name) {
            None | Some(Value::Null) if !param.required => {}
            None => {
                errors.push(FieldError::new(&param.name, FieldErrorKind::MissingRequired));
            }
            Some(value) => match param.ty.coerce(value) {
                Some(typed) => {
                    values.insert(param.name.clone(), typed);
                }
                None => errors.push(FieldError::new(
                    &param.name,
                    FieldErrorKind::TypeMismatch {
                        expected: param.ty,
                        found: json_type_name(value),
                    },
                )),
            },
        }
    }

    if errors.is_empty() {
        ValidationResult::Valid(Arguments { values })
    } else {
        ValidationResult::Invalid(errors)
    }
}
