//! Declared input shapes and casting.
//!
//! A command declares its inputs as an [`InputSchema`]. Before the raw
//! inputs are deserialized into the command's typed `Inputs`, the schema
//! casts them (numeric and boolean strings, defaults, nested objects and
//! lists) and checks constraints. Every invalid field yields one `data`
//! error scoped to the field's path, so a caller sees all problems at once
//! rather than the first serde complaint.
//!
//! ```rust
//! use foreman::{Field, InputSchema};
//! use serde_json::json;
//!
//! let schema = InputSchema::new()
//!     .field(Field::string("name").required())
//!     .field(Field::integer("age").min(0.0));
//!
//! let cast = schema.cast(json!({"name": "Ada", "age": "36"}).as_object().unwrap());
//! assert_eq!(cast.unwrap()["age"], json!(36));
//! ```

use foreman_outcome::{ErrorRecord, PathSegment};
use serde::Serialize;
use serde_json::{Map, Number, Value};
use std::collections::BTreeSet;

use crate::symbols;

/// The kind of value a field holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Integer,
    Float,
    Boolean,
    Array,
    Object,
    Any,
}

/// A check applied after casting.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Constraint {
    Min(f64),
    Max(f64),
    MinLength(usize),
    MaxLength(usize),
    OneOf(Vec<Value>),
}

impl Constraint {
    fn symbol(&self) -> &'static str {
        match self {
            Constraint::Min(_) => symbols::TOO_SMALL,
            Constraint::Max(_) => symbols::TOO_LARGE,
            Constraint::MinLength(_) => symbols::TOO_SHORT,
            Constraint::MaxLength(_) => symbols::TOO_LONG,
            Constraint::OneOf(_) => symbols::NOT_ONE_OF,
        }
    }

    /// Returns an error record if `value` violates the constraint.
    fn check(&self, value: &Value, path: &[PathSegment]) -> Option<ErrorRecord> {
        let violation = match self {
            Constraint::Min(min) => value
                .as_f64()
                .filter(|n| n < min)
                .map(|_| (format!("must be at least {}", min), Value::from(*min))),
            Constraint::Max(max) => value
                .as_f64()
                .filter(|n| n > max)
                .map(|_| (format!("must be at most {}", max), Value::from(*max))),
            Constraint::MinLength(min) => length(value)
                .filter(|len| len < min)
                .map(|_| (format!("must have at least {} elements", min), Value::from(*min))),
            Constraint::MaxLength(max) => length(value)
                .filter(|len| len > max)
                .map(|_| (format!("must have at most {} elements", max), Value::from(*max))),
            Constraint::OneOf(allowed) => (!allowed.contains(value)).then(|| {
                (
                    format!("must be one of {}", Value::from(allowed.clone())),
                    Value::from(allowed.clone()),
                )
            }),
        }?;

        let (message, limit) = violation;
        Some(
            ErrorRecord::data(path.to_vec(), self.symbol(), message)
                .with_context("value", value.clone())
                .with_context("constraint", limit),
        )
    }
}

fn length(value: &Value) -> Option<usize> {
    match value {
        Value::String(s) => Some(s.chars().count()),
        Value::Array(items) => Some(items.len()),
        Value::Object(map) => Some(map.len()),
        _ => None,
    }
}

/// One declared input attribute.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<Constraint>,
    /// Element shape of an array field.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Field>>,
    /// Nested shape of an object field.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<InputSchema>,
}

impl Field {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: false,
            default: None,
            description: None,
            constraints: Vec::new(),
            items: None,
            schema: None,
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::String)
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Integer)
    }

    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Float)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Boolean)
    }

    pub fn any(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Any)
    }

    /// A list whose elements are cast with `items`. The item's name is only
    /// used for documentation.
    pub fn array(name: impl Into<String>, items: Field) -> Self {
        let mut field = Self::new(name, FieldType::Array);
        field.items = Some(Box::new(items));
        field
    }

    pub fn object(name: impl Into<String>, schema: InputSchema) -> Self {
        let mut field = Self::new(name, FieldType::Object);
        field.schema = Some(schema);
        field
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Value used when the attribute is absent or null.
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn min(self, min: f64) -> Self {
        self.constrain(Constraint::Min(min))
    }

    pub fn max(self, max: f64) -> Self {
        self.constrain(Constraint::Max(max))
    }

    pub fn min_length(self, min: usize) -> Self {
        self.constrain(Constraint::MinLength(min))
    }

    pub fn max_length(self, max: usize) -> Self {
        self.constrain(Constraint::MaxLength(max))
    }

    pub fn one_of<I, V>(self, allowed: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.constrain(Constraint::OneOf(allowed.into_iter().map(Into::into).collect()))
    }

    pub fn constrain(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    fn cast(&self, value: &Value, path: &[PathSegment], errors: &mut Vec<ErrorRecord>) -> Option<Value> {
        let cast = match self.field_type {
            FieldType::Any => Some(value.clone()),
            FieldType::String => match value {
                Value::String(_) => Some(value.clone()),
                Value::Number(n) => Some(Value::String(n.to_string())),
                Value::Bool(b) => Some(Value::String(b.to_string())),
                _ => None,
            },
            FieldType::Integer => match value {
                Value::Number(n) if n.is_i64() || n.is_u64() => Some(value.clone()),
                Value::Number(n) => n
                    .as_f64()
                    .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                    .map(|f| Value::from(f as i64)),
                Value::String(s) => s.trim().parse::<i64>().ok().map(Value::from),
                _ => None,
            },
            FieldType::Float => match value {
                Value::Number(_) => Some(value.clone()),
                Value::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .and_then(Number::from_f64)
                    .map(Value::Number),
                _ => None,
            },
            FieldType::Boolean => match value {
                Value::Bool(_) => Some(value.clone()),
                Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                    "true" | "t" | "yes" | "y" | "1" => Some(Value::Bool(true)),
                    "false" | "f" | "no" | "n" | "0" => Some(Value::Bool(false)),
                    _ => None,
                },
                Value::Number(n) => match n.as_i64() {
                    Some(0) => Some(Value::Bool(false)),
                    Some(1) => Some(Value::Bool(true)),
                    _ => None,
                },
                _ => None,
            },
            FieldType::Array => match value {
                Value::Array(items) => Some(self.cast_items(items, path, errors)),
                _ => None,
            },
            FieldType::Object => match (value, &self.schema) {
                (Value::Object(map), Some(schema)) => {
                    Some(Value::Object(schema.cast_into(map, path, errors)))
                }
                (Value::Object(_), None) => Some(value.clone()),
                _ => None,
            },
        };

        let Some(cast) = cast else {
            errors.push(
                ErrorRecord::data(
                    path.to_vec(),
                    symbols::CANNOT_CAST,
                    format!("cannot cast {} to {:?}", describe(value), self.field_type).to_lowercase(),
                )
                .with_context("value", value.clone())
                .with_context("expected_type", format!("{:?}", self.field_type).to_lowercase()),
            );
            return None;
        };

        let before = errors.len();
        errors.extend(
            self.constraints
                .iter()
                .filter_map(|constraint| constraint.check(&cast, path)),
        );
        (errors.len() == before).then_some(cast)
    }

    fn cast_items(&self, items: &[Value], path: &[PathSegment], errors: &mut Vec<ErrorRecord>) -> Value {
        let Some(item) = &self.items else {
            return Value::Array(items.to_vec());
        };
        let cast = items
            .iter()
            .enumerate()
            .filter_map(|(index, value)| {
                let mut item_path = path.to_vec();
                item_path.push(PathSegment::Index(index));
                item.cast(value, &item_path, errors)
            })
            .collect();
        Value::Array(cast)
    }

    fn implied_symbols(&self, found: &mut BTreeSet<&'static str>) {
        if self.required && self.default.is_none() {
            found.insert(symbols::MISSING_REQUIRED_ATTRIBUTE);
        }
        if self.field_type != FieldType::Any {
            found.insert(symbols::CANNOT_CAST);
        }
        for constraint in &self.constraints {
            found.insert(constraint.symbol());
        }
        if let Some(item) = &self.items {
            item.implied_symbols(found);
        }
        if let Some(schema) = &self.schema {
            schema.collect_symbols(found);
        }
    }
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// The declared attributes of a command's inputs.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InputSchema {
    pub fields: Vec<Field>,
    /// Pass undeclared attributes through instead of rejecting them.
    pub allow_unknown: bool,
}

impl InputSchema {
    /// An empty schema that rejects every attribute.
    pub fn new() -> Self {
        Self::default()
    }

    /// A schema that declares nothing and passes every attribute through.
    /// Typed deserialization still applies.
    pub fn open() -> Self {
        Self {
            fields: Vec::new(),
            allow_unknown: true,
        }
    }

    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn allow_unknown(mut self) -> Self {
        self.allow_unknown = true;
        self
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Casts raw attributes, returning every data error found.
    pub fn cast(&self, raw: &Map<String, Value>) -> Result<Map<String, Value>, Vec<ErrorRecord>> {
        let mut errors = Vec::new();
        let cast = self.cast_into(raw, &[], &mut errors);
        if errors.is_empty() {
            Ok(cast)
        } else {
            Err(errors)
        }
    }

    fn cast_into(
        &self,
        raw: &Map<String, Value>,
        path: &[PathSegment],
        errors: &mut Vec<ErrorRecord>,
    ) -> Map<String, Value> {
        let mut cast = Map::new();

        for field in &self.fields {
            let mut field_path = path.to_vec();
            field_path.push(PathSegment::Key(field.name.clone()));

            match raw.get(&field.name) {
                None | Some(Value::Null) => {
                    if let Some(default) = &field.default {
                        cast.insert(field.name.clone(), default.clone());
                    } else if field.required {
                        errors.push(ErrorRecord::data(
                            field_path,
                            symbols::MISSING_REQUIRED_ATTRIBUTE,
                            format!("{} is required", field.name),
                        ));
                    }
                }
                Some(value) => {
                    if let Some(value) = field.cast(value, &field_path, errors) {
                        cast.insert(field.name.clone(), value);
                    }
                }
            }
        }

        for (name, value) in raw {
            if self.get(name).is_some() {
                continue;
            }
            if self.allow_unknown {
                cast.insert(name.clone(), value.clone());
            } else {
                let mut field_path = path.to_vec();
                field_path.push(PathSegment::Key(name.clone()));
                errors.push(
                    ErrorRecord::data(
                        field_path,
                        symbols::UNEXPECTED_ATTRIBUTE,
                        format!("unexpected attribute {}", name),
                    )
                    .with_context("value", value.clone()),
                );
            }
        }

        cast
    }

    /// Data error symbols casting against this schema can produce.
    pub fn implied_errors(&self) -> BTreeSet<&'static str> {
        let mut found = BTreeSet::new();
        self.collect_symbols(&mut found);
        found
    }

    fn collect_symbols(&self, found: &mut BTreeSet<&'static str>) {
        if !self.allow_unknown {
            found.insert(symbols::UNEXPECTED_ATTRIBUTE);
        }
        for field in &self.fields {
            field.implied_symbols(found);
        }
    }
}
