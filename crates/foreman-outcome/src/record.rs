//! Individual error records.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Classification of an error record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    /// Input casting or validation failure. Always path-scoped.
    Data,
    /// Business-rule violation raised deliberately by command logic.
    Runtime,
    /// Unexpected fault caught by the lifecycle.
    System,
}

impl ErrorCategory {
    /// Returns the lowercase name used in keys and serialized output.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Data => "data",
            ErrorCategory::Runtime => "runtime",
            ErrorCategory::System => "system",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One step of an error path: a named attribute or a position in a list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(key) => f.write_str(key),
            PathSegment::Index(index) => write!(f, "{}", index),
        }
    }
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        PathSegment::Key(key.to_string())
    }
}

impl From<String> for PathSegment {
    fn from(key: String) -> Self {
        PathSegment::Key(key)
    }
}

impl From<&String> for PathSegment {
    fn from(key: &String) -> Self {
        PathSegment::Key(key.clone())
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        PathSegment::Index(index)
    }
}

/// A single structured error.
///
/// Records serialize to
/// `{category, symbol, path, message, context, runtime_path, is_fatal}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub category: ErrorCategory,
    /// Stable machine-readable identifier, e.g. `"invalid_age"`.
    pub symbol: String,
    /// Location of the error within nested inputs. Empty for non-field errors.
    #[serde(default)]
    pub path: Vec<PathSegment>,
    pub message: String,
    /// Supplementary values for diagnostics.
    #[serde(default)]
    pub context: Map<String, Value>,
    /// Command names on the subcommand stack when the error was raised.
    #[serde(default)]
    pub runtime_path: Vec<String>,
    /// Fatal records halt the run that adds them.
    #[serde(default)]
    pub is_fatal: bool,
}

impl ErrorRecord {
    /// Creates a record with the given category and no path or context.
    pub fn new(
        category: ErrorCategory,
        symbol: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            symbol: symbol.into(),
            path: Vec::new(),
            message: message.into(),
            context: Map::new(),
            runtime_path: Vec::new(),
            is_fatal: false,
        }
    }

    /// Creates a `data` record scoped to an input path.
    pub fn data(
        path: Vec<PathSegment>,
        symbol: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(ErrorCategory::Data, symbol, message).with_path(path)
    }

    /// Creates a `runtime` record.
    pub fn runtime(symbol: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Runtime, symbol, message)
    }

    /// Creates a `system` record. System records are always fatal.
    pub fn system(symbol: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::System, symbol, message).fatal()
    }

    /// Sets the path.
    pub fn with_path(mut self, path: Vec<PathSegment>) -> Self {
        self.path = path;
        self
    }

    /// Adds a context entry.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Sets the runtime path.
    pub fn with_runtime_path(mut self, runtime_path: Vec<String>) -> Self {
        self.runtime_path = runtime_path;
        self
    }

    /// Marks the record as fatal.
    pub fn fatal(mut self) -> Self {
        self.is_fatal = true;
        self
    }

    /// Adds a context entry to an existing record.
    pub fn insert_context(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Returns the identity key: `category.path.symbol`.
    ///
    /// The path segments are joined with `.`; an empty path leaves two
    /// adjacent separators (`runtime..not_found`).
    pub fn key(&self) -> String {
        let path = self
            .path
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(".");
        format!("{}.{}.{}", self.category, path, self.symbol)
    }

    /// Returns the path joined with `.`.
    pub fn path_string(&self) -> String {
        self.path
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "[{}] {}: {}", self.category, self.symbol, self.message)
        } else {
            write!(
                f,
                "[{}] {} at {}: {}",
                self.category,
                self.symbol,
                self.path_string(),
                self.message
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_with_path() {
        let record = ErrorRecord::data(
            vec!["items".into(), 3usize.into(), "sku".into()],
            "missing_required_attribute",
            "sku is required",
        );
        assert_eq!(record.key(), "data.items.3.sku.missing_required_attribute");
    }

    #[test]
    fn test_key_without_path() {
        let record = ErrorRecord::runtime("not_found", "no such account");
        assert_eq!(record.key(), "runtime..not_found");
    }

    #[test]
    fn test_system_records_are_fatal() {
        assert!(ErrorRecord::system("execution_error", "boom").is_fatal);
        assert!(!ErrorRecord::runtime("warn", "careful").is_fatal);
    }

    #[test]
    fn test_serialization_contract() {
        let record = ErrorRecord::data(vec!["age".into()], "invalid_age", "must be positive")
            .with_context("value", -1)
            .with_runtime_path(vec!["Signup".into()]);

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["category"], "data");
        assert_eq!(value["symbol"], "invalid_age");
        assert_eq!(value["path"], json!(["age"]));
        assert_eq!(value["message"], "must be positive");
        assert_eq!(value["context"], json!({"value": -1}));
        assert_eq!(value["runtime_path"], json!(["Signup"]));
        assert_eq!(value["is_fatal"], false);
    }

    #[test]
    fn test_index_segments_serialize_as_numbers() {
        let record = ErrorRecord::data(vec!["tags".into(), 0usize.into()], "too_long", "x");
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["path"], json!(["tags", 0]));

        let back: ErrorRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back.path[1], PathSegment::Index(0));
    }

    #[test]
    fn test_display() {
        let record = ErrorRecord::data(vec!["age".into()], "invalid_age", "must be positive");
        assert_eq!(record.to_string(), "[data] invalid_age at age: must be positive");

        let record = ErrorRecord::runtime("warn", "careful");
        assert_eq!(record.to_string(), "[runtime] warn: careful");
    }

    #[test]
    fn test_insert_context_in_place() {
        let mut record = ErrorRecord::runtime("insufficient_funds", "balance too low");
        record.insert_context("balance", 10).insert_context("requested", 25);
        assert_eq!(record.context["balance"], 10);
        assert_eq!(record.context["requested"], 25);
    }
}
