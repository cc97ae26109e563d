//! Runtime type classification for dynamic configuration values.
//!
//! Most setters are statically typed. Values read from JSON documents or
//! supplied as raw floating point numbers are only known at runtime, and
//! [`ValueKind`] is what those setters use to reject malformed input with a
//! descriptive [`ConfigError`](crate::ConfigError).

use std::fmt;

use serde_json::Value;

/// The semantic type of a dynamic value.
///
/// `Null` is distinct from `Object` and `NaN` is distinct from `Number`.
/// `Undefined` stands for a value that is absent altogether.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// No value at all.
    Undefined,
    /// An explicit `null`.
    Null,
    /// `true` or `false`.
    Boolean,
    /// A finite or infinite number.
    Number,
    /// A number that is not a number.
    NaN,
    /// A string.
    String,
    /// An ordered list of values.
    Array,
    /// A key-value mapping.
    Object,
}

impl ValueKind {
    /// Classifies an optional JSON value.
    ///
    /// # Example
    ///
    /// ```rust
    /// use pika::ValueKind;
    /// use serde_json::json;
    ///
    /// assert_eq!(ValueKind::of(None), ValueKind::Undefined);
    /// assert_eq!(ValueKind::of(Some(&json!(null))), ValueKind::Null);
    /// assert_eq!(ValueKind::of(Some(&json!({"a": 1}))), ValueKind::Object);
    /// ```
    #[must_use]
    pub const fn of(value: Option<&Value>) -> Self {
        match value {
            None => Self::Undefined,
            Some(Value::Null) => Self::Null,
            Some(Value::Bool(_)) => Self::Boolean,
            Some(Value::Number(_)) => Self::Number,
            Some(Value::String(_)) => Self::String,
            Some(Value::Array(_)) => Self::Array,
            Some(Value::Object(_)) => Self::Object,
        }
    }

    /// Classifies a raw floating point number.
    ///
    /// JSON cannot carry NaN, so this is the only way to obtain [`ValueKind::NaN`].
    #[must_use]
    pub fn of_f64(value: f64) -> Self {
        if value.is_nan() {
            Self::NaN
        } else {
            Self::Number
        }
    }

    /// Returns the lower-case name of this kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Boolean => "boolean",
            Self::Number => "number",
            Self::NaN => "NaN",
            Self::String => "string",
            Self::Array => "array",
            Self::Object => "object",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
