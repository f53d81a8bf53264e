//! Attribute values and their declared types.

use serde::{Deserialize, Serialize};

use crate::error::{EvalError, EvalResult};

/// Declared type of an observable's values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Text,
    Integer,
    Decimal,
    Boolean,
    /// A term from a named vocabulary, stored as text.
    Term,
    /// A record identifier, stored as text.
    Identifier,
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Integer => write!(f, "integer"),
            Self::Decimal => write!(f, "decimal"),
            Self::Boolean => write!(f, "boolean"),
            Self::Term => write!(f, "term"),
            Self::Identifier => write!(f, "identifier"),
        }
    }
}

/// A single attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Boolean(bool),
    Integer(i64),
    Decimal(f64),
    Text(String),
}

impl Value {
    /// Text view of the value, if it is textual.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Decimal(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// The name of the variant, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Boolean(_) => "boolean",
            Self::Integer(_) => "integer",
            Self::Decimal(_) => "decimal",
            Self::Text(_) => "text",
        }
    }

    /// Check that this value is representable as `expected`, coercing
    /// integers to decimals where needed.
    pub fn coerce(self, observable: &str, expected: ValueType) -> EvalResult<Value> {
        match (expected, self) {
            (ValueType::Text | ValueType::Term | ValueType::Identifier, v @ Value::Text(_)) => Ok(v),
            (ValueType::Identifier, Value::Integer(i)) => Ok(Value::Text(i.to_string())),
            (ValueType::Integer, v @ Value::Integer(_)) => Ok(v),
            (ValueType::Decimal, v @ Value::Decimal(_)) => Ok(v),
            (ValueType::Decimal, Value::Integer(i)) => Ok(Value::Decimal(i as f64)),
            (ValueType::Boolean, v @ Value::Boolean(_)) => Ok(v),
            (ValueType::Integer, Value::Text(s)) if s.trim().parse::<i64>().is_ok() => {
                Ok(Value::Integer(s.trim().parse().unwrap_or_default()))
            }
            (ValueType::Decimal, Value::Text(s)) if s.trim().parse::<f64>().is_ok() => {
                Ok(Value::Decimal(s.trim().parse().unwrap_or_default()))
            }
            (expected, actual) => Err(EvalError::TypeMismatch {
                observable: observable.to_string(),
                expected: expected.to_string(),
                actual: actual.kind().to_string(),
            }),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Decimal(d) => write!(f, "{d}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Self::Decimal(d)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_coerce_to_decimals() {
        let v = Value::Integer(3).coerce("weight", ValueType::Decimal).unwrap();
        assert_eq!(v, Value::Decimal(3.0));
    }

    #[test]
    fn numeric_text_coerces_to_integer() {
        let v = Value::from(" 42 ").coerce("priority", ValueType::Integer).unwrap();
        assert_eq!(v, Value::Integer(42));
    }

    #[test]
    fn mismatched_type_is_reported() {
        let err = Value::Boolean(true)
            .coerce("scientificName", ValueType::Text)
            .unwrap_err();
        assert!(matches!(err, EvalError::TypeMismatch { .. }));
    }
}
