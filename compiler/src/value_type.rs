use std::fmt;

use serde::Serialize;

use crate::error::GramError;

/// The type algebra of schema fields and return clauses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum ValueType {
    String,
    /// `bool` and `false` default to `false`, the `true` pseudo-type to `true`.
    Boolean(bool),
    Int32,
    Int64,
    Vector(Box<ValueType>),
    /// A dotted reference to another schema type, kept as written.
    Named(String),
}

impl ValueType {
    /// Parses a type literal as it appears after `:` or `=`.
    pub fn parse(text: &str) -> Result<ValueType, GramError> {
        let lower = text.to_ascii_lowercase();
        match lower.as_str() {
            "" => Err(GramError::MalformedType(text.to_string())),
            "string" => Ok(ValueType::String),
            "bool" => Ok(ValueType::Boolean(false)),
            "true" => Ok(ValueType::Boolean(true)),
            "false" => Ok(ValueType::Boolean(false)),
            "int" => Ok(ValueType::Int32),
            "long" => Ok(ValueType::Int64),
            _ if lower.starts_with("vector") => match (text.find('<'), text.rfind('>')) {
                (Some(open), Some(close)) if open < close => Ok(ValueType::Vector(Box::new(
                    ValueType::parse(&text[open + 1..close])?,
                ))),
                _ => Err(GramError::MalformedType(text.to_string())),
            },
            _ => Ok(ValueType::Named(text.to_string())),
        }
    }

    /// Only `Named` types take part in polymorphism.
    pub fn is_primitive(&self) -> bool {
        !matches!(self, ValueType::Named(_))
    }

    /// The named type at the bottom of any vector nesting.
    pub fn named_leaf(&self) -> Option<&str> {
        match self {
            ValueType::Named(name) => Some(name),
            ValueType::Vector(inner) => inner.named_leaf(),
            _ => None,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ValueType::String => write!(f, "string"),
            ValueType::Boolean(true) => write!(f, "true"),
            ValueType::Boolean(false) => write!(f, "bool"),
            ValueType::Int32 => write!(f, "int"),
            ValueType::Int64 => write!(f, "long"),
            ValueType::Vector(inner) => write!(f, "Vector<{}>", inner),
            ValueType::Named(name) => write!(f, "{}", name),
        }
    }
}
