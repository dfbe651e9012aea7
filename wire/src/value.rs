use std::collections::HashMap;
use std::fmt;
use std::ops::Index;

/// This type holds dynamic TL data.
///
/// Values mirror the TL scalar set plus vectors and objects. An object carries
/// the output type name of the constructor it was built from and its field
/// values keyed by schema field name.
#[derive(Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i32),
    Long(i64),
    String(String),
    Vector(Vec<Value>),
    Object(String, HashMap<String, Value>),
}

impl Value {
    /// Creates an object with no fields set.
    pub fn object(type_name: &str) -> Value {
        Value::Object(type_name.to_owned(), HashMap::new())
    }

    /// A convenience method to extract the value out of a [Bool](#variant.Bool).
    /// Returns `false` for other value kinds.
    pub fn as_bool(&self) -> bool {
        match *self {
            Value::Bool(value) => value,
            _ => false,
        }
    }

    /// A convenience method to extract the value out of an [Int](#variant.Int).
    /// Returns `0` for other value kinds.
    pub fn as_int(&self) -> i32 {
        match *self {
            Value::Int(value) => value,
            _ => 0,
        }
    }

    /// A convenience method to extract the value out of a [Long](#variant.Long).
    /// Returns `0` for other value kinds.
    pub fn as_long(&self) -> i64 {
        match *self {
            Value::Long(value) => value,
            _ => 0,
        }
    }

    /// A convenience method to extract the value out of a [String](#variant.String).
    /// Returns `""` for other value kinds.
    pub fn as_string(&self) -> &str {
        match *self {
            Value::String(ref value) => value.as_str(),
            _ => "",
        }
    }

    /// A convenience method to get the elements out of a [Vector](#variant.Vector).
    /// Returns an empty slice for other value kinds.
    pub fn as_vector(&self) -> &[Value] {
        match *self {
            Value::Vector(ref values) => values.as_slice(),
            _ => &[],
        }
    }

    /// The output type name of an [Object](#variant.Object), `None` otherwise.
    pub fn type_name(&self) -> Option<&str> {
        match *self {
            Value::Object(ref name, _) => Some(name.as_str()),
            _ => None,
        }
    }

    /// A convenience method to extract the length out of a [Vector](#variant.Vector).
    /// Returns `0` for other value kinds.
    pub fn len(&self) -> usize {
        match *self {
            Value::Vector(ref values) => values.len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A convenience method to append to a [Vector](#variant.Vector). Does
    /// nothing for other value kinds.
    pub fn push(&mut self, value: Value) {
        if let Value::Vector(ref mut values) = *self {
            values.push(value);
        }
    }

    /// A convenience method to extract a field out of an [Object](#variant.Object).
    /// Returns `None` for other value kinds or if the field isn't present.
    pub fn get(&self, name: &str) -> Option<&Value> {
        match *self {
            Value::Object(_, ref fields) => fields.get(name),
            _ => None,
        }
    }

    /// A convenience method to update a field on an [Object](#variant.Object).
    /// Does nothing for other value kinds.
    pub fn set(&mut self, name: &str, value: Value) {
        if let Value::Object(_, ref mut fields) = *self {
            fields.insert(name.to_owned(), value);
        }
    }

    /// Builder-style [set](#method.set).
    pub fn with(mut self, name: &str, value: Value) -> Value {
        self.set(name, value);
        self
    }

    /// A convenience method to remove a field on an [Object](#variant.Object).
    /// Does nothing for other value kinds.
    pub fn remove(&mut self, name: &str) {
        if let Value::Object(_, ref mut fields) = *self {
            fields.remove(name);
        }
    }
}

impl Index<usize> for Value {
    type Output = Value;

    /// A convenience method that adds support for `self[index]` expressions.
    /// It will panic if this value isn't a [Vector](#variant.Vector) or if the
    /// provided index is out of bounds.
    fn index(&self, index: usize) -> &Value {
        match *self {
            Value::Vector(ref values) => &values[index],
            _ => panic!("indexing a non-vector value"),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        match *self {
            Value::Bool(value) => value.fmt(f),
            Value::Int(value) => value.fmt(f),
            Value::Long(value) => value.fmt(f),
            Value::String(ref value) => value.fmt(f),
            Value::Vector(ref values) => values.fmt(f),

            Value::Object(ref name, ref fields) => {
                let mut keys: Vec<_> = fields.keys().collect();
                let mut first = true;
                keys.sort();
                write!(f, "{} {{", name)?;

                for key in keys {
                    if first {
                        first = false;
                    } else {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {:?}", key, fields[key])?;
                }

                write!(f, "}}")
            }
        }
    }
}
