//! Core value types: band pixel types, parameter values and parameter types.
//!
//! Parameters, target properties and metadata attributes all carry a
//! [`Value`]. Parameter schemas declare a [`ParamType`], which knows how to
//! convert a default literal (or a caller-supplied string) into a typed value.

use chrono::{NaiveDate, NaiveDateTime};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Canonical textual format for date values.
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Sample type of a band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelType {
    /// Signed 8-bit integer
    Int8,
    /// Unsigned 8-bit integer
    UInt8,
    /// Signed 16-bit integer
    Int16,
    /// Unsigned 16-bit integer
    UInt16,
    /// Signed 32-bit integer
    Int32,
    /// Unsigned 32-bit integer
    UInt32,
    /// 32-bit float
    Float32,
    /// 64-bit float
    Float64,
}

impl PixelType {
    /// Lower-case name, as accepted by [`FromStr`].
    pub fn name(&self) -> &'static str {
        match self {
            PixelType::Int8 => "int8",
            PixelType::UInt8 => "uint8",
            PixelType::Int16 => "int16",
            PixelType::UInt16 => "uint16",
            PixelType::Int32 => "int32",
            PixelType::UInt32 => "uint32",
            PixelType::Float32 => "float32",
            PixelType::Float64 => "float64",
        }
    }

    /// Size of one sample in bytes.
    pub fn size_bytes(&self) -> usize {
        match self {
            PixelType::Int8 | PixelType::UInt8 => 1,
            PixelType::Int16 | PixelType::UInt16 => 2,
            PixelType::Int32 | PixelType::UInt32 | PixelType::Float32 => 4,
            PixelType::Float64 => 8,
        }
    }

    /// Whether samples are floating point.
    pub fn is_float(&self) -> bool {
        matches!(self, PixelType::Float32 | PixelType::Float64)
    }

    /// All pixel types.
    pub fn all() -> &'static [PixelType] {
        &[
            PixelType::Int8,
            PixelType::UInt8,
            PixelType::Int16,
            PixelType::UInt16,
            PixelType::Int32,
            PixelType::UInt32,
            PixelType::Float32,
            PixelType::Float64,
        ]
    }
}

impl fmt::Display for PixelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for PixelType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        PixelType::all()
            .iter()
            .find(|t| t.name() == lower)
            .copied()
            .ok_or_else(|| format!("unknown pixel type '{}'", s))
    }
}

/// A parameter, property or attribute value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data")]
pub enum Value {
    /// 64-bit signed integer
    Integer(i64),
    /// 64-bit floating point number
    Float(f64),
    /// UTF-8 string
    String(String),
    /// Boolean value
    Boolean(bool),
    /// Single character
    Char(char),
    /// Date and time without zone
    Date(NaiveDateTime),
    /// File system path
    Path(PathBuf),
    /// Homogeneous array of values
    Array(Vec<Value>),
    /// Ordered key-value map
    Map(IndexMap<String, Value>),
    /// Represents absence of value
    None,
}

impl Value {
    /// Get the parameter type of this value.
    pub fn get_type(&self) -> ParamType {
        match self {
            Value::Integer(_) => ParamType::Integer,
            Value::Float(_) => ParamType::Float,
            Value::String(_) => ParamType::String,
            Value::Boolean(_) => ParamType::Boolean,
            Value::Char(_) => ParamType::Char,
            Value::Date(_) => ParamType::Date,
            Value::Path(_) => ParamType::Path,
            Value::Array(arr) => match arr.first() {
                Some(first) => ParamType::Array(Box::new(first.get_type())),
                None => ParamType::Array(Box::new(ParamType::Any)),
            },
            Value::Map(_) | Value::None => ParamType::Any,
        }
    }

    /// Try to get this value as an integer.
    pub fn as_integer(&self) -> Option<i64> {
        if let Value::Integer(i) = self {
            Some(*i)
        } else {
            None
        }
    }

    /// Try to get this value as a float.
    /// Integers are automatically converted to floats.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Try to get this value as a string reference.
    pub fn as_string(&self) -> Option<&str> {
        if let Value::String(s) = self {
            Some(s)
        } else {
            None
        }
    }

    /// Try to get this value as a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        if let Value::Boolean(b) = self {
            Some(*b)
        } else {
            None
        }
    }

    /// Try to get this value as a character.
    pub fn as_char(&self) -> Option<char> {
        if let Value::Char(c) = self {
            Some(*c)
        } else {
            None
        }
    }

    /// Try to get this value as a date.
    pub fn as_date(&self) -> Option<NaiveDateTime> {
        if let Value::Date(d) = self {
            Some(*d)
        } else {
            None
        }
    }

    /// Try to get this value as a path.
    pub fn as_path(&self) -> Option<&PathBuf> {
        if let Value::Path(p) = self {
            Some(p)
        } else {
            None
        }
    }

    /// Try to get this value as an array reference.
    pub fn as_array(&self) -> Option<&Vec<Value>> {
        if let Value::Array(arr) = self {
            Some(arr)
        } else {
            None
        }
    }

    /// Try to get this value as a map reference.
    pub fn as_map(&self) -> Option<&IndexMap<String, Value>> {
        if let Value::Map(map) = self {
            Some(map)
        } else {
            None
        }
    }

    /// Check if this value is None.
    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(fl) => write!(f, "{}", fl),
            Value::String(s) => write!(f, "{}", s),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Char(c) => write!(f, "{}", c),
            Value::Date(d) => write!(f, "{}", d.format(DATE_FORMAT)),
            Value::Path(p) => write!(f, "{}", p.display()),
            Value::Array(arr) => {
                for (i, v) in arr.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", v)?;
                }
                Ok(())
            }
            Value::Map(map) => write!(f, "Map{{{} entries}}", map.len()),
            Value::None => Ok(()),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

/// Declared type of an operator parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParamType {
    Boolean,
    Integer,
    Float,
    Char,
    String,
    Date,
    Path,
    /// Array of a specific type
    Array(Box<ParamType>),
    /// Accepts any value
    Any,
}

impl ParamType {
    /// Shorthand for `Array(inner)`.
    pub fn array_of(inner: ParamType) -> Self {
        ParamType::Array(Box::new(inner))
    }

    /// Check if a value matches this type.
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (ParamType::Any, _) => true,
            (ParamType::Boolean, Value::Boolean(_)) => true,
            (ParamType::Integer, Value::Integer(_)) => true,
            (ParamType::Float, Value::Float(_)) => true,
            // Integer can be used where float is expected (implicit conversion)
            (ParamType::Float, Value::Integer(_)) => true,
            (ParamType::Char, Value::Char(_)) => true,
            (ParamType::String, Value::String(_)) => true,
            (ParamType::Date, Value::Date(_)) => true,
            (ParamType::Path, Value::Path(_)) => true,
            (ParamType::Array(inner), Value::Array(arr)) => arr.iter().all(|v| inner.matches(v)),
            _ => false,
        }
    }

    /// Convert a textual literal into a value of this type.
    ///
    /// Array literals are comma separated; an empty literal is an empty array.
    pub fn parse_literal(&self, literal: &str) -> Result<Value, String> {
        let text = literal.trim();
        match self {
            ParamType::Boolean => match text.to_lowercase().as_str() {
                "true" => Ok(Value::Boolean(true)),
                "false" => Ok(Value::Boolean(false)),
                _ => Err(format!("'{}' is not a boolean", literal)),
            },
            ParamType::Integer => text
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|e| format!("'{}' is not an integer: {}", literal, e)),
            ParamType::Float => text
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|e| format!("'{}' is not a number: {}", literal, e)),
            ParamType::Char => {
                let mut chars = literal.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Ok(Value::Char(c)),
                    _ => Err(format!("'{}' is not a single character", literal)),
                }
            }
            ParamType::String | ParamType::Any => Ok(Value::String(literal.to_string())),
            ParamType::Date => parse_date(text).map(Value::Date),
            ParamType::Path => Ok(Value::Path(PathBuf::from(text))),
            ParamType::Array(inner) => {
                if text.is_empty() {
                    return Ok(Value::Array(Vec::new()));
                }
                text.split(',')
                    .map(|item| inner.parse_literal(item))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Array)
            }
        }
    }

    /// Coerce a caller-supplied value into this type.
    ///
    /// Strings are parsed as literals, integers widen to floats, and arrays
    /// are coerced element by element.
    pub fn coerce(&self, value: Value) -> Result<Value, String> {
        match (self, value) {
            (ParamType::Any, v) => Ok(v),
            (ParamType::Float, Value::Integer(i)) => Ok(Value::Float(i as f64)),
            (ParamType::Array(inner), Value::Array(items)) => items
                .into_iter()
                .map(|v| inner.coerce(v))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            (ParamType::String, v @ Value::String(_)) => Ok(v),
            (ty, Value::String(s)) => ty.parse_literal(&s),
            (ty, v) if ty.matches(&v) => Ok(v),
            (ty, v) => Err(format!("expected {}, got {}", ty, v.get_type())),
        }
    }

    /// Get a human-readable name for this type.
    pub fn display_name(&self) -> String {
        match self {
            ParamType::Boolean => "Boolean".to_string(),
            ParamType::Integer => "Integer".to_string(),
            ParamType::Float => "Float".to_string(),
            ParamType::Char => "Char".to_string(),
            ParamType::String => "String".to_string(),
            ParamType::Date => "Date".to_string(),
            ParamType::Path => "Path".to_string(),
            ParamType::Array(inner) => format!("Array<{}>", inner.display_name()),
            ParamType::Any => "Any".to_string(),
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

fn parse_date(text: &str) -> Result<NaiveDateTime, String> {
    NaiveDateTime::parse_from_str(text, DATE_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S"))
        .or_else(|_| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .map(|d| d.and_hms_opt(0, 0, 0).unwrap_or_default())
        })
        .map_err(|_| format!("'{}' is not a date (expected '{}')", text, DATE_FORMAT))
}
