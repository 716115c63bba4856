// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Runtime values carried in call arguments and replies.
// Author: Lukas Bower

use std::fmt;

/// A decoded argument or return value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// No value; the reply of a `NoResult` action.
    Unit,
    String(String),
    OptString(Option<String>),
    StringList(Vec<String>),
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Bytes(Vec<u8>),
    Struct(StructValue),
    StructList(Vec<StructValue>),
    /// Key/value pairs in wire order.
    StringMap(Vec<(String, String)>),
}

impl Value {
    /// Variant name used in mismatch diagnostics.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Unit => "unit",
            Self::String(_) => "string",
            Self::OptString(_) => "optional string",
            Self::StringList(_) => "string list",
            Self::Bool(_) => "bool",
            Self::Int32(_) => "int32",
            Self::Int64(_) => "int64",
            Self::Bytes(_) => "buffer",
            Self::Struct(_) => "struct",
            Self::StructList(_) => "struct list",
            Self::StringMap(_) => "string map",
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value.as_str()),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_string_list(&self) -> Option<&[String]> {
        match self {
            Self::StringList(values) => Some(values.as_slice()),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int32(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int64(value)
    }
}

impl From<Vec<String>> for Value {
    fn from(value: Vec<String>) -> Self {
        Self::StringList(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

/// Instance of a named struct, fields in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct StructValue {
    pub tag: String,
    pub fields: Vec<FieldValue>,
}

/// Value of one struct field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    String(String),
    Bytes(Vec<u8>),
    /// 32 ASCII characters.
    Uuid(String),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Char(u8),
    /// `None` travels as `-1`.
    OptPercent(Option<f32>),
}

impl FieldValue {
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Bytes(_) => "bytes",
            Self::Uuid(_) => "uuid",
            Self::Int32(_) => "int32",
            Self::UInt32(_) => "uint32",
            Self::Int64(_) => "int64",
            Self::UInt64(_) => "uint64",
            Self::Char(_) => "char",
            Self::OptPercent(_) => "opt-percent",
        }
    }
}

/// Arguments of one call: required values in parameter order (stream
/// parameters excluded) and one slot per declared optional argument.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArgs {
    pub required: Vec<Value>,
    pub optional: Vec<Option<Value>>,
}

impl CallArgs {
    #[must_use]
    pub fn new(required: Vec<Value>) -> Self {
        Self {
            required,
            optional: Vec::new(),
        }
    }

    /// Set optional argument `index`, growing the slot vector as needed.
    #[must_use]
    pub fn with_optional(mut self, index: usize, value: Value) -> Self {
        if self.optional.len() <= index {
            self.optional.resize(index + 1, None);
        }
        self.optional[index] = Some(value);
        self
    }

    /// Bitmask of the optional arguments that are present.
    #[must_use]
    pub fn optargs_bitmask(&self) -> u64 {
        self.optional
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_some())
            .fold(0u64, |mask, (index, _)| mask | (1u64 << index))
    }
}

/// Display wrapper for log lines; secret slots print as `<redacted>`.
pub struct Redacted<'a> {
    pub(crate) names: Vec<(&'a str, bool)>,
    pub(crate) values: &'a [Value],
}

impl fmt::Display for Redacted<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (index, value) in self.values.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            let (name, secret) = self.names.get(index).copied().unwrap_or(("?", false));
            if secret {
                write!(f, "{name}=<redacted>")?;
            } else {
                write!(f, "{name}={}", ShortValue(value))?;
            }
        }
        f.write_str(")")
    }
}

struct ShortValue<'a>(&'a Value);

impl fmt::Display for ShortValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Value::Unit => f.write_str("()"),
            Value::String(value) => write!(f, "{value:?}"),
            Value::OptString(Some(value)) => write!(f, "{value:?}"),
            Value::OptString(None) => f.write_str("null"),
            Value::StringList(values) => write!(f, "{values:?}"),
            Value::Bool(value) => write!(f, "{value}"),
            Value::Int32(value) => write!(f, "{value}"),
            Value::Int64(value) => write!(f, "{value}"),
            Value::Bytes(bytes) => write!(f, "<{} bytes>", bytes.len()),
            Value::Struct(value) => write!(f, "<struct {}>", value.tag),
            Value::StructList(values) => write!(f, "<{} structs>", values.len()),
            Value::StringMap(pairs) => write!(f, "<{} pairs>", pairs.len()),
        }
    }
}
