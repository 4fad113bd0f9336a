//! Observability trait and the dynamically-typed state value.
//!
//! Every emulator component exposes its internal state for debugging.
//! Queries never affect emulation state. The same `Value` type carries
//! peripheral state blobs through snapshots, so the core never needs to
//! know a device's internal layout.

use std::collections::BTreeMap;
use std::fmt;

use crate::StateError;

/// A dynamically-typed value for state queries and state blobs.
///
/// With the `serde` feature this serialises externally tagged
/// (`{"U8": 5}`), so integer widths survive a round trip.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Value {
    /// Boolean value.
    Bool(bool),
    /// 8-bit unsigned integer.
    U8(u8),
    /// 16-bit unsigned integer.
    U16(u16),
    /// 32-bit unsigned integer.
    U32(u32),
    /// 64-bit unsigned integer.
    U64(u64),
    /// 8-bit signed integer.
    I8(i8),
    /// String value.
    String(String),
    /// Raw byte block (register files, small RAMs).
    Bytes(Vec<u8>),
    /// Array of values.
    Array(Vec<Value>),
    /// Map of string keys to values. Ordered, so dumps are stable.
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Build a map from `(key, value)` pairs.
    #[must_use]
    pub fn map<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Value::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Look up `key` in a map value.
    pub fn field(&self, key: &str) -> Result<&Value, StateError> {
        match self {
            Value::Map(map) => map
                .get(key)
                .ok_or_else(|| StateError::MissingField(key.to_string())),
            _ => Err(StateError::NotAMap),
        }
    }

    pub fn as_bool(&self, field: &str) -> Result<bool, StateError> {
        match self {
            Value::Bool(v) => Ok(*v),
            _ => Err(StateError::wrong_type(field, "bool")),
        }
    }

    pub fn as_u8(&self, field: &str) -> Result<u8, StateError> {
        match self {
            Value::U8(v) => Ok(*v),
            _ => Err(StateError::wrong_type(field, "u8")),
        }
    }

    pub fn as_u16(&self, field: &str) -> Result<u16, StateError> {
        match self {
            Value::U16(v) => Ok(*v),
            _ => Err(StateError::wrong_type(field, "u16")),
        }
    }

    pub fn as_u64(&self, field: &str) -> Result<u64, StateError> {
        match self {
            Value::U64(v) => Ok(*v),
            _ => Err(StateError::wrong_type(field, "u64")),
        }
    }

    pub fn as_bytes(&self, field: &str) -> Result<&[u8], StateError> {
        match self {
            Value::Bytes(v) => Ok(v),
            _ => Err(StateError::wrong_type(field, "bytes")),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{v}"),
            Value::U8(v) => write!(f, "{v:#04X}"),
            Value::U16(v) => write!(f, "{v:#06X}"),
            Value::U32(v) => write!(f, "{v:#010X}"),
            Value::U64(v) => write!(f, "{v}"),
            Value::I8(v) => write!(f, "{v}"),
            Value::String(v) => write!(f, "{v}"),
            Value::Bytes(bytes) => {
                write!(f, "<")?;
                for (i, b) in bytes.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{b:02X}")?;
                }
                write!(f, ">")
            }
            Value::Array(arr) => {
                write!(f, "[")?;
                for (i, v) in arr.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
            Value::Map(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<u8> for Value {
    fn from(v: u8) -> Self {
        Value::U8(v)
    }
}

impl From<u16> for Value {
    fn from(v: u16) -> Self {
        Value::U16(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::U32(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::U64(v)
    }
}

impl From<i8> for Value {
    fn from(v: i8) -> Self {
        Value::I8(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

/// A component whose state can be inspected.
///
/// At any instruction boundary you can inspect any component. Queries
/// never affect emulation state.
pub trait Observable {
    /// Query a specific property by path.
    ///
    /// Paths are hierarchical, separated by dots:
    /// - `pc` - Program counter
    /// - `a` - Accumulator
    /// - `flags.z` - Zero flag
    ///
    /// Returns `None` if the path is not recognised.
    fn query(&self, path: &str) -> Option<Value>;

    /// List all available query paths.
    fn query_paths(&self) -> &'static [&'static str];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_uses_hex_widths() {
        assert_eq!(Value::U8(0x0A).to_string(), "0x0A");
        assert_eq!(Value::U16(0xBEEF).to_string(), "0xBEEF");
        assert_eq!(Value::Bytes(vec![1, 0xFF]).to_string(), "<01 FF>");
    }

    #[test]
    fn field_lookup_reports_missing_key() {
        let v = Value::map([("latch", Value::U16(0x1234))]);
        assert_eq!(v.field("latch").and_then(|f| f.as_u16("latch")), Ok(0x1234));
        assert_eq!(
            v.field("counter"),
            Err(StateError::MissingField("counter".into()))
        );
    }

    #[test]
    fn typed_accessor_rejects_other_width() {
        let err = Value::U16(1).as_u8("ctrl").unwrap_err();
        assert_eq!(err, StateError::wrong_type("ctrl", "u8"));
    }
}
