use bytes::Bytes;
use std::collections::BTreeMap;

/// A single bencode value.
///
/// Bencode knows four shapes: integers, byte strings, lists, and
/// dictionaries keyed by byte strings. Dictionary keys are held in a
/// `BTreeMap` so encoding emits them in sorted order, as the format
/// requires.
///
/// # Examples
///
/// ```
/// use rdht::bencode::Value;
///
/// let v = Value::string("ping");
/// assert_eq!(v.as_str(), Some("ping"));
/// assert_eq!(Value::Integer(7).as_int(), Some(7));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Signed 64-bit integer.
    Integer(i64),
    /// Byte string; not required to be UTF-8.
    Bytes(Bytes),
    /// Ordered list of values.
    List(Vec<Value>),
    /// Dictionary with byte-string keys.
    Dict(BTreeMap<Bytes, Value>),
}

impl Value {
    /// Builds a byte-string value from UTF-8 text.
    pub fn string(s: &str) -> Self {
        Value::Bytes(Bytes::copy_from_slice(s.as_bytes()))
    }

    /// Builds a byte-string value from a raw slice.
    pub fn bytes(b: &[u8]) -> Self {
        Value::Bytes(Bytes::copy_from_slice(b))
    }

    /// The integer inside, if this is an integer.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// The byte string inside, if this is one.
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// The byte string as UTF-8 text, when it is a byte string and valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Bytes(b) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }

    /// The list inside, if this is a list.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    /// The dictionary inside, if this is a dictionary.
    pub fn as_dict(&self) -> Option<&BTreeMap<Bytes, Value>> {
        match self {
            Value::Dict(d) => Some(d),
            _ => None,
        }
    }

    /// Dictionary lookup; `None` when this is not a dictionary or the key
    /// is absent.
    ///
    /// # Examples
    ///
    /// ```
    /// use rdht::bencode::decode;
    ///
    /// let v = decode(b"d1:y1:qe").unwrap();
    /// assert_eq!(v.get(b"y").and_then(|v| v.as_str()), Some("q"));
    /// ```
    pub fn get(&self, key: &[u8]) -> Option<&Value> {
        self.as_dict()?.get(key)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<Bytes> for Value {
    fn from(b: Bytes) -> Self {
        Value::Bytes(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}
