use std::collections::BTreeMap;

use bytes::Bytes;

use super::error::BencodeError;
use super::value::Value;

const MAX_DEPTH: usize = 32;

/// Decodes one complete bencode value from `data`.
///
/// The slice must hold exactly one value; leftover bytes are an error so a
/// datagram carrying garbage after the message dictionary is rejected
/// whole.
///
/// # Errors
///
/// Returns [`BencodeError::Truncated`] on short input,
/// [`BencodeError::TooDeep`] past 32 nested containers, and
/// [`BencodeError::TrailingData`] when bytes follow the value.
///
/// # Examples
///
/// ```
/// use rdht::bencode::decode;
///
/// let v = decode(b"d1:ad2:id2:ABe1:q4:ping1:t2:aa1:y1:qe").unwrap();
/// assert_eq!(v.get(b"q").and_then(|q| q.as_str()), Some("ping"));
/// ```
pub fn decode(data: &[u8]) -> Result<Value, BencodeError> {
    let mut parser = Parser { data, pos: 0 };
    let value = parser.value(0)?;

    if parser.pos != data.len() {
        return Err(BencodeError::TrailingData);
    }

    Ok(value)
}

struct Parser<'a> {
    data: &'a [u8],
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Result<u8, BencodeError> {
        self.data.get(self.pos).copied().ok_or(BencodeError::Truncated)
    }

    fn value(&mut self, depth: usize) -> Result<Value, BencodeError> {
        if depth > MAX_DEPTH {
            return Err(BencodeError::TooDeep);
        }

        match self.peek()? {
            b'i' => self.integer(),
            b'l' => self.list(depth),
            b'd' => self.dict(depth),
            b'0'..=b'9' => self.byte_string(),
            c => Err(BencodeError::UnexpectedByte(c)),
        }
    }

    fn integer(&mut self) -> Result<Value, BencodeError> {
        self.pos += 1;
        let token = self.take_until(b'e')?;

        let text = std::str::from_utf8(token)
            .map_err(|_| BencodeError::BadInteger("not utf8".into()))?;

        if text.is_empty() {
            return Err(BencodeError::BadInteger("empty".into()));
        }

        // "i-0e" and zero-padded forms are invalid per BEP-3.
        if text.starts_with("-0") || (text.len() > 1 && text.starts_with('0')) {
            return Err(BencodeError::BadInteger("leading zero".into()));
        }

        let n: i64 = text.parse().map_err(|_| BencodeError::BadInteger(text.into()))?;
        Ok(Value::Integer(n))
    }

    fn byte_string(&mut self) -> Result<Value, BencodeError> {
        let token = self.take_until(b':')?;

        let len: usize = std::str::from_utf8(token)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or(BencodeError::BadLength)?;

        if self.pos + len > self.data.len() {
            return Err(BencodeError::Truncated);
        }

        let bytes = Bytes::copy_from_slice(&self.data[self.pos..self.pos + len]);
        self.pos += len;
        Ok(Value::Bytes(bytes))
    }

    fn list(&mut self, depth: usize) -> Result<Value, BencodeError> {
        self.pos += 1;
        let mut items = Vec::new();

        while self.peek()? != b'e' {
            items.push(self.value(depth + 1)?);
        }

        self.pos += 1;
        Ok(Value::List(items))
    }

    fn dict(&mut self, depth: usize) -> Result<Value, BencodeError> {
        self.pos += 1;
        let mut map = BTreeMap::new();

        while self.peek()? != b'e' {
            let key = match self.value(depth + 1)? {
                Value::Bytes(b) => b,
                _ => return Err(BencodeError::UnexpectedByte(self.data[self.pos - 1])),
            };
            let value = self.value(depth + 1)?;
            map.insert(key, value);
        }

        self.pos += 1;
        Ok(Value::Dict(map))
    }

    /// Consumes bytes up to (and including) the delimiter, returning the
    /// bytes before it.
    fn take_until(&mut self, delim: u8) -> Result<&[u8], BencodeError> {
        let start = self.pos;
        while self.pos < self.data.len() && self.data[self.pos] != delim {
            self.pos += 1;
        }

        if self.pos >= self.data.len() {
            return Err(BencodeError::Truncated);
        }

        let token = &self.data[start..self.pos];
        self.pos += 1;
        Ok(token)
    }
}
