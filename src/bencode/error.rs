use thiserror::Error;

/// Errors raised while decoding or encoding bencode data.
///
/// # Examples
///
/// ```
/// use rdht::bencode::{decode, BencodeError};
///
/// assert!(matches!(decode(b"i12"), Err(BencodeError::Truncated)));
/// assert!(matches!(decode(b"i03e"), Err(BencodeError::BadInteger(_))));
/// assert!(matches!(decode(b"le!"), Err(BencodeError::TrailingData)));
/// ```
#[derive(Debug, Error)]
pub enum BencodeError {
    /// Input ran out before a complete value was read.
    #[error("truncated input")]
    Truncated,

    /// Integer token is empty, has leading zeros, or does not parse.
    #[error("bad integer: {0}")]
    BadInteger(String),

    /// Byte-string length prefix is not a decimal number.
    #[error("bad string length")]
    BadLength,

    /// A byte that cannot start or continue a value at this position.
    #[error("unexpected byte {0:#04x}")]
    UnexpectedByte(u8),

    /// Bytes remain after the outermost value.
    #[error("trailing data after value")]
    TrailingData,

    /// Containers nested deeper than the decoder allows.
    #[error("nesting too deep")]
    TooDeep,

    /// I/O failure while writing encoded output.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
