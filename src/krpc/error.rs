use thiserror::Error;

#[derive(Debug, Error)]
pub enum KrpcError {
    #[error("bencode error: {0}")]
    Bencode(#[from] crate::bencode::BencodeError),

    #[error("message is not a dictionary")]
    NotADict,

    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("unknown message type: {0}")]
    UnknownType(String),
}
