//! The KRPC protocol engine (BEP-5).
//!
//! KRPC is a simple request/response protocol carried in single bencoded
//! dictionaries over UDP. Every message has a transaction id `t` and a
//! type `y`; queries add a method name `q` and arguments `a`, responses a
//! return dictionary `r`, errors a `[code, message]` pair `e`.
//!
//! Outbound queries borrow their transaction id from a fixed pool of
//! 62 x 62 two-character ids (see [`TransactionRegistry`]); the id carries
//! the request context back when the response arrives, which is what lets
//! a response be interpreted without any type tag of its own.

mod error;
mod message;
mod transaction;

pub use error::KrpcError;
pub use message::{Body, KrpcMessage, Query, Response, TransactionId};
pub use transaction::{QueryContext, QueryKind, TransactionRegistry};
