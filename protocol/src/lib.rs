//! Wire protocol: envelope framing, encoding/decoding and interpretation.

pub mod codec;
pub mod error;
pub mod payload;

pub use codec::{decode, decode_framed, encode, read_envelope, write_envelope, MAX_MESSAGE_SIZE};
pub use error::ProtocolError;
pub use payload::{interpret, Payload};
