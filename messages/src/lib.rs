//! Message types exchanged between meshchat nodes and with mirrors.

pub mod channel;
pub mod discovery;
pub mod envelope;

pub use channel::{Channel, DEFAULT_CHANNEL_CAPACITY};
pub use discovery::DiscoverResponse;
pub use envelope::{Envelope, MessageType};
