//! Peer networking for meshchat.
//!
//! Dials and accepts peer connections (optionally over TLS), keeps the
//! fingerprint-keyed connection registry, and routes outbound envelopes.

pub mod broadcast;
pub mod error;
pub mod probe;
pub mod registry;
pub mod transport;

pub use broadcast::{broadcast, dispatch, send_to_all, BroadcastResult};
pub use error::NetworkError;
pub use probe::Probe;
pub use registry::{ConnectionRegistry, PeerHandle};
pub use transport::{PeerIo, PeerStream, Transport, DEFAULT_CONNECT_TIMEOUT};
