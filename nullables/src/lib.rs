//! Nullable infrastructure for deterministic testing.
//!
//! Test-friendly stand-ins for the pieces of a node that touch the network:
//! - [`NullProbe`] answers liveness probes from a script instead of dialing
//! - [`NullPeer`] is an in-memory peer connection that records what the node
//!   writes to it
//!
//! Usage: swap real implementations for nullables in tests.

pub mod peer;
pub mod probe;

pub use peer::NullPeer;
pub use probe::NullProbe;
