//! Fundamental types for the meshchat overlay.
//!
//! This crate defines the types shared across every other crate in the workspace:
//! node records, fingerprints, wall-clock timestamps and the shared error type.

pub mod error;
pub mod fingerprint;
pub mod node;
pub mod time;

pub use error::TypesError;
pub use fingerprint::Fingerprint;
pub use node::Node;
pub use time::Timestamp;
