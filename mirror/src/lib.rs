//! Discovery mirror for the meshchat overlay.
//!
//! A mirror is a rendezvous point: a joining node posts its own record and
//! gets back every node registered so far. Nickname collisions are resolved
//! here by suffixing `(n)`.
//!
//! Endpoints:
//! - `POST /register` (alias `POST /getNodes`): register and return the roster
//! - `GET /nodes`: current roster without registering

pub mod client;
pub mod config;
pub mod error;
pub mod roster;
pub mod server;

pub use client::MirrorClient;
pub use config::MirrorConfig;
pub use error::MirrorError;
pub use roster::Roster;
pub use server::{router, MirrorServer, MirrorState};
