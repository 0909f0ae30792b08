//! meshchat node: joins the mesh and keeps channel state in sync.
//!
//! The node is the coordinator that:
//! - Registers with a discovery mirror and announces itself to the roster
//! - Accepts peer connections and applies incoming envelopes in receipt order
//! - Tracks channels, their membership and chat history
//! - Probes every known peer and prunes the unreachable ones
//! - Exposes local chat operations (create/join channel, chat, private message)

pub mod bootstrap;
pub mod channel_store;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod inbound;
pub mod liveness;
pub mod logging;
pub mod node;
pub mod shutdown;

pub use bootstrap::{register_with_mirrors, BootstrapOutcome};
pub use channel_store::ChannelStore;
pub use config::{load_mirror_list, parse_mirror_list, NodeConfig};
pub use engine::GossipEngine;
pub use error::NodeError;
pub use events::{EventBus, NodeEvent};
pub use liveness::LivenessDetector;
pub use logging::{init_logging, LogFormat};
pub use node::ChatNode;
pub use shutdown::ShutdownController;
