use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("network error: {0}")]
    Network(#[from] meshchat_network::NetworkError),

    #[error("protocol error: {0}")]
    Protocol(#[from] meshchat_protocol::ProtocolError),

    #[error("mirror error: {0}")]
    Mirror(#[from] meshchat_mirror::MirrorError),

    #[error("identity error: {0}")]
    Identity(#[from] meshchat_crypto::IdentityError),

    #[error("invalid address: {0}")]
    Types(#[from] meshchat_types::TypesError),

    #[error("unknown channel: {0}")]
    UnknownChannel(String),

    #[error("channel {0} is full")]
    ChannelFull(String),

    #[error("unknown peer: {0}")]
    UnknownPeer(String),

    #[error("invalid channel name: {0:?}")]
    InvalidChannelName(String),

    #[error("bootstrap failed: {0}")]
    BootstrapFailed(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
