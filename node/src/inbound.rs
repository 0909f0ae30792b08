//! Accept loop and per-connection read loops.
//!
//! One task per accepted connection reads framed envelopes and applies them
//! in receipt order. A clean close or an undecodable frame ends only that
//! connection.

use std::net::SocketAddr;
use std::sync::Arc;

use meshchat_network::{PeerStream, Transport};
use meshchat_protocol::{read_envelope, ProtocolError};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::GossipEngine;

/// Spawn the accept loop. It stops when `shutdown` fires.
pub fn spawn_accept_loop(
    listener: TcpListener,
    transport: Transport,
    engine: Arc<GossipEngine>,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((tcp, addr)) => {
                        spawn_connection(tcp, addr, transport.clone(), engine.clone(), shutdown.resubscribe());
                    }
                    Err(e) => tracing::warn!(error = %e, "accept failed"),
                },
                _ = shutdown.recv() => {
                    tracing::debug!("accept loop stopping");
                    break;
                }
            }
        }
    })
}

fn spawn_connection(
    tcp: tokio::net::TcpStream,
    addr: SocketAddr,
    transport: Transport,
    engine: Arc<GossipEngine>,
    mut shutdown: broadcast::Receiver<()>,
) {
    tokio::spawn(async move {
        let stream = match transport.accept(tcp).await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(remote = %addr, error = %e, "inbound handshake failed");
                return;
            }
        };
        tracing::debug!(remote = %addr, "inbound connection");
        tokio::select! {
            result = read_loop(stream, &engine) => match result {
                Ok(()) => tracing::debug!(remote = %addr, "connection closed by peer"),
                Err(e) => tracing::warn!(remote = %addr, error = %e, "connection dropped"),
            },
            _ = shutdown.recv() => {}
        }
    });
}

/// Read envelopes until EOF and hand each to the engine.
pub async fn read_loop(mut stream: PeerStream, engine: &GossipEngine) -> Result<(), ProtocolError> {
    while let Some(envelope) = read_envelope(&mut stream).await? {
        engine.handle(envelope).await;
    }
    Ok(())
}
