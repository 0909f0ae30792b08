use std::sync::Arc;
use std::time::Duration;

use meshchat_messages::{Envelope, MessageType};
use meshchat_network::{ConnectionRegistry, Transport};
use meshchat_node::{ChannelStore, EventBus, GossipEngine, LivenessDetector, NodeEvent, ShutdownController};
use meshchat_nullables::{NullPeer, NullProbe};
use meshchat_types::Node;
use tokio::sync::{Mutex, RwLock};

const TIMEOUT: Duration = Duration::from_millis(100);

fn engine() -> Arc<GossipEngine> {
    Arc::new(GossipEngine::new(
        Node::new("127.0.0.1", "7000", "me"),
        Transport::plain(Duration::from_secs(1)),
        Arc::new(RwLock::new(ConnectionRegistry::new())),
        Arc::new(Mutex::new(ChannelStore::new("lobby", 100))),
        EventBus::new(),
    ))
}

/// Register `node` and put it in the home channel, as a real join would.
async fn join(engine: &GossipEngine, node: &Node) -> NullPeer {
    let (stream, peer) = NullPeer::connect(node.clone());
    engine.registry().write().await.insert(node.clone(), stream);
    engine
        .handle(Envelope::new(MessageType::UpdateChannel, node, "lobby"))
        .await;
    peer
}

#[tokio::test]
async fn failing_probe_removes_peer_everywhere() {
    let engine = engine();
    let alive = Node::new("127.0.0.1", "7101", "alive");
    let dead = Node::new("127.0.0.1", "7102", "dead");
    let _alive_peer = join(&engine, &alive).await;
    let _dead_peer = join(&engine, &dead).await;
    let mut events = engine.events().subscribe();

    let probe = NullProbe::new();
    probe.mark_down(&dead);
    let detector = LivenessDetector::new(probe, engine.clone(), TIMEOUT);

    let removed = detector.poll_round().await;

    assert_eq!(removed.len(), 1);
    assert_eq!(removed[0].nickname, "dead");
    assert_eq!(detector.probe().probed().len(), 2);
    assert_eq!(engine.peers().await.len(), 1);
    let members = engine.members().await;
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].nickname, "alive");
    let store = engine.store().lock().await;
    assert!(store.channels().all(|c| !c.contains(&dead.fingerprint())));
    drop(store);
    assert!(matches!(events.recv().await.unwrap(), NodeEvent::PeerRemoved(n) if n.nickname == "dead"));
}

#[tokio::test]
async fn reachable_peers_are_never_removed() {
    let engine = engine();
    let nodes: Vec<Node> = (0..4)
        .map(|i| Node::new("127.0.0.1", format!("72{i:02}"), format!("n{i}")))
        .collect();
    let mut peers = Vec::new();
    for node in &nodes {
        peers.push(join(&engine, node).await);
    }
    let detector = LivenessDetector::new(NullProbe::new(), engine.clone(), TIMEOUT);

    for _ in 0..3 {
        assert!(detector.poll_round().await.is_empty());
    }
    assert_eq!(engine.peers().await.len(), nodes.len());
    assert_eq!(engine.members().await.len(), nodes.len());
    assert_eq!(detector.probe().probed().len(), nodes.len() * 3);
}

#[tokio::test]
async fn empty_registry_probes_nothing() {
    let detector = LivenessDetector::new(NullProbe::new(), engine(), TIMEOUT);
    assert!(detector.poll_round().await.is_empty());
    assert!(detector.probe().probed().is_empty());
}

#[tokio::test]
async fn peer_removed_in_first_round_after_going_down() {
    let engine = engine();
    let flaky = Node::new("127.0.0.1", "7300", "flaky");
    let _peer = join(&engine, &flaky).await;
    let detector = LivenessDetector::new(NullProbe::new(), engine.clone(), TIMEOUT);

    assert!(detector.poll_round().await.is_empty());
    let peers = engine.peers().await;
    assert_eq!(peers.len(), 1);
    assert_eq!(peers[0].fingerprint(), flaky.fingerprint());

    detector.probe().mark_down(&flaky);
    let removed = detector.poll_round().await;
    assert_eq!(removed.len(), 1);
    assert_eq!(removed[0].fingerprint(), flaky.fingerprint());
    assert!(engine.peers().await.is_empty());
    assert!(engine.members().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn run_polls_on_interval_until_shutdown() {
    let engine = engine();
    let dead = Node::new("127.0.0.1", "7400", "dead");
    let _peer = join(&engine, &dead).await;
    let probe = NullProbe::new();
    probe.mark_down(&dead);
    let shutdown = ShutdownController::new();
    let detector = LivenessDetector::new(probe, engine.clone(), TIMEOUT);
    let handle = tokio::spawn(detector.run(Duration::from_secs(10), shutdown.subscribe()));

    // Nothing happens before the first interval elapses.
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(engine.peers().await.len(), 1);

    tokio::time::sleep(Duration::from_secs(6)).await;
    assert!(engine.peers().await.is_empty());

    shutdown.shutdown();
    handle.await.unwrap();
}
