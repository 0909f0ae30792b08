//! Whole nodes on loopback sockets, bootstrapped through an in-process
//! mirror.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use meshchat_mirror::{MirrorConfig, MirrorServer};
use meshchat_node::{ChatNode, GossipEngine, NodeConfig, NodeEvent};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

const DEADLINE: Duration = Duration::from_secs(5);

async fn spawn_mirror() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let server = Arc::new(MirrorServer::new(MirrorConfig::default()));
    tokio::spawn(async move {
        let _ = server.serve(listener, std::future::pending()).await;
    });
    format!("127.0.0.1:{port}++mirror")
}

fn config(mirror: &str, nickname: &str) -> NodeConfig {
    NodeConfig {
        hostname: "127.0.0.1".into(),
        port: 0,
        nickname: nickname.into(),
        mirrors: vec![mirror.to_string()],
        mirror_list: "does-not-exist.txt".into(),
        poll_interval_secs: 3600,
        ..NodeConfig::default()
    }
}

async fn eventually<F, Fut>(what: &str, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + DEADLINE;
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("timed out waiting for {what}");
}

async fn peer_count(engine: &Arc<GossipEngine>) -> usize {
    engine.peers().await.len()
}

async fn member_count(engine: &Arc<GossipEngine>) -> usize {
    engine.members().await.len()
}

async fn next_matching<F>(events: &mut broadcast::Receiver<NodeEvent>, mut wanted: F) -> NodeEvent
where
    F: FnMut(&NodeEvent) -> bool,
{
    tokio::time::timeout(DEADLINE, async {
        loop {
            match events.recv().await {
                Ok(event) if wanted(&event) => return event,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(e) => panic!("event bus closed: {e}"),
            }
        }
    })
    .await
    .expect("no matching event")
}

#[tokio::test]
async fn second_node_joins_first() {
    let mirror = spawn_mirror().await;
    let mut a = ChatNode::start(config(&mirror, "alice")).await.unwrap();
    let mut b = ChatNode::start(config(&mirror, "bob")).await.unwrap();

    let (ea, eb) = (a.engine().clone(), b.engine().clone());
    eventually("alice to register bob", || {
        let ea = ea.clone();
        async move { peer_count(&ea).await == 1 }
    })
    .await;
    assert_eq!(eb.peers().await[0].nickname, "alice");
    assert_eq!(ea.peers().await[0].nickname, "bob");

    eventually("both homes to hold the other", || {
        let (ea, eb) = (ea.clone(), eb.clone());
        async move { member_count(&ea).await == 1 && member_count(&eb).await == 1 }
    })
    .await;

    // Nobody announced a channel beyond the default.
    let names = |channels: Vec<(String, usize)>| channels.into_iter().map(|(n, _)| n).collect::<Vec<_>>();
    assert_eq!(names(ea.channels().await), ["lobby"]);
    assert_eq!(names(eb.channels().await), ["lobby"]);

    b.stop().await;
    eventually("alice to forget bob", || {
        let ea = ea.clone();
        async move { peer_count(&ea).await == 0 && member_count(&ea).await == 0 }
    })
    .await;
    a.stop().await;
}

#[tokio::test]
async fn duplicate_nickname_is_disambiguated() {
    let mirror = spawn_mirror().await;
    let mut first = ChatNode::start(config(&mirror, "alice")).await.unwrap();
    let mut second = ChatNode::start(config(&mirror, "alice")).await.unwrap();

    assert_eq!(first.local().nickname, "alice");
    assert_eq!(second.local().nickname, "alice(1)");
    assert!(second.mirror().is_some());

    let engine = first.engine().clone();
    eventually("first alice to see the second", || {
        let engine = engine.clone();
        async move { engine.peers().await.iter().any(|n| n.nickname == "alice(1)") }
    })
    .await;

    second.stop().await;
    first.stop().await;
}

#[tokio::test]
async fn switching_channel_receives_history_newest_first() {
    let mirror = spawn_mirror().await;
    let mut a = ChatNode::start(config(&mirror, "alice")).await.unwrap();
    let mut b = ChatNode::start(config(&mirror, "bob")).await.unwrap();
    let (ea, eb) = (a.engine().clone(), b.engine().clone());
    eventually("mesh to settle", || {
        let (ea, eb) = (ea.clone(), eb.clone());
        async move { member_count(&ea).await == 1 && member_count(&eb).await == 1 }
    })
    .await;

    ea.create_channel("general").await.unwrap();
    eventually("bob to see general", || {
        let eb = eb.clone();
        async move { eb.channels().await.iter().any(|(n, _)| n == "general") && member_count(&eb).await == 0 }
    })
    .await;
    for text in ["first", "second", "third"] {
        ea.send_chat(text).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let mut events = b.subscribe();
    eb.change_channel("general").await.unwrap();

    let joined = next_matching(&mut events, |e| matches!(e, NodeEvent::ChannelJoined { name, .. } if name == "general")).await;
    let NodeEvent::ChannelJoined { history, .. } = joined else {
        unreachable!()
    };
    let texts: Vec<_> = history.iter().map(|e| e.content.as_str()).collect();
    assert_eq!(texts, ["third", "second", "first"]);
    assert_eq!(eb.home_name().await, "general");
    assert_eq!(eb.members().await[0].nickname, "alice");

    // A chat line now reaches the other member.
    let mut a_events = a.subscribe();
    eb.send_chat("hello general").await;
    let heard = next_matching(&mut a_events, |e| matches!(e, NodeEvent::Chat(_))).await;
    assert!(matches!(heard, NodeEvent::Chat(e) if e.content == "hello general" && e.nickname == "bob"));

    b.stop().await;
    a.stop().await;
}

#[tokio::test]
async fn private_message_crosses_the_mesh() {
    let mirror = spawn_mirror().await;
    let mut a = ChatNode::start(config(&mirror, "alice")).await.unwrap();
    let mut b = ChatNode::start(config(&mirror, "bob")).await.unwrap();
    let ea = a.engine().clone();
    eventually("alice to register bob", || {
        let ea = ea.clone();
        async move { peer_count(&ea).await == 1 }
    })
    .await;

    let mut b_events = b.subscribe();
    ea.send_private_to("bob", "just between us").await.unwrap();
    let pm = next_matching(&mut b_events, |e| matches!(e, NodeEvent::PrivateMessage(_))).await;
    assert!(matches!(pm, NodeEvent::PrivateMessage(e) if e.content == "just between us"));

    b.stop().await;
    a.stop().await;
}

#[tokio::test]
async fn standalone_without_mirrors() {
    let mut config = config("unused", "solo");
    config.mirrors.clear();
    let mut node = ChatNode::start(config).await.unwrap();
    assert!(node.mirror().is_none());
    assert!(node.engine().peers().await.is_empty());
    assert_ne!(node.local().port, "0");
    node.stop().await;
}

#[tokio::test]
async fn unreachable_mirrors_fail_startup() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    let mut config = config(&format!("127.0.0.1:{port}++gone"), "alice");
    config.bootstrap_attempts = 1;
    config.connect_timeout_secs = 1;
    assert!(ChatNode::start(config).await.is_err());
}
