//! The mirror's registry of every node that ever registered.

use std::collections::HashMap;

use meshchat_types::Node;

/// Ordered list of registered nodes plus a per-base-nickname collision
/// counter. Never shrinks.
#[derive(Debug, Default)]
pub struct Roster {
    nodes: Vec<Node>,
    collisions: HashMap<String, u32>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `node`, renaming it `nick(n)` if the nickname is taken.
    /// Returns the record as stored.
    pub fn register(&mut self, mut node: Node) -> Node {
        let base = node.nickname.trim().to_string();
        let mut nickname = base.clone();
        if self.is_taken(&nickname) {
            let counter = self.collisions.entry(base.clone()).or_insert(0);
            loop {
                *counter += 1;
                nickname = format!("{base}({counter})");
                if !self.nodes.iter().any(|n| n.nickname.trim() == nickname) {
                    break;
                }
            }
        }
        if nickname != base {
            tracing::info!(requested = %base, assigned = %nickname, "nickname collision resolved");
        }
        node.nickname = nickname;
        self.nodes.push(node.clone());
        node
    }

    fn is_taken(&self, nickname: &str) -> bool {
        self.nodes.iter().any(|n| n.nickname.trim() == nickname)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
