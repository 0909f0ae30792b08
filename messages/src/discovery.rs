//! Mirror registration response.

use meshchat_types::{Node, Timestamp};
use serde::{Deserialize, Serialize};

/// Reply to a registration: the whole roster, newest registration included.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoverResponse {
    #[serde(rename = "nodeList")]
    pub node_list: Vec<Node>,
    pub timestamp: Timestamp,
    /// The entry as stored by the mirror, after nickname disambiguation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registered: Option<Node>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uses_camel_case_node_list() {
        let resp = DiscoverResponse {
            node_list: vec![Node::new("h", "1", "a")],
            timestamp: Timestamp::from_unix_millis(0),
            registered: None,
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"nodeList\""));
        assert!(!json.contains("registered"));
    }
}
