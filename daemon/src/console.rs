//! Console input parsing and event rendering for an interactive node.

use meshchat_messages::Envelope;
use meshchat_node::NodeEvent;

#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Chat(String),
    Create(String),
    Join(String),
    Pm { nickname: String, text: String },
    Members,
    Channels,
    History,
    Peers,
    Exit,
    Usage(&'static str),
    Empty,
}

const PM_USAGE: &str = "usage: /pm <nickname> <text>";

/// Interpret one line typed at the console. Anything that is not a command
/// is a chat line.
pub fn parse(line: &str) -> Command {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return Command::Empty;
    }
    if line.trim() == "EXIT" {
        return Command::Exit;
    }
    let Some(rest) = line.trim_start().strip_prefix('/') else {
        return Command::Chat(line.to_string());
    };
    let (verb, arg) = match rest.split_once(char::is_whitespace) {
        Some((verb, arg)) => (verb, arg.trim()),
        None => (rest, ""),
    };
    match verb {
        "create" if !arg.is_empty() => Command::Create(arg.to_string()),
        "create" => Command::Usage("usage: /create <channel>"),
        "join" if !arg.is_empty() => Command::Join(arg.to_string()),
        "join" => Command::Usage("usage: /join <channel>"),
        "pm" => match arg.split_once(char::is_whitespace) {
            Some((nickname, text)) if !text.trim().is_empty() => Command::Pm {
                nickname: nickname.to_string(),
                text: text.trim().to_string(),
            },
            _ => Command::Usage(PM_USAGE),
        },
        "members" => Command::Members,
        "channels" => Command::Channels,
        "history" => Command::History,
        "peers" => Command::Peers,
        _ => Command::Usage("commands: /create /join /pm /members /channels /history /peers EXIT"),
    }
}

/// Lines to print for an event.
pub fn render(event: &NodeEvent) -> Vec<String> {
    match event {
        NodeEvent::Chat(envelope) => vec![envelope.display_line()],
        NodeEvent::PrivateMessage(envelope) => vec![format!("[pm] {}", envelope.display_line())],
        NodeEvent::Joined { channel, node } => {
            vec![format!("* {} joined {}", node.display_name(), channel)]
        }
        NodeEvent::Left { channel, node } => {
            vec![format!("* {} left {}", node.display_name(), channel)]
        }
        NodeEvent::ChannelJoined { name, history } => {
            let mut lines = vec![format!("* now in {name}")];
            lines.extend(chronological(history));
            lines
        }
        NodeEvent::PeerConnected(node) => vec![format!("* {} is online", node.display_name())],
        NodeEvent::PeerRemoved(node) => vec![format!("* {} went away", node.display_name())],
    }
}

/// History is kept newest first; print it oldest first.
pub fn chronological(history: &[Envelope]) -> impl Iterator<Item = String> + '_ {
    history.iter().rev().map(Envelope::display_line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshchat_messages::MessageType;
    use meshchat_types::{Node, Timestamp};

    #[test]
    fn plain_text_is_chat() {
        assert_eq!(parse("hello there\n"), Command::Chat("hello there".into()));
        assert_eq!(parse("   "), Command::Empty);
    }

    #[test]
    fn exit_is_exact() {
        assert_eq!(parse("EXIT"), Command::Exit);
        assert_eq!(parse("EXIT\r\n"), Command::Exit);
        assert_eq!(parse("exit"), Command::Chat("exit".into()));
    }

    #[test]
    fn commands() {
        assert_eq!(parse("/create games"), Command::Create("games".into()));
        assert_eq!(parse("/join  general "), Command::Join("general".into()));
        assert_eq!(
            parse("/pm bob see you at 5"),
            Command::Pm {
                nickname: "bob".into(),
                text: "see you at 5".into()
            }
        );
        assert_eq!(parse("/members"), Command::Members);
        assert_eq!(parse("/peers"), Command::Peers);
        assert!(matches!(parse("/pm bob"), Command::Usage(_)));
        assert!(matches!(parse("/join"), Command::Usage(_)));
        assert!(matches!(parse("/dance"), Command::Usage(_)));
    }

    #[test]
    fn channel_history_prints_oldest_first() {
        let node = Node::new("h", "1", "alice");
        let newer = Envelope::at(MessageType::Chat, &node, "two", Timestamp::from_unix_millis(2_000));
        let older = Envelope::at(MessageType::Chat, &node, "one", Timestamp::from_unix_millis(1_000));
        let lines = render(&NodeEvent::ChannelJoined {
            name: "general".into(),
            history: vec![newer, older],
        });
        assert_eq!(lines.len(), 3);
        assert!(lines[1].ends_with("alice: one"));
        assert!(lines[2].ends_with("alice: two"));
    }
}
