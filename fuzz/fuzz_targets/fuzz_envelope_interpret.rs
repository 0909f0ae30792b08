#![no_main]

use libfuzzer_sys::fuzz_target;
use meshchat_messages::{Envelope, MessageType};
use meshchat_protocol::interpret;
use meshchat_types::Node;

fuzz_target!(|data: &[u8]| {
    // Interpretation of any content under any type is total: a payload or a
    // protocol error, never a panic.
    let Ok(content) = std::str::from_utf8(data) else {
        return;
    };
    let sender = Node::new("127.0.0.1", "7000", "fuzz");
    for kind in MessageType::KNOWN {
        let _ = interpret(&Envelope::new(kind, &sender, content));
    }
    let _ = interpret(&Envelope::new(MessageType::Unrecognized("FUZZ".into()), &sender, content));
});
