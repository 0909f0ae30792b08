#![no_main]

use libfuzzer_sys::fuzz_target;
use meshchat_messages::Envelope;
use meshchat_protocol::codec;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must never panic the decoder, framed or not.
    let _ = codec::decode::<Envelope>(data);
    let _ = codec::decode::<serde_json::Value>(data);

    match codec::decode_framed::<Envelope>(data) {
        Ok(Some((envelope, consumed))) => {
            assert!(consumed <= data.len());
            // Whatever decoded must encode and decode back to itself.
            let encoded = codec::encode(&envelope).expect("decoded envelope re-encodes");
            let (again, used) = codec::decode_framed::<Envelope>(&encoded)
                .expect("re-encoded envelope decodes")
                .expect("re-encoded frame is complete");
            assert_eq!(again, envelope);
            assert_eq!(used, encoded.len());
        }
        Ok(None) | Err(_) => {}
    }
});
