//! Fuzz target for SSH-1.5 inbound packet decoding.
//!
//! This fuzzer feeds arbitrary bytes to the packet decoder, with and without
//! Blowfish, to find:
//! - Panics on hostile length fields
//! - Out-of-bounds payload reads
//! - Incorrect error handling
//!
//! Run with:
//! ```bash
//! cd crates/proto
//! cargo +nightly fuzz run ssh1_packet -- -max_total_time=300
//! ```

#![no_main]
use libfuzzer_sys::fuzz_target;
use retrossh_proto::ssh1::crypto::{Cipher, CipherKind};
use retrossh_proto::ssh1::packet::{ClientPacket, ServerPacket};

fuzz_target!(|data: &[u8]| {
    let Some((&mode, wire)) = data.split_first() else {
        return;
    };

    let mut cipher = (mode & 1 == 1)
        .then(|| Cipher::new(CipherKind::Blowfish, &[mode; 32]).expect("32-byte key"));

    let Ok(mut packet) = ServerPacket::decode(wire, cipher.as_mut()) else {
        return;
    };

    // Exercise every payload reader; none may read past the payload
    let _ = packet.read_u8();
    let _ = packet.read_u16();
    let _ = packet.read_mp_int();
    let _ = packet.read_string();
    let _ = packet.read_bytes(packet.remaining() + 1);
    let msg_type = packet.msg_type();
    let rest = packet.read_to_end();
    let _ = packet.close(true);

    // Re-encoding known types must decode to the same payload
    if let Some(kind) = retrossh_proto::ssh1::MessageType::from_u8(msg_type) {
        let encoded = ClientPacket::new(kind, &rest, None).expect("payload fits");
        let (reparsed_type, reparsed) = ServerPacket::decode(encoded.as_bytes(), None)
            .and_then(ServerPacket::into_verified)
            .expect("Round-trip parsing should never fail");
        assert_eq!(reparsed_type, msg_type);
        assert_eq!(reparsed, rest);
    }
});
