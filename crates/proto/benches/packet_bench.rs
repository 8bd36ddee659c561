//! SSH-1.5 Packet Benchmarks
//!
//! Benchmarks for packet framing with and without Blowfish, and for the
//! double RSA session key wrap done once per connection.
//!
//! Run with: `cargo bench --bench packet_bench`

use bytes::BytesMut;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use num_bigint::BigUint;
use retrossh_proto::ssh1::crypto::{Cipher, CipherKind};
use retrossh_proto::ssh1::message::MessageType;
use retrossh_proto::ssh1::packet::{put_string, ClientPacket, ServerPacket};
use retrossh_proto::ssh1::rsa::{wrap_session_key, RsaPublicKey};

const SERVER_KEY_N: &str = "9af710596eb4fe6ed4419eac6f4d26367627632300fc1e4f34f24fa2a28eab9e2b699acb8726480441dc700666ebf08ce87ecb477955ebf7536bedb90cb735063e97391be99b473e95a81b0c8a0fc5f2d32b19005d5e8cfd2d1b8ef71eaab9e1";
const HOST_KEY_N: &str = "ba9a577bc5fb965a76f581a04904bc2aea5b70640bbb8a6de39eda400cbae8dcd8ee828c1ab5a55ef0ab555b16b00d65f6907806c8fe8d977662519755ef07adbe4111bc020b6d831c47757126fd0bb8f06d9bff2c80cd96b55d72e44fc92b5ac1ce8ca1fd993958d61ca906e63c1bbaa2e2043e02aedf6fa54aa3f8873b004b";

const SIZES: [usize; 3] = [64, 512, 1024];

fn stdin_payload(len: usize) -> Vec<u8> {
    let mut payload = BytesMut::new();
    put_string(&mut payload, &vec![0x42u8; len]);
    payload.to_vec()
}

fn blowfish() -> Cipher {
    Cipher::new(CipherKind::Blowfish, &[0x5au8; 32]).unwrap()
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("packet_encode");

    for size in SIZES {
        let payload = stdin_payload(size);
        group.throughput(Throughput::Bytes(size as u64));

        group.bench_function(format!("plain_{}bytes", size), |b| {
            b.iter(|| {
                black_box(ClientPacket::new(MessageType::StdinData, &payload, None).unwrap())
            });
        });

        group.bench_function(format!("blowfish_{}bytes", size), |b| {
            let mut cipher = blowfish();
            b.iter(|| {
                black_box(
                    ClientPacket::new(MessageType::StdinData, &payload, Some(&mut cipher))
                        .unwrap(),
                )
            });
        });
    }

    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("packet_decode");

    for size in SIZES {
        let payload = stdin_payload(size);
        group.throughput(Throughput::Bytes(size as u64));

        let plain = ClientPacket::new(MessageType::StdoutData, &payload, None).unwrap();
        group.bench_function(format!("plain_{}bytes", size), |b| {
            b.iter(|| {
                let packet = ServerPacket::decode(black_box(plain.as_bytes()), None).unwrap();
                black_box(packet.into_verified().unwrap())
            });
        });

        // Zero IV and a fresh chain per packet keep every iteration identical
        let encrypted =
            ClientPacket::new(MessageType::StdoutData, &payload, Some(&mut blowfish())).unwrap();
        group.bench_function(format!("blowfish_{}bytes", size), |b| {
            b.iter(|| {
                let mut cipher = blowfish();
                let packet =
                    ServerPacket::decode(black_box(encrypted.as_bytes()), Some(&mut cipher))
                        .unwrap();
                black_box(packet.into_verified().unwrap())
            });
        });
    }

    group.finish();
}

fn bench_session_key_wrap(c: &mut Criterion) {
    let e = BigUint::from(65537u32);
    let server_key = RsaPublicKey::new(
        768,
        e.clone(),
        BigUint::parse_bytes(SERVER_KEY_N.as_bytes(), 16).unwrap(),
    );
    let host_key = RsaPublicKey::new(
        1024,
        e,
        BigUint::parse_bytes(HOST_KEY_N.as_bytes(), 16).unwrap(),
    );
    let session_key = [0x17u8; 32];

    c.bench_function("session_key_wrap", |b| {
        b.iter(|| black_box(wrap_session_key(&session_key, &server_key, &host_key).unwrap()));
    });
}

criterion_group!(benches, bench_encode, bench_decode, bench_session_key_wrap);
criterion_main!(benches);
