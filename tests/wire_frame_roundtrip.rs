// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![forbid(unsafe_code)]

use mwc_validation_node::networking::wire::{
    decode_frame_header, decode_message, encode_frame, FrameHeader, Message, MessageType,
    FRAME_HEADER_LEN,
};

const MAGIC: [u8; 2] = [0x1a, 0x36];
const PROTOCOL_VERSION: u32 = 1;

fn split_frame(frame: &[u8]) -> (FrameHeader, &[u8]) {
    let mut header_bytes = [0u8; FRAME_HEADER_LEN];
    header_bytes.copy_from_slice(&frame[..FRAME_HEADER_LEN]);
    let header = decode_frame_header(MAGIC, &header_bytes).unwrap();
    (header, &frame[FRAME_HEADER_LEN..])
}

#[test]
fn ping_survives_encode_decode() {
    let msg = Message::Ping {
        total_difficulty: 12_345,
        height: 42,
    };
    let frame = encode_frame(MAGIC, PROTOCOL_VERSION, &msg);
    let (header, payload) = split_frame(&frame);

    assert_eq!(header.message_type, MessageType::Ping);
    let decoded = decode_message(header, payload, PROTOCOL_VERSION).unwrap();
    assert_eq!(decoded, msg);
}

#[test]
fn hand_shake_roundtrip_preserves_genesis_hash() {
    use mwc_validation_node::networking::wire::NetworkAddress;
    use std::net::Ipv4Addr;

    let msg = Message::Hand {
        nonce: 7,
        total_difficulty: 1,
        sender_addr: NetworkAddress::V4(Ipv4Addr::new(127, 0, 0, 1), 3414),
        receiver_addr: NetworkAddress::V4(Ipv4Addr::new(127, 0, 0, 1), 3415),
        user_agent: "mwc-node/0.1".to_string(),
        genesis_hash: [9u8; 32],
        base_fee: 1_000,
    };
    let frame = encode_frame(MAGIC, PROTOCOL_VERSION, &msg);
    let (header, payload) = split_frame(&frame);
    let decoded = decode_message(header, payload, PROTOCOL_VERSION).unwrap();
    assert_eq!(decoded, msg);
}

#[test]
fn frame_header_rejects_wrong_magic() {
    let msg = Message::Ping { total_difficulty: 0, height: 0 };
    let frame = encode_frame(MAGIC, PROTOCOL_VERSION, &msg);
    let mut header_bytes = [0u8; FRAME_HEADER_LEN];
    header_bytes.copy_from_slice(&frame[..FRAME_HEADER_LEN]);

    assert!(decode_frame_header([0xff, 0xff], &header_bytes).is_err());
}
