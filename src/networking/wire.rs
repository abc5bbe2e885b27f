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
#![warn(missing_docs)]

//! The binary wire protocol: an 11-byte frame header followed by a
//! type-tagged payload, and the messages carried in it.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

use thiserror::Error;

use crate::core::chain::{Header, Kernel};
use crate::core::codec::{CodecError, Reader, Writer};

/// Frame/message decode failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    /// The 2-byte magic didn't match the configured network.
    #[error("magic mismatch")]
    BadMagic,
    /// `payload_length` exceeds `4 * max_payload(type)`.
    #[error("payload exceeds maximum for this message type")]
    PayloadTooLarge,
    /// The payload type byte isn't one of the known message types.
    #[error("unknown message type")]
    UnknownType,
    /// The payload didn't decode as the shape its type implies.
    #[error("malformed payload")]
    Malformed(#[from] CodecError),
}

/// Length of the frame header: `magic(2) | type(1) | payload_length(8)`.
pub const FRAME_HEADER_LEN: usize = 11;

/// One message type byte, per §4.9/§6.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum MessageType {
    /// An error was sent in reply to a request.
    ErrorResponse = 0,
    /// Handshake request.
    Hand = 1,
    /// Handshake reply.
    Shake = 2,
    /// Keepalive.
    Ping = 3,
    /// Keepalive reply.
    Pong = 4,
    /// Request known peer addresses.
    GetPeerAddresses = 5,
    /// Reply with known peer addresses.
    PeerAddresses = 6,
    /// Request a range of headers by locator.
    GetHeaders = 7,
    /// A single header, unsolicited (e.g. new-tip announce).
    Header = 8,
    /// A batch of headers in reply to `GetHeaders`.
    Headers = 9,
    /// Request a full block by hash.
    GetBlock = 10,
    /// A full block.
    Block = 11,
    /// Request a compact block by hash.
    GetCompactBlock = 12,
    /// A compact block.
    CompactBlock = 13,
    /// A stem-phase (Dandelion) transaction.
    StemTransaction = 14,
    /// A fluff-phase transaction.
    Transaction = 15,
    /// Request a tx-hash-set archive at a given height.
    TxHashSetRequest = 16,
    /// A tx-hash-set archive (header fields + an uncounted attachment).
    TxHashSetArchive = 17,
    /// Notifies the peer it is being banned, and why.
    BanReason = 18,
    /// Request a transaction by kernel excess.
    GetTransaction = 19,
    /// A single kernel, used to answer `GetTransaction`.
    TransactionKernel = 20,
    /// A Tor onion address announcement.
    TorAddress = 21,
    /// Anything outside the known range; never sent, only matched on decode.
    Unknown = 255,
}

impl MessageType {
    fn from_u8(b: u8) -> MessageType {
        match b {
            0 => MessageType::ErrorResponse,
            1 => MessageType::Hand,
            2 => MessageType::Shake,
            3 => MessageType::Ping,
            4 => MessageType::Pong,
            5 => MessageType::GetPeerAddresses,
            6 => MessageType::PeerAddresses,
            7 => MessageType::GetHeaders,
            8 => MessageType::Header,
            9 => MessageType::Headers,
            10 => MessageType::GetBlock,
            11 => MessageType::Block,
            12 => MessageType::GetCompactBlock,
            13 => MessageType::CompactBlock,
            14 => MessageType::StemTransaction,
            15 => MessageType::Transaction,
            16 => MessageType::TxHashSetRequest,
            17 => MessageType::TxHashSetArchive,
            18 => MessageType::BanReason,
            19 => MessageType::GetTransaction,
            20 => MessageType::TransactionKernel,
            21 => MessageType::TorAddress,
            _ => MessageType::Unknown,
        }
    }

    /// Per-type cap on a single payload (§6). Controls and small replies get
    /// a few KiB; bulk transfer types (headers batches, blocks, archives)
    /// get multi-megabyte ceilings.
    pub fn max_payload(self) -> u64 {
        match self {
            MessageType::ErrorResponse => 4_096,
            MessageType::Hand | MessageType::Shake => 4_096,
            MessageType::Ping | MessageType::Pong => 16,
            MessageType::GetPeerAddresses => 4,
            MessageType::PeerAddresses => 8_192,
            MessageType::GetHeaders => 4_096,
            MessageType::Header => 8_192,
            MessageType::Headers => 512 * 8_192,
            MessageType::GetBlock | MessageType::GetCompactBlock => 40,
            MessageType::Block | MessageType::CompactBlock => 4_000_000,
            MessageType::StemTransaction | MessageType::Transaction => 1_000_000,
            MessageType::TxHashSetRequest => 48,
            MessageType::TxHashSetArchive => 64,
            MessageType::BanReason => 4_096,
            MessageType::GetTransaction => 40,
            MessageType::TransactionKernel => 8_192,
            MessageType::TorAddress => 128,
            MessageType::Unknown => 0,
        }
    }
}

/// A network address as carried in `Hand`/`PeerAddresses`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NetworkAddress {
    /// IPv4 endpoint.
    V4(Ipv4Addr, u16),
    /// IPv6 endpoint.
    V6(Ipv6Addr, u16),
}

impl NetworkAddress {
    fn write(self, w: &mut Writer) {
        match self {
            NetworkAddress::V4(ip, port) => {
                w.write_u8(4);
                w.write_bytes(&ip.octets());
                w.write_u16(port);
            }
            NetworkAddress::V6(ip, port) => {
                w.write_u8(6);
                w.write_bytes(&ip.octets());
                w.write_u16(port);
            }
        }
    }

    fn read(r: &mut Reader) -> Result<Self, CodecError> {
        match r.read_u8()? {
            4 => {
                let octets = r.read_array::<4>()?;
                let port = r.read_u16()?;
                Ok(NetworkAddress::V4(Ipv4Addr::from(octets), port))
            }
            6 => {
                let octets = r.read_array::<16>()?;
                let port = r.read_u16()?;
                Ok(NetworkAddress::V6(Ipv6Addr::from(octets), port))
            }
            _ => Err(CodecError::InvalidValue),
        }
    }
}

impl From<SocketAddr> for NetworkAddress {
    fn from(a: SocketAddr) -> Self {
        match a {
            SocketAddr::V4(v4) => NetworkAddress::V4(*v4.ip(), v4.port()),
            SocketAddr::V6(v6) => NetworkAddress::V6(*v6.ip(), v6.port()),
        }
    }
}

impl From<NetworkAddress> for SocketAddr {
    fn from(a: NetworkAddress) -> Self {
        match a {
            NetworkAddress::V4(ip, port) => SocketAddr::new(ip.into(), port),
            NetworkAddress::V6(ip, port) => SocketAddr::new(ip.into(), port),
        }
    }
}

/// Bitflags describing what a peer supports, negotiated in `Shake`.
pub mod capabilities {
    /// Serves full blocks and headers to syncing peers.
    pub const FULL_NODE: u32 = 0b0000_0001;
    /// Serves tx-hash-set archives for fast state sync.
    pub const TXHASHSET_HIST: u32 = 0b0000_0010;
    /// What an outbound peer must offer before it counts as healthy.
    pub const REQUIRED: u32 = FULL_NODE;
}

/// Block-locator-style header request: hashes double backward from the tip,
/// capped at 20 plus genesis (§4.10 Phase A).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Locator {
    /// Candidate previous hashes, most recent first.
    pub hashes: Vec<[u8; 32]>,
}

/// A wire-level message. Body-carrying types (`Block`, `CompactBlock`,
/// `Transaction`, `StemTransaction`) are decoded as opaque bytes here; the
/// chain-data codecs in `core::chain` parse them further once a caller
/// needs the typed form.
#[derive(Clone, Debug, PartialEq)]
pub enum Message {
    /// Peer rejected/aborted with a human-readable reason.
    ErrorResponse(String),
    /// Handshake request.
    Hand {
        /// Random nonce identifying this connection attempt.
        nonce: u64,
        /// Sender's view of total chain difficulty.
        total_difficulty: u64,
        /// Sender's own externally reachable address, if known.
        sender_addr: NetworkAddress,
        /// The address being dialed.
        receiver_addr: NetworkAddress,
        /// Free-form software identifier.
        user_agent: String,
        /// Genesis block hash; a mismatch ends the handshake immediately.
        genesis_hash: [u8; 32],
        /// Minimum fee rate the sender will relay/mine.
        base_fee: u64,
    },
    /// Handshake reply.
    Shake {
        /// Capability bitflags (see [`capabilities`]).
        capabilities: u32,
        /// Responder's view of total chain difficulty.
        total_difficulty: u64,
        /// Free-form software identifier.
        user_agent: String,
        /// Negotiated wire protocol version.
        protocol_version: u32,
        /// Minimum fee rate the responder will relay/mine.
        base_fee: u64,
    },
    /// Keepalive carrying the sender's current tip difficulty/height.
    Ping {
        /// Sender's total difficulty.
        total_difficulty: u64,
        /// Sender's height.
        height: u64,
    },
    /// Keepalive reply, same shape as `Ping`.
    Pong {
        /// Sender's total difficulty.
        total_difficulty: u64,
        /// Sender's height.
        height: u64,
    },
    /// Ask the peer for other peer addresses it knows about.
    GetPeerAddresses,
    /// Reply to `GetPeerAddresses`.
    PeerAddresses(Vec<NetworkAddress>),
    /// Ask for headers starting after the best-matching locator entry.
    GetHeaders(Locator),
    /// One header, sent unsolicited on a new local tip.
    Header(Header),
    /// A batch of headers (at most 512) in reply to `GetHeaders`.
    Headers(Vec<Header>),
    /// Ask for a full block by its hash.
    GetBlock([u8; 32]),
    /// A full block body, opaque on the wire (parsed by the caller).
    Block(Vec<u8>),
    /// Ask for a compact block by its hash.
    GetCompactBlock([u8; 32]),
    /// A compact block body, opaque on the wire.
    CompactBlock(Vec<u8>),
    /// A Dandelion stem-phase transaction, opaque on the wire.
    StemTransaction(Vec<u8>),
    /// A fluff-phase (normally relayed) transaction, opaque on the wire.
    Transaction(Vec<u8>),
    /// Ask for a tx-hash-set archive as of the block at `height`/`block_hash`.
    TxHashSetRequest {
        /// Hash of the header the archive snapshots.
        block_hash: [u8; 32],
        /// Height of that header.
        height: u64,
    },
    /// Archive header: the attachment (leaf stream + hash stream + prune
    /// bitmap, `attachment_length` bytes) follows uncounted in the frame.
    TxHashSetArchive {
        /// Hash of the header the archive snapshots.
        block_hash: [u8; 32],
        /// Height of that header.
        height: u64,
        /// Length in bytes of the attachment that follows this payload.
        attachment_length: u64,
    },
    /// Tells the peer it has been banned, and why.
    BanReason(String),
    /// Ask for the transaction whose kernel has this excess commitment.
    GetTransaction {
        /// 33-byte kernel excess commitment.
        kernel_excess: [u8; 33],
    },
    /// A single kernel, in reply to `GetTransaction`.
    TransactionKernel(Kernel),
    /// A Tor onion-service address announcement.
    TorAddress(String),
    /// A type byte outside the known range.
    Unknown(u8, Vec<u8>),
}

impl Message {
    /// This message's wire type byte.
    pub fn message_type(&self) -> MessageType {
        match self {
            Message::ErrorResponse(_) => MessageType::ErrorResponse,
            Message::Hand { .. } => MessageType::Hand,
            Message::Shake { .. } => MessageType::Shake,
            Message::Ping { .. } => MessageType::Ping,
            Message::Pong { .. } => MessageType::Pong,
            Message::GetPeerAddresses => MessageType::GetPeerAddresses,
            Message::PeerAddresses(_) => MessageType::PeerAddresses,
            Message::GetHeaders(_) => MessageType::GetHeaders,
            Message::Header(_) => MessageType::Header,
            Message::Headers(_) => MessageType::Headers,
            Message::GetBlock(_) => MessageType::GetBlock,
            Message::Block(_) => MessageType::Block,
            Message::GetCompactBlock(_) => MessageType::GetCompactBlock,
            Message::CompactBlock(_) => MessageType::CompactBlock,
            Message::StemTransaction(_) => MessageType::StemTransaction,
            Message::Transaction(_) => MessageType::Transaction,
            Message::TxHashSetRequest { .. } => MessageType::TxHashSetRequest,
            Message::TxHashSetArchive { .. } => MessageType::TxHashSetArchive,
            Message::BanReason(_) => MessageType::BanReason,
            Message::GetTransaction { .. } => MessageType::GetTransaction,
            Message::TransactionKernel(_) => MessageType::TransactionKernel,
            Message::TorAddress(_) => MessageType::TorAddress,
            Message::Unknown(t, _) => {
                let _ = t;
                MessageType::Unknown
            }
        }
    }

    fn write_string(w: &mut Writer, s: &str) {
        let bytes = s.as_bytes();
        w.write_u16(bytes.len().min(u16::MAX as usize) as u16);
        w.write_bytes(&bytes[..bytes.len().min(u16::MAX as usize)]);
    }

    fn read_string(r: &mut Reader) -> Result<String, CodecError> {
        let len = r.read_u16()? as usize;
        let bytes = r.read_bytes(len)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    /// Encode the payload only (the frame header is written separately by
    /// [`encode_frame`]).
    fn encode_payload(&self, protocol_version: u32) -> Vec<u8> {
        let mut w = Writer::new();
        match self {
            Message::ErrorResponse(reason) => Self::write_string(&mut w, reason),
            Message::Hand {
                nonce,
                total_difficulty,
                sender_addr,
                receiver_addr,
                user_agent,
                genesis_hash,
                base_fee,
            } => {
                w.write_u64(*nonce);
                w.write_u64(*total_difficulty);
                sender_addr.write(&mut w);
                receiver_addr.write(&mut w);
                Self::write_string(&mut w, user_agent);
                w.write_bytes(genesis_hash);
                w.write_u64(*base_fee);
            }
            Message::Shake {
                capabilities,
                total_difficulty,
                user_agent,
                protocol_version: pv,
                base_fee,
            } => {
                w.write_u32(*capabilities);
                w.write_u64(*total_difficulty);
                Self::write_string(&mut w, user_agent);
                w.write_u32(*pv);
                w.write_u64(*base_fee);
            }
            Message::Ping { total_difficulty, height } | Message::Pong { total_difficulty, height } => {
                w.write_u64(*total_difficulty);
                w.write_u64(*height);
            }
            Message::GetPeerAddresses => {}
            Message::PeerAddresses(addrs) => {
                w.write_u32(addrs.len() as u32);
                for a in addrs {
                    a.write(&mut w);
                }
            }
            Message::GetHeaders(locator) => {
                w.write_u32(locator.hashes.len() as u32);
                for h in &locator.hashes {
                    w.write_bytes(h);
                }
            }
            Message::Header(h) => w.write_bytes(&h.serialize()),
            Message::Headers(hs) => {
                w.write_u32(hs.len() as u32);
                for h in hs {
                    let bytes = h.serialize();
                    w.write_u32(bytes.len() as u32);
                    w.write_bytes(&bytes);
                }
            }
            Message::GetBlock(hash) | Message::GetCompactBlock(hash) => w.write_bytes(hash),
            Message::Block(bytes) | Message::CompactBlock(bytes) => w.write_bytes(bytes),
            Message::StemTransaction(bytes) | Message::Transaction(bytes) => w.write_bytes(bytes),
            Message::TxHashSetRequest { block_hash, height } => {
                w.write_bytes(block_hash);
                w.write_u64(*height);
            }
            Message::TxHashSetArchive {
                block_hash,
                height,
                attachment_length,
            } => {
                w.write_bytes(block_hash);
                w.write_u64(*height);
                w.write_u64(*attachment_length);
            }
            Message::BanReason(reason) => Self::write_string(&mut w, reason),
            Message::GetTransaction { kernel_excess } => w.write_bytes(kernel_excess),
            Message::TransactionKernel(k) => w.write_bytes(&k.serialize(protocol_version)),
            Message::TorAddress(addr) => Self::write_string(&mut w, addr),
            Message::Unknown(_, bytes) => w.write_bytes(bytes),
        }
        w.into_bytes()
    }

    fn decode_payload(ty: MessageType, bytes: &[u8], protocol_version: u32) -> Result<Message, WireError> {
        let mut r = Reader::new(bytes);
        let msg = match ty {
            MessageType::ErrorResponse => Message::ErrorResponse(Self::read_string(&mut r)?),
            MessageType::Hand => {
                let nonce = r.read_u64()?;
                let total_difficulty = r.read_u64()?;
                let sender_addr = NetworkAddress::read(&mut r)?;
                let receiver_addr = NetworkAddress::read(&mut r)?;
                let user_agent = Self::read_string(&mut r)?;
                let genesis_hash = r.read_array::<32>()?;
                let base_fee = r.read_u64()?;
                Message::Hand {
                    nonce,
                    total_difficulty,
                    sender_addr,
                    receiver_addr,
                    user_agent,
                    genesis_hash,
                    base_fee,
                }
            }
            MessageType::Shake => {
                let capabilities = r.read_u32()?;
                let total_difficulty = r.read_u64()?;
                let user_agent = Self::read_string(&mut r)?;
                let protocol_version = r.read_u32()?;
                let base_fee = r.read_u64()?;
                Message::Shake {
                    capabilities,
                    total_difficulty,
                    user_agent,
                    protocol_version,
                    base_fee,
                }
            }
            MessageType::Ping => Message::Ping {
                total_difficulty: r.read_u64()?,
                height: r.read_u64()?,
            },
            MessageType::Pong => Message::Pong {
                total_difficulty: r.read_u64()?,
                height: r.read_u64()?,
            },
            MessageType::GetPeerAddresses => Message::GetPeerAddresses,
            MessageType::PeerAddresses => {
                let count = r.read_u32()? as usize;
                let mut addrs = Vec::with_capacity(count.min(1024));
                for _ in 0..count {
                    addrs.push(NetworkAddress::read(&mut r)?);
                }
                Message::PeerAddresses(addrs)
            }
            MessageType::GetHeaders => {
                let count = r.read_u32()? as usize;
                let mut hashes = Vec::with_capacity(count.min(64));
                for _ in 0..count {
                    hashes.push(r.read_array::<32>()?);
                }
                Message::GetHeaders(Locator { hashes })
            }
            MessageType::Header => Message::Header(Header::deserialize(r.read_bytes(r.remaining())?)?),
            MessageType::Headers => {
                let count = r.read_u32()? as usize;
                let mut headers = Vec::with_capacity(count.min(512));
                for _ in 0..count {
                    let len = r.read_u32()? as usize;
                    headers.push(Header::deserialize(r.read_bytes(len)?)?);
                }
                Message::Headers(headers)
            }
            MessageType::GetBlock => Message::GetBlock(r.read_array::<32>()?),
            MessageType::GetCompactBlock => Message::GetCompactBlock(r.read_array::<32>()?),
            MessageType::Block => Message::Block(r.read_bytes(r.remaining())?.to_vec()),
            MessageType::CompactBlock => Message::CompactBlock(r.read_bytes(r.remaining())?.to_vec()),
            MessageType::StemTransaction => Message::StemTransaction(r.read_bytes(r.remaining())?.to_vec()),
            MessageType::Transaction => Message::Transaction(r.read_bytes(r.remaining())?.to_vec()),
            MessageType::TxHashSetRequest => Message::TxHashSetRequest {
                block_hash: r.read_array::<32>()?,
                height: r.read_u64()?,
            },
            MessageType::TxHashSetArchive => Message::TxHashSetArchive {
                block_hash: r.read_array::<32>()?,
                height: r.read_u64()?,
                attachment_length: r.read_u64()?,
            },
            MessageType::BanReason => Message::BanReason(Self::read_string(&mut r)?),
            MessageType::GetTransaction => Message::GetTransaction {
                kernel_excess: r.read_array::<33>()?,
            },
            MessageType::TransactionKernel => {
                let (kernel, _consumed) = Kernel::deserialize(r.read_bytes(r.remaining())?, protocol_version)
                    .ok_or(WireError::Malformed(CodecError::InvalidValue))?;
                Message::TransactionKernel(kernel)
            }
            MessageType::TorAddress => Message::TorAddress(Self::read_string(&mut r)?),
            MessageType::Unknown => return Err(WireError::UnknownType),
        };
        Ok(msg)
    }
}

/// Encode one message as a complete frame: header + payload (+ the
/// uncounted attachment for `TxHashSetArchive`, appended by the caller).
pub fn encode_frame(magic: [u8; 2], protocol_version: u32, msg: &Message) -> Vec<u8> {
    let payload = msg.encode_payload(protocol_version);
    let mut out = Vec::with_capacity(FRAME_HEADER_LEN + payload.len());
    out.extend_from_slice(&magic);
    out.push(match msg.message_type() {
        MessageType::Unknown => 255,
        other => other as u8,
    });
    out.extend_from_slice(&(payload.len() as u64).to_be_bytes());
    out.extend_from_slice(&payload);
    out
}

/// A parsed frame header: message type and declared payload length.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameHeader {
    /// Declared message type byte.
    pub message_type: MessageType,
    /// Declared payload length, in bytes.
    pub payload_length: u64,
}

/// Parse the 11-byte frame header, checking magic and the
/// `4 * max_payload(type)` cap (§6).
pub fn decode_frame_header(magic: [u8; 2], bytes: &[u8; FRAME_HEADER_LEN]) -> Result<FrameHeader, WireError> {
    if bytes[0] != magic[0] || bytes[1] != magic[1] {
        return Err(WireError::BadMagic);
    }
    let message_type = MessageType::from_u8(bytes[2]);
    let mut len_bytes = [0u8; 8];
    len_bytes.copy_from_slice(&bytes[3..11]);
    let payload_length = u64::from_be_bytes(len_bytes);
    if payload_length > message_type.max_payload().saturating_mul(4) {
        return Err(WireError::PayloadTooLarge);
    }
    Ok(FrameHeader {
        message_type,
        payload_length,
    })
}

/// Parse a message body given the frame header that preceded it.
pub fn decode_message(header: FrameHeader, payload: &[u8], protocol_version: u32) -> Result<Message, WireError> {
    if payload.len() as u64 != header.payload_length {
        return Err(WireError::Malformed(CodecError::TrailingBytes));
    }
    if header.message_type == MessageType::Unknown {
        return Ok(Message::Unknown(255, payload.to_vec()));
    }
    Message::decode_payload(header.message_type, payload, protocol_version)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAGIC: [u8; 2] = [0x1a, 0x36];

    #[test]
    fn ping_round_trips_through_a_full_frame() {
        let msg = Message::Ping {
            total_difficulty: 42,
            height: 7,
        };
        let frame = encode_frame(MAGIC, 3, &msg);
        let mut header_bytes = [0u8; FRAME_HEADER_LEN];
        header_bytes.copy_from_slice(&frame[..FRAME_HEADER_LEN]);
        let header = decode_frame_header(MAGIC, &header_bytes).unwrap();
        assert_eq!(header.message_type, MessageType::Ping);
        let decoded = decode_message(header, &frame[FRAME_HEADER_LEN..], 3).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn hand_round_trips_with_addresses_and_user_agent() {
        let msg = Message::Hand {
            nonce: 0xdead_beef,
            total_difficulty: 1000,
            sender_addr: NetworkAddress::V4(Ipv4Addr::new(127, 0, 0, 1), 3414),
            receiver_addr: NetworkAddress::V4(Ipv4Addr::new(10, 0, 0, 1), 3414),
            user_agent: "mwc-node/5.0".to_string(),
            genesis_hash: [9u8; 32],
            base_fee: 1_000_000,
        };
        let frame = encode_frame(MAGIC, 3, &msg);
        let mut header_bytes = [0u8; FRAME_HEADER_LEN];
        header_bytes.copy_from_slice(&frame[..FRAME_HEADER_LEN]);
        let header = decode_frame_header(MAGIC, &header_bytes).unwrap();
        let decoded = decode_message(header, &frame[FRAME_HEADER_LEN..], 3).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn bad_magic_is_rejected() {
        let msg = Message::GetPeerAddresses;
        let frame = encode_frame(MAGIC, 3, &msg);
        let mut header_bytes = [0u8; FRAME_HEADER_LEN];
        header_bytes.copy_from_slice(&frame[..FRAME_HEADER_LEN]);
        assert_eq!(decode_frame_header([0, 0], &header_bytes).unwrap_err(), WireError::BadMagic);
    }

    #[test]
    fn oversized_payload_length_is_rejected_before_reading_any_payload() {
        let mut header_bytes = [0u8; FRAME_HEADER_LEN];
        header_bytes[0..2].copy_from_slice(&MAGIC);
        header_bytes[2] = MessageType::Ping as u8;
        header_bytes[3..11].copy_from_slice(&(1_000_000u64).to_be_bytes());
        assert_eq!(
            decode_frame_header(MAGIC, &header_bytes).unwrap_err(),
            WireError::PayloadTooLarge
        );
    }

    #[test]
    fn headers_batch_round_trips() {
        let mut header = Header {
            version: 1,
            height: 5,
            timestamp: 100,
            previous_block_hash: [1u8; 32],
            previous_header_root: [2u8; 32],
            output_root: [3u8; 32],
            rangeproof_root: [4u8; 32],
            kernel_root: [5u8; 32],
            total_kernel_offset: [0u8; 32],
            output_mmr_size: 0,
            kernel_mmr_size: 0,
            total_difficulty: 10,
            secondary_scaling: 1,
            nonce: 0,
            edge_bits: 29,
            proof_nonces: [0u64; 42],
        };
        for (i, n) in header.proof_nonces.iter_mut().enumerate() {
            *n = i as u64;
        }
        let msg = Message::Headers(vec![header.clone(), header.clone()]);
        let frame = encode_frame(MAGIC, 3, &msg);
        let mut header_bytes = [0u8; FRAME_HEADER_LEN];
        header_bytes.copy_from_slice(&frame[..FRAME_HEADER_LEN]);
        let fh = decode_frame_header(MAGIC, &header_bytes).unwrap();
        let decoded = decode_message(fh, &frame[FRAME_HEADER_LEN..], 3).unwrap();
        match decoded {
            Message::Headers(hs) => assert_eq!(hs, vec![header.clone(), header]),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn unknown_type_byte_round_trips_as_opaque() {
        let mut header_bytes = [0u8; FRAME_HEADER_LEN];
        header_bytes[0..2].copy_from_slice(&MAGIC);
        header_bytes[2] = 200;
        header_bytes[3..11].copy_from_slice(&4u64.to_be_bytes());
        let header = decode_frame_header(MAGIC, &header_bytes).unwrap();
        assert_eq!(header.message_type, MessageType::Unknown);
        let decoded = decode_message(header, &[1, 2, 3, 4], 3).unwrap();
        assert_eq!(decoded, Message::Unknown(255, vec![1, 2, 3, 4]));
    }
}
