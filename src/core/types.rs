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

//! Deterministic canonical encoding helpers, and the node's on-disk
//! configuration shape.

use bincode::Options;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

/// Canonical serialization error.
#[derive(Debug, Error)]
pub enum CodecError {
    /// `bincode` failed to serialize the value.
    #[error("serialization")]
    Serialize,
    /// `bincode` failed to deserialize the value.
    #[error("deserialization")]
    Deserialize,
    /// The input exceeded the caller's size cap.
    #[error("size limit exceeded")]
    TooLarge,
}

/// Canonical bincode options (deterministic).
fn bincode_opts() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .reject_trailing_bytes()
}

/// Encode with deterministic rules. Requires deterministic container
/// ordering (use `BTreeMap`/`BTreeSet`).
pub fn encode_canonical<T: Serialize>(v: &T) -> Result<Vec<u8>, CodecError> {
    bincode_opts().serialize(v).map_err(|_| CodecError::Serialize)
}

/// Decode with a hard size cap, checked both before and during parsing.
pub fn decode_canonical_limited<T: DeserializeOwned>(bytes: &[u8], max: usize) -> Result<T, CodecError> {
    if bytes.len() > max {
        return Err(CodecError::TooLarge);
    }
    bincode_opts()
        .with_limit(max as u64)
        .deserialize(bytes)
        .map_err(|_| CodecError::Deserialize)
}

/// Raw signature bytes, used by [`crate::core::security::keystore`] for the
/// node identity key (expected 64 bytes, Ed25519).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Signature(pub Vec<u8>);

/// Node configuration root, loaded from TOML with environment overrides
/// (§6 Ambient Stack).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Node-level settings.
    pub node: NodeSettings,
    /// Metrics HTTP endpoint.
    pub http: HttpConfig,
    /// Peer-to-peer networking settings.
    pub p2p: P2pConfig,
    /// Consensus parameter overrides.
    pub consensus: ConsensusConfig,
}

/// Node-level settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeSettings {
    /// Human-readable node name, sent as part of the handshake user agent.
    pub name: String,
    /// Data directory (persisted chain state + keys).
    pub data_dir: String,
    /// Which network's consensus parameters to run (`"mainnet"` or `"floonet"`).
    #[serde(default = "default_network")]
    pub network: String,
}

fn default_network() -> String {
    "mainnet".to_string()
}

/// Metrics HTTP endpoint config.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Listen address, e.g. `0.0.0.0:9090`.
    pub listen_addr: String,
}

/// Peer-to-peer networking settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct P2pConfig {
    /// Address to listen on for inbound peer connections.
    pub listen_addr: String,
    /// This node's externally reachable address, if known (advertised in
    /// the `Hand` handshake message).
    #[serde(default)]
    pub external_addr: Option<String>,
    /// Seed peers to dial at startup, in addition to DNS seeds.
    #[serde(default)]
    pub seed_peers: Vec<String>,
    /// Target number of simultaneously connected peers.
    #[serde(default = "default_max_peers")]
    pub max_peers: usize,
    /// Minimum fee rate this node relays and mines.
    #[serde(default)]
    pub base_fee: u64,
}

fn default_max_peers() -> usize {
    crate::networking::node::DESIRED_PEERS
}

/// Consensus parameter overrides; absent fields fall back to the network's
/// built-in defaults (`ConsensusParams::mainnet`/`floonet`).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ConsensusConfig {
    /// Override the maximum block weight, if set.
    #[serde(default)]
    pub maximum_block_weight: Option<u64>,
    /// Override the default relay/mining base fee, if set.
    #[serde(default)]
    pub default_base_fee: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_round_trips_through_encode_decode() {
        let sig = Signature(vec![1, 2, 3, 4]);
        let bytes = encode_canonical(&sig).unwrap();
        let restored: Signature = decode_canonical_limited(&bytes, 64).unwrap();
        assert_eq!(restored, sig);
    }

    #[test]
    fn decode_rejects_oversized_input() {
        let sig = Signature(vec![0u8; 100]);
        let bytes = encode_canonical(&sig).unwrap();
        let err = decode_canonical_limited::<Signature>(&bytes, 8).unwrap_err();
        assert!(matches!(err, CodecError::TooLarge));
    }
}
