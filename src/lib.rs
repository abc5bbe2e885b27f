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

//! A Mimblewimble-style chain validation node.
//!
//! This repository provides:
//! - Chain data model (headers, inputs, outputs, kernels, transactions, blocks)
//!   and a Merkle Mountain Range accumulator backing them
//! - Proof-of-work and difficulty retargeting, kernel-sum balancing, cut-through
//! - A binary wire protocol, per-peer connection state machine and candidate
//!   pools, and a node supervisor that drives header/state/block sync
//! - Flat-file persisted chain state and an Ed25519 node identity keystore
//! - Monitoring via Prometheus metrics and structured logging

/// Node configuration loading (TOML + environment overrides).
pub mod config;
/// Core protocol primitives (crypto, codec, MMR, consensus, chain, state, security).
pub mod core;
/// Observability (metrics, structured logging helpers).
pub mod monitoring;
/// Networking stack (wire protocol, peer state machine, node supervisor).
pub mod networking;
