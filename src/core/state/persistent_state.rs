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

//! Flat-file persistence for [`ChainState`] (§6): the tip header plus the
//! four MMRs, each snapshotted through [`crate::core::mmr::Mmr::export_archive`]
//! and restored through [`crate::core::mmr::Mmr::build_from_archive`], written
//! with the same write-to-tmp/rename idiom `core::security::keystore` uses
//! for key material.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use croaring::Bitmap;
use thiserror::Error;

use crate::core::chain::header::{Header, HeaderError, HeaderLeaf};
use crate::core::chain::kernel::Kernel;
use crate::core::chain::output::{Output, Rangeproof};
use crate::core::chain::state::ChainState;
use crate::core::codec::{CodecError, Reader, Writer};
use crate::core::mmr::{Mmr, MmrError, MmrLeaf};

/// State store errors.
#[derive(Debug, Error)]
pub enum StateError {
    /// A filesystem operation failed.
    #[error("io error")]
    Io,
    /// A snapshot file was truncated or malformed.
    #[error("malformed snapshot: {0}")]
    Codec(#[from] CodecError),
    /// The tip header failed to parse.
    #[error("malformed tip header: {0}")]
    Header(#[from] HeaderError),
    /// Rebuilding an MMR from its snapshot failed.
    #[error("malformed mmr snapshot: {0}")]
    Mmr(#[from] MmrError),
}

const HEADERS_FILE: &str = "headers.mmr";
const OUTPUTS_FILE: &str = "outputs.mmr";
const RANGEPROOFS_FILE: &str = "rangeproofs.mmr";
const KERNELS_FILE: &str = "kernels.mmr";
const TIP_FILE: &str = "tip.header";

/// A directory holding one node's persisted chain state.
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    /// Open (creating if absent) the state directory at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StateError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|_| StateError::Io)?;
        Ok(Self { dir })
    }

    /// Load the persisted chain state, or a fresh genesis state if this
    /// store has never been saved to.
    pub fn load(&self, protocol_version: u32, genesis: Header) -> Result<ChainState, StateError> {
        let tip_path = self.dir.join(TIP_FILE);
        if !tip_path.exists() {
            return Ok(ChainState::new(protocol_version, genesis));
        }

        let tip_bytes = fs::read(&tip_path).map_err(|_| StateError::Io)?;
        let tip = Header::deserialize(&tip_bytes)?;

        let headers: Mmr<HeaderLeaf> = self.load_mmr(protocol_version, HEADERS_FILE)?;
        let outputs: Mmr<Output> = self.load_mmr(protocol_version, OUTPUTS_FILE)?;
        let rangeproofs: Mmr<Rangeproof> = self.load_mmr(protocol_version, RANGEPROOFS_FILE)?;
        let kernels: Mmr<Kernel> = self.load_mmr(protocol_version, KERNELS_FILE)?;

        let mut state = ChainState::new(protocol_version, genesis);
        state.install_archive(headers, outputs, rangeproofs, kernels, tip);
        Ok(state)
    }

    /// Snapshot the current chain state to disk, replacing any prior
    /// snapshot. Each file is written to a `.tmp` sibling and renamed into
    /// place, so a save that's interrupted mid-write leaves the previous
    /// snapshot intact.
    pub fn save(&self, state: &ChainState) -> Result<(), StateError> {
        let tip = state.tip_header().expect("tip header always retained");
        self.atomic_write(TIP_FILE, &tip.serialize())?;
        self.save_mmr(state.headers(), HEADERS_FILE)?;
        self.save_mmr(state.outputs(), OUTPUTS_FILE)?;
        self.save_mmr(state.rangeproofs(), RANGEPROOFS_FILE)?;
        self.save_mmr(state.kernels(), KERNELS_FILE)?;
        Ok(())
    }

    fn save_mmr<L: MmrLeaf>(&self, mmr: &Mmr<L>, name: &str) -> Result<(), StateError> {
        let (total_size, leaf_stream, hash_stream, pruned) = mmr.export_archive();

        let mut w = Writer::new();
        w.write_u64(total_size);
        w.write_u32(leaf_stream.len() as u32);
        w.write_bytes(&leaf_stream);
        w.write_u32(hash_stream.len() as u32);
        w.write_bytes(&hash_stream);
        let pruned_positions: Vec<u32> = pruned.iter().collect();
        w.write_u32(pruned_positions.len() as u32);
        for position in pruned_positions {
            w.write_u32(position);
        }

        self.atomic_write(name, &w.into_bytes())
    }

    fn load_mmr<L: MmrLeaf>(&self, protocol_version: u32, name: &str) -> Result<Mmr<L>, StateError> {
        let bytes = fs::read(self.dir.join(name)).map_err(|_| StateError::Io)?;
        let mut r = Reader::new(&bytes);

        let total_size = r.read_u64()?;
        let leaf_len = r.read_u32()? as usize;
        let leaf_stream = r.read_bytes(leaf_len)?.to_vec();
        let hash_len = r.read_u32()? as usize;
        let hash_stream = r.read_bytes(hash_len)?.to_vec();
        let pruned_count = r.read_u32()? as usize;
        let mut pruned = Bitmap::new();
        for _ in 0..pruned_count {
            pruned.add(r.read_u32()?);
        }
        r.expect_exhausted()?;

        Ok(Mmr::build_from_archive(protocol_version, total_size, &leaf_stream, &hash_stream, &pruned)?)
    }

    fn atomic_write(&self, name: &str, bytes: &[u8]) -> Result<(), StateError> {
        let path = self.dir.join(name);
        let mut tmp = path.clone();
        tmp.set_extension("tmp");

        {
            let mut f = fs::OpenOptions::new()
                .create(true)
                .truncate(true)
                .write(true)
                .open(&tmp)
                .map_err(|_| StateError::Io)?;
            f.write_all(bytes).map_err(|_| StateError::Io)?;
            let _ = f.sync_all();
        }
        fs::rename(&tmp, &path).map_err(|_| StateError::Io)?;
        Ok(())
    }

    /// The directory this store reads from and writes to.
    pub fn path(&self) -> &Path {
        &self.dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::chain::block::Block;
    use crate::core::chain::output::{Output, Rangeproof};
    use crate::core::consensus::params::{ConsensusParams, PROOF_SIZE};
    use crate::core::crypto::test_stub::StubCryptoProvider;

    fn genesis() -> Header {
        Header {
            version: 1,
            height: 0,
            timestamp: 0,
            previous_block_hash: [0u8; 32],
            previous_header_root: [0u8; 32],
            output_root: Mmr::<Output>::new(0).root().unwrap(),
            rangeproof_root: Mmr::<Rangeproof>::new(0).root().unwrap(),
            kernel_root: Mmr::<Kernel>::new(0).root().unwrap(),
            total_kernel_offset: [0u8; 32],
            output_mmr_size: 0,
            kernel_mmr_size: 0,
            total_difficulty: 0,
            secondary_scaling: 0,
            nonce: 0,
            edge_bits: 29,
            proof_nonces: [0u64; PROOF_SIZE],
        }
    }

    fn tmp_dir(name: &str) -> PathBuf {
        let mut p = std::env::temp_dir();
        p.push(format!("amunchain-state-test-{name}-{:x}", std::process::id()));
        p
    }

    #[test]
    fn load_with_no_snapshot_yields_fresh_genesis_state() {
        let dir = tmp_dir("fresh");
        let store = StateStore::open(&dir).unwrap();
        let state = store.load(0, genesis()).unwrap();
        assert_eq!(state.tip_height(), 0);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn save_then_load_round_trips_tip_and_mmrs() {
        let dir = tmp_dir("roundtrip");
        let store = StateStore::open(&dir).unwrap();

        let crypto = StubCryptoProvider;
        let params = ConsensusParams::mainnet();
        let mut state = ChainState::new(0, genesis());

        let mut header = genesis();
        header.height = 1;
        header.previous_block_hash = genesis().block_hash();
        header.output_root = state.outputs().root().unwrap();
        header.rangeproof_root = state.rangeproofs().root().unwrap();
        header.kernel_root = state.kernels().root().unwrap();

        let block = Block::new(&params, vec![], vec![], vec![], vec![], false).unwrap();
        state.apply_block(&crypto, &params, 1, header, &block).unwrap();

        store.save(&state).unwrap();
        let restored = store.load(0, genesis()).unwrap();

        assert_eq!(restored.tip_height(), 1);
        assert_eq!(restored.outputs().size(), state.outputs().size());
        assert_eq!(restored.headers().root().unwrap(), state.headers().root().unwrap());

        let _ = fs::remove_dir_all(&dir);
    }
}
