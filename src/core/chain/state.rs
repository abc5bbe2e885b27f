// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Chain state: the header MMR plus the three body MMRs (outputs,
//! rangeproofs, kernels), and block acceptance / rewind (§4.6).

use thiserror::Error;

use crate::core::chain::block::Block;
use crate::core::chain::header::{Header, HeaderError, HeaderLeaf};
use crate::core::chain::input::InputFeatures;
use crate::core::chain::kernel::Kernel;
use crate::core::chain::mempool::UtxoView;
use crate::core::chain::output::{Output, OutputFeatures, Rangeproof};
use crate::core::consensus::params::ConsensusParams;
use crate::core::crypto::CryptoProvider;
use crate::core::mmr::{Mmr, MmrError};

/// Block acceptance failures (§4.6).
#[derive(Debug, Error)]
pub enum ApplyBlockError {
    /// The header itself failed validation.
    #[error("invalid header: {0}")]
    Header(#[from] HeaderError),
    /// An output's commitment already exists live.
    #[error("duplicate output commitment")]
    DuplicateOutput,
    /// An input spends a commitment with no live output.
    #[error("input spends a nonexistent output")]
    MissingOutput,
    /// An input's claimed features don't match the spent output's.
    #[error("input features don't match the spent output")]
    FeatureMismatch,
    /// An input spends an immature coinbase.
    #[error("input spends an immature coinbase")]
    ImmatureCoinbase,
    /// Output/rangeproof MMR size or root doesn't match the header.
    #[error("output or rangeproof commitment doesn't match the header")]
    OutputRootMismatch,
    /// Kernel MMR size or root doesn't match the header.
    #[error("kernel commitment doesn't match the header")]
    KernelRootMismatch,
    /// The block's kernel excesses don't sum against the block's own
    /// commitments (cut-through already validated at `Block` construction;
    /// this re-checks against chain-relative values such as fees).
    #[error("kernel sums don't balance")]
    Unbalanced,
    /// An MMR operation failed outright; the caller must reset to genesis.
    #[error("mmr error: {0}")]
    Mmr(#[from] MmrError),
}

/// The four MMRs making up validated chain state, plus the height they're
/// synced to.
pub struct ChainState {
    headers: Mmr<HeaderLeaf>,
    outputs: Mmr<Output>,
    rangeproofs: Mmr<Rangeproof>,
    kernels: Mmr<Kernel>,
    header_by_height: std::collections::BTreeMap<u64, Header>,
    synced_header_index: u64,
}

impl ChainState {
    /// An empty chain state, rooted at `genesis`.
    pub fn new(protocol_version: u32, genesis: Header) -> Self {
        let mut headers = Mmr::new(protocol_version);
        headers.append(genesis.to_leaf());
        let mut header_by_height = std::collections::BTreeMap::new();
        let height = genesis.height;
        header_by_height.insert(height, genesis);
        Self {
            headers,
            outputs: Mmr::new(protocol_version),
            rangeproofs: Mmr::new(protocol_version),
            kernels: Mmr::new(protocol_version),
            header_by_height,
            synced_header_index: height,
        }
    }

    /// Current synced height.
    pub fn tip_height(&self) -> u64 {
        self.synced_header_index
    }

    /// The header at the current tip, if retained.
    pub fn tip_header(&self) -> Option<&Header> {
        self.header_by_height.get(&self.synced_header_index)
    }

    /// Read-only access to the header MMR.
    pub fn headers(&self) -> &Mmr<HeaderLeaf> {
        &self.headers
    }

    /// Read-only access to the output MMR.
    pub fn outputs(&self) -> &Mmr<Output> {
        &self.outputs
    }

    /// Read-only access to the rangeproof MMR.
    pub fn rangeproofs(&self) -> &Mmr<Rangeproof> {
        &self.rangeproofs
    }

    /// Read-only access to the kernel MMR.
    pub fn kernels(&self) -> &Mmr<Kernel> {
        &self.kernels
    }

    /// Replace the four MMRs wholesale, as installed by a tx-hash-set
    /// archive during Phase B state sync.
    pub fn install_archive(
        &mut self,
        headers: Mmr<HeaderLeaf>,
        outputs: Mmr<Output>,
        rangeproofs: Mmr<Rangeproof>,
        kernels: Mmr<Kernel>,
        tip: Header,
    ) {
        self.synced_header_index = tip.height;
        self.header_by_height.clear();
        self.header_by_height.insert(tip.height, tip);
        self.headers = headers;
        self.outputs = outputs;
        self.rangeproofs = rangeproofs;
        self.kernels = kernels;
    }

    /// Apply one block atop the current tip, per §4.6. On any failure the
    /// three body MMRs are rewound back to their pre-call sizes and the
    /// synced index is left unchanged; the caller decides whether to
    /// retry, reorg, or reset to genesis (an `Mmr` error rewinding itself
    /// is the one case that can't be locally recovered from).
    pub fn apply_block(
        &mut self,
        crypto: &dyn CryptoProvider,
        params: &ConsensusParams,
        new_height: u64,
        header: Header,
        block: &Block,
    ) -> Result<(), ApplyBlockError> {
        let previous = self
            .header_by_height
            .get(&self.synced_header_index)
            .expect("tip header always retained");
        let outputs_size = previous.output_mmr_size;
        let kernels_size = previous.kernel_mmr_size;

        self.outputs.rewind(outputs_size)?;
        self.rangeproofs.rewind(outputs_size)?;
        self.kernels.rewind(kernels_size)?;

        let result = self.try_apply(crypto, params, new_height, &header, block);
        match result {
            Ok(()) => {
                self.header_by_height.insert(new_height, header);
                self.synced_header_index = new_height;
                Ok(())
            }
            Err(e) => {
                let _ = self.outputs.rewind(outputs_size);
                let _ = self.rangeproofs.rewind(outputs_size);
                let _ = self.kernels.rewind(kernels_size);
                Err(e)
            }
        }
    }

    fn try_apply(
        &mut self,
        crypto: &dyn CryptoProvider,
        params: &ConsensusParams,
        new_height: u64,
        header: &Header,
        block: &Block,
    ) -> Result<(), ApplyBlockError> {
        for output in block.outputs() {
            if self.outputs.leaf_index_by_lookup_value(&output.commitment).is_some() {
                return Err(ApplyBlockError::DuplicateOutput);
            }
        }
        for (output, rangeproof) in block.outputs().iter().zip(block.rangeproofs().iter()) {
            self.outputs.append(output.clone());
            self.rangeproofs.append(rangeproof.clone());
        }

        let unspendable_start = crate::core::consensus::params::unspendable_start(params, new_height);
        for input in block.inputs() {
            let leaf_index = self
                .outputs
                .leaf_index_by_lookup_value(&input.commitment)
                .ok_or(ApplyBlockError::MissingOutput)?;
            let spent = self
                .outputs
                .get_leaf(leaf_index)
                .ok_or(ApplyBlockError::MissingOutput)?;

            let matches = match input.features {
                InputFeatures::SameAsOutput => true,
                InputFeatures::Plain => spent.features == OutputFeatures::Plain,
                InputFeatures::Coinbase => spent.features == OutputFeatures::Coinbase,
            };
            if !matches {
                return Err(ApplyBlockError::FeatureMismatch);
            }
            if spent.features == OutputFeatures::Coinbase {
                if new_height < params.coinbase_maturity || leaf_index >= unspendable_start {
                    return Err(ApplyBlockError::ImmatureCoinbase);
                }
            }
            self.outputs.prune(leaf_index, false)?;
            self.rangeproofs.prune(leaf_index, false)?;
        }

        if self.outputs.size() != header.output_mmr_size || self.rangeproofs.size() != header.output_mmr_size {
            return Err(ApplyBlockError::OutputRootMismatch);
        }
        if self.outputs.root()? != header.output_root || self.rangeproofs.root()? != header.rangeproof_root {
            return Err(ApplyBlockError::OutputRootMismatch);
        }

        for kernel in block.kernels() {
            self.kernels.append(kernel.clone());
        }
        if self.kernels.size() != header.kernel_mmr_size {
            return Err(ApplyBlockError::KernelRootMismatch);
        }
        if self.kernels.root()? != header.kernel_root {
            return Err(ApplyBlockError::KernelRootMismatch);
        }

        self.verify_kernel_sums(crypto, block)?;
        Ok(())
    }

    fn verify_kernel_sums(&self, crypto: &dyn CryptoProvider, block: &Block) -> Result<(), ApplyBlockError> {
        let fees: u64 = block.kernels().iter().fold(0, |acc, k| acc.saturating_add(k.fee));

        let mut positive = Vec::with_capacity(block.outputs().len() + 1);
        for output in block.outputs() {
            positive.push(
                crypto
                    .commitment_parse(&output.commitment)
                    .map_err(|_| ApplyBlockError::Unbalanced)?,
            );
        }
        if fees != 0 {
            positive.push(
                crypto
                    .pedersen_commit(&[0u8; 32], fees)
                    .map_err(|_| ApplyBlockError::Unbalanced)?,
            );
        }
        let mut negative = Vec::with_capacity(block.inputs().len());
        for input in block.inputs() {
            negative.push(
                crypto
                    .commitment_parse(&input.commitment)
                    .map_err(|_| ApplyBlockError::Unbalanced)?,
            );
        }
        let commitments_sum = crypto
            .commit_sum(&positive, &negative)
            .map_err(|_| ApplyBlockError::Unbalanced)?;

        let mut excesses = Vec::with_capacity(block.kernels().len());
        for kernel in block.kernels() {
            excesses.push(
                crypto
                    .commitment_parse(&kernel.excess)
                    .map_err(|_| ApplyBlockError::Unbalanced)?,
            );
        }
        let excess_sum = crypto.commit_sum(&excesses, &[]).map_err(|_| ApplyBlockError::Unbalanced)?;

        if crypto.commitment_serialize(&commitments_sum) != crypto.commitment_serialize(&excess_sum) {
            return Err(ApplyBlockError::Unbalanced);
        }
        Ok(())
    }
}

/// Adapts [`ChainState`] to the mempool's read-only view of the UTXO set.
pub struct ChainStateUtxoView<'a> {
    /// The chain state being viewed.
    pub state: &'a ChainState,
    /// Consensus parameters in force.
    pub params: &'a ConsensusParams,
}

impl UtxoView for ChainStateUtxoView<'_> {
    fn output(&self, commitment: &[u8; 33]) -> Option<(OutputFeatures, u64)> {
        let leaf_index = self.state.outputs.leaf_index_by_lookup_value(commitment)?;
        let output = self.state.outputs.get_leaf(leaf_index)?;
        Some((output.features, leaf_index))
    }

    fn tip_height(&self) -> u64 {
        self.state.tip_height()
    }

    fn unspendable_start(&self, height: u64) -> u64 {
        crate::core::consensus::params::unspendable_start(self.params, height)
    }

    fn header_version(&self, height: u64) -> u16 {
        crate::core::consensus::params::header_version(self.params, height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
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
            proof_nonces: [0u64; crate::core::consensus::params::PROOF_SIZE],
        }
    }

    #[test]
    fn fresh_state_reports_genesis_tip() {
        let state = ChainState::new(0, genesis());
        assert_eq!(state.tip_height(), 0);
        assert_eq!(state.outputs().size(), 0);
    }

    #[test]
    fn apply_block_with_no_elements_advances_tip_when_roots_match() {
        let crypto = StubCryptoProvider;
        let params = ConsensusParams::mainnet();
        let mut state = ChainState::new(0, genesis());

        let mut header = genesis();
        header.height = 1;
        header.previous_block_hash = genesis().block_hash();
        header.output_mmr_size = 0;
        header.kernel_mmr_size = 0;
        header.output_root = state.outputs().root().unwrap();
        header.rangeproof_root = state.rangeproofs().root().unwrap();
        header.kernel_root = state.kernels().root().unwrap();

        let block = Block::new(&params, vec![], vec![], vec![], vec![], false).unwrap();
        state.apply_block(&crypto, &params, 1, header, &block).unwrap();
        assert_eq!(state.tip_height(), 1);
    }

    #[test]
    fn apply_block_rejects_and_rewinds_on_root_mismatch() {
        let crypto = StubCryptoProvider;
        let params = ConsensusParams::mainnet();
        let mut state = ChainState::new(0, genesis());

        let mut header = genesis();
        header.height = 1;
        header.output_root = [0xffu8; 32]; // deliberately wrong
        header.rangeproof_root = state.rangeproofs().root().unwrap();
        header.kernel_root = state.kernels().root().unwrap();

        let block = Block::new(&params, vec![], vec![], vec![], vec![], false).unwrap();
        let err = state.apply_block(&crypto, &params, 1, header, &block).unwrap_err();
        assert!(matches!(err, ApplyBlockError::OutputRootMismatch));
        assert_eq!(state.tip_height(), 0);
        assert_eq!(state.outputs().size(), 0);
    }
}
