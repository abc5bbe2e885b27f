// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Block bodies: the four element lists plus the structural invariants
//! every block and every standalone transaction must satisfy.

use std::collections::BTreeSet;

use thiserror::Error;

use crate::core::chain::input::Input;
use crate::core::chain::kernel::{Kernel, KernelFeatures};
use crate::core::chain::output::{Output, Rangeproof};
use crate::core::consensus::params::{block_weight, ConsensusParams};
use crate::core::crypto::blake2b_256;

/// Block body construction failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BlockError {
    /// Total weight exceeds the cap for this element count.
    #[error("block doesn't have a valid weight")]
    InvalidWeight,
    /// Some list isn't strictly ascending by serialized-element hash.
    #[error("block elements aren't sorted and unique")]
    NotSortedAndUnique,
    /// Two `NoRecentDuplicate` kernels share an excess.
    #[error("block has a duplicate no-recent-duplicate kernel excess")]
    DuplicateNrdExcess,
    /// An input/output commitment collides with another input or output.
    #[error("block doesn't have valid cut-through")]
    InvalidCutThrough,
}

/// One block's (or standalone transaction's) element lists. Construction
/// validates weight, ordering, NRD-excess uniqueness, and cut-through;
/// a `Block` that exists is one that passed all four (§4.4).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    inputs: Vec<Input>,
    outputs: Vec<Output>,
    rangeproofs: Vec<Rangeproof>,
    kernels: Vec<Kernel>,
}

impl Block {
    /// Build and validate a block body. `is_transaction` shaves
    /// `coinbase_weight` off the weight cap, since a standalone
    /// transaction never carries a coinbase output/kernel pair of its own.
    pub fn new(
        params: &ConsensusParams,
        inputs: Vec<Input>,
        outputs: Vec<Output>,
        rangeproofs: Vec<Rangeproof>,
        kernels: Vec<Kernel>,
        is_transaction: bool,
    ) -> Result<Self, BlockError> {
        let block = Block {
            inputs,
            outputs,
            rangeproofs,
            kernels,
        };

        if !block.has_valid_weight(params, is_transaction) {
            return Err(BlockError::InvalidWeight);
        }
        if !block.is_sorted_and_unique() {
            return Err(BlockError::NotSortedAndUnique);
        }
        if !block.has_unique_nrd_kernel_excesses() {
            return Err(BlockError::DuplicateNrdExcess);
        }
        if !block.has_valid_cut_through() {
            return Err(BlockError::InvalidCutThrough);
        }

        Ok(block)
    }

    /// This block's inputs.
    pub fn inputs(&self) -> &[Input] {
        &self.inputs
    }

    /// This block's outputs.
    pub fn outputs(&self) -> &[Output] {
        &self.outputs
    }

    /// This block's rangeproofs, index-aligned with `outputs`.
    pub fn rangeproofs(&self) -> &[Rangeproof] {
        &self.rangeproofs
    }

    /// This block's kernels.
    pub fn kernels(&self) -> &[Kernel] {
        &self.kernels
    }

    fn has_valid_weight(&self, params: &ConsensusParams, is_transaction: bool) -> bool {
        let weight = block_weight(
            self.inputs.len() as u64,
            self.outputs.len() as u64,
            self.kernels.len() as u64,
        );
        let cap = params
            .maximum_block_weight
            .saturating_sub(if is_transaction { params.coinbase_weight } else { 0 });
        weight <= cap
    }

    fn is_sorted_and_unique(&self) -> bool {
        sorted_and_unique(self.inputs.iter().map(Input::serialize))
            && sorted_and_unique(self.outputs.iter().map(Output::serialize))
            && sorted_and_unique(self.kernels.iter().map(|k| k.serialize(0)))
    }

    fn has_unique_nrd_kernel_excesses(&self) -> bool {
        let mut seen = BTreeSet::new();
        for kernel in &self.kernels {
            if kernel.features == KernelFeatures::NoRecentDuplicate && !seen.insert(kernel.excess) {
                return false;
            }
        }
        true
    }

    fn has_valid_cut_through(&self) -> bool {
        let mut seen = BTreeSet::new();
        for input in &self.inputs {
            if !seen.insert(input.commitment) {
                return false;
            }
        }
        for output in &self.outputs {
            if !seen.insert(output.commitment) {
                return false;
            }
        }
        true
    }
}

fn sorted_and_unique(serialized: impl Iterator<Item = Vec<u8>>) -> bool {
    let mut previous: Option<[u8; 32]> = None;
    for bytes in serialized {
        let hash = blake2b_256(&bytes);
        if let Some(prev) = previous {
            if hash <= prev {
                return false;
            }
        }
        previous = Some(hash);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::chain::input::InputFeatures;
    use crate::core::chain::kernel::KernelFeatures;
    use crate::core::chain::output::OutputFeatures;

    fn kernel(excess: [u8; 33], features: KernelFeatures) -> Kernel {
        Kernel {
            features,
            fee: 0,
            lock_height: 0,
            relative_height: 0,
            excess,
            signature: [0u8; 64],
        }
    }

    fn ordered_commitments(n: u8) -> Vec<[u8; 33]> {
        // Distinct, pre-sorted-by-hash isn't guaranteed by raw byte order, so
        // tests build commitments and rely on hash-sort happening inside
        // `Block::new`, not on any assumption about input order here.
        (0..n).map(|i| { let mut c = [0u8; 33]; c[0] = i; c }).collect()
    }

    fn distinct_commitment(index: u16) -> [u8; 33] {
        let mut c = [0u8; 33];
        c[0..2].copy_from_slice(&index.to_be_bytes());
        c
    }

    #[test]
    fn rejects_duplicate_commitment_across_inputs_and_outputs() {
        let params = ConsensusParams::mainnet();
        let commitments = ordered_commitments(1);
        let input = Input::new(InputFeatures::Plain, commitments[0]);
        let output = Output::new(OutputFeatures::Plain, commitments[0]);
        let err = Block::new(&params, vec![input], vec![output], vec![], vec![], true).unwrap_err();
        assert_eq!(err, BlockError::InvalidCutThrough);
    }

    #[test]
    fn rejects_duplicate_nrd_excess() {
        let params = ConsensusParams::mainnet();
        let k1 = kernel([1u8; 33], KernelFeatures::NoRecentDuplicate);
        let k2 = kernel([1u8; 33], KernelFeatures::NoRecentDuplicate);
        let err = Block::new(&params, vec![], vec![], vec![], vec![k1, k2], true).unwrap_err();
        assert_eq!(err, BlockError::DuplicateNrdExcess);
    }

    #[test]
    fn accepts_empty_block() {
        let params = ConsensusParams::mainnet();
        let block = Block::new(&params, vec![], vec![], vec![], vec![], true).unwrap();
        assert!(block.inputs().is_empty());
    }

    #[test]
    fn rejects_weight_over_cap() {
        let params = ConsensusParams::mainnet();
        // Cap is 40_000 at 21 weight per output; 2_000 outputs exceeds it.
        let mut outputs = Vec::new();
        let mut rangeproofs = Vec::new();
        for i in 0..2_000u16 {
            outputs.push(Output::new(OutputFeatures::Plain, distinct_commitment(i)));
            rangeproofs.push(Rangeproof { proof: vec![] });
        }
        let err = Block::new(&params, vec![], outputs, rangeproofs, vec![], true).unwrap_err();
        assert_eq!(err, BlockError::InvalidWeight);
    }
}
