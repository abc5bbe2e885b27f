// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Standalone transactions: a block body restricted to non-coinbase
//! elements, plus a kernel offset, whose kernel-excess sum is checked
//! against its commitment sum at construction.

use thiserror::Error;

use crate::core::chain::block::{Block, BlockError};
use crate::core::chain::input::Input;
use crate::core::chain::kernel::{Kernel, KernelFeatures};
use crate::core::chain::output::{Output, OutputFeatures, Rangeproof};
use crate::core::consensus::params::{block_weight, ConsensusParams};
use crate::core::crypto::CryptoProvider;

/// Transaction construction failures.
#[derive(Debug, Error)]
pub enum TransactionError {
    /// The underlying block body failed one of its own checks.
    #[error("invalid transaction body: {0}")]
    Block(#[from] BlockError),
    /// A transaction carries a coinbase output or kernel, which only a
    /// mined block may produce.
    #[error("transaction carries a coinbase element")]
    CoinbaseNotAllowed,
    /// The kernel offset is nonzero but not a valid scalar.
    #[error("kernel offset is invalid")]
    InvalidOffset,
    /// A kernel excess doesn't parse as a commitment.
    #[error("kernel excess is invalid")]
    InvalidExcess,
    /// An input or output commitment doesn't parse.
    #[error("commitment is invalid")]
    InvalidCommitment,
    /// `sum(outputs) + fee - sum(inputs) != sum(kernel excesses) + offset`.
    #[error("kernel excesses don't balance against commitments")]
    Unbalanced,
}

/// A balanced, self-contained transaction.
pub struct Transaction {
    offset: [u8; 32],
    block: Block,
    fees: u64,
}

impl Transaction {
    /// Build and balance-check a transaction. `crypto` performs the
    /// Pedersen commitment arithmetic; construction fails if the body's
    /// own checks fail, if it carries coinbase elements, or if it doesn't
    /// balance.
    pub fn new(
        crypto: &dyn CryptoProvider,
        params: &ConsensusParams,
        offset: [u8; 32],
        inputs: Vec<Input>,
        outputs: Vec<Output>,
        rangeproofs: Vec<Rangeproof>,
        kernels: Vec<Kernel>,
    ) -> Result<Self, TransactionError> {
        if outputs.iter().any(|o| o.features == OutputFeatures::Coinbase)
            || kernels.iter().any(|k| k.features == KernelFeatures::Coinbase)
        {
            return Err(TransactionError::CoinbaseNotAllowed);
        }

        let block = Block::new(params, inputs, outputs, rangeproofs, kernels, true)?;

        let fees = block
            .kernels()
            .iter()
            .fold(0u64, |acc, k| acc.saturating_add(k.fee));

        let offset_is_zero = offset == [0u8; 32];

        let mut kernel_excesses = Vec::with_capacity(block.kernels().len() + 1);
        for kernel in block.kernels() {
            kernel_excesses.push(
                crypto
                    .commitment_parse(&kernel.excess)
                    .map_err(|_| TransactionError::InvalidExcess)?,
            );
        }
        if !offset_is_zero {
            if !crypto.scalar_verify(&offset) {
                return Err(TransactionError::InvalidOffset);
            }
            kernel_excesses.push(
                crypto
                    .pedersen_commit(&offset, 0)
                    .map_err(|_| TransactionError::InvalidOffset)?,
            );
        }
        let kernel_excess_sum = crypto
            .commit_sum(&kernel_excesses, &[])
            .map_err(|_| TransactionError::InvalidExcess)?;

        let mut positive_commitments = Vec::with_capacity(block.outputs().len() + 1);
        for output in block.outputs() {
            positive_commitments.push(
                crypto
                    .commitment_parse(&output.commitment)
                    .map_err(|_| TransactionError::InvalidCommitment)?,
            );
        }
        if fees != 0 {
            positive_commitments.push(
                crypto
                    .pedersen_commit(&[0u8; 32], fees)
                    .map_err(|_| TransactionError::InvalidCommitment)?,
            );
        }

        let mut negative_commitments = Vec::with_capacity(block.inputs().len());
        for input in block.inputs() {
            negative_commitments.push(
                crypto
                    .commitment_parse(&input.commitment)
                    .map_err(|_| TransactionError::InvalidCommitment)?,
            );
        }

        let commitments_sum = crypto
            .commit_sum(&positive_commitments, &negative_commitments)
            .map_err(|_| TransactionError::InvalidCommitment)?;

        if crypto.commitment_serialize(&commitments_sum) != crypto.commitment_serialize(&kernel_excess_sum) {
            return Err(TransactionError::Unbalanced);
        }

        Ok(Transaction { offset, block, fees })
    }

    /// The 32-byte kernel offset.
    pub fn offset(&self) -> [u8; 32] {
        self.offset
    }

    /// This transaction's inputs.
    pub fn inputs(&self) -> &[Input] {
        self.block.inputs()
    }

    /// This transaction's outputs.
    pub fn outputs(&self) -> &[Output] {
        self.block.outputs()
    }

    /// This transaction's rangeproofs, index-aligned with `outputs`.
    pub fn rangeproofs(&self) -> &[Rangeproof] {
        self.block.rangeproofs()
    }

    /// This transaction's kernels.
    pub fn kernels(&self) -> &[Kernel] {
        self.block.kernels()
    }

    /// Sum of every kernel's fee.
    pub fn fees(&self) -> u64 {
        self.fees
    }

    /// Minimum fee this transaction must pay at the given base rate,
    /// proportional to the weight it adds to a block.
    pub fn required_fees(&self, base_fee: u64) -> u64 {
        let weight = block_weight(
            self.inputs().len() as u64,
            self.outputs().len() as u64,
            self.kernels().len() as u64,
        );
        weight.saturating_mul(base_fee)
    }

    /// Canonical byte encoding used for the transaction's content-addressed
    /// id (mempool `TxId`) and peer-to-peer relay.
    pub fn serialize(&self, protocol_version: u32) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.offset);
        out.extend_from_slice(&(self.inputs().len() as u64).to_be_bytes());
        for input in self.inputs() {
            out.extend_from_slice(&input.serialize());
        }
        out.extend_from_slice(&(self.outputs().len() as u64).to_be_bytes());
        for output in self.outputs() {
            out.extend_from_slice(&output.serialize());
        }
        for rangeproof in self.rangeproofs() {
            out.extend_from_slice(&rangeproof.serialize());
        }
        out.extend_from_slice(&(self.kernels().len() as u64).to_be_bytes());
        for kernel in self.kernels() {
            out.extend_from_slice(&kernel.serialize(protocol_version));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::crypto::test_stub::StubCryptoProvider;

    #[test]
    fn rejects_coinbase_output() {
        let params = ConsensusParams::mainnet();
        let crypto = StubCryptoProvider;
        let output = Output::new(OutputFeatures::Coinbase, [1u8; 33]);
        let err = Transaction::new(&crypto, &params, [0u8; 32], vec![], vec![output], vec![], vec![]).unwrap_err();
        assert!(matches!(err, TransactionError::CoinbaseNotAllowed));
    }

    #[test]
    fn empty_transaction_balances_with_stub_provider() {
        let params = ConsensusParams::mainnet();
        let crypto = StubCryptoProvider;
        let tx = Transaction::new(&crypto, &params, [0u8; 32], vec![], vec![], vec![], vec![]).unwrap();
        assert_eq!(tx.fees(), 0);
    }

    #[test]
    fn required_fees_scale_with_weight() {
        let params = ConsensusParams::mainnet();
        let crypto = StubCryptoProvider;
        let output = Output::new(OutputFeatures::Plain, [1u8; 33]);
        let rp = Rangeproof { proof: vec![] };
        let tx = Transaction::new(&crypto, &params, [0u8; 32], vec![], vec![output], vec![rp], vec![]).unwrap();
        assert_eq!(tx.required_fees(10), block_weight(0, 1, 0) * 10);
    }
}
