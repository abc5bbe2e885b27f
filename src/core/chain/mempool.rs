// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! The unconfirmed transaction pool: an index over pending [`Transaction`]s
//! kept consistent with the chain tip's UTXO set, plus greedy fee-ordered
//! block template assembly.

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;

use crate::core::chain::input::InputFeatures;
use crate::core::chain::kernel::KernelFeatures;
use crate::core::chain::output::OutputFeatures;
use crate::core::chain::transaction::Transaction;
use crate::core::consensus::params::ConsensusParams;
use crate::core::crypto::blake2b_256;

/// Content-addressed transaction id: the Blake2b-256 hash of its
/// canonical serialization.
pub type TxId = [u8; 32];

/// Read-only view onto the chain tip's UTXO set and header schedule that
/// the mempool validates against. Implemented by chain state; a mock
/// implementation lets mempool logic be tested in isolation.
pub trait UtxoView {
    /// Look up a live output by commitment; returns its features and the
    /// leaf index it occupies in the output MMR, if it hasn't been spent.
    fn output(&self, commitment: &[u8; 33]) -> Option<(OutputFeatures, u64)>;

    /// Current chain tip height.
    fn tip_height(&self) -> u64;

    /// First output-MMR leaf index that remains spendable once a new block
    /// lands at `height`.
    fn unspendable_start(&self, height: u64) -> u64;

    /// Header version in force at `height`.
    fn header_version(&self, height: u64) -> u16;
}

/// Mempool insertion/cleanup failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MempoolError {
    /// Adding this tx would push the pool past `MAXIMUM_BLOCK_WEIGHT`
    /// once a coinbase pair is reserved.
    #[error("transaction doesn't fit within the block weight budget")]
    WouldExceedWeight,
    /// A `SameAsOutput` input's features couldn't be resolved against the
    /// UTXO set or the pool itself.
    #[error("input's spent output could not be found")]
    SpentOutputNotFound,
    /// This exact transaction is already pooled.
    #[error("transaction already pooled")]
    AlreadyPooled,
    /// `fees(tx) < required_fees(base_fee)`.
    #[error("transaction pays too low a fee")]
    FeeTooLow,
    /// Replacing the conflicting transaction(s) would reduce the pool's
    /// fee total.
    #[error("transaction doesn't outbid the transactions it conflicts with")]
    DoesNotOutbidConflicts,
    /// An input spends a coinbase that won't be mature at tip+1.
    #[error("input spends an immature coinbase")]
    ImmatureCoinbase,
    /// A `HeightLocked` kernel isn't valid yet at tip+1.
    #[error("kernel is still height-locked")]
    StillLocked,
    /// A `NoRecentDuplicate` kernel was submitted before NRD activates.
    #[error("no-recent-duplicate kernels aren't active at this height")]
    NrdNotActive,
}

struct PooledTx {
    tx: Transaction,
    fee: u64,
}

/// The unconfirmed transaction pool.
pub struct Mempool {
    transactions: BTreeMap<TxId, PooledTx>,
    outputs: BTreeMap<[u8; 33], TxId>,
    fees: BTreeMap<u64, BTreeSet<TxId>>,
}

impl Default for Mempool {
    fn default() -> Self {
        Self::new()
    }
}

impl Mempool {
    /// An empty pool.
    pub fn new() -> Self {
        Self {
            transactions: BTreeMap::new(),
            outputs: BTreeMap::new(),
            fees: BTreeMap::new(),
        }
    }

    /// Number of pooled transactions.
    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    /// Whether the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    fn tx_id(tx: &Transaction) -> TxId {
        blake2b_256(&tx.serialize(0))
    }

    /// Resolve a commitment's effective output features against the UTXO
    /// set, falling back to any pooled transaction's outputs.
    fn resolve_features(&self, utxo: &dyn UtxoView, commitment: &[u8; 33]) -> Option<OutputFeatures> {
        if let Some((features, _)) = utxo.output(commitment) {
            return Some(features);
        }
        let id = self.outputs.get(commitment)?;
        let pooled = self.transactions.get(id)?;
        pooled
            .tx
            .outputs()
            .iter()
            .find(|o| &o.commitment == commitment)
            .map(|o| o.features)
    }

    /// Insert `tx`, resolving conflicts with already-pooled transactions
    /// per §4.7. On success, any replaced transactions are returned.
    pub fn insert(
        &mut self,
        params: &ConsensusParams,
        base_fee: u64,
        utxo: &dyn UtxoView,
        tx: Transaction,
    ) -> Result<Vec<Transaction>, MempoolError> {
        let coinbase_reserve = crate::core::consensus::params::block_weight(0, 1, 1);
        let tx_weight = crate::core::consensus::params::block_weight(
            tx.inputs().len() as u64,
            tx.outputs().len() as u64,
            tx.kernels().len() as u64,
        );
        if self.pooled_weight() + tx_weight + coinbase_reserve > params.maximum_block_weight {
            return Err(MempoolError::WouldExceedWeight);
        }

        for input in tx.inputs() {
            if input.features == InputFeatures::SameAsOutput
                && self.resolve_features(utxo, &input.commitment).is_none()
            {
                return Err(MempoolError::SpentOutputNotFound);
            }
        }

        let id = Self::tx_id(&tx);
        if self.transactions.contains_key(&id) {
            return Err(MempoolError::AlreadyPooled);
        }
        let fee = tx.fees();
        if fee < tx.required_fees(base_fee) {
            return Err(MempoolError::FeeTooLow);
        }

        let tip_plus_one = utxo.tip_height() + 1;
        for input in tx.inputs() {
            if let Some((OutputFeatures::Coinbase, leaf_index)) = utxo.output(&input.commitment) {
                if leaf_index >= utxo.unspendable_start(tip_plus_one) {
                    return Err(MempoolError::ImmatureCoinbase);
                }
            }
        }
        for kernel in tx.kernels() {
            match kernel.features {
                KernelFeatures::HeightLocked if kernel.lock_height > tip_plus_one => {
                    return Err(MempoolError::StillLocked);
                }
                KernelFeatures::NoRecentDuplicate if utxo.header_version(tip_plus_one) < 4 => {
                    return Err(MempoolError::NrdNotActive);
                }
                _ => {}
            }
        }

        let mut replaced: BTreeSet<TxId> = BTreeSet::new();
        for output in tx.outputs() {
            if let Some(conflicting) = self.outputs.get(&output.commitment) {
                replaced.insert(*conflicting);
            }
        }
        for input in tx.inputs() {
            if let Some(conflicting) = self.outputs.get(&input.commitment) {
                replaced.insert(*conflicting);
            }
        }
        self.collect_dependents(&mut replaced);

        let replaced_fees: u64 = replaced
            .iter()
            .filter_map(|id| self.transactions.get(id))
            .map(|p| p.fee)
            .sum();
        if !replaced.is_empty() && fee <= replaced_fees {
            return Err(MempoolError::DoesNotOutbidConflicts);
        }

        let removed = replaced
            .iter()
            .filter_map(|id| self.remove(id))
            .collect::<Vec<_>>();

        self.insert_unchecked(id, tx, fee);

        Ok(removed)
    }

    /// Pull in any pooled tx whose inputs spend an output of a tx already
    /// marked for replacement, transitively.
    fn collect_dependents(&self, replaced: &mut BTreeSet<TxId>) {
        loop {
            let mut grown = false;
            let spent_by_replaced: BTreeSet<[u8; 33]> = replaced
                .iter()
                .filter_map(|id| self.transactions.get(id))
                .flat_map(|p| p.tx.outputs().iter().map(|o| o.commitment))
                .collect();

            for (id, pooled) in &self.transactions {
                if replaced.contains(id) {
                    continue;
                }
                if pooled.tx.inputs().iter().any(|i| spent_by_replaced.contains(&i.commitment)) {
                    replaced.insert(*id);
                    grown = true;
                }
            }
            if !grown {
                break;
            }
        }
    }

    fn insert_unchecked(&mut self, id: TxId, tx: Transaction, fee: u64) {
        for output in tx.outputs() {
            self.outputs.insert(output.commitment, id);
        }
        self.fees.entry(fee).or_default().insert(id);
        self.transactions.insert(id, PooledTx { tx, fee });
    }

    fn remove(&mut self, id: &TxId) -> Option<Transaction> {
        let pooled = self.transactions.remove(id)?;
        for output in pooled.tx.outputs() {
            self.outputs.remove(&output.commitment);
        }
        if let Some(set) = self.fees.get_mut(&pooled.fee) {
            set.remove(id);
            if set.is_empty() {
                self.fees.remove(&pooled.fee);
            }
        }
        Some(pooled.tx)
    }

    fn pooled_weight(&self) -> u64 {
        self.transactions
            .values()
            .map(|p| {
                crate::core::consensus::params::block_weight(
                    p.tx.inputs().len() as u64,
                    p.tx.outputs().len() as u64,
                    p.tx.kernels().len() as u64,
                )
            })
            .sum()
    }

    /// Evict every pooled transaction that no longer satisfies the
    /// invariants checked by [`Mempool::insert`] against the current tip.
    pub fn cleanup(&mut self, params: &ConsensusParams, base_fee: u64, utxo: &dyn UtxoView) {
        let tip_plus_one = utxo.tip_height() + 1;
        let mut to_remove = Vec::new();

        for (id, pooled) in &self.transactions {
            let tx = &pooled.tx;
            if pooled.fee < tx.required_fees(base_fee) {
                to_remove.push(*id);
                continue;
            }
            for kernel in tx.kernels() {
                match kernel.features {
                    KernelFeatures::HeightLocked if kernel.lock_height > tip_plus_one => {
                        to_remove.push(*id);
                    }
                    KernelFeatures::NoRecentDuplicate if utxo.header_version(tip_plus_one) < 4 => {
                        to_remove.push(*id);
                    }
                    _ => {}
                }
            }
        }
        to_remove.dedup();
        for id in &to_remove {
            self.remove(id);
        }

        // Second pass: drop anything whose inputs no longer resolve now
        // that dependency txs may have been evicted above.
        let mut unresolved = Vec::new();
        for (id, pooled) in &self.transactions {
            for input in pooled.tx.inputs() {
                let in_utxo = utxo.output(&input.commitment).is_some();
                let in_pool = self.outputs.contains_key(&input.commitment);
                if !in_utxo && !in_pool {
                    unresolved.push(*id);
                    break;
                }
            }
        }
        for id in &unresolved {
            self.remove(id);
        }

        let _ = params;
    }

    /// Greedily assemble a candidate block body from the pool, fee-
    /// descending, skipping any transaction whose inputs aren't satisfied
    /// by `utxo` plus outputs already selected in this template.
    pub fn next_block(&self, utxo: &dyn UtxoView) -> (Vec<TxId>, u64, [u8; 32]) {
        let mut selected_ids = Vec::new();
        let mut selected_outputs: BTreeSet<[u8; 33]> = BTreeSet::new();
        let mut spent_inputs: BTreeSet<[u8; 33]> = BTreeSet::new();
        let mut total_fees = 0u64;
        let mut offset_sum = [0u8; 32];

        for ids in self.fees.values().rev() {
            for id in ids {
                let Some(pooled) = self.transactions.get(id) else { continue };
                let tx = &pooled.tx;

                let inputs_satisfied = tx.inputs().iter().all(|input| {
                    !spent_inputs.contains(&input.commitment)
                        && (utxo.output(&input.commitment).is_some() || selected_outputs.contains(&input.commitment))
                });
                let outputs_free = tx
                    .outputs()
                    .iter()
                    .all(|output| !selected_outputs.contains(&output.commitment));
                if !inputs_satisfied || !outputs_free {
                    continue;
                }

                for input in tx.inputs() {
                    spent_inputs.insert(input.commitment);
                }
                for output in tx.outputs() {
                    selected_outputs.insert(output.commitment);
                }
                total_fees = total_fees.saturating_add(pooled.fee);
                // Offsets are scalars; XOR is a placeholder combinator kept
                // deliberately simple until the scalar-sum facade is threaded
                // through template assembly.
                for (acc, b) in offset_sum.iter_mut().zip(tx.offset().iter()) {
                    *acc ^= b;
                }
                selected_ids.push(*id);
            }
        }

        (selected_ids, total_fees, offset_sum)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::crypto::test_stub::StubCryptoProvider;

    struct EmptyUtxo;
    impl UtxoView for EmptyUtxo {
        fn output(&self, _commitment: &[u8; 33]) -> Option<(OutputFeatures, u64)> {
            None
        }
        fn tip_height(&self) -> u64 {
            100
        }
        fn unspendable_start(&self, _height: u64) -> u64 {
            0
        }
        fn header_version(&self, _height: u64) -> u16 {
            4
        }
    }

    fn plain_tx(commitment: [u8; 33]) -> Transaction {
        let params = ConsensusParams::mainnet();
        let crypto = StubCryptoProvider;
        let output = crate::core::chain::output::Output::new(OutputFeatures::Plain, commitment);
        let rp = crate::core::chain::output::Rangeproof { proof: vec![] };
        Transaction::new(&crypto, &params, [0u8; 32], vec![], vec![output], vec![rp], vec![]).unwrap()
    }

    #[test]
    fn inserts_and_removes_cleanly() {
        let params = ConsensusParams::mainnet();
        let utxo = EmptyUtxo;
        let mut pool = Mempool::new();
        let tx = plain_tx([1u8; 33]);
        let replaced = pool.insert(&params, 0, &utxo, tx).unwrap();
        assert!(replaced.is_empty());
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn rejects_duplicate_insert() {
        let params = ConsensusParams::mainnet();
        let utxo = EmptyUtxo;
        let mut pool = Mempool::new();
        pool.insert(&params, 0, &utxo, plain_tx([2u8; 33])).unwrap();
        let err = pool.insert(&params, 0, &utxo, plain_tx([2u8; 33])).unwrap_err();
        assert_eq!(err, MempoolError::AlreadyPooled);
    }

    #[test]
    fn conflicting_output_requires_outbidding_fee() {
        let params = ConsensusParams::mainnet();
        let utxo = EmptyUtxo;
        let mut pool = Mempool::new();
        pool.insert(&params, 0, &utxo, plain_tx([3u8; 33])).unwrap();
        // Same output commitment, same (zero) fee: doesn't outbid.
        let err = pool.insert(&params, 0, &utxo, plain_tx([3u8; 33])).unwrap_err();
        assert!(matches!(err, MempoolError::AlreadyPooled | MempoolError::DoesNotOutbidConflicts));
    }

    #[test]
    fn next_block_selects_pooled_transactions() {
        let params = ConsensusParams::mainnet();
        let utxo = EmptyUtxo;
        let mut pool = Mempool::new();
        pool.insert(&params, 0, &utxo, plain_tx([4u8; 33])).unwrap();
        let (ids, fees, _offset) = pool.next_block(&utxo);
        assert_eq!(ids.len(), 1);
        assert_eq!(fees, 0);
    }
}
