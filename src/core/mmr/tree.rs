// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Generic, prunable, rewindable Merkle Mountain Range, ported from the
//! reference node's `MerkleMountainRange<T>` template.

use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

use super::algebra::{
    height_at_index, is_size_valid, left_child_index, left_sibling_index, number_of_leaves_at_size,
    parent_index, peak_positions, right_child_index, size_at_number_of_leaves,
};
use super::leaf::{AdditionReason, MmrLeaf, SubtractionReason};
use crate::core::crypto::blake2b_256;

/// MMR errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MmrError {
    /// `rewind`/`root_at_size` was given a node count that is not a valid
    /// MMR shape.
    #[error("size is invalid")]
    InvalidSize,
    /// `rewind` target is below `minimum_size`.
    #[error("size is below the minimum rewindable size")]
    BelowMinimumSize,
    /// `set_minimum_size` was given a value smaller than the current one.
    #[error("minimum size must be non-decreasing")]
    MinimumSizeDecreased,
    /// `prune`/lookup referenced a leaf index that doesn't exist live.
    #[error("leaf not found")]
    LeafNotFound,
    /// A hash needed to complete an operation (e.g. a peak hash) is
    /// missing, usually because it was permanently pruned.
    #[error("required hash is missing")]
    MissingHash,
    /// An archive stream failed to parse or its hashes didn't match.
    #[error("archive is malformed")]
    MalformedArchive,
}

/// Generic append-only, prunable, rewindable accumulator over leaves of
/// type `L`.
#[derive(Clone)]
pub struct Mmr<L: MmrLeaf> {
    pub(crate) protocol_version: u32,
    pub(crate) number_of_leaves: u64,
    pub(crate) number_of_nodes: u64,
    pub(crate) unpruned_leaves: BTreeMap<u64, L>,
    pub(crate) unpruned_hashes: BTreeMap<u64, [u8; 32]>,
    pub(crate) lookup: BTreeMap<L::LookupKey, BTreeSet<u64>>,
    pub(crate) sum: L::Sum,
    pub(crate) prune_history: BTreeMap<u64, BTreeSet<u64>>,
    pub(crate) prune_list: BTreeMap<u64, L>,
    pub(crate) minimum_size: u64,
    /// Position -> leaf index, maintained only for live leaf positions so
    /// prune's upward sibling walk can tell a leaf sibling from an
    /// internal one without re-deriving it from the position algebra.
    pub(crate) leaf_index_of_position: BTreeMap<u64, u64>,
}

impl<L: MmrLeaf> Mmr<L> {
    /// An empty MMR.
    pub fn new(protocol_version: u32) -> Self {
        Self {
            protocol_version,
            number_of_leaves: 0,
            number_of_nodes: 0,
            unpruned_leaves: BTreeMap::new(),
            unpruned_hashes: BTreeMap::new(),
            lookup: BTreeMap::new(),
            sum: L::zero_sum(),
            prune_history: BTreeMap::new(),
            prune_list: BTreeMap::new(),
            minimum_size: 0,
            leaf_index_of_position: BTreeMap::new(),
        }
    }

    /// Total node count (leaves + internal nodes).
    pub fn size(&self) -> u64 {
        self.number_of_nodes
    }

    /// Number of leaves ever appended (including pruned ones).
    pub fn number_of_leaves(&self) -> u64 {
        self.number_of_leaves
    }

    /// The running aggregate over all live leaves.
    pub fn sum(&self) -> &L::Sum {
        &self.sum
    }

    /// The smallest size this MMR can currently be rewound to.
    pub fn minimum_size(&self) -> u64 {
        self.minimum_size
    }

    /// Live leaf indices whose lookup key matches `key`.
    pub fn leaf_indices_by_lookup_key(&self, key: &L::LookupKey) -> BTreeSet<u64> {
        self.lookup.get(key).cloned().unwrap_or_default()
    }

    /// The sole live leaf index for `key`, when the leaf type disallows
    /// duplicate lookup values.
    pub fn leaf_index_by_lookup_value(&self, key: &L::LookupKey) -> Option<u64> {
        let set = self.lookup.get(key)?;
        if L::ALLOW_DUPLICATE_LOOKUP_VALUES {
            set.iter().next().copied()
        } else {
            debug_assert!(set.len() <= 1);
            set.iter().next().copied()
        }
    }

    /// Reference to a live (non-pruned) leaf.
    pub fn get_leaf(&self, leaf_index: u64) -> Option<&L> {
        self.unpruned_leaves.get(&leaf_index)
    }

    fn hash_leaf(&self, position: u64, leaf: &L) -> [u8; 32] {
        let mut buf = Vec::with_capacity(8 + L::MAXIMUM_SERIALIZED_LENGTH);
        buf.extend_from_slice(&position.to_be_bytes());
        buf.extend_from_slice(&leaf.serialize(self.protocol_version));
        blake2b_256(&buf)
    }

    fn hash_internal(position: u64, left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
        let mut buf = Vec::with_capacity(8 + 32 + 32);
        buf.extend_from_slice(&position.to_be_bytes());
        buf.extend_from_slice(left);
        buf.extend_from_slice(right);
        blake2b_256(&buf)
    }

    /// Append one leaf, building every parent whose two children now exist
    /// at equal height.
    pub fn append(&mut self, leaf: L) {
        let position = self.number_of_nodes;
        let leaf_index = self.number_of_leaves;

        let hash = self.hash_leaf(position, &leaf);
        self.unpruned_hashes.insert(position, hash);
        self.leaf_index_of_position.insert(position, leaf_index);

        if let Some(key) = leaf.lookup_key() {
            self.lookup.entry(key).or_default().insert(leaf_index);
        }
        self.sum = leaf.add_to_sum(&self.sum, AdditionReason::Appended);
        self.unpruned_leaves.insert(leaf_index, leaf);

        self.number_of_leaves += 1;
        self.number_of_nodes += 1;

        let mut i = position;
        while height_at_index(i) < height_at_index(i + 1) {
            let left = left_sibling_index(i);
            let hl = *self
                .unpruned_hashes
                .get(&left)
                .expect("left sibling hash present during cascade");
            let hr = *self
                .unpruned_hashes
                .get(&i)
                .expect("own hash present during cascade");
            let parent = self.number_of_nodes;
            let ph = Self::hash_internal(parent, &hl, &hr);
            self.unpruned_hashes.insert(parent, ph);
            self.number_of_nodes += 1;
            i = parent;
        }
    }

    fn is_fully_pruned(&self, position: u64) -> bool {
        if height_at_index(position) == 0 {
            match self.leaf_index_of_position.get(&position) {
                Some(leaf_index) => !self.unpruned_leaves.contains_key(leaf_index),
                None => true,
            }
        } else {
            !self.unpruned_hashes.contains_key(&position)
        }
    }

    fn walk_up_pruning_dead_siblings(&mut self, start: u64) {
        let mut pos = start;
        loop {
            let parent = parent_index(pos);
            if parent >= self.number_of_nodes {
                break;
            }
            let sibling = if left_child_index(parent) == pos {
                right_child_index(parent)
            } else {
                left_child_index(parent)
            };
            if self.is_fully_pruned(sibling) {
                self.unpruned_hashes.remove(&parent);
                pos = parent;
            } else {
                break;
            }
        }
    }

    /// Remove a live leaf. If `permanent`, its hash (and any ancestor whose
    /// subtree becomes fully pruned) is dropped immediately and the leaf
    /// cannot later be restored by a rewind. Otherwise the leaf moves into
    /// the prune list and can be restored by rewinding to a size at or
    /// before the current leaf count.
    pub fn prune(&mut self, leaf_index: u64, permanent: bool) -> Result<(), MmrError> {
        let leaf = self
            .unpruned_leaves
            .remove(&leaf_index)
            .ok_or(MmrError::LeafNotFound)?;

        if let Some(key) = leaf.lookup_key() {
            if let Some(set) = self.lookup.get_mut(&key) {
                set.remove(&leaf_index);
                if set.is_empty() {
                    self.lookup.remove(&key);
                }
            }
        }
        self.sum = leaf.subtract_from_sum(&self.sum, SubtractionReason::Pruned);

        if permanent {
            let position = *self
                .leaf_index_of_position
                .iter()
                .find(|(_, &li)| li == leaf_index)
                .map(|(p, _)| p)
                .expect("append always records a leaf position");
            self.unpruned_hashes.remove(&position);
            self.walk_up_pruning_dead_siblings(position);
        } else {
            self.prune_list.insert(leaf_index, leaf);
            self.prune_history
                .entry(self.number_of_leaves)
                .or_default()
                .insert(leaf_index);
        }
        Ok(())
    }

    /// Root hash of the forest at size `s`: empty ⇒ 32 zero bytes, else the
    /// peaks folded right-to-left into a single hash.
    pub fn root_at_size(&self, size: u64) -> Result<[u8; 32], MmrError> {
        if !is_size_valid(size) {
            return Err(MmrError::InvalidSize);
        }
        let peaks = peak_positions(size);
        let Some((&rightmost, rest)) = peaks.split_last() else {
            return Ok([0u8; 32]);
        };
        let mut root = *self
            .unpruned_hashes
            .get(&rightmost)
            .ok_or(MmrError::MissingHash)?;
        for &p in rest.iter().rev() {
            let h = *self.unpruned_hashes.get(&p).ok_or(MmrError::MissingHash)?;
            let mut buf = Vec::with_capacity(8 + 32 + 32);
            buf.extend_from_slice(&size.to_be_bytes());
            buf.extend_from_slice(&h);
            buf.extend_from_slice(&root);
            root = blake2b_256(&buf);
        }
        Ok(root)
    }

    /// Current root, at the current size.
    pub fn root(&self) -> Result<[u8; 32], MmrError> {
        self.root_at_size(self.number_of_nodes)
    }

    /// Rewind to node count `s`.
    pub fn rewind(&mut self, s: u64) -> Result<(), MmrError> {
        if !is_size_valid(s) {
            return Err(MmrError::InvalidSize);
        }
        if s < self.minimum_size {
            return Err(MmrError::BelowMinimumSize);
        }

        self.unpruned_hashes = std::mem::take(&mut self.unpruned_hashes)
            .into_iter()
            .filter(|&(pos, _)| pos < s)
            .collect();
        self.leaf_index_of_position = std::mem::take(&mut self.leaf_index_of_position)
            .into_iter()
            .filter(|&(pos, _)| pos < s)
            .collect();

        let new_number_of_leaves = number_of_leaves_at_size(s);

        let disappearing: Vec<u64> = self
            .unpruned_leaves
            .range(new_number_of_leaves..)
            .map(|(&idx, _)| idx)
            .collect();
        for leaf_index in disappearing {
            let leaf = self.unpruned_leaves.remove(&leaf_index).expect("just matched");
            if let Some(key) = leaf.lookup_key() {
                if let Some(set) = self.lookup.get_mut(&key) {
                    set.remove(&leaf_index);
                    if set.is_empty() {
                        self.lookup.remove(&key);
                    }
                }
            }
            self.sum = leaf.subtract_from_sum(&self.sum, SubtractionReason::Rewinded);
        }

        self.number_of_leaves = new_number_of_leaves;
        self.number_of_nodes = s;

        let newer_entries: Vec<u64> = self
            .prune_history
            .range(new_number_of_leaves + 1..)
            .map(|(&k, _)| k)
            .rev()
            .collect();
        for key in newer_entries {
            let leaf_indices = self.prune_history.remove(&key).unwrap_or_default();
            for leaf_index in leaf_indices {
                if leaf_index < new_number_of_leaves {
                    if let Some(leaf) = self.prune_list.remove(&leaf_index) {
                        if let Some(k) = leaf.lookup_key() {
                            self.lookup.entry(k).or_default().insert(leaf_index);
                        }
                        self.sum = leaf.add_to_sum(&self.sum, AdditionReason::Restored);
                        self.unpruned_leaves.insert(leaf_index, leaf);
                    }
                } else if let Some(leaf) = self.prune_list.remove(&leaf_index) {
                    self.sum = leaf.subtract_from_sum(&self.sum, SubtractionReason::Discarded);
                }
            }
        }

        Ok(())
    }

    /// Raise the floor below which this MMR can no longer be rewound,
    /// permanently compacting any prune-history entries at or below `m`.
    pub fn set_minimum_size(&mut self, m: u64) -> Result<(), MmrError> {
        if m < self.minimum_size {
            return Err(MmrError::MinimumSizeDecreased);
        }
        let stale_keys: Vec<u64> = self.prune_history.range(..=m).map(|(&k, _)| k).collect();
        for key in stale_keys {
            let leaf_indices = self.prune_history.remove(&key).unwrap_or_default();
            for leaf_index in leaf_indices {
                self.prune_list.remove(&leaf_index);
                if let Some(&position) = self.leaf_index_of_position.iter().find_map(|(p, &li)| {
                    if li == leaf_index {
                        Some(p)
                    } else {
                        None
                    }
                }) {
                    self.unpruned_hashes.remove(&position);
                    self.leaf_index_of_position.remove(&position);
                    self.walk_up_pruning_dead_siblings(position);
                }
            }
        }
        self.minimum_size = m;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, PartialEq, Eq, Debug)]
    struct TestLeaf(u64);

    impl MmrLeaf for TestLeaf {
        type Sum = u64;
        type LookupKey = u64;

        const ALLOW_DUPLICATE_LOOKUP_VALUES: bool = false;
        const MAXIMUM_SERIALIZED_LENGTH: usize = 8;

        fn zero_sum() -> Self::Sum {
            0
        }

        fn serialize(&self, _protocol_version: u32) -> Vec<u8> {
            self.0.to_be_bytes().to_vec()
        }

        fn unserialize(bytes: &[u8], _protocol_version: u32, _is_first: bool) -> Option<(Self, usize)> {
            if bytes.len() < 8 {
                return None;
            }
            let mut b = [0u8; 8];
            b.copy_from_slice(&bytes[..8]);
            Some((TestLeaf(u64::from_be_bytes(b)), 8))
        }

        fn lookup_key(&self) -> Option<Self::LookupKey> {
            Some(self.0)
        }

        fn add_to_sum(&self, sum: &Self::Sum, _reason: AdditionReason) -> Self::Sum {
            sum + self.0
        }

        fn subtract_from_sum(&self, sum: &Self::Sum, _reason: SubtractionReason) -> Self::Sum {
            sum - self.0
        }
    }

    #[test]
    fn append_tracks_sum_and_root_changes() {
        let mut mmr: Mmr<TestLeaf> = Mmr::new(0);
        let mut roots = Vec::new();
        for i in 0..8u64 {
            mmr.append(TestLeaf(i));
            roots.push(mmr.root().unwrap());
        }
        assert_eq!(*mmr.sum(), (0..8u64).sum::<u64>());
        assert_eq!(mmr.number_of_leaves(), 8);
        // every root is distinct as the tree grows
        for i in 0..roots.len() {
            for j in (i + 1)..roots.len() {
                assert_ne!(roots[i], roots[j]);
            }
        }
    }

    #[test]
    fn rewind_restores_sum_and_size() {
        let mut mmr: Mmr<TestLeaf> = Mmr::new(0);
        for i in 0..10u64 {
            mmr.append(TestLeaf(i));
        }
        let size_at_5 = size_at_number_of_leaves(5);
        let root_at_5 = mmr.root_at_size(size_at_5).unwrap();

        mmr.rewind(size_at_5).unwrap();
        assert_eq!(mmr.number_of_leaves(), 5);
        assert_eq!(*mmr.sum(), (0..5u64).sum::<u64>());
        assert_eq!(mmr.root().unwrap(), root_at_5);
    }

    #[test]
    fn soft_prune_then_rewind_restores_leaf() {
        let mut mmr: Mmr<TestLeaf> = Mmr::new(0);
        for i in 0..4u64 {
            mmr.append(TestLeaf(i));
        }
        let size_before = mmr.size();
        mmr.prune(1, false).unwrap();
        assert!(mmr.get_leaf(1).is_none());
        assert_eq!(*mmr.sum(), 0 + 2 + 3);

        mmr.rewind(size_before).unwrap();
        assert_eq!(*mmr.get_leaf(1).unwrap(), TestLeaf(1));
        assert_eq!(*mmr.sum(), 0 + 1 + 2 + 3);
    }

    #[test]
    fn permanent_prune_removes_leaf_hash() {
        let mut mmr: Mmr<TestLeaf> = Mmr::new(0);
        for i in 0..2u64 {
            mmr.append(TestLeaf(i));
        }
        mmr.prune(0, true).unwrap();
        assert!(mmr.get_leaf(0).is_none());
        // root still computable from the remaining sibling + parent hash chain
        assert!(mmr.root().is_ok());
    }
}
