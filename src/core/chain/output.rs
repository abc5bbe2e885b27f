// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Transaction outputs and their rangeproofs, stored in parallel MMRs
//! keyed by the same leaf index.

use thiserror::Error;

use crate::core::mmr::{AdditionReason, MmrLeaf, SubtractionReason};

/// Output/rangeproof construction failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OutputError {
    /// The 33-byte commitment doesn't parse.
    #[error("commitment is invalid")]
    InvalidCommitment,
}

/// An output's spending features.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum OutputFeatures {
    /// An ordinary, immediately spendable output.
    Plain,
    /// A coinbase output, spendable only after `COINBASE_MATURITY` blocks.
    Coinbase,
}

impl OutputFeatures {
    fn wire_tag(self) -> u8 {
        match self {
            OutputFeatures::Plain => 0,
            OutputFeatures::Coinbase => 1,
        }
    }

    fn from_wire_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(OutputFeatures::Plain),
            1 => Some(OutputFeatures::Coinbase),
            _ => None,
        }
    }
}

/// One transaction output: spending features plus a 33-byte Pedersen
/// commitment. Lookup key is the serialized commitment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Output {
    /// Spending features.
    pub features: OutputFeatures,
    /// Serialized Pedersen commitment.
    pub commitment: [u8; 33],
}

impl Output {
    /// Build an output, checking only shape; commitment group-membership is
    /// verified by the crypto provider when it's actually parsed.
    pub fn new(features: OutputFeatures, commitment: [u8; 33]) -> Self {
        Self { features, commitment }
    }

    /// Serialized form used for sorted-and-unique hashing and MMR storage.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(34);
        out.push(self.features.wire_tag());
        out.extend_from_slice(&self.commitment);
        out
    }

    /// The value other structures (mempool, UTXO lookups) key this output by.
    pub fn lookup_value(&self) -> [u8; 33] {
        self.commitment
    }
}

impl MmrLeaf for Output {
    type Sum = ();
    type LookupKey = [u8; 33];

    const ALLOW_DUPLICATE_LOOKUP_VALUES: bool = false;
    const MAXIMUM_SERIALIZED_LENGTH: usize = 34;

    fn zero_sum() -> Self::Sum {}

    fn serialize(&self, _protocol_version: u32) -> Vec<u8> {
        Output::serialize(self)
    }

    fn unserialize(bytes: &[u8], _protocol_version: u32, _is_first: bool) -> Option<(Self, usize)> {
        if bytes.len() < 34 {
            return None;
        }
        let features = OutputFeatures::from_wire_tag(bytes[0])?;
        let mut commitment = [0u8; 33];
        commitment.copy_from_slice(&bytes[1..34]);
        Some((Output { features, commitment }, 34))
    }

    fn lookup_key(&self) -> Option<Self::LookupKey> {
        Some(self.commitment)
    }

    fn add_to_sum(&self, _sum: &Self::Sum, _reason: AdditionReason) -> Self::Sum {}

    fn subtract_from_sum(&self, _sum: &Self::Sum, _reason: SubtractionReason) -> Self::Sum {}
}

/// Maximum bulletproof byte length this node will ever parse.
pub const BULLETPROOF_LENGTH: usize = 675;

/// A bulletproof rangeproof: a length prefix and an opaque byte string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rangeproof {
    /// The opaque bulletproof bytes.
    pub proof: Vec<u8>,
}

impl Rangeproof {
    /// Serialized form: a 2-byte big-endian length prefix plus the proof.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(2 + self.proof.len());
        out.extend_from_slice(&(self.proof.len() as u16).to_be_bytes());
        out.extend_from_slice(&self.proof);
        out
    }
}

impl MmrLeaf for Rangeproof {
    type Sum = ();
    type LookupKey = ();

    const ALLOW_DUPLICATE_LOOKUP_VALUES: bool = true;
    const MAXIMUM_SERIALIZED_LENGTH: usize = 2 + BULLETPROOF_LENGTH;

    fn zero_sum() -> Self::Sum {}

    fn serialize(&self, _protocol_version: u32) -> Vec<u8> {
        Rangeproof::serialize(self)
    }

    fn unserialize(bytes: &[u8], _protocol_version: u32, _is_first: bool) -> Option<(Self, usize)> {
        if bytes.len() < 2 {
            return None;
        }
        let len = u16::from_be_bytes([bytes[0], bytes[1]]) as usize;
        if len > BULLETPROOF_LENGTH || bytes.len() < 2 + len {
            return None;
        }
        Some((
            Rangeproof {
                proof: bytes[2..2 + len].to_vec(),
            },
            2 + len,
        ))
    }

    fn lookup_key(&self) -> Option<Self::LookupKey> {
        None
    }

    fn add_to_sum(&self, _sum: &Self::Sum, _reason: AdditionReason) -> Self::Sum {}

    fn subtract_from_sum(&self, _sum: &Self::Sum, _reason: SubtractionReason) -> Self::Sum {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_round_trips() {
        let output = Output::new(OutputFeatures::Coinbase, [7u8; 33]);
        let bytes = MmrLeaf::serialize(&output, 0);
        let (restored, consumed) = Output::unserialize(&bytes, 0, false).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(restored, output);
    }

    #[test]
    fn rangeproof_round_trips() {
        let rp = Rangeproof { proof: vec![1, 2, 3, 4] };
        let bytes = MmrLeaf::serialize(&rp, 0);
        let (restored, consumed) = Rangeproof::unserialize(&bytes, 0, false).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(restored, rp);
    }

    #[test]
    fn rangeproof_rejects_oversized_length_prefix() {
        let mut bytes = vec![0xff, 0xff];
        bytes.extend(std::iter::repeat(0).take(10));
        assert!(Rangeproof::unserialize(&bytes, 0, false).is_none());
    }
}
