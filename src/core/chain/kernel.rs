// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Transaction kernels: the excess commitment plus aggregate Schnorr
//! signature proving a transaction/block balances, with a protocol-
//! version-dependent encoding of the fee-lock fields.

use crate::core::mmr::{AdditionReason, MmrLeaf, SubtractionReason};

/// A kernel's spending-condition variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum KernelFeatures {
    /// An ordinary kernel; `fee` applies, no lock.
    Plain,
    /// A coinbase kernel; no fee.
    Coinbase,
    /// Not valid before `lock_height`.
    HeightLocked,
    /// Not valid until `relative_height` blocks after the spent output's
    /// prior same-excess kernel (NRD support stub, enabled from header
    /// version 4 onward).
    NoRecentDuplicate,
}

impl KernelFeatures {
    fn wire_tag(self) -> u8 {
        match self {
            KernelFeatures::Plain => 0,
            KernelFeatures::Coinbase => 1,
            KernelFeatures::HeightLocked => 2,
            KernelFeatures::NoRecentDuplicate => 3,
        }
    }

    fn from_wire_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(KernelFeatures::Plain),
            1 => Some(KernelFeatures::Coinbase),
            2 => Some(KernelFeatures::HeightLocked),
            3 => Some(KernelFeatures::NoRecentDuplicate),
            _ => None,
        }
    }
}

/// One transaction kernel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Kernel {
    /// Spending-condition variant.
    pub features: KernelFeatures,
    /// Fee paid, 0 for `Coinbase`.
    pub fee: u64,
    /// Height before which the kernel is invalid, `HeightLocked` only.
    pub lock_height: u64,
    /// Minimum height delta since the matching prior kernel,
    /// `NoRecentDuplicate` only.
    pub relative_height: u64,
    /// Serialized excess commitment.
    pub excess: [u8; 33],
    /// Aggregate Schnorr signature over the kernel's signed message.
    pub signature: [u8; 64],
}

impl Kernel {
    /// Encode per `protocol_version`: 0-1 use a fixed-width record with
    /// every field present; 2+ encode only the fields each feature needs,
    /// with `relative_height` as `u16` below protocol 3 and `u64` from 3
    /// onward (§9 Open Question 1).
    pub fn serialize(&self, protocol_version: u32) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + 8 + 8 + 33 + 64);
        out.push(self.features.wire_tag());
        if protocol_version <= 1 {
            out.extend_from_slice(&self.fee.to_be_bytes());
            out.extend_from_slice(&self.lock_height.to_be_bytes());
        } else {
            match self.features {
                KernelFeatures::Plain => out.extend_from_slice(&self.fee.to_be_bytes()),
                KernelFeatures::Coinbase => {}
                KernelFeatures::HeightLocked => {
                    out.extend_from_slice(&self.fee.to_be_bytes());
                    out.extend_from_slice(&self.lock_height.to_be_bytes());
                }
                KernelFeatures::NoRecentDuplicate => {
                    out.extend_from_slice(&self.fee.to_be_bytes());
                    if protocol_version < 3 {
                        out.extend_from_slice(&(self.relative_height as u16).to_be_bytes());
                    } else {
                        out.extend_from_slice(&self.relative_height.to_be_bytes());
                    }
                }
            }
        }
        out.extend_from_slice(&self.excess);
        out.extend_from_slice(&self.signature);
        out
    }

    /// Decode per the same layout rules as [`Kernel::serialize`].
    pub fn deserialize(bytes: &[u8], protocol_version: u32) -> Option<(Self, usize)> {
        let mut pos = 0usize;
        let take = |pos: &mut usize, n: usize| -> Option<&[u8]> {
            if bytes.len() < *pos + n {
                return None;
            }
            let slice = &bytes[*pos..*pos + n];
            *pos += n;
            Some(slice)
        };

        let features = KernelFeatures::from_wire_tag(*take(&mut pos, 1)?.first()?)?;
        let mut fee = 0u64;
        let mut lock_height = 0u64;
        let mut relative_height = 0u64;

        if protocol_version <= 1 {
            fee = u64::from_be_bytes(take(&mut pos, 8)?.try_into().ok()?);
            lock_height = u64::from_be_bytes(take(&mut pos, 8)?.try_into().ok()?);
        } else {
            match features {
                KernelFeatures::Plain => {
                    fee = u64::from_be_bytes(take(&mut pos, 8)?.try_into().ok()?);
                }
                KernelFeatures::Coinbase => {}
                KernelFeatures::HeightLocked => {
                    fee = u64::from_be_bytes(take(&mut pos, 8)?.try_into().ok()?);
                    lock_height = u64::from_be_bytes(take(&mut pos, 8)?.try_into().ok()?);
                }
                KernelFeatures::NoRecentDuplicate => {
                    fee = u64::from_be_bytes(take(&mut pos, 8)?.try_into().ok()?);
                    relative_height = if protocol_version < 3 {
                        u16::from_be_bytes(take(&mut pos, 2)?.try_into().ok()?) as u64
                    } else {
                        u64::from_be_bytes(take(&mut pos, 8)?.try_into().ok()?)
                    };
                }
            }
        }

        let excess: [u8; 33] = take(&mut pos, 33)?.try_into().ok()?;
        let signature: [u8; 64] = take(&mut pos, 64)?.try_into().ok()?;

        Some((
            Kernel {
                features,
                fee,
                lock_height,
                relative_height,
                excess,
                signature,
            },
            pos,
        ))
    }
}

impl MmrLeaf for Kernel {
    type Sum = ();
    type LookupKey = ();

    const ALLOW_DUPLICATE_LOOKUP_VALUES: bool = true;
    const MAXIMUM_SERIALIZED_LENGTH: usize = 1 + 8 + 8 + 33 + 64;

    fn zero_sum() -> Self::Sum {}

    fn serialize(&self, protocol_version: u32) -> Vec<u8> {
        Kernel::serialize(self, protocol_version)
    }

    fn unserialize(bytes: &[u8], protocol_version: u32, _is_first: bool) -> Option<(Self, usize)> {
        Kernel::deserialize(bytes, protocol_version)
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

    fn sample(features: KernelFeatures) -> Kernel {
        Kernel {
            features,
            fee: 500,
            lock_height: 1000,
            relative_height: 12,
            excess: [9u8; 33],
            signature: [3u8; 64],
        }
    }

    #[test]
    fn plain_round_trips_at_protocol_2() {
        let k = sample(KernelFeatures::Plain);
        let bytes = k.serialize(2);
        let (decoded, consumed) = Kernel::deserialize(&bytes, 2).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(decoded.fee, 500);
        assert_eq!(decoded.lock_height, 0);
        assert_eq!(decoded.excess, k.excess);
    }

    #[test]
    fn coinbase_omits_fee_at_protocol_2() {
        let k = sample(KernelFeatures::Coinbase);
        let bytes = k.serialize(2);
        assert_eq!(bytes.len(), 1 + 33 + 64);
    }

    #[test]
    fn nrd_relative_height_width_depends_on_protocol_version() {
        let k = sample(KernelFeatures::NoRecentDuplicate);
        let legacy = k.serialize(2);
        let modern = k.serialize(3);
        assert_eq!(legacy.len() + 6, modern.len());
        let (decoded_legacy, _) = Kernel::deserialize(&legacy, 2).unwrap();
        let (decoded_modern, _) = Kernel::deserialize(&modern, 3).unwrap();
        assert_eq!(decoded_legacy.relative_height, 12);
        assert_eq!(decoded_modern.relative_height, 12);
    }

    #[test]
    fn fixed_width_record_at_protocol_0() {
        let k = sample(KernelFeatures::Coinbase);
        let bytes = k.serialize(0);
        assert_eq!(bytes.len(), 1 + 8 + 8 + 33 + 64);
    }
}
