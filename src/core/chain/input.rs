// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Transaction inputs: a spent commitment plus the spent output's
//! features, or a marker that the features must be read off the output
//! being spent.

use thiserror::Error;

/// Input construction failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputError {
    /// The 33-byte commitment doesn't parse.
    #[error("commitment is invalid")]
    InvalidCommitment,
}

/// An input's claimed features, mirroring the output it spends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum InputFeatures {
    /// Spends an ordinary output.
    Plain,
    /// Spends a coinbase output; maturity is checked against the spent
    /// output's height, not recorded here.
    Coinbase,
    /// Features aren't carried on the wire; resolve them against the
    /// output this input actually spends.
    SameAsOutput,
}

impl InputFeatures {
    fn wire_tag(self) -> u8 {
        match self {
            InputFeatures::Plain => 0,
            InputFeatures::Coinbase => 1,
            InputFeatures::SameAsOutput => unreachable!("SameAsOutput carries no wire tag"),
        }
    }

    fn from_wire_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(InputFeatures::Plain),
            1 => Some(InputFeatures::Coinbase),
            _ => None,
        }
    }
}

/// One transaction input: the commitment being spent, plus features that
/// are either carried explicitly or resolved from the spent output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Input {
    /// Claimed spending features.
    pub features: InputFeatures,
    /// Serialized Pedersen commitment of the output being spent.
    pub commitment: [u8; 33],
}

impl Input {
    /// Build an input, checking only shape; commitment group-membership is
    /// verified by the crypto provider when it's actually parsed.
    pub fn new(features: InputFeatures, commitment: [u8; 33]) -> Self {
        Self { features, commitment }
    }

    /// Serialized form: the features byte is omitted when `SameAsOutput`,
    /// since in that case it carries no information of its own.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(34);
        if self.features != InputFeatures::SameAsOutput {
            out.push(self.features.wire_tag());
        }
        out.extend_from_slice(&self.commitment);
        out
    }

    /// Decode, given whether the features byte is present on the wire.
    pub fn deserialize(bytes: &[u8], features_present: bool) -> Option<(Self, usize)> {
        if features_present {
            if bytes.len() < 34 {
                return None;
            }
            let features = InputFeatures::from_wire_tag(bytes[0])?;
            let mut commitment = [0u8; 33];
            commitment.copy_from_slice(&bytes[1..34]);
            Some((Input { features, commitment }, 34))
        } else {
            if bytes.len() < 33 {
                return None;
            }
            let mut commitment = [0u8; 33];
            commitment.copy_from_slice(&bytes[..33]);
            Some((
                Input {
                    features: InputFeatures::SameAsOutput,
                    commitment,
                },
                33,
            ))
        }
    }

    /// The value this input matches against the UTXO set.
    pub fn lookup_value(&self) -> [u8; 33] {
        self.commitment
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_round_trips_with_features_byte() {
        let input = Input::new(InputFeatures::Plain, [4u8; 33]);
        let bytes = input.serialize();
        assert_eq!(bytes.len(), 34);
        let (restored, consumed) = Input::deserialize(&bytes, true).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(restored, input);
    }

    #[test]
    fn same_as_output_omits_features_byte() {
        let input = Input::new(InputFeatures::SameAsOutput, [4u8; 33]);
        let bytes = input.serialize();
        assert_eq!(bytes.len(), 33);
        let (restored, consumed) = Input::deserialize(&bytes, false).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(restored, input);
    }
}
