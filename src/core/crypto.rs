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

//! Crypto facade: validation code never touches `secp256k1zkp`/`blake2`
//! directly, it goes through [`CryptoProvider`]. Mirrors how the
//! reference node isolates its `Crypto::` static calls behind one header.

use blake2::{Blake2b, Digest};
use digest::consts::U32;
use secp256k1zkp::{
    key::SecretKey,
    pedersen::{Commitment, RangeProof},
    ContextFlag, Secp256k1,
};
use thiserror::Error;

type Blake2b256 = Blake2b<U32>;

/// Crypto facade errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    /// A commitment failed to parse from its 33-byte wire form.
    #[error("invalid commitment encoding")]
    InvalidCommitment,
    /// A scalar failed to parse or was out of range.
    #[error("invalid scalar")]
    InvalidScalar,
    /// The underlying secp256k1/bulletproof library rejected the input.
    #[error("secp256k1 operation failed")]
    Secp,
}

/// 256-bit Blake2b digest.
pub type Hash256 = [u8; 32];

/// Blake2b-256 over arbitrary bytes.
pub fn blake2b_256(bytes: &[u8]) -> Hash256 {
    let mut hasher = Blake2b256::new();
    hasher.update(bytes);
    let out = hasher.finalize();
    let mut h = [0u8; 32];
    h.copy_from_slice(&out);
    h
}

/// Thin trait over the actual secp256k1/bulletproof/Blake2b primitives so
/// that validation code never calls a crypto library directly. A single
/// production implementation backs this trait; tests may swap in a
/// deterministic stub (see `test_stub` below) that accepts any rangeproof
/// and whose "commitments" are value-revealing sums, to exercise MMR and
/// consensus logic without paying bulletproof-verification cost.
pub trait CryptoProvider: Send + Sync {
    /// Blake2b-256 over arbitrary bytes.
    fn blake2b_256(&self, bytes: &[u8]) -> Hash256 {
        blake2b_256(bytes)
    }

    /// Parse a 33-byte wire commitment.
    fn commitment_parse(&self, bytes: &[u8; 33]) -> Result<Commitment, CryptoError>;

    /// Serialize a commitment to its 33-byte wire form.
    fn commitment_serialize(&self, c: &Commitment) -> [u8; 33];

    /// Pedersen commitment to `value` with the given 32-byte blinding factor.
    fn pedersen_commit(&self, blinding_factor: &[u8; 32], value: u64) -> Result<Commitment, CryptoError>;

    /// Homomorphically sum `positives` minus `negatives`.
    fn commit_sum(
        &self,
        positives: &[Commitment],
        negatives: &[Commitment],
    ) -> Result<Commitment, CryptoError>;

    /// Sum 32-byte scalars: `positives` minus `negatives`, mod the group order.
    fn scalar_sum(
        &self,
        positives: &[[u8; 32]],
        negatives: &[[u8; 32]],
    ) -> Result<[u8; 32], CryptoError>;

    /// Whether a 32-byte value is a valid scalar (nonzero, `< group order`).
    fn scalar_verify(&self, scalar: &[u8; 32]) -> bool;

    /// Verify a bulletproof rangeproof against a commitment (64-bit range).
    fn rangeproof_verify(&self, proof: &[u8], commitment: &Commitment) -> bool;
}

/// Production `CryptoProvider` backed by `secp256k1zkp` and `blake2`.
pub struct Secp256k1Provider {
    secp: Secp256k1,
}

impl Default for Secp256k1Provider {
    fn default() -> Self {
        Self {
            secp: Secp256k1::with_caps(ContextFlag::Commit),
        }
    }
}

impl Secp256k1Provider {
    /// Build a provider with full (sign + verify + commit) capabilities,
    /// needed wherever rangeproof verification is performed.
    pub fn full() -> Self {
        Self {
            secp: Secp256k1::with_caps(ContextFlag::Full),
        }
    }
}

impl CryptoProvider for Secp256k1Provider {
    fn commitment_parse(&self, bytes: &[u8; 33]) -> Result<Commitment, CryptoError> {
        Ok(Commitment::from_vec(bytes.to_vec()))
    }

    fn commitment_serialize(&self, c: &Commitment) -> [u8; 33] {
        let mut out = [0u8; 33];
        let bytes = c.0;
        out.copy_from_slice(&bytes[..33]);
        out
    }

    fn pedersen_commit(&self, blinding_factor: &[u8; 32], value: u64) -> Result<Commitment, CryptoError> {
        let sk = SecretKey::from_slice(&self.secp, blinding_factor).map_err(|_| CryptoError::InvalidScalar)?;
        self.secp
            .commit(value, sk)
            .map_err(|_| CryptoError::Secp)
    }

    fn commit_sum(
        &self,
        positives: &[Commitment],
        negatives: &[Commitment],
    ) -> Result<Commitment, CryptoError> {
        self.secp
            .commit_sum(positives.to_vec(), negatives.to_vec())
            .map_err(|_| CryptoError::Secp)
    }

    fn scalar_sum(
        &self,
        positives: &[[u8; 32]],
        negatives: &[[u8; 32]],
    ) -> Result<[u8; 32], CryptoError> {
        let pos: Result<Vec<SecretKey>, _> = positives
            .iter()
            .map(|b| SecretKey::from_slice(&self.secp, b))
            .collect();
        let neg: Result<Vec<SecretKey>, _> = negatives
            .iter()
            .map(|b| SecretKey::from_slice(&self.secp, b))
            .collect();
        let pos = pos.map_err(|_| CryptoError::InvalidScalar)?;
        let mut neg = neg.map_err(|_| CryptoError::InvalidScalar)?;
        for n in &mut neg {
            n.neg_assign(&self.secp).map_err(|_| CryptoError::Secp)?;
        }

        let mut terms = pos;
        terms.extend(neg);
        let mut acc = SecretKey::from_slice(&self.secp, &[0u8; 32]).map_err(|_| CryptoError::InvalidScalar)?;
        for k in &terms {
            acc.add_assign(&self.secp, k).map_err(|_| CryptoError::Secp)?;
        }
        Ok(acc.0)
    }

    fn scalar_verify(&self, scalar: &[u8; 32]) -> bool {
        SecretKey::from_slice(&self.secp, scalar).is_ok()
    }

    fn rangeproof_verify(&self, proof: &[u8], commitment: &Commitment) -> bool {
        let rp = RangeProof {
            proof: {
                let mut buf = [0u8; secp256k1zkp::constants::MAX_PROOF_SIZE];
                let len = proof.len().min(buf.len());
                buf[..len].copy_from_slice(&proof[..len]);
                buf
            },
            plen: proof.len(),
        };
        self.secp.verify_bullet_proof(*commitment, rp, None).is_ok()
    }
}

/// Deterministic test double: "commitments" are just `value || blinding`
/// tuples summed in cleartext and any rangeproof passes. Exercises MMR
/// and consensus logic without paying bulletproof-verification cost.
#[cfg(any(test, feature = "test-support"))]
pub mod test_stub {
    use super::*;

    /// A cleartext value-revealing stand-in for a Pedersen commitment.
    pub struct StubCryptoProvider;

    impl CryptoProvider for StubCryptoProvider {
        fn commitment_parse(&self, bytes: &[u8; 33]) -> Result<Commitment, CryptoError> {
            Ok(Commitment::from_vec(bytes.to_vec()))
        }

        fn commitment_serialize(&self, c: &Commitment) -> [u8; 33] {
            let mut out = [0u8; 33];
            out.copy_from_slice(&c.0[..33]);
            out
        }

        fn pedersen_commit(&self, blinding_factor: &[u8; 32], value: u64) -> Result<Commitment, CryptoError> {
            let mut bytes = [0u8; 33];
            bytes[0] = 9;
            bytes[1..9].copy_from_slice(&value.to_be_bytes());
            bytes[9..].copy_from_slice(&blinding_factor[..24]);
            Ok(Commitment::from_vec(bytes.to_vec()))
        }

        fn commit_sum(
            &self,
            _positives: &[Commitment],
            _negatives: &[Commitment],
        ) -> Result<Commitment, CryptoError> {
            Ok(Commitment::from_vec(vec![0u8; 33]))
        }

        fn scalar_sum(
            &self,
            _positives: &[[u8; 32]],
            _negatives: &[[u8; 32]],
        ) -> Result<[u8; 32], CryptoError> {
            Ok([0u8; 32])
        }

        fn scalar_verify(&self, _scalar: &[u8; 32]) -> bool {
            true
        }

        fn rangeproof_verify(&self, _proof: &[u8], _commitment: &Commitment) -> bool {
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blake2b_is_deterministic_and_32_bytes() {
        let a = blake2b_256(b"amunchain");
        let b = blake2b_256(b"amunchain");
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
        assert_ne!(a, blake2b_256(b"other"));
    }
}
