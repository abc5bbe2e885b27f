// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Cuckoo Cycle proof-of-work verification, ported edge-for-edge from the
//! reference node's `ProofOfWork` (SipHash-2-4 block/node derivation plus
//! the C29 and C31+ cycle-closure checks).

use super::params::{C29_EDGE_BITS, C31_EDGE_BITS, PROOF_SIZE};
use crate::core::crypto::blake2b_256;

const SIPHASH_BLOCK_BITS: u32 = 6;
const SIPHASH_BLOCK_LENGTH: usize = 1 << SIPHASH_BLOCK_BITS;
const SIPHASH_BLOCK_MASK: u64 = (SIPHASH_BLOCK_LENGTH - 1) as u64;
const SIPHASH_DEFAULT_ROTATION: u32 = 21;
const C29_SIPHASH_ROTATION: u32 = 25;

/// Incremental SipHash-2-4 state. Unlike a typical one-shot hash, a single
/// state is reused across many `hash24` calls within a `sipblock`, so the
/// mixing accumulates across the block the way the reference
/// implementation's `SipHash24` object does.
struct SipState {
    v: [u64; 4],
}

impl SipState {
    fn new(keys: [u64; 4]) -> Self {
        Self { v: keys }
    }

    fn round(&mut self, rotation: u32) {
        let v = &mut self.v;
        v[0] = v[0].wrapping_add(v[1]);
        v[2] = v[2].wrapping_add(v[3]);
        v[1] = v[1].rotate_left(13);
        v[3] = v[3].rotate_left(16);
        v[1] ^= v[0];
        v[3] ^= v[2];
        v[0] = v[0].rotate_left(32);
        v[2] = v[2].wrapping_add(v[1]);
        v[0] = v[0].wrapping_add(v[3]);
        v[1] = v[1].rotate_left(17);
        v[3] = v[3].rotate_left(rotation);
        v[1] ^= v[2];
        v[3] ^= v[0];
        v[2] = v[2].rotate_left(32);
    }

    fn hash24(&mut self, nonce: u64, rotation: u32) {
        self.v[3] ^= nonce;
        self.round(rotation);
        self.round(rotation);
        self.v[0] ^= nonce;
        self.v[2] ^= 0xff;
        self.round(rotation);
        self.round(rotation);
        self.round(rotation);
        self.round(rotation);
    }

    fn digest(&self) -> u64 {
        self.v[0] ^ self.v[1] ^ self.v[2] ^ self.v[3]
    }
}

/// Cuckoo Cycle edge derivation for C29: a 64-wide block of hashes sharing
/// the same upper bits as `nonce`, combined with the block's last hash.
fn sipblock(keys: [u64; 4], nonce: u64, rotation: u32) -> u64 {
    let starting = nonce & !SIPHASH_BLOCK_MASK;
    let mut state = SipState::new(keys);
    let mut hashes = [0u64; SIPHASH_BLOCK_LENGTH];
    for (i, slot) in hashes.iter_mut().enumerate() {
        state.hash24(starting + i as u64, rotation);
        *slot = state.digest();
    }
    let index = (nonce & SIPHASH_BLOCK_MASK) as usize;
    let last = hashes[SIPHASH_BLOCK_MASK as usize];
    if index == SIPHASH_BLOCK_MASK as usize {
        last
    } else {
        hashes[index] ^ last
    }
}

/// Cuckoo Cycle node derivation for C31+: one SipHash-2-4 digest per endpoint.
fn sipnode(keys: [u64; 4], edge: u64, uorv: u64) -> u64 {
    let mut state = SipState::new(keys);
    state.hash24(2 * edge + uorv, SIPHASH_DEFAULT_ROTATION);
    state.digest()
}

/// Canonical PoW preimage fields, in header field order (§4.5). Bundled so
/// callers don't need to depend on `core::chain::header` from this module.
pub struct PowPreimage {
    /// Header version.
    pub version: u16,
    /// Block height.
    pub height: u64,
    /// Timestamp, seconds since epoch.
    pub timestamp: i64,
    /// The five 32-byte header roots/hashes, in header order.
    pub hashes: [[u8; 32]; 5],
    /// Total kernel offset scalar.
    pub total_kernel_offset: [u8; 32],
    /// Output MMR node count.
    pub output_mmr_size: u64,
    /// Kernel MMR node count.
    pub kernel_mmr_size: u64,
    /// Cumulative total difficulty.
    pub total_difficulty: u64,
    /// Secondary scaling value.
    pub secondary_scaling: u32,
    /// The header's PoW nonce.
    pub nonce: u64,
}

/// Derive the 4 little-endian SipHash keys from `blake2b256(preimage)`.
pub fn derive_siphash_keys(preimage: &PowPreimage) -> [u64; 4] {
    let mut buf = Vec::with_capacity(2 + 8 + 8 + 5 * 32 + 32 + 8 + 8 + 8 + 4 + 8);
    buf.extend_from_slice(&preimage.version.to_be_bytes());
    buf.extend_from_slice(&preimage.height.to_be_bytes());
    buf.extend_from_slice(&preimage.timestamp.to_be_bytes());
    for h in &preimage.hashes {
        buf.extend_from_slice(h);
    }
    buf.extend_from_slice(&preimage.total_kernel_offset);
    buf.extend_from_slice(&preimage.output_mmr_size.to_be_bytes());
    buf.extend_from_slice(&preimage.kernel_mmr_size.to_be_bytes());
    buf.extend_from_slice(&preimage.total_difficulty.to_be_bytes());
    buf.extend_from_slice(&preimage.secondary_scaling.to_be_bytes());
    buf.extend_from_slice(&preimage.nonce.to_be_bytes());

    let hash = blake2b_256(&buf);
    let mut keys = [0u64; 4];
    for (i, key) in keys.iter_mut().enumerate() {
        let mut b = [0u8; 8];
        b.copy_from_slice(&hash[i * 8..(i + 1) * 8]);
        *key = u64::from_le_bytes(b);
    }
    keys
}

/// Verify a 42-edge Cuckoo Cycle proof against the derived SipHash keys.
pub fn verify_cuckoo_cycle(keys: [u64; 4], edge_bits: u8, nonces: &[u64; PROOF_SIZE]) -> bool {
    let edge_mask = (1u64 << edge_bits) - 1;

    if edge_bits == C29_EDGE_BITS {
        verify_c29(keys, edge_mask, nonces)
    } else if edge_bits >= C31_EDGE_BITS {
        verify_c31_plus(keys, edge_bits, edge_mask, nonces)
    } else {
        false
    }
}

fn verify_c29(keys: [u64; 4], edge_mask: u64, nonces: &[u64; PROOF_SIZE]) -> bool {
    let node_mask = (1u64 << (C29_EDGE_BITS - 1)) - 1;
    let mut uvs = [0u64; 2 * PROOF_SIZE];
    let mut ndir = [0usize; 2];
    let mut xor0 = 0u64;
    let mut xor1 = 0u64;

    for i in 0..PROOF_SIZE {
        let dir = (nonces[i] & 1) as usize;
        if ndir[dir] >= PROOF_SIZE / 2 {
            return false;
        }
        if nonces[i] > edge_mask {
            return false;
        }
        if i > 0 && nonces[i] <= nonces[i - 1] {
            return false;
        }

        let edge = sipblock(keys, nonces[i], C29_SIPHASH_ROTATION);
        let index = 4 * ndir[dir] + 2 * dir;
        uvs[index] = edge & node_mask;
        uvs[index + 1] = (edge >> 32) & node_mask;
        xor0 ^= uvs[index];
        xor1 ^= uvs[index + 1];
        ndir[dir] += 1;
    }

    if xor0 | xor1 != 0 {
        return false;
    }

    let mut length = 0u64;
    let mut i = 0usize;
    loop {
        let mut j = i;
        let mut k = (i % 4) ^ 2;
        while k < 2 * PROOF_SIZE {
            if uvs[k] == uvs[i] {
                if j != i {
                    return false;
                }
                j = k;
            }
            k += 4;
        }
        if j == i {
            return false;
        }
        i = j ^ 1;
        length += 1;
        if i == 0 {
            break;
        }
    }
    length == PROOF_SIZE as u64
}

fn verify_c31_plus(keys: [u64; 4], edge_bits: u8, edge_mask: u64, nonces: &[u64; PROOF_SIZE]) -> bool {
    let node_mask = (1u64 << edge_bits) - 1;
    let mut uvs = [0u64; 2 * PROOF_SIZE];
    let parity = ((PROOF_SIZE / 2) & 1) as u64;
    let mut xor0 = parity;
    let mut xor1 = parity;

    for i in 0..PROOF_SIZE {
        if nonces[i] > edge_mask {
            return false;
        }
        if i > 0 && nonces[i] <= nonces[i - 1] {
            return false;
        }
        uvs[2 * i] = sipnode(keys, nonces[i], 0) & node_mask;
        uvs[2 * i + 1] = sipnode(keys, nonces[i], 1) & node_mask;
        xor0 ^= uvs[2 * i];
        xor1 ^= uvs[2 * i + 1];
    }

    if xor0 | xor1 != 0 {
        return false;
    }

    let total = 2 * PROOF_SIZE;
    let mut length = 0u64;
    let mut i = 0usize;
    loop {
        let mut j = i;
        let mut k = (j + 2) % total;
        while k != i {
            if uvs[k] >> 1 == uvs[i] >> 1 {
                if j != i {
                    return false;
                }
                j = k;
            }
            k = (k + 2) % total;
        }
        if j == i || uvs[j] == uvs[i] {
            return false;
        }
        i = j ^ 1;
        length += 1;
        if i == 0 {
            break;
        }
    }
    length == PROOF_SIZE as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_ascending_nonces() {
        let keys = [1u64, 2, 3, 4];
        let mut nonces = [0u64; PROOF_SIZE];
        for (i, n) in nonces.iter_mut().enumerate() {
            *n = i as u64;
        }
        nonces[10] = nonces[9];
        assert!(!verify_cuckoo_cycle(keys, C29_EDGE_BITS, &nonces));
    }

    #[test]
    fn rejects_unsupported_edge_bits() {
        let keys = [1u64, 2, 3, 4];
        let mut nonces = [0u64; PROOF_SIZE];
        for (i, n) in nonces.iter_mut().enumerate() {
            *n = i as u64;
        }
        assert!(!verify_cuckoo_cycle(keys, 10, &nonces));
    }

    #[test]
    fn siphash_keys_are_deterministic() {
        let preimage = PowPreimage {
            version: 1,
            height: 10,
            timestamp: 100,
            hashes: [[0u8; 32]; 5],
            total_kernel_offset: [0u8; 32],
            output_mmr_size: 0,
            kernel_mmr_size: 0,
            total_difficulty: 1,
            secondary_scaling: 1,
            nonce: 42,
        };
        let a = derive_siphash_keys(&preimage);
        let b = derive_siphash_keys(&preimage);
        assert_eq!(a, b);
    }
}
