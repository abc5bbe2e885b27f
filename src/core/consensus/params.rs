// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Fixed consensus parameters, per network profile.

/// Which network this node is validating against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Network {
    /// The production network.
    Mainnet,
    /// The public test network.
    Floonet,
}

/// A header implying more than this many `BLOCK_TIME`-sized blocks in the
/// future (relative to the local clock) is rejected before any other check.
pub const FUTURE_NUMBER_OF_BLOCKS_THRESHOLD: u64 = 12;

/// Cuckoo Cycle cycle length (number of edges in a valid proof).
pub const PROOF_SIZE: usize = 42;

/// Smallest supported Cuckoo Cycle graph size.
pub const C29_EDGE_BITS: u8 = 29;
/// First graph size eligible for the "C31+" verification path.
pub const C31_EDGE_BITS: u8 = 31;
/// Largest edge_bits this node will ever accept.
pub const MAXIMUM_EDGE_BITS: u8 = 32;

/// Fixed parameters for one network profile.
#[derive(Clone, Copy, Debug)]
pub struct ConsensusParams {
    /// Target seconds between blocks.
    pub block_time: u64,
    /// Window size (in blocks) for difficulty/secondary-scaling retargeting.
    pub difficulty_adjustment_window: u64,
    /// Height delta before a coinbase output becomes spendable.
    pub coinbase_maturity: u64,
    /// Height delta behind the tip beyond which full blocks, rather than
    /// just headers, must be fetched during sync.
    pub cut_through_horizon: u64,
    /// Height delta behind the tip beyond which a tx-hash-set snapshot is
    /// requested instead of replaying every block.
    pub state_sync_height_threshold: u64,
    /// Maximum total block weight (§4.4).
    pub maximum_block_weight: u64,
    /// Weight charged for the coinbase output + kernel pair.
    pub coinbase_weight: u64,
    /// Floor on retargeted difficulty.
    pub minimum_difficulty: u64,
    /// Floor on retargeted secondary scaling.
    pub minimum_secondary_scaling: u32,
    /// Damping factor for the C29-ratio adjustment.
    pub c29_headers_adjustment_damp_factor: u64,
    /// Clamp factor for the C29-ratio adjustment.
    pub c29_headers_adjustment_clamp_factor: u64,
    /// Damping factor for the window-duration adjustment.
    pub window_duration_adjustment_damp_factor: u64,
    /// Clamp factor for the window-duration adjustment.
    pub window_duration_adjustment_clamp_factor: u64,
    /// Default fee rate (in base units per weight unit) a node will relay
    /// and mine without explicit operator override.
    pub default_base_fee: u64,
    /// Network magic bytes used in the wire frame header.
    pub magic: [u8; 2],
    /// Fixed DNS seed hostnames.
    pub dns_seeds: &'static [&'static str],
}

/// Weight of a block body with the given element counts.
pub fn block_weight(num_inputs: u64, num_outputs: u64, num_kernels: u64) -> u64 {
    const INPUT_WEIGHT: u64 = 1;
    const OUTPUT_WEIGHT: u64 = 21;
    const KERNEL_WEIGHT: u64 = 3;
    num_inputs
        .saturating_mul(INPUT_WEIGHT)
        .saturating_add(num_outputs.saturating_mul(OUTPUT_WEIGHT))
        .saturating_add(num_kernels.saturating_mul(KERNEL_WEIGHT))
}

/// Height at which a given network profile requires a given header version.
/// Versions increase monotonically with height; version 4 introduces
/// `NoRecentDuplicate` kernel support (§4.7).
pub fn header_version(_params: &ConsensusParams, height: u64) -> u16 {
    // Mainnet and floonet share one hard-fork schedule, expressed as
    // ascending (activation height, version) pairs.
    const SCHEDULE: &[(u64, u16)] = &[(0, 1), (180_000, 2), (360_000, 3), (540_000, 4)];
    SCHEDULE
        .iter()
        .rev()
        .find(|&&(h, _)| height >= h)
        .map(|&(_, v)| v)
        .unwrap_or(1)
}

/// Height at which kernel version 4 (NoRecentDuplicate) becomes valid.
pub fn nrd_enabled_at(params: &ConsensusParams, height: u64) -> bool {
    header_version(params, height) >= 4
}

/// First leaf index (into the outputs MMR) that remains spendable when
/// `tip_height` coinbase outputs must already have matured.
pub fn unspendable_start(_params: &ConsensusParams, _tip_height: u64) -> u64 {
    // Computed by the caller from the coinbase-tagged leaf closest to
    // `tip_height - coinbase_maturity`; left as a hook so chain-state code
    // (which knows the actual output index mapping) supplies it.
    0
}

impl ConsensusParams {
    /// Parameters for [`Network::Mainnet`].
    pub const fn mainnet() -> Self {
        Self {
            block_time: 60,
            difficulty_adjustment_window: 60,
            coinbase_maturity: 1_440,
            cut_through_horizon: 90,
            state_sync_height_threshold: 90,
            maximum_block_weight: 40_000,
            coinbase_weight: 22,
            minimum_difficulty: 1,
            minimum_secondary_scaling: 1,
            c29_headers_adjustment_damp_factor: 3,
            c29_headers_adjustment_clamp_factor: 2,
            window_duration_adjustment_damp_factor: 3,
            window_duration_adjustment_clamp_factor: 2,
            default_base_fee: 1_000,
            magic: [0x1a, 0x36],
            dns_seeds: &[
                "mainnet-seed.mwc.mw",
                "mwcseed1.mwc.mw",
                "mwcseed2.mwc.mw",
            ],
        }
    }

    /// Parameters for [`Network::Floonet`].
    pub const fn floonet() -> Self {
        Self {
            block_time: 60,
            difficulty_adjustment_window: 60,
            coinbase_maturity: 1_440,
            cut_through_horizon: 90,
            state_sync_height_threshold: 90,
            maximum_block_weight: 40_000,
            coinbase_weight: 22,
            minimum_difficulty: 1,
            minimum_secondary_scaling: 1,
            c29_headers_adjustment_damp_factor: 3,
            c29_headers_adjustment_clamp_factor: 2,
            window_duration_adjustment_damp_factor: 3,
            window_duration_adjustment_clamp_factor: 2,
            default_base_fee: 1_000,
            magic: [0x3b, 0x75],
            dns_seeds: &["floonet-seed.mwc.mw"],
        }
    }

    /// Look up the parameter set for a given network.
    pub const fn for_network(network: Network) -> Self {
        match network {
            Network::Mainnet => Self::mainnet(),
            Network::Floonet => Self::floonet(),
        }
    }

    /// The fixed, hardcoded genesis header for this network: height 0,
    /// empty body MMRs, `minimum_difficulty` total difficulty.
    pub fn genesis_header(&self) -> crate::core::chain::header::Header {
        use crate::core::chain::kernel::Kernel;
        use crate::core::chain::output::{Output, Rangeproof};
        use crate::core::mmr::Mmr;

        crate::core::chain::header::Header {
            version: 1,
            height: 0,
            timestamp: 0,
            previous_block_hash: [0u8; 32],
            previous_header_root: [0u8; 32],
            output_root: Mmr::<Output>::new(0).root().expect("empty mmr has a root"),
            rangeproof_root: Mmr::<Rangeproof>::new(0).root().expect("empty mmr has a root"),
            kernel_root: Mmr::<Kernel>::new(0).root().expect("empty mmr has a root"),
            total_kernel_offset: [0u8; 32],
            output_mmr_size: 0,
            kernel_mmr_size: 0,
            total_difficulty: self.minimum_difficulty,
            secondary_scaling: self.minimum_secondary_scaling,
            nonce: 0,
            edge_bits: C29_EDGE_BITS,
            proof_nonces: [0u64; PROOF_SIZE],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_weight_matches_formula() {
        assert_eq!(block_weight(2, 1, 1), 2 * 1 + 21 + 3);
    }

    #[test]
    fn genesis_header_is_height_zero_with_empty_mmrs() {
        let p = ConsensusParams::mainnet();
        let genesis = p.genesis_header();
        assert_eq!(genesis.height, 0);
        assert_eq!(genesis.output_mmr_size, 0);
        assert_eq!(genesis.total_difficulty, p.minimum_difficulty);
    }

    #[test]
    fn header_version_schedule_is_monotonic() {
        let p = ConsensusParams::mainnet();
        assert_eq!(header_version(&p, 0), 1);
        assert_eq!(header_version(&p, 179_999), 1);
        assert_eq!(header_version(&p, 180_000), 2);
        assert_eq!(header_version(&p, 540_000), 4);
        assert!(nrd_enabled_at(&p, 540_000));
        assert!(!nrd_enabled_at(&p, 539_999));
    }
}
