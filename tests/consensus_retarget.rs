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

use mwc_validation_node::core::consensus::params::ConsensusParams;
use mwc_validation_node::core::consensus::retarget::{retarget, synthetic_pre_genesis_window};

#[test]
fn a_flat_synthetic_window_retargets_to_the_same_difficulty() {
    let params = ConsensusParams::mainnet();
    let window = synthetic_pre_genesis_window(&params, 1_000_000, params.difficulty_adjustment_window);

    let result = retarget(&params, &window);

    assert_eq!(result.target_difficulty, params.minimum_difficulty);
    assert_eq!(result.secondary_scaling, params.minimum_secondary_scaling);
}

#[test]
fn blocks_arriving_faster_than_target_raise_difficulty_above_the_floor() {
    let params = ConsensusParams::mainnet();
    let mut window = synthetic_pre_genesis_window(&params, 1_000_000, params.difficulty_adjustment_window);
    // Compress the window so it spans a tenth of the target duration,
    // simulating blocks arriving far faster than `block_time`.
    let n = window.len() as i64;
    for (i, entry) in window.iter_mut().enumerate() {
        entry.timestamp = 1_000_000 - (n - i as i64) * (params.block_time as i64 / 10);
    }

    let result = retarget(&params, &window);

    assert!(result.target_difficulty > params.minimum_difficulty);
}

#[test]
fn floonet_and_mainnet_have_distinct_network_magic() {
    let mainnet = ConsensusParams::mainnet();
    let floonet = ConsensusParams::floonet();
    assert_ne!(mainnet.magic, floonet.magic);
}
