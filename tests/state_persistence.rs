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

use mwc_validation_node::core::chain::state::ChainState;
use mwc_validation_node::core::consensus::params::ConsensusParams;
use mwc_validation_node::core::state::StateStore;

fn tmp_dir(name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("mwc-node-test-{name}-{}", std::process::id()))
}

#[test]
fn fresh_store_loads_genesis_state() {
    let dir = tmp_dir("fresh");
    let _ = std::fs::remove_dir_all(&dir);
    let store = StateStore::open(&dir).unwrap();

    let params = ConsensusParams::mainnet();
    let genesis = params.genesis_header();
    let state = store.load(1, genesis.clone()).unwrap();

    assert_eq!(state.tip_height(), 0);
    assert_eq!(state.tip_header(), Some(&genesis));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn saved_state_survives_a_reopen() {
    let dir = tmp_dir("roundtrip");
    let _ = std::fs::remove_dir_all(&dir);

    let params = ConsensusParams::mainnet();
    let genesis = params.genesis_header();

    {
        let store = StateStore::open(&dir).unwrap();
        let state = ChainState::new(1, genesis.clone());
        store.save(&state).unwrap();
    }

    {
        let store = StateStore::open(&dir).unwrap();
        let restored = store.load(1, genesis.clone()).unwrap();
        assert_eq!(restored.tip_height(), 0);
        assert_eq!(restored.tip_header(), Some(&genesis));
        assert_eq!(restored.headers().number_of_leaves(), 1);
        assert_eq!(restored.outputs().number_of_leaves(), 0);
        assert_eq!(restored.kernels().number_of_leaves(), 0);
    }

    let _ = std::fs::remove_dir_all(&dir);
}
