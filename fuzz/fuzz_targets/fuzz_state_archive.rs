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

#![no_main]
#![forbid(unsafe_code)]

use arbitrary::Arbitrary;
use croaring::Bitmap;
use libfuzzer_sys::fuzz_target;
use mwc_validation_node::core::chain::header::HeaderLeaf;
use mwc_validation_node::core::mmr::Mmr;

#[derive(Clone, Debug, Arbitrary)]
struct Input {
    total_size: u64,
    leaf_stream: Vec<u8>,
    hash_stream: Vec<u8>,
    pruned_positions: Vec<u32>,
}

fuzz_target!(|input: Input| {
    let mut pruned = Bitmap::new();
    for p in &input.pruned_positions {
        pruned.add(*p);
    }

    // A malformed tx-hash-set archive must be rejected, never panic.
    let _ = Mmr::<HeaderLeaf>::build_from_archive(
        1,
        input.total_size,
        &input.leaf_stream,
        &input.hash_stream,
        &pruned,
    );
});
