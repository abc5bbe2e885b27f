// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Merkle Mountain Range: the append-only, prunable, rewindable
//! accumulator backing headers, outputs, rangeproofs, and kernels.

pub mod algebra;
mod archive;
pub mod leaf;
mod tree;

pub use algebra::*;
pub use leaf::{AdditionReason, MmrLeaf, SubtractionReason};
pub use tree::{Mmr, MmrError};
