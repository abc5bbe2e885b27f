#![forbid(unsafe_code)]
#![allow(missing_docs)]

//! Consensus rules: fixed network parameters, difficulty retargeting,
//! header-version schedule, and Cuckoo Cycle proof-of-work verification.

pub mod params;
pub mod pow;
pub mod retarget;

pub use params::*;
