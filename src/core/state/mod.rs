#![forbid(unsafe_code)]
#![allow(missing_docs)]

//! Persisted node state: a flat-file `StateStore` holding the tip header
//! and the four MMRs backing it.

pub mod persistent_state;

pub use persistent_state::{StateError, StateStore};
