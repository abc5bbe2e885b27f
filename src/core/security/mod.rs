#![forbid(unsafe_code)]
#![allow(missing_docs)]

//! Node identity keypair management.

pub mod keystore;
