#![forbid(unsafe_code)]
#![allow(missing_docs)]

//! Observability: Prometheus metrics for chain height, mempool, sync state
//! and peer counts.

pub mod metrics;
