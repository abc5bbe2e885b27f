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
#![warn(missing_docs)]

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{routing::get, Router};
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};
use thiserror::Error;
use tracing::info;

/// Metrics errors.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// A prometheus registration or encoding call failed.
    #[error("prometheus")]
    Prom,
    /// The metrics HTTP listener failed to bind.
    #[error("bind metrics listener")]
    Bind,
}

/// Metrics container.
#[derive(Clone)]
pub struct Metrics {
    /// Registry.
    pub registry: Registry,

    /// Currently connected (healthy) peers.
    pub peers_connected: IntGauge,
    /// Current synced block height.
    pub block_height: IntGauge,
    /// Transactions accepted into the mempool.
    pub transactions_total: IntCounter,
    /// Blocks accepted onto the chain.
    pub blocks_accepted_total: IntCounter,
    /// Peers banned for protocol violations.
    pub peers_banned_total: IntCounter,
    /// Messages rejected by the wire decoder.
    pub invalid_messages_total: IntCounter,
    /// Sync phase transitions (Headers -> TxHashSet -> Blocks).
    pub sync_restarts_total: IntCounter,
}

impl Metrics {
    /// Create and register metrics.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let peers_connected = IntGauge::new("mwc_node_peers_connected", "Currently connected peers")
            .map_err(|_| MetricsError::Prom)?;
        let block_height = IntGauge::new("mwc_node_block_height", "Current synced block height")
            .map_err(|_| MetricsError::Prom)?;
        let transactions_total = IntCounter::new("mwc_node_transactions_total", "Transactions accepted into the mempool")
            .map_err(|_| MetricsError::Prom)?;
        let blocks_accepted_total = IntCounter::new("mwc_node_blocks_accepted_total", "Blocks accepted onto the chain")
            .map_err(|_| MetricsError::Prom)?;
        let peers_banned_total = IntCounter::new("mwc_node_peers_banned_total", "Peers banned for protocol violations")
            .map_err(|_| MetricsError::Prom)?;
        let invalid_messages_total = IntCounter::new("mwc_node_invalid_messages_total", "Messages rejected by the wire decoder")
            .map_err(|_| MetricsError::Prom)?;
        let sync_restarts_total = IntCounter::new("mwc_node_sync_restarts_total", "Sync phase restarts")
            .map_err(|_| MetricsError::Prom)?;

        registry.register(Box::new(peers_connected.clone())).map_err(|_| MetricsError::Prom)?;
        registry.register(Box::new(block_height.clone())).map_err(|_| MetricsError::Prom)?;
        registry.register(Box::new(transactions_total.clone())).map_err(|_| MetricsError::Prom)?;
        registry.register(Box::new(blocks_accepted_total.clone())).map_err(|_| MetricsError::Prom)?;
        registry.register(Box::new(peers_banned_total.clone())).map_err(|_| MetricsError::Prom)?;
        registry.register(Box::new(invalid_messages_total.clone())).map_err(|_| MetricsError::Prom)?;
        registry.register(Box::new(sync_restarts_total.clone())).map_err(|_| MetricsError::Prom)?;

        Ok(Self {
            registry,
            peers_connected,
            block_height,
            transactions_total,
            blocks_accepted_total,
            peers_banned_total,
            invalid_messages_total,
            sync_restarts_total,
        })
    }

    /// Render the registry in Prometheus text exposition format.
    pub fn encode(&self) -> Result<Vec<u8>, MetricsError> {
        let families = self.registry.gather();
        let mut buf = Vec::new();
        TextEncoder::new().encode(&families, &mut buf).map_err(|_| MetricsError::Prom)?;
        Ok(buf)
    }
}

async fn serve_metrics(metrics: axum::extract::State<Arc<Metrics>>) -> Result<String, axum::http::StatusCode> {
    metrics
        .0
        .encode()
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .ok_or(axum::http::StatusCode::INTERNAL_SERVER_ERROR)
}

/// Bind `listen_addr` and serve `/metrics` until the process exits.
pub async fn serve(listen_addr: SocketAddr, metrics: Arc<Metrics>) -> Result<(), MetricsError> {
    let app = Router::new().route("/metrics", get(serve_metrics)).with_state(metrics);
    let listener = tokio::net::TcpListener::bind(listen_addr).await.map_err(|_| MetricsError::Bind)?;
    info!(%listen_addr, "metrics endpoint listening");
    axum::serve(listener, app).await.map_err(|_| MetricsError::Bind)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_produces_nonempty_prometheus_text() {
        let metrics = Metrics::new().unwrap();
        metrics.block_height.set(42);
        let rendered = String::from_utf8(metrics.encode().unwrap()).unwrap();
        assert!(rendered.contains("mwc_node_block_height"));
        assert!(rendered.contains("42"));
    }
}
