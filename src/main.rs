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

//! Node entrypoint: load config, open persisted state, start the node
//! supervisor and the metrics endpoint.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use mwc_validation_node::core::consensus::params::{ConsensusParams, Network};
use mwc_validation_node::core::crypto::Secp256k1Provider;
use mwc_validation_node::core::state::StateStore;
use mwc_validation_node::core::types::NodeConfig;
use mwc_validation_node::monitoring::metrics::Metrics;
use mwc_validation_node::networking::node::{Node, NodeCallbacks, NodeConfig as NetworkConfig};

const STATE_SAVE_INTERVAL: Duration = Duration::from_secs(60);

struct LoggingCallbacks {
    metrics: Arc<Metrics>,
}

impl NodeCallbacks for LoggingCallbacks {
    fn on_start_syncing(&self, peer: SocketAddr) {
        info!(%peer, "sync started");
    }

    fn on_synced(&self, height: u64) {
        info!(height, "sync caught up with peer");
    }

    fn on_block(&self, height: u64) {
        info!(height, "accepted block");
        self.metrics.block_height.set(height as i64);
        self.metrics.blocks_accepted_total.inc();
    }

    fn on_error(&self, message: &str) {
        error!(message, "node error");
    }

    fn on_peer_event(&self, event: &mwc_validation_node::networking::peer::PeerEvent) {
        use mwc_validation_node::networking::peer::PeerEvent;
        match event {
            PeerEvent::BecameHealthy(..) => self.metrics.peers_connected.inc(),
            PeerEvent::Disconnected(..) => {
                let current = self.metrics.peers_connected.get();
                if current > 0 {
                    self.metrics.peers_connected.dec();
                }
            }
            PeerEvent::Banned(..) => self.metrics.peers_banned_total.inc(),
            _ => {}
        }
    }
}

fn network_params(name: &str) -> ConsensusParams {
    match name {
        "floonet" => ConsensusParams::for_network(Network::Floonet),
        _ => ConsensusParams::for_network(Network::Mainnet),
    }
}

fn parse_addr(s: &str, what: &str) -> SocketAddr {
    s.parse().unwrap_or_else(|_| panic!("invalid {what} address: {s}"))
}

#[tokio::main]
async fn main() {
    let _ = tracing_subscriber::fmt().with_target(false).with_level(true).compact().try_init();

    let config_path = std::env::args().nth(1).unwrap_or_else(|| "node.toml".to_string());
    let cfg: NodeConfig = match mwc_validation_node::config::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("failed to load config from {config_path}: {e}");
            std::process::exit(1);
        }
    };

    let params = network_params(&cfg.node.network);
    let genesis = params.genesis_header();

    let store = match StateStore::open(&cfg.node.data_dir) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("failed to open state store at {}: {e}", cfg.node.data_dir);
            std::process::exit(1);
        }
    };

    let metrics = Arc::new(Metrics::new().expect("metrics init failed"));

    let protocol_version = 1;
    let network_config = NetworkConfig {
        magic: params.magic,
        genesis_hash: genesis.block_hash(),
        protocol_version,
        user_agent: format!("{}/0.1", cfg.node.name),
        base_fee: cfg.p2p.base_fee,
        listen_addr: Some(parse_addr(&cfg.p2p.listen_addr, "p2p listen")),
        external_addr: cfg.p2p.external_addr.as_deref().map(|a| parse_addr(a, "p2p external")),
        dns_seeds: params.dns_seeds.iter().map(|s| s.to_string()).collect(),
    };

    let crypto = Arc::new(Secp256k1Provider::full());
    let callbacks = Arc::new(LoggingCallbacks { metrics: metrics.clone() });

    let node = Node::new(network_config, params, crypto, callbacks, genesis.clone());

    match store.load(protocol_version, genesis) {
        Ok(state) => {
            let height = state.tip_height();
            node.install_state(state).await;
            info!(height, "restored persisted chain state");
        }
        Err(e) => {
            warn!(err = %e, "no usable persisted state, starting from genesis");
        }
    }

    let configured_peers: Vec<SocketAddr> = cfg
        .p2p
        .seed_peers
        .iter()
        .filter_map(|s| s.parse::<SocketAddr>().ok())
        .collect();
    node.seed_candidates(configured_peers).await;

    let metrics_addr = parse_addr(&cfg.http.listen_addr, "http listen");
    let metrics_task = tokio::spawn({
        let metrics = metrics.clone();
        async move {
            if let Err(e) = mwc_validation_node::monitoring::metrics::serve(metrics_addr, metrics).await {
                error!(%e, "metrics server exited");
            }
        }
    });

    let snapshot_task = tokio::spawn({
        let node = node.clone();
        let store_path = cfg.node.data_dir.clone();
        async move {
            let store = StateStore::open(&store_path).expect("state dir available for periodic snapshot");
            loop {
                tokio::time::sleep(STATE_SAVE_INTERVAL).await;
                if let Err(e) = node.persist_state(&store).await {
                    warn!(err = %e, "periodic state snapshot failed");
                }
            }
        }
    });

    info!(network = %cfg.node.network, data_dir = %cfg.node.data_dir, "node starting");
    node.clone().run().await;

    metrics_task.abort();
    snapshot_task.abort();

    if let Err(e) = node.persist_state(&store).await {
        error!(err = %e, "final state snapshot failed");
    }
}
