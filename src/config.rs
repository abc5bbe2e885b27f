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

//! Loads [`NodeConfig`](crate::core::types::NodeConfig) from a TOML file,
//! with a handful of environment overrides for container deployments.

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::core::types::NodeConfig;

/// Config loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("read config file")]
    Read,
    /// The file's contents aren't valid TOML for [`NodeConfig`].
    #[error("parse config file")]
    Parse,
}

/// Environment variables that override the corresponding TOML field when set.
const ENV_DATA_DIR: &str = "AMUN_DATA_DIR";
const ENV_P2P_LISTEN_ADDR: &str = "AMUN_P2P_LISTEN_ADDR";
const ENV_HTTP_LISTEN_ADDR: &str = "AMUN_HTTP_LISTEN_ADDR";

/// Load [`NodeConfig`] from `path`, applying environment overrides on top.
pub fn load(path: impl AsRef<Path>) -> Result<NodeConfig, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|_| ConfigError::Read)?;
    let mut cfg: NodeConfig = toml::from_str(&raw).map_err(|_| ConfigError::Parse)?;
    apply_env_overrides(&mut cfg);
    Ok(cfg)
}

fn apply_env_overrides(cfg: &mut NodeConfig) {
    if let Ok(v) = std::env::var(ENV_DATA_DIR) {
        if !v.trim().is_empty() {
            cfg.node.data_dir = v;
        }
    }
    if let Ok(v) = std::env::var(ENV_P2P_LISTEN_ADDR) {
        if !v.trim().is_empty() {
            cfg.p2p.listen_addr = v;
        }
    }
    if let Ok(v) = std::env::var(ENV_HTTP_LISTEN_ADDR) {
        if !v.trim().is_empty() {
            cfg.http.listen_addr = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_minimal_config_and_applies_defaults() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            f,
            r#"
            [node]
            name = "test-node"
            data_dir = "./data"

            [http]
            listen_addr = "127.0.0.1:9090"

            [p2p]
            listen_addr = "0.0.0.0:3414"

            [consensus]
            "#
        )
        .unwrap();

        let cfg = load(f.path()).unwrap();
        assert_eq!(cfg.node.network, "mainnet");
        assert_eq!(cfg.p2p.max_peers, crate::networking::node::DESIRED_PEERS);
    }

    #[test]
    fn env_override_replaces_data_dir() {
        let mut cfg = NodeConfig {
            node: crate::core::types::NodeSettings {
                name: "test-node".into(),
                data_dir: "./data".into(),
                network: "mainnet".into(),
            },
            http: crate::core::types::HttpConfig {
                listen_addr: "127.0.0.1:9090".into(),
            },
            p2p: crate::core::types::P2pConfig {
                listen_addr: "0.0.0.0:3414".into(),
                external_addr: None,
                seed_peers: vec![],
                max_peers: 8,
                base_fee: 0,
            },
            consensus: crate::core::types::ConsensusConfig::default(),
        };

        std::env::set_var(ENV_DATA_DIR, "/tmp/override-data-dir-unique-marker");
        apply_env_overrides(&mut cfg);
        std::env::remove_var(ENV_DATA_DIR);
        assert_eq!(cfg.node.data_dir, "/tmp/override-data-dir-unique-marker");
    }
}
