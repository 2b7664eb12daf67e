// SPDX-License-Identifier: Apache-2.0
// Copyright OpenVirteX Authors

//! Startup configuration, read once from a YAML file and not touched by
//! the core afterwards.

use std::net::SocketAddr;
use std::path::Path;

use api::Credential;
use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_OPENFLOW_PORT: u16 = 6633;
pub const DEFAULT_API_PORT: u16 = 8080;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("i/o error during startup: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot parse config file: {0}")]
    Parse(#[from] serde_yaml_ng::Error),

    #[error("invalid listen address {addr}: {reason}")]
    BadAddress { addr: String, reason: String },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_openflow_port")]
    pub openflow_port: u16,
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    /// Admin API credentials; an empty list locks the API down entirely.
    #[serde(default)]
    pub auth: Vec<Credential>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: default_host(),
            openflow_port: default_openflow_port(),
            api_port: default_api_port(),
            auth: Vec::new(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Ok(serde_yaml_ng::from_str(&std::fs::read_to_string(path)?)?)
    }

    /// The socket the admin API listens on.
    pub fn api_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr = format!("{}:{}", self.host, self.api_port);
        addr.parse().map_err(|e: std::net::AddrParseError| {
            ConfigError::BadAddress {
                addr,
                reason: e.to_string(),
            }
        })
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_openflow_port() -> u16 {
    DEFAULT_OPENFLOW_PORT
}

const fn default_api_port() -> u16 {
    DEFAULT_API_PORT
}

#[cfg(test)]
mod tests {
    use super::*;
    use api::Role;
    use pretty_assertions::assert_eq;

    #[test]
    fn full_config_parses() {
        let yaml = concat!(
            "host: 127.0.0.1\n",
            "openflow_port: 6653\n",
            "api_port: 8443\n",
            "auth:\n",
            "- username: tenant1\n",
            "  password: secret\n",
            "  role: user\n",
        );
        let cfg: Config = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(cfg.host, "127.0.0.1");
        assert_eq!(cfg.openflow_port, 6653);
        assert_eq!(cfg.api_port, 8443);
        assert_eq!(cfg.auth.len(), 1);
        assert_eq!(cfg.auth[0].role, Role::User);
        assert_eq!(cfg.api_addr().unwrap().port(), 8443);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let cfg: Config = serde_yaml_ng::from_str("host: 10.0.0.1\n").unwrap();
        assert_eq!(cfg.openflow_port, DEFAULT_OPENFLOW_PORT);
        assert_eq!(cfg.api_port, DEFAULT_API_PORT);
        assert!(cfg.auth.is_empty());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(serde_yaml_ng::from_str::<Config>("hosst: 1.2.3.4\n").is_err());
    }
}
