// SPDX-License-Identifier: Apache-2.0
// Copyright OpenVirteX Authors

pub(crate) use clap::Parser;
use std::path::PathBuf;

use ovxd::{Config, ConfigError};

#[derive(Parser)]
#[command(name = "ovxd")]
#[command(version)]
#[command(about = "OpenFlow network hypervisor", long_about = None)]
pub(crate) struct CmdArgs {
    /// YAML configuration file.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Listen address, overrides the config file.
    #[arg(long, value_name = "ADDR")]
    host: Option<String>,

    /// OpenFlow listen port, overrides the config file.
    #[arg(long, value_name = "PORT")]
    openflow_port: Option<u16>,

    /// Admin API port, overrides the config file.
    #[arg(long, value_name = "PORT")]
    api_port: Option<u16>,
}

impl CmdArgs {
    /// The effective configuration: file (or defaults) plus overrides.
    pub fn load_config(&self) -> Result<Config, ConfigError> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.openflow_port {
            config.openflow_port = port;
        }
        if let Some(port) = self.api_port {
            config.api_port = port;
        }
        Ok(config)
    }
}
