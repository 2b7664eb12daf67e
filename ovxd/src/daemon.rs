// SPDX-License-Identifier: Apache-2.0
// Copyright OpenVirteX Authors

//! The composition root.
//!
//! `Daemon` owns the shared state and exposes the seams the OpenFlow
//! connection layer drives: a datapath connects, hands over messages, and
//! disconnects; tenant controllers do the same against their virtual
//! switches. Everything behind those seams is plain threaded code.

use std::sync::Arc;

use api::{ApiServer, ApiState, AuthStore, ChannelFactory};
use discovery::Discovery;
use elements::{
    ControlChannel, LoggingChannel, OvxMap, OvxSwitch, PhysicalNetwork, PhysicalSwitch,
};
use net::openflow::OfMessage;
use tracing::info;
use virt::VirtContext;

use crate::config::{Config, ConfigError};

/// Until the controller transport is dialed, tenant networks get a
/// channel that logs and discards.
struct LoggingChannelFactory;

impl ChannelFactory for LoggingChannelFactory {
    fn controller_channel(
        &self,
        protocol: &str,
        host: &str,
        port: u16,
    ) -> Arc<dyn ControlChannel> {
        Arc::new(LoggingChannel::new(&format!("{protocol}://{host}:{port}")))
    }
}

pub struct Daemon {
    pub map: Arc<OvxMap>,
    pub physical: Arc<PhysicalNetwork>,
    pub discovery: Arc<Discovery>,
    ctx: VirtContext,
    _api: ApiServer,
}

impl Daemon {
    /// Bring up the shared state and the admin API listener.
    pub fn start(config: &Config) -> Result<Daemon, ConfigError> {
        let map = Arc::new(OvxMap::new());
        let physical = Arc::new(PhysicalNetwork::new());
        let discovery = Arc::new(Discovery::new(Arc::clone(&physical)));
        let ctx = VirtContext::new(Arc::clone(&map), Arc::clone(&physical));

        let api = ApiServer::start(
            config.api_addr()?,
            ApiState {
                map: Arc::clone(&map),
                physical: Arc::clone(&physical),
                channels: Arc::new(LoggingChannelFactory),
            },
            AuthStore::new(config.auth.clone()),
        )?;
        info!(
            openflow_port = config.openflow_port,
            api_port = config.api_port,
            "hypervisor up"
        );
        Ok(Daemon {
            map,
            physical,
            discovery,
            ctx,
            _api: api,
        })
    }

    /// A datapath connection completed its handshake.
    pub fn datapath_connected(&self, dpid: u64, channel: Arc<dyn ControlChannel>) {
        self.physical
            .add_switch(Arc::new(PhysicalSwitch::new(dpid, channel)));
    }

    /// A datapath connection dropped. Its discovery runner stops and its
    /// links disappear from the topology.
    pub fn datapath_disconnected(&self, dpid: u64) {
        self.discovery.detach_switch(dpid);
        self.physical.remove_switch(dpid);
    }

    /// A message arrived from a connected datapath.
    pub fn datapath_message(&self, dpid: u64, msg: OfMessage) {
        virt::handle_physical(&self.ctx, &self.discovery, dpid, msg);
    }

    /// A tenant controller sent a message to one of its virtual switches.
    pub fn controller_message(&self, sw: &Arc<OvxSwitch>, msg: OfMessage) {
        virt::handle_virtual(&self.ctx, sw, msg);
    }

    /// Stop discovery on every datapath. Called once on shutdown.
    pub fn shutdown(&self) {
        for dpid in self.discovery.dpids() {
            self.discovery.detach_switch(dpid);
        }
        info!("hypervisor stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use elements::RecordingChannel;
    use net::eth::Mac;
    use net::openflow::{FeaturesReply, PortDesc};
    use pretty_assertions::assert_eq;

    #[test]
    fn datapath_lifecycle_drives_discovery() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            api_port: 0,
            ..Config::default()
        };
        let daemon = Daemon::start(&config).unwrap();

        let channel = Arc::new(RecordingChannel::new("dp"));
        daemon.datapath_connected(0x1, channel);
        daemon.datapath_message(
            0x1,
            OfMessage::FeaturesReply(FeaturesReply {
                dpid: 0x1,
                n_buffers: 256,
                n_tables: 1,
                capabilities: 0,
                actions: 0,
                ports: vec![PortDesc {
                    port_no: 1,
                    hw_addr: Mac([0, 0, 0, 0, 1, 1]),
                    name: "eth1".to_string(),
                    config: 0,
                    state: 0,
                    current: 0,
                    advertised: 0,
                    supported: 0,
                    peer: 0,
                }],
            }),
        );
        assert_eq!(daemon.discovery.dpids(), vec![0x1]);

        daemon.datapath_disconnected(0x1);
        assert_eq!(daemon.discovery.dpids(), Vec::<u64>::new());
        daemon.shutdown();
    }

    #[test]
    fn occupied_api_port_fails_startup() {
        let holder = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let config = Config {
            host: "127.0.0.1".to_string(),
            api_port: holder.local_addr().unwrap().port(),
            ..Config::default()
        };
        assert!(Daemon::start(&config).is_err());
    }
}
