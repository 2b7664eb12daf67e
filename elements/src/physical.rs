// SPDX-License-Identifier: Apache-2.0
// Copyright OpenVirteX Authors

//! The discovered physical network: switches whose control channels are
//! connected, their ports, and the directional adjacencies probing found.

use std::sync::Arc;

use ahash::RandomState;
use dashmap::DashMap;
use tracing::{debug, info};

use crate::channel::{ChannelError, ControlChannel};
use crate::errors::MapError;
use crate::link::PhysicalLink;
use crate::port::{PhysicalPort, PortLocator};
use net::openflow::OfMessage;

/// A physical switch with a live control channel.
pub struct PhysicalSwitch {
    pub dpid: u64,
    ports: DashMap<u16, PhysicalPort, RandomState>,
    channel: Arc<dyn ControlChannel>,
}

impl PhysicalSwitch {
    #[must_use]
    pub fn new(dpid: u64, channel: Arc<dyn ControlChannel>) -> Self {
        PhysicalSwitch {
            dpid,
            ports: DashMap::with_hasher(RandomState::new()),
            channel,
        }
    }

    pub fn add_port(&self, port: PhysicalPort) {
        self.ports.insert(port.locator.port, port);
    }

    pub fn remove_port(&self, number: u16) -> Option<PhysicalPort> {
        self.ports.remove(&number).map(|(_, p)| p)
    }

    #[must_use]
    pub fn port(&self, number: u16) -> Option<PhysicalPort> {
        self.ports.get(&number).map(|p| p.clone())
    }

    #[must_use]
    pub fn port_numbers(&self) -> Vec<u16> {
        let mut nums: Vec<u16> = self.ports.iter().map(|p| *p.key()).collect();
        nums.sort_unstable();
        nums
    }

    /// Send a message south, to the datapath.
    pub fn send(&self, msg: OfMessage) -> Result<(), ChannelError> {
        self.channel.send(msg)
    }
}

impl std::fmt::Debug for PhysicalSwitch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhysicalSwitch")
            .field("dpid", &self.dpid)
            .field("ports", &self.ports.len())
            .finish()
    }
}

/// Registry of connected physical switches and the links between them.
///
/// Constructed once at startup and passed by reference; probing threads,
/// message handlers and the admin API all read and write it concurrently.
#[derive(Debug, Default)]
pub struct PhysicalNetwork {
    switches: DashMap<u64, Arc<PhysicalSwitch>, RandomState>,
    /// Directional adjacency: out of this port, into that one.
    neighbors: DashMap<PortLocator, PortLocator, RandomState>,
}

impl PhysicalNetwork {
    #[must_use]
    pub fn new() -> Self {
        PhysicalNetwork {
            switches: DashMap::with_hasher(RandomState::new()),
            neighbors: DashMap::with_hasher(RandomState::new()),
        }
    }

    pub fn add_switch(&self, sw: Arc<PhysicalSwitch>) {
        info!(dpid = format_args!("{:#x}", sw.dpid), "physical switch connected");
        self.switches.insert(sw.dpid, sw);
    }

    /// Drop a switch and every adjacency touching it. The caller also stops
    /// the switch's discovery runner.
    pub fn remove_switch(&self, dpid: u64) -> Option<Arc<PhysicalSwitch>> {
        self.neighbors
            .retain(|src, dst| src.dpid != dpid && dst.dpid != dpid);
        let removed = self.switches.remove(&dpid).map(|(_, sw)| sw);
        if removed.is_some() {
            info!(dpid = format_args!("{dpid:#x}"), "physical switch removed");
        }
        removed
    }

    pub fn switch(&self, dpid: u64) -> Result<Arc<PhysicalSwitch>, MapError> {
        self.switches
            .get(&dpid)
            .map(|s| Arc::clone(&s))
            .ok_or(MapError::NoSuchSwitch(dpid))
    }

    #[must_use]
    pub fn dpids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.switches.iter().map(|s| *s.key()).collect();
        ids.sort_unstable();
        ids
    }

    /// Record one direction of a discovered adjacency.
    pub fn create_link(&self, src: PortLocator, dst: PortLocator) {
        if self.neighbors.insert(src, dst) != Some(dst) {
            debug!(%src, %dst, "physical link up");
        }
    }

    /// Forget the adjacency out of `src`, in both directions.
    pub fn remove_link(&self, src: PortLocator) {
        if let Some((_, dst)) = self.neighbors.remove(&src) {
            debug!(%src, %dst, "physical link down");
            self.neighbors.remove_if(&dst, |_, back| *back == src);
        }
    }

    #[must_use]
    pub fn neighbor_port(&self, port: PortLocator) -> Option<PortLocator> {
        self.neighbors.get(&port).map(|d| *d)
    }

    /// A port with no discovered neighbor faces a host.
    #[must_use]
    pub fn is_edge(&self, port: PortLocator) -> bool {
        !self.neighbors.contains_key(&port)
    }

    /// Snapshot of every directional link currently known.
    #[must_use]
    pub fn links(&self) -> Vec<PhysicalLink> {
        let mut out: Vec<PhysicalLink> = self
            .neighbors
            .iter()
            .map(|e| PhysicalLink::new(*e.key(), *e.value()))
            .collect();
        out.sort_unstable();
        out
    }

    pub fn reset(&self) {
        self.switches.clear();
        self.neighbors.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::RecordingChannel;
    use pretty_assertions::assert_eq;

    fn switch(dpid: u64) -> Arc<PhysicalSwitch> {
        Arc::new(PhysicalSwitch::new(
            dpid,
            Arc::new(RecordingChannel::new("dp")),
        ))
    }

    #[test]
    fn link_lifecycle() {
        let net = PhysicalNetwork::new();
        net.add_switch(switch(1));
        net.add_switch(switch(2));
        let a = PortLocator::new(1, 1);
        let b = PortLocator::new(2, 1);
        net.create_link(a, b);
        net.create_link(b, a);
        assert_eq!(net.neighbor_port(a), Some(b));
        assert!(!net.is_edge(a));
        net.remove_link(a);
        assert!(net.is_edge(a));
        assert!(net.is_edge(b));
    }

    #[test]
    fn switch_removal_drops_adjacencies() {
        let net = PhysicalNetwork::new();
        net.add_switch(switch(1));
        net.add_switch(switch(2));
        net.create_link(PortLocator::new(1, 1), PortLocator::new(2, 1));
        net.create_link(PortLocator::new(2, 1), PortLocator::new(1, 1));
        net.remove_switch(2);
        assert!(net.switch(2).is_err());
        assert!(net.links().is_empty());
    }
}
