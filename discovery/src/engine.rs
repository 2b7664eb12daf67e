// SPDX-License-Identifier: Apache-2.0
// Copyright OpenVirteX Authors

//! The probing state machine of one physical switch.
//!
//! Every port moves between two tiers. Slow ports have no confirmed
//! neighbor and get probed once in a while, one port per tick round-robin,
//! so a switch full of host-facing ports costs almost nothing. Fast ports
//! carry a confirmed link and are probed every tick; three consecutive
//! unacknowledged probes are the link-death signal, the only one there is.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tracing::{debug, warn};

use elements::physical::PhysicalNetwork;
use elements::port::PortLocator;
use net::lldp::build_lldp;
use net::openflow::{Action, OfMessage, OfPort, PacketOut, NO_BUFFER};

/// Unacknowledged fast probes a link survives.
pub const MAX_PROBE_COUNT: u32 = 3;
/// Time between probing rounds.
pub const PROBE_INTERVAL: Duration = Duration::from_millis(1000);

#[derive(Debug, Default)]
struct PortTiers {
    slow: Vec<u16>,
    slow_cursor: usize,
    fast: Vec<u16>,
    probe_count: HashMap<u16, u32>,
}

/// Port-state transitions are serialized under one mutex per engine;
/// engines of different switches are fully independent.
#[derive(Debug)]
pub struct SwitchDiscovery {
    dpid: u64,
    tiers: Mutex<PortTiers>,
}

impl SwitchDiscovery {
    #[must_use]
    pub fn new(dpid: u64) -> Self {
        debug!(dpid = format_args!("{dpid:#x}"), "discovery engine started");
        SwitchDiscovery {
            dpid,
            tiers: Mutex::new(PortTiers::default()),
        }
    }

    #[must_use]
    pub fn dpid(&self) -> u64 {
        self.dpid
    }

    /// Start probing a port: send an initial probe and file it as slow.
    pub fn add_port(&self, net: &PhysicalNetwork, port: u16) {
        let mut tiers = self.tiers.lock().unwrap();
        if tiers.slow.contains(&port) || tiers.fast.contains(&port) {
            return;
        }
        debug!(dpid = format_args!("{:#x}", self.dpid), port, "sending init probe");
        self.send_probe(net, port);
        tiers.slow.push(port);
    }

    /// Forget a port entirely, whichever tier it is in.
    pub fn remove_port(&self, port: u16) {
        let mut tiers = self.tiers.lock().unwrap();
        if let Some(pos) = tiers.slow.iter().position(|p| *p == port) {
            tiers.slow.remove(pos);
            if tiers.slow_cursor > pos {
                tiers.slow_cursor -= 1;
            }
        } else if let Some(pos) = tiers.fast.iter().position(|p| *p == port) {
            tiers.fast.remove(pos);
            tiers.probe_count.remove(&port);
        } else {
            warn!(
                dpid = format_args!("{:#x}", self.dpid),
                port, "tried to remove non-existing port"
            );
        }
    }

    /// A probe sent out of `port` came back from the neighbor.
    pub fn ack_probe(&self, port: u16) {
        let mut tiers = self.tiers.lock().unwrap();
        if let Some(pos) = tiers.slow.iter().position(|p| *p == port) {
            debug!(
                dpid = format_args!("{:#x}", self.dpid),
                port, "setting slow port to fast"
            );
            tiers.slow.remove(pos);
            if tiers.slow_cursor > pos {
                tiers.slow_cursor -= 1;
            }
            tiers.fast.push(port);
            tiers.probe_count.insert(port, 0);
        } else if tiers.fast.contains(&port) {
            if let Some(count) = tiers.probe_count.get_mut(&port) {
                *count = count.saturating_sub(1);
            }
        } else {
            debug!(
                dpid = format_args!("{:#x}", self.dpid),
                port, "ack for non-existing port"
            );
        }
    }

    /// One probing round: every fast port either gets a fresh probe or,
    /// having exhausted its chances, is demoted and its link torn down;
    /// then exactly one slow port gets its turn.
    pub fn tick(&self, net: &PhysicalNetwork) {
        let mut tiers = self.tiers.lock().unwrap();
        let mut demoted = Vec::new();
        for pos in 0..tiers.fast.len() {
            let port = tiers.fast[pos];
            let count = tiers.probe_count.get(&port).copied().unwrap_or(0);
            if count < MAX_PROBE_COUNT {
                tiers.probe_count.insert(port, count + 1);
                debug!(
                    dpid = format_args!("{:#x}", self.dpid),
                    port, "sending fast probe"
                );
                self.send_probe(net, port);
            } else {
                demoted.push(port);
            }
        }
        for port in demoted {
            debug!(
                dpid = format_args!("{:#x}", self.dpid),
                port, "link timed out, demoting port"
            );
            tiers.fast.retain(|p| *p != port);
            tiers.probe_count.remove(&port);
            tiers.slow.push(port);
            net.remove_link(PortLocator::new(self.dpid, port));
        }
        if !tiers.slow.is_empty() {
            if tiers.slow_cursor >= tiers.slow.len() {
                tiers.slow_cursor = 0;
            }
            let port = tiers.slow[tiers.slow_cursor];
            tiers.slow_cursor += 1;
            debug!(
                dpid = format_args!("{:#x}", self.dpid),
                port, "sending slow probe"
            );
            self.send_probe(net, port);
        }
    }

    #[must_use]
    pub fn is_slow(&self, port: u16) -> bool {
        self.tiers.lock().unwrap().slow.contains(&port)
    }

    #[must_use]
    pub fn is_fast(&self, port: u16) -> bool {
        self.tiers.lock().unwrap().fast.contains(&port)
    }

    #[must_use]
    pub fn probe_count(&self, port: u16) -> Option<u32> {
        self.tiers.lock().unwrap().probe_count.get(&port).copied()
    }

    fn send_probe(&self, net: &PhysicalNetwork, port: u16) {
        let Ok(sw) = net.switch(self.dpid) else {
            debug!(dpid = format_args!("{:#x}", self.dpid), "switch gone, skipping probe");
            return;
        };
        let src_mac = match sw.port(port) {
            Some(p) => p.hw_addr,
            None => {
                debug!(
                    dpid = format_args!("{:#x}", self.dpid),
                    port, "port gone, skipping probe"
                );
                return;
            }
        };
        let lldp = build_lldp(src_mac, self.dpid, port);
        let pkt = PacketOut {
            buffer_id: NO_BUFFER,
            in_port: OfPort::NONE,
            actions: vec![Action::Output { port, max_len: 0 }],
            data: lldp,
        };
        if let Err(err) = sw.send(OfMessage::PacketOut(pkt)) {
            debug!(dpid = format_args!("{:#x}", self.dpid), port, %err, "probe send failed");
        }
    }
}
