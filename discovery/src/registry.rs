// SPDX-License-Identifier: Apache-2.0
// Copyright OpenVirteX Authors

//! Routes the discovery traffic of the whole physical network.
//!
//! One engine and one runner per attached switch. A probe received as a
//! packet-in names its sender inside the payload; the registry confirms
//! the link in the topology and acks the sender's engine.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use ahash::RandomState;
use dashmap::DashMap;
use thiserror::Error;
use tracing::debug;

use elements::errors::MapError;
use elements::physical::PhysicalNetwork;
use elements::port::PortLocator;
use net::lldp::{check_lldp, parse_lldp};

use crate::engine::{SwitchDiscovery, PROBE_INTERVAL};
use crate::runner::DiscoveryRunner;

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("no discovery engine for switch {0:#x}")]
    NotAttached(u64),

    #[error(transparent)]
    Map(#[from] MapError),
}

struct Attached {
    engine: Arc<SwitchDiscovery>,
    runner: Mutex<DiscoveryRunner>,
}

/// Process-wide discovery state, dpid-keyed.
pub struct Discovery {
    net: Arc<PhysicalNetwork>,
    attached: DashMap<u64, Attached, RandomState>,
}

impl Discovery {
    #[must_use]
    pub fn new(net: Arc<PhysicalNetwork>) -> Self {
        Discovery {
            net,
            attached: DashMap::with_hasher(RandomState::new()),
        }
    }

    /// Create and start an engine for a newly connected switch, probing
    /// every port it reported.
    pub fn attach_switch(&self, dpid: u64) -> Result<(), DiscoveryError> {
        let sw = self.net.switch(dpid)?;
        let engine = Arc::new(SwitchDiscovery::new(dpid));
        for port in sw.port_numbers() {
            engine.add_port(&self.net, port);
        }
        let mut runner = DiscoveryRunner::new(Arc::clone(&engine), Arc::clone(&self.net));
        runner.start(PROBE_INTERVAL);
        self.attached.insert(
            dpid,
            Attached {
                engine,
                runner: Mutex::new(runner),
            },
        );
        Ok(())
    }

    /// Variant of [`Discovery::attach_switch`] with a caller-chosen tick
    /// interval, for tests.
    pub fn attach_switch_with_interval(
        &self,
        dpid: u64,
        interval: Duration,
    ) -> Result<(), DiscoveryError> {
        self.attach_switch(dpid)?;
        if let Some(entry) = self.attached.get(&dpid) {
            let mut runner = entry.runner.lock().unwrap();
            runner.stop();
            runner.start(interval);
        }
        Ok(())
    }

    /// Stop and drop the engine of a switch being torn down. The runner
    /// thread is joined before this returns.
    pub fn detach_switch(&self, dpid: u64) {
        if let Some((_, attached)) = self.attached.remove(&dpid) {
            attached.runner.lock().unwrap().stop();
        }
    }

    pub fn engine(&self, dpid: u64) -> Result<Arc<SwitchDiscovery>, DiscoveryError> {
        self.attached
            .get(&dpid)
            .map(|a| Arc::clone(&a.engine))
            .ok_or(DiscoveryError::NotAttached(dpid))
    }

    /// A probe arrived as a packet-in on `receiver`. Validate it, confirm
    /// the link sender -> receiver, and ack the sender's engine. Malformed
    /// payloads are dropped.
    pub fn handle_lldp(&self, receiver: PortLocator, data: &[u8]) {
        if !check_lldp(data) {
            debug!(%receiver, "invalid LLDP");
            return;
        }
        let sender = match parse_lldp(data) {
            Ok(dp) => PortLocator::new(dp.dpid, dp.port),
            Err(err) => {
                debug!(%receiver, %err, "undecodable LLDP");
                return;
            }
        };
        self.net.create_link(sender, receiver);
        match self.engine(sender.dpid) {
            Ok(engine) => engine.ack_probe(sender.port),
            Err(err) => debug!(%sender, %err, "probe from unattached switch"),
        }
    }

    /// All switches currently attached.
    #[must_use]
    pub fn dpids(&self) -> Vec<u64> {
        let mut out: Vec<u64> = self.attached.iter().map(|e| *e.key()).collect();
        out.sort_unstable();
        out
    }
}

impl Drop for Discovery {
    fn drop(&mut self) {
        let dpids = self.dpids();
        for dpid in dpids {
            self.detach_switch(dpid);
        }
    }
}
