// SPDX-License-Identifier: Apache-2.0
// Copyright OpenVirteX Authors

//! The tenant-facing virtual switch.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU16, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use ahash::RandomState;
use dashmap::DashMap;
use tracing::warn;

use net::eth::Mac;
use net::openflow::message::{FeaturesReply, PortDesc};
use net::openflow::{OfMessage, OfPort, PacketIn};

use crate::addr::TenantId;
use crate::bufmap::{BufferMap, BUFFER_CAPACITY};
use crate::channel::ControlChannel;
use crate::errors::MapError;
use crate::link::PhysicalLink;
use crate::physical::PhysicalNetwork;
use crate::port::OvxPort;
use crate::routing::{Routable, SwitchRoute};

/// `OFPC_FLOW_STATS | OFPC_TABLE_STATS | OFPC_PORT_STATS`.
const CAPABILITIES: u32 = 0x7;
/// Every OpenFlow 1.0 action type.
const SUPPORTED_ACTIONS: u32 = 0xfff;
const DEFAULT_MISS_SEND_LEN: u16 = 128;

/// State of a virtual switch backed by several physical switches: its
/// member set, the routing strategy and the memoized internal routes.
pub struct BigSwitch {
    /// Physical dpids, in the order the tenant supplied them.
    pub members: Vec<u64>,
    pub algorithm: Arc<dyn Routable>,
    routes: Mutex<HashMap<(u16, u16), Arc<SwitchRoute>>>,
    route_counter: AtomicU32,
}

impl BigSwitch {
    #[must_use]
    pub fn new(members: Vec<u64>, algorithm: Arc<dyn Routable>) -> Self {
        BigSwitch {
            members,
            algorithm,
            routes: Mutex::new(HashMap::new()),
            route_counter: AtomicU32::new(1),
        }
    }
}

/// What backs a virtual switch.
pub enum SwitchKind {
    /// Exactly one physical switch; ports map through one to one.
    Single { phys_dpid: u64 },
    /// Several physical switches stitched together by internal routes the
    /// tenant never sees.
    Big(BigSwitch),
}

/// A switch as one tenant sees it.
pub struct OvxSwitch {
    pub tenant: TenantId,
    /// Virtual dpid, unique within the tenant.
    pub dpid: u64,
    pub kind: SwitchKind,
    ports: DashMap<u16, OvxPort, RandomState>,
    buffers: Mutex<BufferMap>,
    miss_send_len: AtomicU16,
    controller: Arc<dyn ControlChannel>,
}

impl OvxSwitch {
    #[must_use]
    pub fn new(
        tenant: TenantId,
        dpid: u64,
        kind: SwitchKind,
        controller: Arc<dyn ControlChannel>,
    ) -> Self {
        OvxSwitch {
            tenant,
            dpid,
            kind,
            ports: DashMap::with_hasher(RandomState::new()),
            buffers: Mutex::new(BufferMap::new()),
            miss_send_len: AtomicU16::new(DEFAULT_MISS_SEND_LEN),
            controller,
        }
    }

    /// The physical dpids backing this switch, in order.
    #[must_use]
    pub fn phys_dpids(&self) -> Vec<u64> {
        match &self.kind {
            SwitchKind::Single { phys_dpid } => vec![*phys_dpid],
            SwitchKind::Big(big) => big.members.clone(),
        }
    }

    /// Lowest free port number, starting at 1.
    pub fn next_port_number(&self) -> Result<u16, MapError> {
        (1..256)
            .find(|n| !self.ports.contains_key(n))
            .ok_or(MapError::PortSpaceExhausted(self.dpid))
    }

    pub fn add_port(&self, port: OvxPort) {
        self.ports.insert(port.number, port);
    }

    #[must_use]
    pub fn get_port(&self, number: u16) -> Option<OvxPort> {
        self.ports.get(&number).map(|p| p.clone())
    }

    pub fn remove_port(&self, number: u16) -> Result<OvxPort, MapError> {
        self.ports
            .remove(&number)
            .map(|(_, p)| p)
            .ok_or(MapError::NoSuchPort {
                dpid: self.dpid,
                port: number,
            })
    }

    /// Apply `f` to the stored port, if present.
    pub fn update_port(&self, number: u16, f: impl FnOnce(&mut OvxPort)) -> bool {
        match self.ports.get_mut(&number) {
            Some(mut p) => {
                f(&mut p);
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn ports(&self) -> Vec<OvxPort> {
        let mut out: Vec<OvxPort> = self.ports.iter().map(|p| p.clone()).collect();
        out.sort_by_key(|p| p.number);
        out
    }

    pub fn add_to_buffer(&self, pkt: PacketIn) -> u32 {
        self.buffers.lock().unwrap().add(pkt)
    }

    #[must_use]
    pub fn from_buffer(&self, id: u32) -> Option<PacketIn> {
        self.buffers.lock().unwrap().get(id)
    }

    #[must_use]
    pub fn miss_send_len(&self) -> u16 {
        self.miss_send_len.load(Ordering::Relaxed)
    }

    pub fn set_miss_send_len(&self, len: u16) {
        self.miss_send_len.store(len, Ordering::Relaxed);
    }

    /// Send a message north, to the tenant controller. Channel failures are
    /// logged; the session stays up.
    pub fn send_to_controller(&self, msg: OfMessage) {
        if let Err(err) = self.controller.send(msg) {
            warn!(
                tenant = self.tenant,
                dpid = format_args!("{:#x}", self.dpid),
                %err,
                "dropping message to tenant controller"
            );
        }
    }

    /// Send a message south, to one of the backing physical switches.
    pub fn send_to_datapath(&self, net: &PhysicalNetwork, phys_dpid: u64, msg: OfMessage) {
        match net.switch(phys_dpid) {
            Ok(sw) => {
                if let Err(err) = sw.send(msg) {
                    warn!(dpid = format_args!("{phys_dpid:#x}"), %err, "datapath send failed");
                }
            }
            Err(err) => {
                warn!(dpid = format_args!("{phys_dpid:#x}"), %err, "datapath gone");
            }
        }
    }

    /// The internal route between two ports of a big switch, computed on
    /// first request and memoized per (ingress, egress) pair.
    pub fn get_route(
        &self,
        net: &PhysicalNetwork,
        ingress: &OvxPort,
        egress: &OvxPort,
    ) -> Result<Arc<SwitchRoute>, MapError> {
        let SwitchKind::Big(big) = &self.kind else {
            return Err(MapError::NotBigSwitch(self.dpid));
        };
        let mut routes = big.routes.lock().unwrap();
        if let Some(route) = routes.get(&(ingress.number, egress.number)) {
            return Ok(Arc::clone(route));
        }
        let path = big
            .algorithm
            .compute(net, &big.members, ingress.phys.dpid, egress.phys.dpid)
            .ok_or(MapError::NoRoute {
                src: ingress.phys.dpid,
                dst: egress.phys.dpid,
            })?;
        let route = Arc::new(SwitchRoute {
            route_id: big.route_counter.fetch_add(1, Ordering::Relaxed),
            ingress: ingress.number,
            egress: egress.number,
            path,
        });
        routes.insert((ingress.number, egress.number), Arc::clone(&route));
        Ok(route)
    }

    /// Install an explicit route between two ports of a big switch,
    /// replacing whatever was memoized for the pair.
    pub fn connect_route(
        &self,
        ingress: u16,
        egress: u16,
        path: Vec<PhysicalLink>,
    ) -> Result<Arc<SwitchRoute>, MapError> {
        let SwitchKind::Big(big) = &self.kind else {
            return Err(MapError::NotBigSwitch(self.dpid));
        };
        let route = Arc::new(SwitchRoute {
            route_id: big.route_counter.fetch_add(1, Ordering::Relaxed),
            ingress,
            egress,
            path,
        });
        big.routes
            .lock()
            .unwrap()
            .insert((ingress, egress), Arc::clone(&route));
        Ok(route)
    }

    /// Forget the memoized route between two ports, if any.
    pub fn remove_route(&self, ingress: u16, egress: u16) -> Result<(), MapError> {
        let SwitchKind::Big(big) = &self.kind else {
            return Err(MapError::NotBigSwitch(self.dpid));
        };
        big.routes.lock().unwrap().remove(&(ingress, egress));
        Ok(())
    }

    /// The description this switch presents to its tenant controller on
    /// handshake. Includes the administratively-down local port every
    /// OpenFlow 1.0 switch carries.
    #[must_use]
    pub fn features_reply(&self) -> FeaturesReply {
        let mut ports: Vec<PortDesc> = self
            .ports()
            .iter()
            .map(|p| PortDesc {
                port_no: p.number,
                hw_addr: p.hw_addr,
                name: format!("ovxport-{}-{}", self.tenant, p.number),
                config: 0,
                state: 0,
                current: 0,
                advertised: 0,
                supported: 0,
                peer: 0,
            })
            .collect();
        ports.push(PortDesc {
            port_no: OfPort::LOCAL,
            hw_addr: self.local_port_mac(),
            name: format!("ovxsw-{}", self.tenant),
            // OFPPC_PORT_DOWN and OFPPS_LINK_DOWN
            config: 1,
            state: 1,
            current: 0,
            advertised: 0,
            supported: 0,
            peer: 0,
        });
        FeaturesReply {
            dpid: self.dpid,
            n_buffers: BUFFER_CAPACITY as u32,
            n_tables: 1,
            capabilities: CAPABILITIES,
            actions: SUPPORTED_ACTIONS,
            ports,
        }
    }

    fn local_port_mac(&self) -> Mac {
        let b = self.dpid.to_be_bytes();
        Mac([b[2], b[3], b[4], b[5], b[6], b[7]])
    }
}

impl std::fmt::Debug for OvxSwitch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match &self.kind {
            SwitchKind::Single { phys_dpid } => format!("single({phys_dpid:#x})"),
            SwitchKind::Big(big) => format!("big({} members)", big.members.len()),
        };
        f.debug_struct("OvxSwitch")
            .field("tenant", &self.tenant)
            .field("dpid", &self.dpid)
            .field("kind", &kind)
            .finish()
    }
}
