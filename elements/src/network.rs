// SPDX-License-Identifier: Apache-2.0
// Copyright OpenVirteX Authors

//! A tenant's virtual network: its switches, links, hosts and the counters
//! its identifiers come from.

use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use ahash::RandomState;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use ipnet::Ipv4Net;
use tracing::info;

use net::eth::Mac;

use crate::addr::{TenantId, MAX_TENANT_ID, TENANT_ADDR_BITS};
use crate::channel::ControlChannel;
use crate::errors::MapError;
use crate::link::{OvxLink, PhysicalLink};
use crate::map::OvxMap;
use crate::physical::PhysicalNetwork;
use crate::port::{OvxPort, PortLocator};
use crate::routing::default_routable;
use crate::switch::{BigSwitch, OvxSwitch, SwitchKind};

type Index<K, V> = DashMap<K, V, RandomState>;

fn index<K: std::hash::Hash + Eq, V>() -> Index<K, V> {
    DashMap::with_hasher(RandomState::new())
}

pub struct OvxNetwork {
    pub tenant: TenantId,
    pub protocol: String,
    pub ctrl_host: String,
    pub ctrl_port: u16,
    /// The tenant-visible address range; addresses inside it get translated.
    pub subnet: Ipv4Net,
    controller: Arc<dyn ControlChannel>,
    booted: AtomicBool,
    dpid_counter: AtomicU64,
    /// Link ids below 2 are reserved: 0 marks "no link" on a port.
    link_counter: AtomicU32,
    ip_counter: AtomicU32,
    switches: Index<u64, Arc<OvxSwitch>>,
    /// Both directions of each virtual link, forward first.
    links: Index<u32, [Arc<OvxLink>; 2]>,
    /// Which virtual port sits on each claimed physical port. At most one
    /// claim per physical port within the tenant.
    port_claims: Index<PortLocator, PortLocator>,
    hosts: Index<Mac, PortLocator>,
    gateways: Index<Ipv4Addr, Mac>,
    /// Virtual adjacency over virtual links, both directions.
    neighbors: Index<PortLocator, PortLocator>,
}

impl OvxNetwork {
    #[must_use]
    pub fn new(
        tenant: TenantId,
        protocol: &str,
        ctrl_host: &str,
        ctrl_port: u16,
        subnet: Ipv4Net,
        controller: Arc<dyn ControlChannel>,
    ) -> Self {
        OvxNetwork {
            tenant,
            protocol: protocol.to_string(),
            ctrl_host: ctrl_host.to_string(),
            ctrl_port,
            subnet,
            controller,
            booted: AtomicBool::new(false),
            dpid_counter: AtomicU64::new(1),
            link_counter: AtomicU32::new(2),
            ip_counter: AtomicU32::new(1),
            switches: index(),
            links: index(),
            port_claims: index(),
            hosts: index(),
            gateways: index(),
            neighbors: index(),
        }
    }

    pub fn boot(&self) {
        self.booted.store(true, Ordering::Relaxed);
        info!(tenant = self.tenant, "virtual network booted");
    }

    pub fn stop(&self) {
        self.booted.store(false, Ordering::Relaxed);
        info!(tenant = self.tenant, "virtual network stopped");
    }

    #[must_use]
    pub fn is_booted(&self) -> bool {
        self.booted.load(Ordering::Relaxed)
    }

    /// Allocate the next wire address for this tenant: tenant id in the top
    /// bits, a per-tenant counter below.
    #[must_use]
    pub fn next_physical_ip(&self) -> Ipv4Addr {
        let host = self.ip_counter.fetch_add(1, Ordering::Relaxed);
        // ids above the mask are rejected at allocation time
        let value =
            ((self.tenant & MAX_TENANT_ID) << (32 - TENANT_ADDR_BITS)) | (host & 0x00ff_ffff);
        Ipv4Addr::from(value)
    }

    /// Create a virtual switch over the given physical dpids. One dpid makes
    /// a single switch, several make a big switch.
    pub fn create_switch(
        &self,
        map: &OvxMap,
        physical: &PhysicalNetwork,
        phys_dpids: &[u64],
    ) -> Result<Arc<OvxSwitch>, MapError> {
        if phys_dpids.is_empty() {
            return Err(MapError::NotMapped("physical dpid list"));
        }
        for dpid in phys_dpids {
            physical.switch(*dpid)?;
        }
        let vdpid = self.dpid_counter.fetch_add(1, Ordering::Relaxed);
        let kind = if let [single] = phys_dpids {
            SwitchKind::Single { phys_dpid: *single }
        } else {
            SwitchKind::Big(BigSwitch::new(phys_dpids.to_vec(), default_routable()))
        };
        let sw = Arc::new(OvxSwitch::new(
            self.tenant,
            vdpid,
            kind,
            Arc::clone(&self.controller),
        ));
        self.switches.insert(vdpid, Arc::clone(&sw));
        map.add_switches(phys_dpids, &sw);
        info!(
            tenant = self.tenant,
            vdpid = format_args!("{vdpid:#x}"),
            members = phys_dpids.len(),
            "virtual switch created"
        );
        Ok(sw)
    }

    pub fn get_switch(&self, vdpid: u64) -> Result<Arc<OvxSwitch>, MapError> {
        self.switches
            .get(&vdpid)
            .map(|s| Arc::clone(&s))
            .ok_or(MapError::NoSuchSwitch(vdpid))
    }

    #[must_use]
    pub fn switches(&self) -> Vec<Arc<OvxSwitch>> {
        let mut out: Vec<Arc<OvxSwitch>> = self.switches.iter().map(|s| Arc::clone(&s)).collect();
        out.sort_by_key(|s| s.dpid);
        out
    }

    /// Create a virtual port on `vdpid` backed by the given physical port.
    /// Each physical port backs at most one virtual port per tenant; a
    /// second claim fails with `PortInUse`.
    pub fn create_port(
        &self,
        physical: &PhysicalNetwork,
        vdpid: u64,
        phys: PortLocator,
    ) -> Result<OvxPort, MapError> {
        let sw = self.get_switch(vdpid)?;
        let phys_sw = physical.switch(phys.dpid)?;
        let phys_port = phys_sw.port(phys.port).ok_or(MapError::NoSuchPort {
            dpid: phys.dpid,
            port: phys.port,
        })?;
        let number = sw.next_port_number()?;
        match self.port_claims.entry(phys) {
            Entry::Occupied(_) => return Err(MapError::PortInUse(phys)),
            Entry::Vacant(slot) => {
                slot.insert(PortLocator::new(vdpid, number));
            }
        }
        let port = OvxPort {
            tenant: self.tenant,
            dpid: vdpid,
            number,
            hw_addr: phys_port.hw_addr,
            edge: true,
            link_id: 0,
            phys,
        };
        sw.add_port(port.clone());
        Ok(port)
    }

    pub fn remove_port(&self, vdpid: u64, number: u16) -> Result<(), MapError> {
        let sw = self.get_switch(vdpid)?;
        let port = sw.remove_port(number)?;
        self.port_claims.remove(&port.phys);
        let locator = port.locator();
        self.hosts.retain(|_, at| *at != locator);
        Ok(())
    }

    /// Attach a host MAC to an existing virtual port. A MAC can be
    /// connected once across the whole hypervisor.
    pub fn connect_host(
        &self,
        map: &OvxMap,
        vdpid: u64,
        number: u16,
        mac: Mac,
    ) -> Result<OvxPort, MapError> {
        let sw = self.get_switch(vdpid)?;
        let port = sw.get_port(number).ok_or(MapError::NoSuchPort {
            dpid: vdpid,
            port: number,
        })?;
        map.add_mac(mac, self.tenant)?;
        self.hosts.insert(mac, port.locator());
        info!(tenant = self.tenant, %mac, port = %port.locator(), "host connected");
        Ok(port)
    }

    pub fn disconnect_host(&self, map: &OvxMap, mac: Mac) {
        self.hosts.remove(&mac);
        map.remove_mac(mac);
    }

    #[must_use]
    pub fn host_port(&self, mac: Mac) -> Option<PortLocator> {
        self.hosts.get(&mac).map(|p| *p)
    }

    /// Create a virtual link over a contiguous physical path. Both
    /// directions come into being, sharing one link id.
    pub fn connect_link(
        &self,
        map: &OvxMap,
        path: Vec<PhysicalLink>,
    ) -> Result<u32, MapError> {
        let (first, last) = match (path.first(), path.last()) {
            (Some(f), Some(l)) => (*f, *l),
            _ => return Err(MapError::NotMapped("physical path")),
        };
        let src = self.claimed_port(first.src)?;
        let dst = self.claimed_port(last.dst)?;
        if self.neighbors.contains_key(&src) {
            return Err(MapError::PortInUse(first.src));
        }
        if self.neighbors.contains_key(&dst) {
            return Err(MapError::PortInUse(last.dst));
        }
        let link_id = self.link_counter.fetch_add(1, Ordering::Relaxed);
        let reverse_path: Vec<PhysicalLink> =
            path.iter().rev().map(|l| l.reversed()).collect();
        let forward = Arc::new(OvxLink::new(self.tenant, link_id, src, dst, path.clone()));
        let reverse = Arc::new(OvxLink::new(
            self.tenant,
            link_id,
            dst,
            src,
            reverse_path.clone(),
        ));
        map.add_links(&path, &forward);
        map.add_links(&reverse_path, &reverse);
        self.links.insert(link_id, [forward, reverse]);
        for locator in [src, dst] {
            if let Ok(sw) = self.get_switch(locator.dpid) {
                sw.update_port(locator.port, |p| {
                    p.edge = false;
                    p.link_id = link_id;
                });
            }
        }
        self.neighbors.insert(src, dst);
        self.neighbors.insert(dst, src);
        info!(tenant = self.tenant, link_id, hops = path.len(), "virtual link connected");
        Ok(link_id)
    }

    pub fn disconnect_link(&self, map: &OvxMap, link_id: u32) -> Result<(), MapError> {
        let (_, [forward, reverse]) =
            self.links
                .remove(&link_id)
                .ok_or(MapError::NoSuchLink {
                    tenant: self.tenant,
                    link_id,
                })?;
        map.remove_link(&forward);
        map.remove_link(&reverse);
        for locator in [forward.src, forward.dst] {
            self.neighbors.remove(&locator);
            if let Ok(sw) = self.get_switch(locator.dpid) {
                sw.update_port(locator.port, |p| {
                    p.edge = true;
                    p.link_id = 0;
                });
            }
        }
        Ok(())
    }

    /// Re-route an existing virtual link over a new physical path.
    pub fn set_link_path(
        &self,
        map: &OvxMap,
        link_id: u32,
        path: Vec<PhysicalLink>,
    ) -> Result<(), MapError> {
        let entry = self.links.get(&link_id).ok_or(MapError::NoSuchLink {
            tenant: self.tenant,
            link_id,
        })?;
        let [forward, reverse] = entry.value();
        let reverse_path: Vec<PhysicalLink> =
            path.iter().rev().map(|l| l.reversed()).collect();
        forward.set_path(path.clone());
        reverse.set_path(reverse_path.clone());
        map.relink(&path, forward);
        map.relink(&reverse_path, reverse);
        Ok(())
    }

    pub fn get_link(&self, link_id: u32) -> Result<Arc<OvxLink>, MapError> {
        self.links
            .get(&link_id)
            .map(|pair| Arc::clone(&pair[0]))
            .ok_or(MapError::NoSuchLink {
                tenant: self.tenant,
                link_id,
            })
    }

    /// The virtual port at the far end of the virtual link leaving `port`.
    #[must_use]
    pub fn neighbor_port(&self, port: PortLocator) -> Option<PortLocator> {
        self.neighbors.get(&port).map(|p| *p)
    }

    /// The virtual port a tenant laid over the given physical port.
    #[must_use]
    pub fn virtual_port_at(&self, phys: PortLocator) -> Option<PortLocator> {
        self.port_claims.get(&phys).map(|p| *p)
    }

    pub fn remove_switch(&self, map: &OvxMap, vdpid: u64) -> Result<(), MapError> {
        let (_, sw) = self
            .switches
            .remove(&vdpid)
            .ok_or(MapError::NoSuchSwitch(vdpid))?;
        let doomed: Vec<u32> = self
            .links
            .iter()
            .filter(|e| e.value()[0].src.dpid == vdpid || e.value()[0].dst.dpid == vdpid)
            .map(|e| *e.key())
            .collect();
        for link_id in doomed {
            let _ = self.disconnect_link(map, link_id);
        }
        for port in sw.ports() {
            self.port_claims.remove(&port.phys);
            let locator = port.locator();
            self.hosts.retain(|_, at| *at != locator);
        }
        map.remove_switch(&sw);
        Ok(())
    }

    pub fn add_gateway(&self, ip: Ipv4Addr, mac: Mac) {
        self.gateways.insert(ip, mac);
    }

    #[must_use]
    pub fn gateway(&self, ip: Ipv4Addr) -> Option<Mac> {
        self.gateways.get(&ip).map(|m| *m)
    }

    fn claimed_port(&self, phys: PortLocator) -> Result<PortLocator, MapError> {
        self.port_claims
            .get(&phys)
            .map(|p| *p)
            .ok_or(MapError::NotMapped("physical port endpoint"))
    }
}

impl std::fmt::Debug for OvxNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OvxNetwork")
            .field("tenant", &self.tenant)
            .field("subnet", &self.subnet)
            .field("switches", &self.switches.len())
            .field("links", &self.links.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::RecordingChannel;
    use crate::physical::PhysicalSwitch;
    use crate::port::PhysicalPort;
    use pretty_assertions::assert_eq;

    fn phys_net(dpids: &[u64], ports_per_switch: u16) -> PhysicalNetwork {
        let net = PhysicalNetwork::new();
        for &dpid in dpids {
            let sw = PhysicalSwitch::new(dpid, Arc::new(RecordingChannel::new("dp")));
            for number in 1..=ports_per_switch {
                sw.add_port(PhysicalPort {
                    locator: PortLocator::new(dpid, number),
                    hw_addr: Mac([0, 0, 0, 0, dpid as u8, number as u8]),
                    name: format!("eth{number}"),
                });
            }
            net.add_switch(Arc::new(sw));
        }
        net
    }

    fn tenant_net(map: &OvxMap) -> OvxNetwork {
        OvxNetwork::new(
            map.next_tenant_id().unwrap(),
            "tcp",
            "127.0.0.1",
            6633,
            "10.0.0.0/8".parse().unwrap(),
            Arc::new(RecordingChannel::new("ctrl")),
        )
    }

    #[test]
    fn second_claim_on_same_physical_port_fails() {
        let map = OvxMap::new();
        let physical = phys_net(&[1], 4);
        let net = tenant_net(&map);
        let sw = net.create_switch(&map, &physical, &[1]).unwrap();
        let phys = PortLocator::new(1, 1);
        net.create_port(&physical, sw.dpid, phys).unwrap();
        assert_eq!(
            net.create_port(&physical, sw.dpid, phys),
            Err(MapError::PortInUse(phys))
        );
    }

    #[test]
    fn duplicate_host_mac_fails() {
        let map = OvxMap::new();
        let physical = phys_net(&[1], 4);
        let net = tenant_net(&map);
        let sw = net.create_switch(&map, &physical, &[1]).unwrap();
        let p1 = net.create_port(&physical, sw.dpid, PortLocator::new(1, 1)).unwrap();
        let p2 = net.create_port(&physical, sw.dpid, PortLocator::new(1, 2)).unwrap();
        let mac = Mac([0, 0, 0, 0, 0, 1]);
        net.connect_host(&map, sw.dpid, p1.number, mac).unwrap();
        assert_eq!(
            net.connect_host(&map, sw.dpid, p2.number, mac),
            Err(MapError::DuplicateMac(mac))
        );
    }

    #[test]
    fn link_connect_sets_port_state_both_ends() {
        let map = OvxMap::new();
        let physical = phys_net(&[1, 2], 4);
        let net = tenant_net(&map);
        let s1 = net.create_switch(&map, &physical, &[1]).unwrap();
        let s2 = net.create_switch(&map, &physical, &[2]).unwrap();
        let a = net.create_port(&physical, s1.dpid, PortLocator::new(1, 2)).unwrap();
        let b = net.create_port(&physical, s2.dpid, PortLocator::new(2, 1)).unwrap();
        let hop = PhysicalLink::new(PortLocator::new(1, 2), PortLocator::new(2, 1));

        let link_id = net.connect_link(&map, vec![hop]).unwrap();
        assert_eq!(link_id, 2);
        let a_now = s1.get_port(a.number).unwrap();
        let b_now = s2.get_port(b.number).unwrap();
        assert!(!a_now.edge);
        assert_eq!(a_now.link_id, link_id);
        assert_eq!(net.neighbor_port(a_now.locator()), Some(b_now.locator()));
        assert_eq!(
            map.get_virtual_link(hop, net.tenant).unwrap().link_id,
            link_id
        );
        assert_eq!(
            map.get_virtual_link(hop.reversed(), net.tenant).unwrap().link_id,
            link_id
        );

        net.disconnect_link(&map, link_id).unwrap();
        assert!(s1.get_port(a.number).unwrap().edge);
        assert!(map.get_virtual_link(hop, net.tenant).is_err());
    }

    #[test]
    fn occupied_far_end_rejects_a_second_link() {
        let map = OvxMap::new();
        let physical = phys_net(&[1, 2, 3], 4);
        let net = tenant_net(&map);
        let s1 = net.create_switch(&map, &physical, &[1]).unwrap();
        let s2 = net.create_switch(&map, &physical, &[2]).unwrap();
        let s3 = net.create_switch(&map, &physical, &[3]).unwrap();
        net.create_port(&physical, s1.dpid, PortLocator::new(1, 2)).unwrap();
        net.create_port(&physical, s2.dpid, PortLocator::new(2, 2)).unwrap();
        net.create_port(&physical, s3.dpid, PortLocator::new(3, 1)).unwrap();

        let far_end = PortLocator::new(3, 1);
        net.connect_link(&map, vec![PhysicalLink::new(PortLocator::new(1, 2), far_end)])
            .unwrap();
        assert_eq!(
            net.connect_link(&map, vec![PhysicalLink::new(PortLocator::new(2, 2), far_end)]),
            Err(MapError::PortInUse(far_end))
        );
    }

    #[test]
    fn wire_addresses_embed_tenant() {
        let map = OvxMap::new();
        let net = tenant_net(&map);
        let first = net.next_physical_ip();
        let second = net.next_physical_ip();
        assert_eq!(first, Ipv4Addr::new(net.tenant as u8, 0, 0, 1));
        assert_eq!(second, Ipv4Addr::new(net.tenant as u8, 0, 0, 2));
    }
}
