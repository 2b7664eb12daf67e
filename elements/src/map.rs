// SPDX-License-Identifier: Apache-2.0
// Copyright OpenVirteX Authors

//! The central bidirectional index between the virtual and physical worlds.
//!
//! One `OvxMap` exists per process. It is constructed explicitly at startup
//! and handed by reference to everything that needs it; admin API threads,
//! discovery threads and per-switch message handlers all mutate it
//! concurrently. Each index is a `DashMap` keyed so that the invariant "a
//! (physical entity, tenant) pair maps to at most one virtual entity" is a
//! per-key property; cross-key consistency comes from construction order,
//! so a reader may observe a virtual switch before all its ports exist and
//! has to treat that as valid-but-incomplete.

use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use ahash::RandomState;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use net::eth::Mac;

use crate::addr::{OvxIpAddr, PhysIpAddr, TenantId, MAX_TENANT_ID};
use crate::errors::MapError;
use crate::link::{OvxLink, PhysicalLink};
use crate::network::OvxNetwork;
use crate::switch::OvxSwitch;

type Index<K, V> = DashMap<K, V, RandomState>;

fn index<K: std::hash::Hash + Eq, V>() -> Index<K, V> {
    DashMap::with_hasher(RandomState::new())
}

pub struct OvxMap {
    tenant_counter: AtomicU32,
    networks: Index<TenantId, Arc<OvxNetwork>>,
    /// Virtual switch -> ordered backing physical dpids.
    virt_switch: Index<(TenantId, u64), Vec<u64>>,
    /// (physical dpid, tenant) -> the one virtual switch over it.
    phys_switch: Index<(u64, TenantId), Arc<OvxSwitch>>,
    /// Virtual link -> ordered physical path.
    virt_link: Index<(TenantId, u32), Vec<PhysicalLink>>,
    /// (physical link, tenant) -> the one virtual link over it.
    phys_link: Index<(PhysicalLink, TenantId), Arc<OvxLink>>,
    /// Tenant-visible address -> wire address.
    virt_ip: Index<OvxIpAddr, Ipv4Addr>,
    /// Wire address -> tenant-visible address.
    phys_ip: Index<PhysIpAddr, Ipv4Addr>,
    /// Host MAC -> owning tenant.
    macs: Index<Mac, TenantId>,
}

impl Default for OvxMap {
    fn default() -> Self {
        Self::new()
    }
}

impl OvxMap {
    #[must_use]
    pub fn new() -> Self {
        OvxMap {
            tenant_counter: AtomicU32::new(1),
            networks: index(),
            virt_switch: index(),
            phys_switch: index(),
            virt_link: index(),
            phys_link: index(),
            virt_ip: index(),
            phys_ip: index(),
            macs: index(),
        }
    }

    /// Hand out the next tenant id. Ids are never reused within a process
    /// lifetime, even after their network is removed, and never exceed the
    /// wire address format's tenant field.
    pub fn next_tenant_id(&self) -> Result<TenantId, MapError> {
        let id = self.tenant_counter.fetch_add(1, Ordering::Relaxed);
        if id > MAX_TENANT_ID {
            return Err(MapError::TenantSpaceExhausted);
        }
        Ok(id)
    }

    pub fn add_network(&self, network: Arc<OvxNetwork>) {
        self.networks.insert(network.tenant, network);
    }

    pub fn get_virtual_network(&self, tenant: TenantId) -> Result<Arc<OvxNetwork>, MapError> {
        self.networks
            .get(&tenant)
            .map(|n| Arc::clone(&n))
            .ok_or(MapError::UnknownTenant(tenant))
    }

    /// Drop a tenant's network and every index entry belonging to it.
    pub fn remove_network(&self, tenant: TenantId) -> Result<Arc<OvxNetwork>, MapError> {
        let (_, network) = self
            .networks
            .remove(&tenant)
            .ok_or(MapError::UnknownTenant(tenant))?;
        self.virt_switch.retain(|(t, _), _| *t != tenant);
        self.phys_switch.retain(|(_, t), _| *t != tenant);
        self.virt_link.retain(|(t, _), _| *t != tenant);
        self.phys_link.retain(|(_, t), _| *t != tenant);
        self.virt_ip.retain(|k, _| k.tenant != tenant);
        self.phys_ip.retain(|k, _| k.tenant != tenant);
        self.macs.retain(|_, t| *t != tenant);
        Ok(network)
    }

    /// Register every physical dpid as backing the virtual switch.
    /// Idempotent per physical dpid.
    pub fn add_switches(&self, phys_dpids: &[u64], vswitch: &Arc<OvxSwitch>) {
        let mut backing = self
            .virt_switch
            .entry((vswitch.tenant, vswitch.dpid))
            .or_default();
        for dpid in phys_dpids {
            if !backing.contains(dpid) {
                backing.push(*dpid);
            }
            self.phys_switch
                .insert((*dpid, vswitch.tenant), Arc::clone(vswitch));
        }
    }

    pub fn remove_switch(&self, vswitch: &OvxSwitch) {
        if let Some((_, backing)) = self.virt_switch.remove(&(vswitch.tenant, vswitch.dpid)) {
            for dpid in backing {
                self.phys_switch.remove(&(dpid, vswitch.tenant));
            }
        }
    }

    pub fn get_virtual_switch(
        &self,
        phys_dpid: u64,
        tenant: TenantId,
    ) -> Result<Arc<OvxSwitch>, MapError> {
        self.phys_switch
            .get(&(phys_dpid, tenant))
            .map(|s| Arc::clone(&s))
            .ok_or(MapError::NoVirtualSwitch {
                dpid: phys_dpid,
                tenant,
            })
    }

    pub fn get_physical_switches(&self, vswitch: &OvxSwitch) -> Result<Vec<u64>, MapError> {
        self.virt_switch
            .get(&(vswitch.tenant, vswitch.dpid))
            .map(|v| v.clone())
            .ok_or(MapError::NotMapped("virtual switch"))
    }

    /// Register every physical link as carrying the virtual link.
    /// Idempotent per physical link; the path order is the caller's.
    pub fn add_links(&self, path: &[PhysicalLink], vlink: &Arc<OvxLink>) {
        let mut backing = self
            .virt_link
            .entry((vlink.tenant, vlink.link_id))
            .or_default();
        for link in path {
            if !backing.contains(link) {
                backing.push(*link);
            }
            self.phys_link
                .insert((*link, vlink.tenant), Arc::clone(vlink));
        }
    }

    /// Replace the physical path of a virtual link.
    pub fn relink(&self, path: &[PhysicalLink], vlink: &Arc<OvxLink>) {
        self.remove_link(vlink);
        self.add_links(path, vlink);
    }

    pub fn remove_link(&self, vlink: &OvxLink) {
        if let Some((_, backing)) = self.virt_link.remove(&(vlink.tenant, vlink.link_id)) {
            for link in backing {
                self.phys_link.remove(&(link, vlink.tenant));
            }
        }
    }

    pub fn get_virtual_link(
        &self,
        link: PhysicalLink,
        tenant: TenantId,
    ) -> Result<Arc<OvxLink>, MapError> {
        self.phys_link
            .get(&(link, tenant))
            .map(|l| Arc::clone(&l))
            .ok_or(MapError::NotMapped("physical link"))
    }

    pub fn get_physical_links(&self, vlink: &OvxLink) -> Result<Vec<PhysicalLink>, MapError> {
        self.virt_link
            .get(&(vlink.tenant, vlink.link_id))
            .map(|v| v.clone())
            .ok_or(MapError::NotMapped("virtual link"))
    }

    /// Map a tenant-visible address to a wire address, allocating one with
    /// `alloc` the first time. Later calls return the first allocation;
    /// the look-up-or-create is atomic per key.
    pub fn add_ip(&self, virt: OvxIpAddr, alloc: impl FnOnce() -> Ipv4Addr) -> Ipv4Addr {
        let phys = *self.virt_ip.entry(virt).or_insert_with(alloc);
        self.phys_ip.insert(
            PhysIpAddr {
                tenant: virt.tenant,
                ip: phys,
            },
            virt.ip,
        );
        phys
    }

    #[must_use]
    pub fn get_physical_ip(&self, virt: OvxIpAddr) -> Option<Ipv4Addr> {
        self.virt_ip.get(&virt).map(|ip| *ip)
    }

    #[must_use]
    pub fn get_virtual_ip(&self, phys: PhysIpAddr) -> Option<Ipv4Addr> {
        self.phys_ip.get(&phys).map(|ip| *ip)
    }

    /// Claim a host MAC for a tenant. Fails if any tenant already owns it.
    pub fn add_mac(&self, mac: Mac, tenant: TenantId) -> Result<(), MapError> {
        match self.macs.entry(mac) {
            Entry::Occupied(_) => Err(MapError::DuplicateMac(mac)),
            Entry::Vacant(slot) => {
                slot.insert(tenant);
                Ok(())
            }
        }
    }

    pub fn remove_mac(&self, mac: Mac) {
        self.macs.remove(&mac);
    }

    #[must_use]
    pub fn tenant_for_mac(&self, mac: Mac) -> Option<TenantId> {
        self.macs.get(&mac).map(|t| *t)
    }

    /// All virtual switches of one tenant, deduped (a big switch appears
    /// under each of its physical members).
    #[must_use]
    pub fn list_virtual_switches(&self, tenant: TenantId) -> Vec<Arc<OvxSwitch>> {
        let mut out: Vec<Arc<OvxSwitch>> = Vec::new();
        for entry in &self.phys_switch {
            let (_, t) = *entry.key();
            if t == tenant && !out.iter().any(|s| s.dpid == entry.value().dpid) {
                out.push(Arc::clone(entry.value()));
            }
        }
        out.sort_by_key(|s| s.dpid);
        out
    }

    /// All virtual links of one tenant, deduped across their physical hops.
    #[must_use]
    pub fn list_virtual_links(&self, tenant: TenantId) -> Vec<Arc<OvxLink>> {
        let mut out: Vec<Arc<OvxLink>> = Vec::new();
        for entry in &self.phys_link {
            let (_, t) = *entry.key();
            if t == tenant && !out.iter().any(|l| l.link_id == entry.value().link_id) {
                out.push(Arc::clone(entry.value()));
            }
        }
        out.sort_by_key(|l| l.link_id);
        out
    }

    /// Wipe everything but keep the tenant counter running, so ids are
    /// still never reused. Test isolation hook.
    pub fn reset(&self) {
        self.networks.clear();
        self.virt_switch.clear();
        self.phys_switch.clear();
        self.virt_link.clear();
        self.phys_link.clear();
        self.virt_ip.clear();
        self.phys_ip.clear();
        self.macs.clear();
    }
}

impl std::fmt::Debug for OvxMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OvxMap")
            .field("networks", &self.networks.len())
            .field("switch_mappings", &self.phys_switch.len())
            .field("link_mappings", &self.phys_link.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::RecordingChannel;
    use crate::port::PortLocator;
    use crate::switch::SwitchKind;
    use pretty_assertions::assert_eq;

    fn vswitch(tenant: TenantId, dpid: u64, phys: u64) -> Arc<OvxSwitch> {
        Arc::new(OvxSwitch::new(
            tenant,
            dpid,
            SwitchKind::Single { phys_dpid: phys },
            Arc::new(RecordingChannel::new("ctrl")),
        ))
    }

    #[test]
    fn switch_mapping_both_ways() {
        let map = OvxMap::new();
        let sw = vswitch(1, 0x100, 7);
        map.add_switches(&[7], &sw);
        let found = map.get_virtual_switch(7, 1).unwrap();
        assert_eq!(found.dpid, 0x100);
        assert_eq!(map.get_physical_switches(&sw).unwrap(), vec![7]);
        assert!(matches!(
            map.get_virtual_switch(7, 2),
            Err(MapError::NoVirtualSwitch { dpid: 7, tenant: 2 })
        ));
    }

    #[test]
    fn switch_mapping_is_idempotent() {
        let map = OvxMap::new();
        let sw = vswitch(1, 0x100, 7);
        map.add_switches(&[7], &sw);
        map.add_switches(&[7], &sw);
        assert_eq!(map.get_physical_switches(&sw).unwrap(), vec![7]);
    }

    #[test]
    fn ip_allocation_is_idempotent() {
        let map = OvxMap::new();
        let virt = OvxIpAddr {
            tenant: 1,
            ip: Ipv4Addr::new(10, 0, 0, 5),
        };
        let first = map.add_ip(virt, || Ipv4Addr::new(1, 0, 0, 1));
        let second = map.add_ip(virt, || Ipv4Addr::new(1, 0, 0, 2));
        assert_eq!(first, second);
        assert_eq!(map.get_physical_ip(virt), Some(first));
        assert_eq!(
            map.get_virtual_ip(PhysIpAddr {
                tenant: 1,
                ip: first
            }),
            Some(virt.ip)
        );
    }

    #[test]
    fn mac_claims_are_exclusive() {
        let map = OvxMap::new();
        let mac = Mac([0, 0, 0, 0, 0, 1]);
        map.add_mac(mac, 1).unwrap();
        assert_eq!(map.add_mac(mac, 2), Err(MapError::DuplicateMac(mac)));
        assert_eq!(map.tenant_for_mac(mac), Some(1));
    }

    #[test]
    fn listing_dedupes_big_switches() {
        let map = OvxMap::new();
        let sw = vswitch(1, 0x100, 0);
        map.add_switches(&[1, 2, 3], &sw);
        assert_eq!(map.list_virtual_switches(1).len(), 1);
        assert_eq!(map.get_physical_switches(&sw).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn remove_network_clears_tenant_state() {
        let map = OvxMap::new();
        let tenant = map.next_tenant_id().unwrap();
        assert_eq!(tenant, 1);
        let network = Arc::new(crate::network::OvxNetwork::new(
            tenant,
            "tcp",
            "127.0.0.1",
            6633,
            "10.0.0.0/8".parse().unwrap(),
            Arc::new(RecordingChannel::new("ctrl")),
        ));
        map.add_network(Arc::clone(&network));

        let sw = vswitch(tenant, 0x100, 7);
        map.add_switches(&[7], &sw);
        map.add_mac(Mac([0, 0, 0, 0, 0, 1]), tenant).unwrap();
        let link = Arc::new(OvxLink::new(
            tenant,
            2,
            PortLocator::new(0x100, 1),
            PortLocator::new(0x100, 2),
            vec![],
        ));
        map.add_links(
            &[PhysicalLink::new(
                PortLocator::new(7, 1),
                PortLocator::new(8, 1),
            )],
            &link,
        );
        assert_eq!(map.list_virtual_links(tenant).len(), 1);

        map.remove_network(tenant).unwrap();
        assert!(map.get_virtual_network(tenant).is_err());
        assert!(map.get_virtual_switch(7, tenant).is_err());
        assert!(map.list_virtual_links(tenant).is_empty());
        assert_eq!(map.tenant_for_mac(Mac([0, 0, 0, 0, 0, 1])), None);
        // ids keep moving after a reset of the state
        assert_eq!(map.next_tenant_id().unwrap(), 2);
    }

    #[test]
    fn tenant_ids_stop_at_the_address_space() {
        let map = OvxMap::new();
        for expected in 1..=MAX_TENANT_ID {
            assert_eq!(map.next_tenant_id().unwrap(), expected);
        }
        assert_eq!(map.next_tenant_id(), Err(MapError::TenantSpaceExhausted));
        assert_eq!(map.next_tenant_id(), Err(MapError::TenantSpaceExhausted));
    }
}
