// SPDX-License-Identifier: Apache-2.0
// Copyright OpenVirteX Authors

//! Physical and virtual port descriptions.

use std::fmt::Display;

use net::eth::Mac;

use crate::addr::TenantId;

/// The process-wide identity of a physical port: which switch, which number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortLocator {
    pub dpid: u64,
    pub port: u16,
}

impl PortLocator {
    #[must_use]
    pub const fn new(dpid: u64, port: u16) -> Self {
        PortLocator { dpid, port }
    }
}

impl Display for PortLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}/{}", self.dpid, self.port)
    }
}

/// A port of a physical switch as reported in its features handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhysicalPort {
    pub locator: PortLocator,
    pub hw_addr: Mac,
    pub name: String,
}

/// A port of a tenant's virtual switch. Backed by exactly one physical port;
/// the same physical port may back ports of many tenants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OvxPort {
    pub tenant: TenantId,
    /// Virtual dpid of the owning switch.
    pub dpid: u64,
    pub number: u16,
    pub hw_addr: Mac,
    /// True while no virtual link is attached; edge ports face hosts.
    pub edge: bool,
    /// Id of the virtual link this port terminates, zero if none.
    pub link_id: u32,
    /// The physical port backing this one.
    pub phys: PortLocator,
}

impl OvxPort {
    #[must_use]
    pub fn locator(&self) -> PortLocator {
        PortLocator::new(self.dpid, self.number)
    }
}
