// SPDX-License-Identifier: Apache-2.0
// Copyright OpenVirteX Authors

//! Physical and virtual links.

use std::fmt::Display;
use std::sync::RwLock;

use crate::addr::TenantId;
use crate::port::PortLocator;

/// A directional physical adjacency discovered by probing. A bidirectional
/// cable shows up as two links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PhysicalLink {
    pub src: PortLocator,
    pub dst: PortLocator,
}

impl PhysicalLink {
    #[must_use]
    pub const fn new(src: PortLocator, dst: PortLocator) -> Self {
        PhysicalLink { src, dst }
    }

    /// The same cable seen from the other end.
    #[must_use]
    pub const fn reversed(self) -> Self {
        PhysicalLink {
            src: self.dst,
            dst: self.src,
        }
    }
}

impl Display for PhysicalLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.src, self.dst)
    }
}

/// One direction of a tenant's point-to-point virtual connection, realized
/// as an ordered path of physical links. The path can be reassigned after
/// creation.
#[derive(Debug)]
pub struct OvxLink {
    pub tenant: TenantId,
    pub link_id: u32,
    /// Virtual (dpid, port) the link leaves from.
    pub src: PortLocator,
    /// Virtual (dpid, port) the link arrives at.
    pub dst: PortLocator,
    path: RwLock<Vec<PhysicalLink>>,
}

impl OvxLink {
    #[must_use]
    pub fn new(
        tenant: TenantId,
        link_id: u32,
        src: PortLocator,
        dst: PortLocator,
        path: Vec<PhysicalLink>,
    ) -> Self {
        OvxLink {
            tenant,
            link_id,
            src,
            dst,
            path: RwLock::new(path),
        }
    }

    #[must_use]
    pub fn path(&self) -> Vec<PhysicalLink> {
        self.path.read().unwrap().clone()
    }

    /// Re-route the link over a new physical path.
    pub fn set_path(&self, path: Vec<PhysicalLink>) {
        *self.path.write().unwrap() = path;
    }
}
