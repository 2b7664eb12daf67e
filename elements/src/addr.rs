// SPDX-License-Identifier: Apache-2.0
// Copyright OpenVirteX Authors

//! Tenant identity and the tenant-scoped address pair used by the IP
//! translation tables.

use std::fmt::Display;
use std::net::Ipv4Addr;

/// Identifier of one virtual network. Assigned from a process-wide counter
/// and never reused within a process lifetime.
pub type TenantId = u32;

/// How many leading bits of an allocated wire address identify the tenant.
/// The remaining bits are the per-tenant host counter.
pub const TENANT_ADDR_BITS: u32 = 8;

/// Largest tenant id that fits the wire address format.
pub const MAX_TENANT_ID: TenantId = (1 << TENANT_ADDR_BITS) - 1;

/// A tenant-visible IPv4 address. The same address value may exist in many
/// tenants at once; the pair is the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OvxIpAddr {
    pub tenant: TenantId,
    pub ip: Ipv4Addr,
}

/// An address actually carried on the physical wire, owned by the tenant it
/// was allocated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PhysIpAddr {
    pub tenant: TenantId,
    pub ip: Ipv4Addr,
}

impl Display for OvxIpAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@tenant{}", self.ip, self.tenant)
    }
}

impl Display for PhysIpAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}(phys,tenant{})", self.ip, self.tenant)
    }
}
