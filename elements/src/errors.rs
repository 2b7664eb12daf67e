// SPDX-License-Identifier: Apache-2.0
// Copyright OpenVirteX Authors

//! The error results used by this library.

use net::eth::Mac;
use thiserror::Error;

use crate::addr::TenantId;
use crate::port::PortLocator;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum MapError {
    #[error("no virtual network for tenant {0}")]
    UnknownTenant(TenantId),

    #[error("no virtual switch on physical dpid {dpid:#x} for tenant {tenant}")]
    NoVirtualSwitch { dpid: u64, tenant: TenantId },

    #[error("no mapping registered for {0}")]
    NotMapped(&'static str),

    #[error("physical port {0} already backs a virtual port of this tenant")]
    PortInUse(PortLocator),

    #[error("host MAC {0} is already connected in this network")]
    DuplicateMac(Mac),

    #[error("no switch with dpid {0:#x}")]
    NoSuchSwitch(u64),

    #[error("switch {dpid:#x} has no port {port}")]
    NoSuchPort { dpid: u64, port: u16 },

    #[error("no virtual link {link_id} for tenant {tenant}")]
    NoSuchLink { tenant: TenantId, link_id: u32 },

    #[error("switch {0:#x} has no free port numbers")]
    PortSpaceExhausted(u64),

    #[error("tenant id space exhausted")]
    TenantSpaceExhausted,

    #[error("switch {0:#x} is not a big switch")]
    NotBigSwitch(u64),

    #[error("no internal route between dpids {src:#x} and {dst:#x}")]
    NoRoute { src: u64, dst: u64 },
}
