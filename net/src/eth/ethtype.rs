// SPDX-License-Identifier: Apache-2.0
// Copyright OpenVirteX Authors

//! `EthType` wrapper and the ethertypes the hypervisor inspects.

use std::fmt::Display;

/// An ethertype as found in an ethernet header.
#[repr(transparent)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct EthType(pub u16);

impl EthType {
    pub const IPV4: EthType = EthType(0x0800);
    pub const ARP: EthType = EthType(0x0806);
    pub const VLAN: EthType = EthType(0x8100);
    pub const LLDP: EthType = EthType(0x88cc);

    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }
}

impl From<u16> for EthType {
    fn from(value: u16) -> Self {
        EthType(value)
    }
}

impl Display for EthType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{:04x}", self.0)
    }
}
