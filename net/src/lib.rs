// SPDX-License-Identifier: Apache-2.0
// Copyright OpenVirteX Authors

//! Wire types shared by the hypervisor core: ethernet addressing, ARP and
//! LLDP codecs, and the OpenFlow 1.0 subset the control plane rewrites.

pub mod arp;
pub mod eth;
pub mod lldp;
pub mod openflow;
pub mod vlan;
