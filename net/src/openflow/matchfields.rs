// SPDX-License-Identifier: Apache-2.0
// Copyright OpenVirteX Authors

//! The OpenFlow 1.0 match structure and packet-to-match loading.

use std::net::Ipv4Addr;

use crate::arp::{ArpPacket, EthernetFrame};
use crate::eth::{EthType, Mac};
use crate::openflow::wildcards::{Flag, Wildcards};

/// Wire length of an OpenFlow 1.0 match.
pub const MATCH_LEN: u16 = 40;

/// No VLAN tag present.
pub const VLAN_NONE: u16 = 0xffff;

/// An OpenFlow 1.0 twelve-tuple match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OfMatch {
    pub wildcards: Wildcards,
    pub in_port: u16,
    pub dl_src: Mac,
    pub dl_dst: Mac,
    pub dl_vlan: u16,
    pub dl_vlan_pcp: u8,
    pub dl_type: u16,
    pub nw_tos: u8,
    pub nw_proto: u8,
    pub nw_src: Ipv4Addr,
    pub nw_dst: Ipv4Addr,
    pub tp_src: u16,
    pub tp_dst: u16,
}

impl Default for OfMatch {
    fn default() -> Self {
        OfMatch {
            wildcards: Wildcards::all(),
            in_port: 0,
            dl_src: Mac::ZERO,
            dl_dst: Mac::ZERO,
            dl_vlan: VLAN_NONE,
            dl_vlan_pcp: 0,
            dl_type: 0,
            nw_tos: 0,
            nw_proto: 0,
            nw_src: Ipv4Addr::UNSPECIFIED,
            nw_dst: Ipv4Addr::UNSPECIFIED,
            tp_src: 0,
            tp_dst: 0,
        }
    }
}

impl OfMatch {
    /// Load an exact match from a raw packet, the way switches populate the
    /// match of a packet-in. Fields of layers the packet does not carry
    /// stay wildcarded.
    #[must_use]
    pub fn from_packet(bytes: &[u8], in_port: u16) -> Self {
        let mut m = OfMatch {
            in_port,
            wildcards: Wildcards::all().match_on(Flag::InPort),
            ..OfMatch::default()
        };
        let Ok(eth) = EthernetFrame::parse(bytes) else {
            return m;
        };
        m.dl_src = eth.src;
        m.dl_dst = eth.dst;
        m.dl_type = eth.ethertype.as_u16();
        m.wildcards = m
            .wildcards
            .match_on(Flag::DlSrc)
            .match_on(Flag::DlDst)
            .match_on(Flag::DlType);
        if let Some(vid) = eth.vlan {
            m.dl_vlan = vid;
            m.wildcards = m.wildcards.match_on(Flag::DlVlan);
        }
        match eth.ethertype {
            EthType::ARP => {
                if let Ok(arp) = ArpPacket::parse(&eth.payload) {
                    // the ARP opcode rides in nw_proto per OF 1.0
                    m.nw_proto = arp.opcode as u8;
                    m.nw_src = arp.sender_ip;
                    m.nw_dst = arp.target_ip;
                    m.wildcards = m
                        .wildcards
                        .match_on(Flag::NwProto)
                        .match_on(Flag::NwSrc)
                        .match_on(Flag::NwDst);
                }
            }
            EthType::IPV4 => {
                if eth.payload.len() >= 20 {
                    let p = &eth.payload;
                    m.nw_tos = p[1];
                    m.nw_proto = p[9];
                    m.nw_src = Ipv4Addr::new(p[12], p[13], p[14], p[15]);
                    m.nw_dst = Ipv4Addr::new(p[16], p[17], p[18], p[19]);
                    m.wildcards = m
                        .wildcards
                        .match_on(Flag::NwTos)
                        .match_on(Flag::NwProto)
                        .match_on(Flag::NwSrc)
                        .match_on(Flag::NwDst);
                    let ihl = usize::from(p[0] & 0x0f) * 4;
                    // TCP and UDP ports live at the same offsets
                    if (m.nw_proto == 6 || m.nw_proto == 17) && p.len() >= ihl + 4 {
                        m.tp_src = u16::from_be_bytes([p[ihl], p[ihl + 1]]);
                        m.tp_dst = u16::from_be_bytes([p[ihl + 2], p[ihl + 3]]);
                        m.wildcards = m.wildcards.match_on(Flag::TpSrc).match_on(Flag::TpDst);
                    }
                }
            }
            _ => {}
        }
        m
    }

    #[must_use]
    pub fn is_arp(&self) -> bool {
        self.dl_type == EthType::ARP.as_u16()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arp::{build_arp, ARP_OP_REQUEST};
    use pretty_assertions::assert_eq;

    #[test]
    fn match_from_arp() {
        let pkt = build_arp(
            ARP_OP_REQUEST,
            Mac([0, 0, 0, 0, 0, 1]),
            Ipv4Addr::new(10, 0, 0, 1),
            Mac::BROADCAST,
            Ipv4Addr::new(10, 0, 0, 2),
        );
        let m = OfMatch::from_packet(&pkt, 3);
        assert_eq!(m.in_port, 3);
        assert!(m.is_arp());
        assert_eq!(m.nw_src, Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(m.nw_dst, Ipv4Addr::new(10, 0, 0, 2));
        assert!(!m.wildcards.is_wildcarded(Flag::NwDst));
        assert!(m.wildcards.is_wildcarded(Flag::TpSrc));
    }

    #[test]
    fn match_from_short_packet_stays_wild() {
        let m = OfMatch::from_packet(&[0u8; 6], 1);
        assert_eq!(m.in_port, 1);
        assert!(m.wildcards.is_wildcarded(Flag::DlSrc));
        assert!(m.wildcards.is_wildcarded(Flag::NwDst));
    }
}
