// SPDX-License-Identifier: Apache-2.0
// Copyright OpenVirteX Authors

//! Minimal ethernet and ARP codecs.
//!
//! The hypervisor never forwards payloads it does not understand; it only
//! needs enough of the ethernet and ARP layout to synthesize unicast ARP
//! answers for virtualized point-to-point links and to classify packets
//! when loading an OpenFlow match from raw bytes.

use byteorder::{BigEndian, WriteBytesExt};
use std::net::Ipv4Addr;

use crate::eth::{EthType, Mac};

/// Length of an untagged ethernet header.
pub const ETH_HEADER_LEN: usize = 14;
/// Length of an ARP payload for IPv4 over ethernet.
pub const ARP_LEN: usize = 28;

pub const ARP_OP_REQUEST: u16 = 1;
pub const ARP_OP_REPLY: u16 = 2;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("packet too short: have {have} bytes, need {need}")]
    Truncated { have: usize, need: usize },
    #[error("unexpected ethertype {0}")]
    WrongEthType(EthType),
    #[error("unsupported ARP hardware/protocol type")]
    UnsupportedArp,
}

/// An ethernet frame split into header fields and an opaque payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EthernetFrame {
    pub dst: Mac,
    pub src: Mac,
    /// VLAN tag, if the frame carried an 802.1q header.
    pub vlan: Option<u16>,
    pub ethertype: EthType,
    pub payload: Vec<u8>,
}

impl EthernetFrame {
    /// Parse a frame, stripping one optional 802.1q tag.
    pub fn parse(bytes: &[u8]) -> Result<Self, CodecError> {
        if bytes.len() < ETH_HEADER_LEN {
            return Err(CodecError::Truncated {
                have: bytes.len(),
                need: ETH_HEADER_LEN,
            });
        }
        let dst = Mac([bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5]]);
        let src = Mac([bytes[6], bytes[7], bytes[8], bytes[9], bytes[10], bytes[11]]);
        let mut ethertype = EthType(u16::from_be_bytes([bytes[12], bytes[13]]));
        let mut offset = ETH_HEADER_LEN;
        let mut vlan = None;
        if ethertype == EthType::VLAN {
            if bytes.len() < ETH_HEADER_LEN + 4 {
                return Err(CodecError::Truncated {
                    have: bytes.len(),
                    need: ETH_HEADER_LEN + 4,
                });
            }
            vlan = Some(u16::from_be_bytes([bytes[14], bytes[15]]) & 0x0fff);
            ethertype = EthType(u16::from_be_bytes([bytes[16], bytes[17]]));
            offset += 4;
        }
        Ok(EthernetFrame {
            dst,
            src,
            vlan,
            ethertype,
            payload: bytes[offset..].to_vec(),
        })
    }

    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(ETH_HEADER_LEN + 4 + self.payload.len());
        bytes.extend_from_slice(&self.dst.0);
        bytes.extend_from_slice(&self.src.0);
        if let Some(vid) = self.vlan {
            bytes.extend_from_slice(&EthType::VLAN.as_u16().to_be_bytes());
            bytes.extend_from_slice(&(vid & 0x0fff).to_be_bytes());
        }
        bytes.extend_from_slice(&self.ethertype.as_u16().to_be_bytes());
        bytes.extend_from_slice(&self.payload);
        bytes
    }
}

/// An IPv4-over-ethernet ARP payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArpPacket {
    pub opcode: u16,
    pub sender_mac: Mac,
    pub sender_ip: Ipv4Addr,
    pub target_mac: Mac,
    pub target_ip: Ipv4Addr,
}

impl ArpPacket {
    pub fn parse(bytes: &[u8]) -> Result<Self, CodecError> {
        if bytes.len() < ARP_LEN {
            return Err(CodecError::Truncated {
                have: bytes.len(),
                need: ARP_LEN,
            });
        }
        let htype = u16::from_be_bytes([bytes[0], bytes[1]]);
        let ptype = u16::from_be_bytes([bytes[2], bytes[3]]);
        if htype != 1 || ptype != EthType::IPV4.as_u16() || bytes[4] != 6 || bytes[5] != 4 {
            return Err(CodecError::UnsupportedArp);
        }
        let opcode = u16::from_be_bytes([bytes[6], bytes[7]]);
        let mac_at = |off: usize| {
            Mac([
                bytes[off],
                bytes[off + 1],
                bytes[off + 2],
                bytes[off + 3],
                bytes[off + 4],
                bytes[off + 5],
            ])
        };
        let ip_at = |off: usize| {
            Ipv4Addr::new(bytes[off], bytes[off + 1], bytes[off + 2], bytes[off + 3])
        };
        let sender_mac = mac_at(8);
        let sender_ip = ip_at(14);
        let target_mac = mac_at(18);
        let target_ip = ip_at(24);
        Ok(ArpPacket {
            opcode,
            sender_mac,
            sender_ip,
            target_mac,
            target_ip,
        })
    }

    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(ARP_LEN);
        bytes.write_u16::<BigEndian>(1).expect("vec write");
        bytes
            .write_u16::<BigEndian>(EthType::IPV4.as_u16())
            .expect("vec write");
        bytes.push(6);
        bytes.push(4);
        bytes.write_u16::<BigEndian>(self.opcode).expect("vec write");
        bytes.extend_from_slice(&self.sender_mac.0);
        bytes.extend_from_slice(&self.sender_ip.octets());
        bytes.extend_from_slice(&self.target_mac.0);
        bytes.extend_from_slice(&self.target_ip.octets());
        bytes
    }

    /// Build a complete ethernet frame carrying this ARP payload, addressed
    /// at the link layer with the ARP's own sender/target addresses.
    #[must_use]
    pub fn into_frame(self) -> Vec<u8> {
        EthernetFrame {
            dst: self.target_mac,
            src: self.sender_mac,
            vlan: None,
            ethertype: EthType::ARP,
            payload: self.serialize(),
        }
        .serialize()
    }
}

/// Build a unicast ARP frame with the given opcode.
#[must_use]
pub fn build_arp(
    opcode: u16,
    sender_mac: Mac,
    sender_ip: Ipv4Addr,
    target_mac: Mac,
    target_ip: Ipv4Addr,
) -> Vec<u8> {
    ArpPacket {
        opcode,
        sender_mac,
        sender_ip,
        target_mac,
        target_ip,
    }
    .into_frame()
}
