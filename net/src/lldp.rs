// SPDX-License-Identifier: Apache-2.0
// Copyright OpenVirteX Authors

//! LLDP probe codec for physical link discovery.
//!
//! Probes carry exactly what the discovery engine needs to identify the
//! sending attachment point: the dpid in the chassis-id TLV and the port
//! number in the port-id TLV. Anything else in a received LLDP frame is
//! skipped, and frames that are not our probes fail validation.

use byteorder::{BigEndian, WriteBytesExt};

use crate::arp::ETH_HEADER_LEN;
use crate::eth::{EthType, Mac};

/// The LLDP nearest-bridge multicast address probes are sent to.
pub const LLDP_DST: Mac = Mac([0x01, 0x80, 0xc2, 0x00, 0x00, 0x0e]);

const TLV_END: u8 = 0;
const TLV_CHASSIS_ID: u8 = 1;
const TLV_PORT_ID: u8 = 2;
const TLV_TTL: u8 = 3;

// IEEE 802.1AB subtype "locally assigned"
const SUBTYPE_LOCAL: u8 = 7;

const PROBE_TTL_SECS: u16 = 120;

/// The (dpid, port) attachment point decoded from an LLDP probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DpidPort {
    pub dpid: u64,
    pub port: u16,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LldpError {
    #[error("not an LLDP probe")]
    NotLldp,
    #[error("malformed LLDP TLV structure")]
    BadTlv,
    #[error("probe is missing chassis or port TLV")]
    MissingTlv,
}

fn push_tlv(bytes: &mut Vec<u8>, tlv_type: u8, value: &[u8]) {
    debug_assert!(value.len() < 0x1ff);
    let head = (u16::from(tlv_type) << 9) | value.len() as u16;
    bytes.write_u16::<BigEndian>(head).expect("vec write");
    bytes.extend_from_slice(value);
}

/// Build an LLDP probe frame for the given attachment point.
#[must_use]
pub fn build_lldp(src_mac: Mac, dpid: u64, port: u16) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(ETH_HEADER_LEN + 32);
    bytes.extend_from_slice(&LLDP_DST.0);
    bytes.extend_from_slice(&src_mac.0);
    bytes.extend_from_slice(&EthType::LLDP.as_u16().to_be_bytes());

    let mut chassis = Vec::with_capacity(9);
    chassis.push(SUBTYPE_LOCAL);
    chassis.extend_from_slice(&dpid.to_be_bytes());
    push_tlv(&mut bytes, TLV_CHASSIS_ID, &chassis);

    let mut port_id = Vec::with_capacity(3);
    port_id.push(SUBTYPE_LOCAL);
    port_id.extend_from_slice(&port.to_be_bytes());
    push_tlv(&mut bytes, TLV_PORT_ID, &port_id);

    push_tlv(&mut bytes, TLV_TTL, &PROBE_TTL_SECS.to_be_bytes());
    push_tlv(&mut bytes, TLV_END, &[]);
    bytes
}

/// Quick validation: is this frame one of our LLDP probes?
#[must_use]
pub fn check_lldp(bytes: &[u8]) -> bool {
    bytes.len() > ETH_HEADER_LEN
        && bytes[0..6] == LLDP_DST.0
        && u16::from_be_bytes([bytes[12], bytes[13]]) == EthType::LLDP.as_u16()
}

/// Decode the sending attachment point from an LLDP probe frame.
pub fn parse_lldp(bytes: &[u8]) -> Result<DpidPort, LldpError> {
    if !check_lldp(bytes) {
        return Err(LldpError::NotLldp);
    }
    let mut dpid = None;
    let mut port = None;
    let mut off = ETH_HEADER_LEN;
    loop {
        if off + 2 > bytes.len() {
            return Err(LldpError::BadTlv);
        }
        let head = u16::from_be_bytes([bytes[off], bytes[off + 1]]);
        let tlv_type = (head >> 9) as u8;
        let tlv_len = (head & 0x1ff) as usize;
        off += 2;
        if off + tlv_len > bytes.len() {
            return Err(LldpError::BadTlv);
        }
        let value = &bytes[off..off + tlv_len];
        off += tlv_len;
        match tlv_type {
            TLV_END => break,
            TLV_CHASSIS_ID if tlv_len == 9 && value[0] == SUBTYPE_LOCAL => {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(&value[1..9]);
                dpid = Some(u64::from_be_bytes(raw));
            }
            TLV_PORT_ID if tlv_len == 3 && value[0] == SUBTYPE_LOCAL => {
                port = Some(u16::from_be_bytes([value[1], value[2]]));
            }
            _ => {} // TTL and optional TLVs carry nothing we need
        }
    }
    match (dpid, port) {
        (Some(dpid), Some(port)) => Ok(DpidPort { dpid, port }),
        _ => Err(LldpError::MissingTlv),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn probe_round_trip() {
        let frame = build_lldp(Mac([0, 1, 2, 3, 4, 5]), 0xdeadbeefcafe, 7);
        assert!(check_lldp(&frame));
        let dp = parse_lldp(&frame).unwrap();
        assert_eq!(
            dp,
            DpidPort {
                dpid: 0xdeadbeefcafe,
                port: 7
            }
        );
    }

    #[test]
    fn non_lldp_rejected() {
        let mut frame = build_lldp(Mac([0, 1, 2, 3, 4, 5]), 1, 1);
        frame[12] = 0x08; // now an IPv4 ethertype
        frame[13] = 0x00;
        assert!(!check_lldp(&frame));
        assert_eq!(parse_lldp(&frame), Err(LldpError::NotLldp));
    }

    #[test]
    fn truncated_tlv_rejected() {
        let frame = build_lldp(Mac([0, 1, 2, 3, 4, 5]), 1, 1);
        assert_eq!(parse_lldp(&frame[..frame.len() - 3]), Err(LldpError::BadTlv));
    }
}
