// SPDX-License-Identifier: Apache-2.0
// Copyright OpenVirteX Authors

//! The OpenFlow 1.0 actions the hypervisor reads and rewrites.

use std::net::Ipv4Addr;

use byteorder::{BigEndian, WriteBytesExt};

use crate::eth::Mac;

const TYPE_OUTPUT: u16 = 0;
const TYPE_SET_VLAN_ID: u16 = 1;
const TYPE_STRIP_VLAN: u16 = 3;
const TYPE_SET_DL_SRC: u16 = 4;
const TYPE_SET_DL_DST: u16 = 5;
const TYPE_SET_NW_SRC: u16 = 6;
const TYPE_SET_NW_DST: u16 = 7;

/// An action of an OpenFlow 1.0 action list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Output { port: u16, max_len: u16 },
    SetVlanId { vid: u16 },
    StripVlan,
    SetDlSrc { mac: Mac },
    SetDlDst { mac: Mac },
    SetNwSrc { ip: Ipv4Addr },
    SetNwDst { ip: Ipv4Addr },
}

impl Action {
    /// Wire length of this action, padding included.
    #[must_use]
    pub const fn wire_len(&self) -> u16 {
        match self {
            Action::Output { .. } | Action::SetVlanId { .. } | Action::StripVlan => 8,
            Action::SetDlSrc { .. } | Action::SetDlDst { .. } => 16,
            Action::SetNwSrc { .. } | Action::SetNwDst { .. } => 8,
        }
    }

    /// Serialize the action as it would appear on the wire. Used when a
    /// rejected action has to be echoed back inside an error reply.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let len = self.wire_len();
        let mut bytes = Vec::with_capacity(usize::from(len));
        let kind = match self {
            Action::Output { .. } => TYPE_OUTPUT,
            Action::SetVlanId { .. } => TYPE_SET_VLAN_ID,
            Action::StripVlan => TYPE_STRIP_VLAN,
            Action::SetDlSrc { .. } => TYPE_SET_DL_SRC,
            Action::SetDlDst { .. } => TYPE_SET_DL_DST,
            Action::SetNwSrc { .. } => TYPE_SET_NW_SRC,
            Action::SetNwDst { .. } => TYPE_SET_NW_DST,
        };
        bytes.write_u16::<BigEndian>(kind).expect("vec write");
        bytes.write_u16::<BigEndian>(len).expect("vec write");
        match *self {
            Action::Output { port, max_len } => {
                bytes.write_u16::<BigEndian>(port).expect("vec write");
                bytes.write_u16::<BigEndian>(max_len).expect("vec write");
            }
            Action::SetVlanId { vid } => {
                bytes.write_u16::<BigEndian>(vid).expect("vec write");
                bytes.extend_from_slice(&[0; 2]);
            }
            Action::StripVlan => bytes.extend_from_slice(&[0; 4]),
            Action::SetDlSrc { mac } | Action::SetDlDst { mac } => {
                bytes.extend_from_slice(&mac.0);
                bytes.extend_from_slice(&[0; 6]);
            }
            Action::SetNwSrc { ip } | Action::SetNwDst { ip } => {
                bytes.extend_from_slice(&ip.octets());
            }
        }
        bytes
    }
}

/// Total wire length of an action list.
#[must_use]
pub fn actions_len(actions: &[Action]) -> u16 {
    actions.iter().map(Action::wire_len).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn wire_lengths() {
        assert_eq!(Action::Output { port: 1, max_len: 0 }.wire_len(), 8);
        assert_eq!(Action::SetDlSrc { mac: Mac::ZERO }.wire_len(), 16);
        let list = [
            Action::SetDlDst { mac: Mac::ZERO },
            Action::SetVlanId { vid: 7 },
            Action::Output { port: 2, max_len: 0 },
        ];
        assert_eq!(actions_len(&list), 32);
    }

    #[test]
    fn output_serialized_form() {
        let bytes = Action::Output {
            port: 0xfffb,
            max_len: 128,
        }
        .serialize();
        assert_eq!(bytes, vec![0, 0, 0, 8, 0xff, 0xfb, 0, 128]);
    }
}
