// SPDX-License-Identifier: Apache-2.0
// Copyright OpenVirteX Authors

//! The OpenFlow 1.0 messages the hypervisor rewrites or synthesizes.

use crate::openflow::action::{actions_len, Action};
use crate::openflow::matchfields::{OfMatch, MATCH_LEN};

/// Length of the common OpenFlow header.
pub const HEADER_LEN: u16 = 8;
/// `buffer_id` value meaning the full packet rides in the message.
pub const NO_BUFFER: u32 = 0xffff_ffff;

/// Minimum wire length of a packet-in, header included.
pub const PACKET_IN_MIN_LEN: u16 = 18;
/// Minimum wire length of a packet-out, header included.
pub const PACKET_OUT_MIN_LEN: u16 = 16;
/// Wire length of a flow-mod with an empty action list.
pub const FLOW_MOD_MIN_LEN: u16 = 72;
/// Wire length of a features-reply with no ports.
pub const FEATURES_REPLY_MIN_LEN: u16 = 32;
/// Wire length of one physical port description.
pub const PORT_DESC_LEN: u16 = 48;
/// Minimum wire length of an error, header included.
pub const ERROR_MIN_LEN: u16 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketInReason {
    NoMatch,
    Action,
}

/// A packet handed up to a controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketIn {
    pub buffer_id: u32,
    pub total_len: u16,
    pub in_port: u16,
    pub reason: PacketInReason,
    pub data: Vec<u8>,
}

impl PacketIn {
    /// Wire length, header included.
    #[must_use]
    pub fn length(&self) -> u16 {
        PACKET_IN_MIN_LEN + self.data.len() as u16
    }
}

/// A packet a controller asks a switch to emit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketOut {
    pub buffer_id: u32,
    pub in_port: u16,
    pub actions: Vec<Action>,
    pub data: Vec<u8>,
}

impl PacketOut {
    #[must_use]
    pub fn actions_len(&self) -> u16 {
        actions_len(&self.actions)
    }

    /// Wire length, header included. Recomputed whenever the action list
    /// or payload has been rewritten.
    #[must_use]
    pub fn length(&self) -> u16 {
        PACKET_OUT_MIN_LEN + self.actions_len() + self.data.len() as u16
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowModCommand {
    Add,
    Modify,
    Delete,
}

impl FlowModCommand {
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        match self {
            FlowModCommand::Add => 0,
            FlowModCommand::Modify => 1,
            FlowModCommand::Delete => 3,
        }
    }
}

/// A flow table modification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowMod {
    pub command: FlowModCommand,
    pub of_match: OfMatch,
    pub cookie: u64,
    pub idle_timeout: u16,
    pub hard_timeout: u16,
    pub priority: u16,
    pub buffer_id: u32,
    pub out_port: u16,
    pub flags: u16,
    pub actions: Vec<Action>,
}

impl FlowMod {
    #[must_use]
    pub fn length(&self) -> u16 {
        FLOW_MOD_MIN_LEN + actions_len(&self.actions)
    }
}

/// One port entry of a features-reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortDesc {
    pub port_no: u16,
    pub hw_addr: crate::eth::Mac,
    pub name: String,
    pub config: u32,
    pub state: u32,
    pub current: u32,
    pub advertised: u32,
    pub supported: u32,
    pub peer: u32,
}

/// The switch description a controller receives on handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeaturesReply {
    pub dpid: u64,
    pub n_buffers: u32,
    pub n_tables: u8,
    pub capabilities: u32,
    pub actions: u32,
    pub ports: Vec<PortDesc>,
}

impl FeaturesReply {
    #[must_use]
    pub fn length(&self) -> u16 {
        FEATURES_REPLY_MIN_LEN + PORT_DESC_LEN * self.ports.len() as u16
    }
}

/// The error codes the hypervisor sends back to tenant controllers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OfError {
    /// `OFPET_BAD_REQUEST` / `OFPBRC_BAD_LEN`.
    BadRequestBadLen { data: Vec<u8> },
    /// `OFPET_BAD_REQUEST` / `OFPBRC_BUFFER_UNKNOWN`.
    BadRequestBufferUnknown { data: Vec<u8> },
    /// `OFPET_BAD_ACTION` / `OFPBAC_BAD_OUT_PORT`, echoing the offender.
    BadActionBadOutPort { data: Vec<u8> },
}

impl OfError {
    /// The `(type, code)` pair of this error on the wire.
    #[must_use]
    pub const fn type_code(&self) -> (u16, u16) {
        match self {
            OfError::BadRequestBadLen { .. } => (1, 6),
            OfError::BadRequestBufferUnknown { .. } => (1, 8),
            OfError::BadActionBadOutPort { .. } => (2, 4),
        }
    }

    #[must_use]
    pub fn data(&self) -> &[u8] {
        match self {
            OfError::BadRequestBadLen { data }
            | OfError::BadRequestBufferUnknown { data }
            | OfError::BadActionBadOutPort { data } => data,
        }
    }

    #[must_use]
    pub fn length(&self) -> u16 {
        ERROR_MIN_LEN + self.data().len() as u16
    }
}

/// A message travelling on a control channel, either direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OfMessage {
    PacketIn(PacketIn),
    PacketOut(PacketOut),
    FlowMod(FlowMod),
    FeaturesReply(FeaturesReply),
    Error(OfError),
}

impl OfMessage {
    /// Wire length of the message, header included.
    #[must_use]
    pub fn length(&self) -> u16 {
        match self {
            OfMessage::PacketIn(m) => m.length(),
            OfMessage::PacketOut(m) => m.length(),
            OfMessage::FlowMod(m) => m.length(),
            OfMessage::FeaturesReply(m) => m.length(),
            OfMessage::Error(m) => m.length(),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            OfMessage::PacketIn(_) => "packet-in",
            OfMessage::PacketOut(_) => "packet-out",
            OfMessage::FlowMod(_) => "flow-mod",
            OfMessage::FeaturesReply(_) => "features-reply",
            OfMessage::Error(_) => "error",
        }
    }
}

// keep the match length next to the flow-mod that embeds it
const _: () = assert!(FLOW_MOD_MIN_LEN == HEADER_LEN + MATCH_LEN + 24);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eth::Mac;
    use pretty_assertions::assert_eq;

    #[test]
    fn packet_out_length_tracks_rewrites() {
        let mut po = PacketOut {
            buffer_id: NO_BUFFER,
            in_port: 0xffff,
            actions: vec![Action::Output { port: 1, max_len: 0 }],
            data: vec![0; 60],
        };
        assert_eq!(po.length(), 16 + 8 + 60);
        po.actions.insert(0, Action::SetDlSrc { mac: Mac::ZERO });
        po.actions.insert(1, Action::SetVlanId { vid: 5 });
        assert_eq!(po.length(), 16 + 8 + 16 + 8 + 60);
    }

    #[test]
    fn features_reply_length() {
        let fr = FeaturesReply {
            dpid: 1,
            n_buffers: 256,
            n_tables: 1,
            capabilities: 0,
            actions: 0xfff,
            ports: vec![
                PortDesc {
                    port_no: 1,
                    hw_addr: Mac::ZERO,
                    name: "ovx-1".into(),
                    config: 0,
                    state: 0,
                    current: 0,
                    advertised: 0,
                    supported: 0,
                    peer: 0,
                };
                2
            ],
        };
        assert_eq!(fr.length(), 32 + 96);
    }

    #[test]
    fn error_codes() {
        let err = OfError::BadActionBadOutPort { data: vec![0; 8] };
        assert_eq!(err.type_code(), (2, 4));
        assert_eq!(err.length(), 20);
    }
}
