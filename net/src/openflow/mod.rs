// SPDX-License-Identifier: Apache-2.0
// Copyright OpenVirteX Authors

//! The OpenFlow 1.0 subset the hypervisor reads and rewrites.
//!
//! Full wire framing lives in the protocol channel outside the core; here
//! messages are plain structs whose lengths mirror the 1.0 wire format so
//! that rewritten messages carry correct length fields.

pub mod action;
pub mod matchfields;
pub mod message;
pub mod port;
pub mod wildcards;

pub use action::Action;
pub use matchfields::OfMatch;
pub use message::{
    FeaturesReply, FlowMod, FlowModCommand, OfError, OfMessage, PacketIn, PacketInReason,
    PacketOut, PortDesc, NO_BUFFER,
};
pub use port::OfPort;
pub use wildcards::{Flag, Wildcards};
