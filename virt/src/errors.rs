// SPDX-License-Identifier: Apache-2.0
// Copyright OpenVirteX Authors

use elements::MapError;
use net::vlan::InvalidVid;
use thiserror::Error;

/// Outcome of translating a single controller-issued action or message.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VirtError {
    /// The action names a virtual port the tenant does not own. The
    /// offending message is rejected with an OpenFlow error reply.
    #[error("no port {port} on virtual switch {dpid:#x}")]
    Denied { dpid: u64, port: u16 },

    /// The message was consumed internally, typically because it was
    /// answered on the tenant's behalf. No error reply is sent.
    #[error("message handled internally")]
    Dropped,

    #[error(transparent)]
    Map(#[from] MapError),

    /// A link or route id has outgrown the 12-bit VLAN tag space.
    #[error(transparent)]
    Tag(#[from] InvalidVid),
}
