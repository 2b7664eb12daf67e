// SPDX-License-Identifier: Apache-2.0
// Copyright OpenVirteX Authors

//! Translation between the physical OpenFlow plane and per-tenant
//! virtual planes.
//!
//! Southbound, controller-issued messages are devirtualized: virtual
//! port numbers become physical ones, virtual addresses are rewritten
//! to their physical counterparts and output actions are expanded
//! against the tenant topology. Northbound, datapath events are
//! virtualized into the owning tenant's address space before they are
//! handed to its controller.

mod action;
mod dispatch;
mod errors;
mod packet_in;
mod packet_out;

pub use dispatch::{VirtContext, handle_physical, handle_virtual};
pub use errors::VirtError;
pub use packet_in::virtualize_packet_in;
pub use packet_out::devirtualize_packet_out;
