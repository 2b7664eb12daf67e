// SPDX-License-Identifier: Apache-2.0
// Copyright OpenVirteX Authors

//! The hypervisor data model: physical switches, ports and links as seen on
//! the wire, the per-tenant virtual elements layered over them, and the
//! central [`map::OvxMap`] that ties the two worlds together.

pub mod addr;
pub mod bufmap;
pub mod channel;
pub mod errors;
pub mod link;
pub mod map;
pub mod network;
pub mod physical;
pub mod port;
pub mod routing;
pub mod switch;

pub use addr::{OvxIpAddr, PhysIpAddr, TenantId};
pub use channel::{ChannelError, ControlChannel, LoggingChannel};
#[cfg(any(test, feature = "testing"))]
pub use channel::RecordingChannel;
pub use errors::MapError;
pub use link::{OvxLink, PhysicalLink};
pub use map::OvxMap;
pub use network::OvxNetwork;
pub use physical::{PhysicalNetwork, PhysicalSwitch};
pub use port::{OvxPort, PhysicalPort, PortLocator};
pub use routing::{Routable, ShortestPath, SwitchRoute};
pub use switch::{OvxSwitch, SwitchKind};
