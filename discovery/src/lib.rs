// SPDX-License-Identifier: Apache-2.0
// Copyright OpenVirteX Authors

//! Physical link discovery: per-switch LLDP probing state machines, their
//! periodic runner threads, and the registry that routes received probes
//! back to the right engine.

pub mod engine;
pub mod registry;
pub mod runner;

pub use engine::{SwitchDiscovery, MAX_PROBE_COUNT, PROBE_INTERVAL};
pub use registry::{Discovery, DiscoveryError};
pub use runner::DiscoveryRunner;
