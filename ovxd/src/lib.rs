// SPDX-License-Identifier: Apache-2.0
// Copyright OpenVirteX Authors

//! Daemon plumbing: startup configuration and the composition root that
//! wires the map, discovery, translation engine and admin API together.

pub mod config;
pub mod daemon;

pub use config::{Config, ConfigError};
pub use daemon::Daemon;
