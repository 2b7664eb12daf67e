// SPDX-License-Identifier: Apache-2.0
// Copyright OpenVirteX Authors

//! Ethernet-layer types.

pub mod ethtype;
pub mod mac;

pub use ethtype::EthType;
pub use mac::Mac;
