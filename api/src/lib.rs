// SPDX-License-Identifier: Apache-2.0
// Copyright OpenVirteX Authors

//! The JSON-RPC admin API.
//!
//! Tenants provision their networks through here: create a network, carve
//! switches and ports out of the physical plane, wire links and routes,
//! boot. Every request is a JSON-RPC 2.0 call over HTTP with basic auth;
//! every core failure comes back as a JSON-RPC error, never a panic.

mod auth;
mod handlers;
mod rpc;
mod server;

pub use auth::{AuthStore, Credential, Role};
pub use handlers::{ApiState, ChannelFactory, dispatch};
pub use rpc::{ApiError, RpcRequest, RpcResponse};
pub use server::ApiServer;
