// SPDX-License-Identifier: Apache-2.0
// Copyright OpenVirteX Authors

//! The tenant-facing method table.

use std::net::Ipv4Addr;
use std::sync::Arc;

use elements::{
    ControlChannel, OvxMap, OvxNetwork, PhysicalLink, PhysicalNetwork, PortLocator,
};
use ipnet::Ipv4Net;
use net::eth::Mac;
use serde_json::{json, Value};
use tracing::info;

use crate::rpc::{ApiError, RpcRequest, RpcResponse, METHOD_NOT_FOUND};

/// Makes the control channel for a freshly created tenant network. The
/// daemon dials the tenant controller behind this; tests record instead.
pub trait ChannelFactory: Send + Sync {
    fn controller_channel(&self, protocol: &str, host: &str, port: u16)
        -> Arc<dyn ControlChannel>;
}

/// Everything a handler needs.
#[derive(Clone)]
pub struct ApiState {
    pub map: Arc<OvxMap>,
    pub physical: Arc<PhysicalNetwork>,
    pub channels: Arc<dyn ChannelFactory>,
}

/// Route one JSON-RPC request to its handler.
#[must_use]
pub fn dispatch(state: &ApiState, req: &RpcRequest) -> RpcResponse {
    let id = req.id.clone();
    let out = match req.method.as_str() {
        "createNetwork" => create_network(state, &req.params),
        "createSwitch" => create_switch(state, &req.params),
        "createPort" => create_port(state, &req.params),
        "connectHost" => connect_host(state, &req.params),
        "connectLink" => connect_link(state, &req.params),
        "disconnectLink" => disconnect_link(state, &req.params),
        "setLinkPath" => set_link_path(state, &req.params),
        "connectRoute" => connect_route(state, &req.params),
        "disconnectRoute" => disconnect_route(state, &req.params),
        "removeNetwork" => remove_network(state, &req.params),
        "removeSwitch" => remove_switch(state, &req.params),
        "removePort" => remove_port(state, &req.params),
        "bootNetwork" => boot_network(state, &req.params),
        "stopNetwork" => stop_network(state, &req.params),
        other => {
            return RpcResponse::error(id, METHOD_NOT_FOUND, format!("no such method: {other}"));
        }
    };
    match out {
        Ok(result) => RpcResponse::result(id, result),
        Err(err) => RpcResponse::error(id, err.code(), err.to_string()),
    }
}

fn create_network(state: &ApiState, params: &Value) -> Result<Value, ApiError> {
    let protocol = str_field(params, "protocol")?;
    let host = str_field(params, "controllerAddress")?;
    let port = u16_field(params, "controllerPort")?;
    let address: Ipv4Addr = parse_field(params, "networkAddress")?;
    let mask = u8_field(params, "mask")?;
    let subnet = Ipv4Net::new(address, mask).map_err(|e| ApiError::InvalidField {
        field: "mask",
        reason: e.to_string(),
    })?;

    let tenant = state.map.next_tenant_id()?;
    let controller = state.channels.controller_channel(protocol, host, port);
    let network = Arc::new(OvxNetwork::new(
        tenant, protocol, host, port, subnet, controller,
    ));
    state.map.add_network(Arc::clone(&network));
    info!(tenant, %subnet, "virtual network created");
    Ok(json!({ "tenantId": tenant }))
}

fn create_switch(state: &ApiState, params: &Value) -> Result<Value, ApiError> {
    let network = tenant_network(state, params)?;
    let dpids = dpid_list(params, "dpids")?;
    let sw = network.create_switch(&state.map, &state.physical, &dpids)?;
    Ok(json!({ "vdpid": sw.dpid }))
}

fn create_port(state: &ApiState, params: &Value) -> Result<Value, ApiError> {
    let network = tenant_network(state, params)?;
    let vdpid = u64_field(params, "vdpid")?;
    let dpid = u64_field(params, "dpid")?;
    let port = u16_field(params, "port")?;
    let created = network.create_port(&state.physical, vdpid, PortLocator::new(dpid, port))?;
    Ok(json!({ "vdpid": created.dpid, "port": created.number }))
}

fn connect_host(state: &ApiState, params: &Value) -> Result<Value, ApiError> {
    let network = tenant_network(state, params)?;
    let vdpid = u64_field(params, "vdpid")?;
    let port = u16_field(params, "port")?;
    let mac = mac_field(params, "mac")?;
    let at = network.connect_host(&state.map, vdpid, port, mac)?;
    Ok(json!({ "vdpid": at.dpid, "port": at.number }))
}

fn connect_link(state: &ApiState, params: &Value) -> Result<Value, ApiError> {
    let network = tenant_network(state, params)?;
    let path = path_field(params, "path")?;
    let link_id = network.connect_link(&state.map, path)?;
    Ok(json!({ "linkId": link_id }))
}

fn disconnect_link(state: &ApiState, params: &Value) -> Result<Value, ApiError> {
    let network = tenant_network(state, params)?;
    let link_id = u32_field(params, "linkId")?;
    network.disconnect_link(&state.map, link_id)?;
    Ok(json!({ "linkId": link_id }))
}

fn set_link_path(state: &ApiState, params: &Value) -> Result<Value, ApiError> {
    let network = tenant_network(state, params)?;
    let link_id = u32_field(params, "linkId")?;
    let path = path_field(params, "path")?;
    network.set_link_path(&state.map, link_id, path)?;
    Ok(json!({ "linkId": link_id }))
}

fn connect_route(state: &ApiState, params: &Value) -> Result<Value, ApiError> {
    let network = tenant_network(state, params)?;
    let vdpid = u64_field(params, "vdpid")?;
    let src_port = u16_field(params, "srcPort")?;
    let dst_port = u16_field(params, "dstPort")?;
    let path = path_field(params, "path")?;
    let route = network.get_switch(vdpid)?.connect_route(src_port, dst_port, path)?;
    Ok(json!({ "routeId": route.route_id }))
}

fn disconnect_route(state: &ApiState, params: &Value) -> Result<Value, ApiError> {
    let network = tenant_network(state, params)?;
    let vdpid = u64_field(params, "vdpid")?;
    let src_port = u16_field(params, "srcPort")?;
    let dst_port = u16_field(params, "dstPort")?;
    network.get_switch(vdpid)?.remove_route(src_port, dst_port)?;
    Ok(json!({ "vdpid": vdpid }))
}

fn remove_network(state: &ApiState, params: &Value) -> Result<Value, ApiError> {
    let tenant = u32_field(params, "tenantId")?;
    let network = state.map.remove_network(tenant)?;
    network.stop();
    Ok(json!({ "tenantId": tenant }))
}

fn remove_switch(state: &ApiState, params: &Value) -> Result<Value, ApiError> {
    let network = tenant_network(state, params)?;
    let vdpid = u64_field(params, "vdpid")?;
    network.remove_switch(&state.map, vdpid)?;
    Ok(json!({ "vdpid": vdpid }))
}

fn remove_port(state: &ApiState, params: &Value) -> Result<Value, ApiError> {
    let network = tenant_network(state, params)?;
    let vdpid = u64_field(params, "vdpid")?;
    let port = u16_field(params, "port")?;
    network.remove_port(vdpid, port)?;
    Ok(json!({ "vdpid": vdpid, "port": port }))
}

fn boot_network(state: &ApiState, params: &Value) -> Result<Value, ApiError> {
    let network = tenant_network(state, params)?;
    network.boot();
    Ok(json!({ "tenantId": network.tenant, "booted": true }))
}

fn stop_network(state: &ApiState, params: &Value) -> Result<Value, ApiError> {
    let network = tenant_network(state, params)?;
    network.stop();
    Ok(json!({ "tenantId": network.tenant, "booted": false }))
}

fn tenant_network(state: &ApiState, params: &Value) -> Result<Arc<OvxNetwork>, ApiError> {
    let tenant = u32_field(params, "tenantId")?;
    Ok(state.map.get_virtual_network(tenant)?)
}

fn field<'a>(params: &'a Value, name: &'static str) -> Result<&'a Value, ApiError> {
    match params.get(name) {
        Some(v) if !v.is_null() => Ok(v),
        _ => Err(ApiError::MissingField(name)),
    }
}

fn str_field<'a>(params: &'a Value, name: &'static str) -> Result<&'a str, ApiError> {
    field(params, name)?.as_str().ok_or(ApiError::InvalidField {
        field: name,
        reason: "expected a string".to_string(),
    })
}

fn u64_field(params: &Value, name: &'static str) -> Result<u64, ApiError> {
    field(params, name)?.as_u64().ok_or(ApiError::InvalidField {
        field: name,
        reason: "expected an unsigned integer".to_string(),
    })
}

fn u32_field(params: &Value, name: &'static str) -> Result<u32, ApiError> {
    bounded(params, name, u64::from(u32::MAX)).map(|v| v as u32)
}

fn u16_field(params: &Value, name: &'static str) -> Result<u16, ApiError> {
    bounded(params, name, u64::from(u16::MAX)).map(|v| v as u16)
}

fn u8_field(params: &Value, name: &'static str) -> Result<u8, ApiError> {
    bounded(params, name, u64::from(u8::MAX)).map(|v| v as u8)
}

fn bounded(params: &Value, name: &'static str, max: u64) -> Result<u64, ApiError> {
    let v = u64_field(params, name)?;
    if v > max {
        return Err(ApiError::InvalidField {
            field: name,
            reason: format!("out of range, max {max}"),
        });
    }
    Ok(v)
}

fn parse_field<T>(params: &Value, name: &'static str) -> Result<T, ApiError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    str_field(params, name)?
        .parse()
        .map_err(|e: T::Err| ApiError::InvalidField {
            field: name,
            reason: e.to_string(),
        })
}

fn mac_field(params: &Value, name: &'static str) -> Result<Mac, ApiError> {
    Mac::try_from(str_field(params, name)?).map_err(|e| ApiError::InvalidField {
        field: name,
        reason: e.to_string(),
    })
}

fn dpid_list(params: &Value, name: &'static str) -> Result<Vec<u64>, ApiError> {
    let list = field(params, name)?.as_array().ok_or(ApiError::InvalidField {
        field: name,
        reason: "expected an array of dpids".to_string(),
    })?;
    list.iter()
        .map(|v| {
            v.as_u64().ok_or(ApiError::InvalidField {
                field: name,
                reason: "dpids must be unsigned integers".to_string(),
            })
        })
        .collect()
}

/// Parse `[{srcDpid, srcPort, dstDpid, dstPort}, ..]` into physical hops.
fn path_field(params: &Value, name: &'static str) -> Result<Vec<PhysicalLink>, ApiError> {
    let hops = field(params, name)?.as_array().ok_or(ApiError::InvalidField {
        field: name,
        reason: "expected an array of hops".to_string(),
    })?;
    hops.iter()
        .map(|hop| {
            Ok(PhysicalLink::new(
                PortLocator::new(u64_field(hop, "srcDpid")?, u16_field(hop, "srcPort")?),
                PortLocator::new(u64_field(hop, "dstDpid")?, u16_field(hop, "dstPort")?),
            ))
        })
        .collect()
}
