// SPDX-License-Identifier: Apache-2.0
// Copyright OpenVirteX Authors

//! Entry points of the translation engine.
//!
//! Both planes funnel through here: tenant controllers talk to their
//! virtual switches through [`handle_virtual`], datapaths feed events in
//! through [`handle_physical`].

use std::sync::Arc;

use discovery::Discovery;
use elements::{OvxMap, OvxSwitch, PhysicalNetwork, PhysicalPort, PortLocator};
use net::lldp::check_lldp;
use net::openflow::{FeaturesReply, OfMessage, OfPort};
use tracing::{debug, info, warn};

use crate::packet_in::virtualize_packet_in;
use crate::packet_out::devirtualize_packet_out;

/// The shared state every translation touches.
#[derive(Debug, Clone)]
pub struct VirtContext {
    pub map: Arc<OvxMap>,
    pub physical: Arc<PhysicalNetwork>,
}

impl VirtContext {
    #[must_use]
    pub fn new(map: Arc<OvxMap>, physical: Arc<PhysicalNetwork>) -> Self {
        VirtContext { map, physical }
    }
}

/// Handle a message a tenant controller sent to one of its virtual
/// switches. Anything the hypervisor cannot virtualize is dropped with a
/// log line rather than forwarded raw.
pub fn handle_virtual(ctx: &VirtContext, sw: &Arc<OvxSwitch>, msg: OfMessage) {
    match msg {
        OfMessage::PacketOut(po) => devirtualize_packet_out(ctx, sw, po),
        other => {
            // nothing else a controller sends may reach the wire untranslated
            warn!(
                dpid = format_args!("{:#x}", sw.dpid),
                kind = other.kind(),
                "unhandled controller message, dropping"
            );
        }
    }
}

/// Handle a message arriving from a physical datapath.
pub fn handle_physical(ctx: &VirtContext, discovery: &Discovery, dpid: u64, msg: OfMessage) {
    match msg {
        OfMessage::PacketIn(pi) => {
            if check_lldp(&pi.data) {
                discovery.handle_lldp(PortLocator::new(dpid, pi.in_port), &pi.data);
            } else {
                virtualize_packet_in(ctx, dpid, pi);
            }
        }
        OfMessage::FeaturesReply(fr) => register_datapath(ctx, discovery, dpid, fr),
        other => debug!(
            dpid = format_args!("{dpid:#x}"),
            kind = other.kind(),
            "ignoring datapath message"
        ),
    }
}

/// Populate a newly-handshaken datapath's ports and put it under
/// discovery. The connection layer has already placed the switch in the
/// physical network.
fn register_datapath(ctx: &VirtContext, discovery: &Discovery, dpid: u64, fr: FeaturesReply) {
    let Ok(psw) = ctx.physical.switch(fr.dpid) else {
        warn!(
            dpid = format_args!("{:#x}", fr.dpid),
            "features-reply from an unregistered datapath, ignoring"
        );
        return;
    };
    if fr.dpid != dpid {
        warn!(
            claimed = format_args!("{:#x}", fr.dpid),
            seen = format_args!("{dpid:#x}"),
            "features-reply dpid does not match its connection"
        );
    }
    let mut ports = 0usize;
    for desc in &fr.ports {
        if !OfPort::is_physical(desc.port_no) {
            continue;
        }
        psw.add_port(PhysicalPort {
            locator: PortLocator::new(fr.dpid, desc.port_no),
            hw_addr: desc.hw_addr,
            name: desc.name.clone(),
        });
        ports += 1;
    }
    info!(
        dpid = format_args!("{:#x}", fr.dpid),
        ports, "datapath registered"
    );
    if let Err(err) = discovery.attach_switch(fr.dpid) {
        warn!(%err, "could not start discovery on datapath");
    }
}
