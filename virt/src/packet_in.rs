// SPDX-License-Identifier: Apache-2.0
// Copyright OpenVirteX Authors

//! Packet-in virtualization.

use elements::PortLocator;
use net::arp::EthernetFrame;
use net::openflow::{OfMessage, PacketIn};
use tracing::debug;

use crate::dispatch::VirtContext;

/// Lift a datapath packet-in into the owning tenant's virtual plane and
/// hand it to that tenant's controller.
///
/// Ownership follows the source MAC. Packets from hosts no tenant has
/// connected are dropped, as is anything arriving on a physical port no
/// virtual port is bound to.
pub fn virtualize_packet_in(ctx: &VirtContext, phys_dpid: u64, pi: PacketIn) {
    let Ok(eth) = EthernetFrame::parse(&pi.data) else {
        debug!(
            dpid = format_args!("{phys_dpid:#x}"),
            "unparseable packet-in, dropping"
        );
        return;
    };
    let Some(tenant) = ctx.map.tenant_for_mac(eth.src) else {
        debug!(mac = %eth.src, "packet-in from an unowned host, dropping");
        return;
    };
    let vsw = match ctx.map.get_virtual_switch(phys_dpid, tenant) {
        Ok(sw) => sw,
        Err(err) => {
            debug!(%err, tenant, "packet-in outside the tenant topology, dropping");
            return;
        }
    };
    let Ok(network) = ctx.map.get_virtual_network(tenant) else {
        return;
    };
    let at = PortLocator::new(phys_dpid, pi.in_port);
    let Some(vport) = network.virtual_port_at(at) else {
        debug!(%at, tenant, "packet-in on an unmapped port, dropping");
        return;
    };

    // keep the full frame around so a later packet-out can refer to it;
    // the stored copy retains the datapath's own buffer id
    let mut stored = pi.clone();
    stored.in_port = vport.port;
    let buffer_id = vsw.add_to_buffer(stored);

    let total_len = pi.data.len() as u16;
    let mut data = pi.data;
    data.truncate(usize::from(vsw.miss_send_len()));
    let out = PacketIn {
        buffer_id,
        total_len,
        in_port: vport.port,
        reason: pi.reason,
        data,
    };
    debug!(
        dpid = format_args!("{:#x}", vsw.dpid),
        tenant,
        in_port = vport.port,
        buffer_id,
        "packet-in sent north"
    );
    vsw.send_to_controller(OfMessage::PacketIn(out));
}
