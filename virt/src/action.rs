// SPDX-License-Identifier: Apache-2.0
// Copyright OpenVirteX Authors

//! Output-action translation.
//!
//! An output action names a virtual port. Depending on what backs that
//! port the action becomes a plain physical output, a VLAN-tagged hop
//! onto a virtual link, a route through the members of a big switch, or
//! a synthesized ARP that never touches the wire at all.

use std::sync::Arc;

use elements::{OvxIpAddr, OvxNetwork, OvxPort, OvxSwitch, SwitchKind, SwitchRoute};
use net::arp::build_arp;
use net::openflow::{
    Action, Flag, FlowMod, FlowModCommand, OfMatch, OfMessage, OfPort, PacketIn, PacketInReason,
    PacketOut, Wildcards, NO_BUFFER,
};
use net::vlan::Vid;
use tracing::debug;

use crate::dispatch::VirtContext;
use crate::errors::VirtError;

/// How long a route hop entry stays installed without traffic, in seconds.
const ROUTE_IDLE_TIMEOUT: u16 = 5;

/// The wire tag carrying a link or route id. Ids come from 32-bit
/// counters, so one past the tag space is an error, not a truncation.
pub(crate) fn vlan_tag(id: u32) -> Result<u16, VirtError> {
    Ok(Vid::try_from(id)?.as_u16())
}

/// Translate one output action of a controller packet-out into the
/// physical actions it stands for, appending them to `approved`.
///
/// `m` is the match loaded from the packet being emitted; `inport` is the
/// already-resolved virtual ingress port.
pub(crate) fn virtualize_output(
    ctx: &VirtContext,
    sw: &Arc<OvxSwitch>,
    inport: &OvxPort,
    m: &OfMatch,
    port: u16,
    max_len: u16,
    approved: &mut Vec<Action>,
) -> Result<(), VirtError> {
    let network = ctx.map.get_virtual_network(sw.tenant)?;
    match port {
        OfPort::ALL | OfPort::FLOOD => {
            let mut drop_after = false;
            for out in sw.ports() {
                if out.number == inport.number {
                    continue;
                }
                drop_after |=
                    emit_port(ctx, sw, &network, m, inport, &out, max_len, true, approved)?;
            }
            if port == OfPort::ALL {
                approved.push(Action::Output {
                    port: OfPort::IN_PORT,
                    max_len,
                });
            }
            if drop_after {
                return Err(VirtError::Dropped);
            }
        }
        p if OfPort::is_physical(p) => {
            let Some(out) = sw.get_port(p) else {
                return Err(VirtError::Denied {
                    dpid: sw.dpid,
                    port: p,
                });
            };
            if emit_port(ctx, sw, &network, m, inport, &out, max_len, false, approved)? {
                return Err(VirtError::Dropped);
            }
        }
        _ => {
            // reserved ports other than FLOOD and ALL pass through untouched
            approved.push(Action::Output { port, max_len });
        }
    }
    Ok(())
}

/// Emit the physical actions for one resolved egress port. Returns true
/// when the whole packet-out must be suppressed once translation is done,
/// which happens when the packet was answered on the controller's behalf.
#[allow(clippy::too_many_arguments)]
fn emit_port(
    ctx: &VirtContext,
    sw: &Arc<OvxSwitch>,
    network: &Arc<OvxNetwork>,
    m: &OfMatch,
    inport: &OvxPort,
    out: &OvxPort,
    max_len: u16,
    flood: bool,
    approved: &mut Vec<Action>,
) -> Result<bool, VirtError> {
    let big = matches!(sw.kind, SwitchKind::Big(_));
    if out.edge {
        if big {
            if m.is_arp() {
                // answer the ARP at the far end of the route rather than
                // flooding it across the member datapaths
                send_arp_packet_out(ctx, sw, inport, out, m)?;
                return Ok(true);
            }
            route_output(ctx, sw, network, m, inport, out, max_len, approved)?;
            return Ok(false);
        }
        push_unrewrite(approved, m);
        if !inport.edge {
            approved.push(Action::StripVlan);
        }
        approved.push(Action::Output {
            port: out.phys.port,
            max_len,
        });
        return Ok(false);
    }

    // the port terminates a virtual link
    if m.is_arp() {
        inject_neighbor_arp(network, out, m);
        // a flood keeps its remaining outputs; a unicast output is spent
        return Ok(!flood);
    }
    if big {
        route_output(ctx, sw, network, m, inport, out, max_len, approved)?;
        return Ok(false);
    }
    approved.push(Action::SetVlanId {
        vid: vlan_tag(out.link_id)?,
    });
    let phys_port = if out.phys == inport.phys {
        OfPort::IN_PORT
    } else {
        out.phys.port
    };
    approved.push(Action::Output {
        port: phys_port,
        max_len,
    });
    Ok(false)
}

/// Send the packet across the internal route of a big switch: tag it with
/// the route id, output it at the first hop and install the delivering
/// flow entry at the last hop.
#[allow(clippy::too_many_arguments)]
fn route_output(
    ctx: &VirtContext,
    sw: &Arc<OvxSwitch>,
    network: &Arc<OvxNetwork>,
    m: &OfMatch,
    inport: &OvxPort,
    out: &OvxPort,
    max_len: u16,
    approved: &mut Vec<Action>,
) -> Result<(), VirtError> {
    let route = sw.get_route(&ctx.physical, inport, out)?;
    let Some(first) = route.path.first() else {
        // ingress and egress back onto the same datapath
        if out.edge {
            push_unrewrite(approved, m);
            if !inport.edge {
                approved.push(Action::StripVlan);
            }
        } else {
            approved.push(Action::SetVlanId {
                vid: vlan_tag(out.link_id)?,
            });
        }
        approved.push(Action::Output {
            port: out.phys.port,
            max_len,
        });
        return Ok(());
    };
    approved.push(Action::SetVlanId {
        vid: vlan_tag(route.route_id)?,
    });
    approved.push(Action::Output {
        port: first.src.port,
        max_len,
    });
    install_route_flow(ctx, sw, network, m, &route, out)
}

/// Install the flow entry that delivers route-tagged traffic at the last
/// hop of a big-switch route.
fn install_route_flow(
    ctx: &VirtContext,
    sw: &Arc<OvxSwitch>,
    network: &Arc<OvxNetwork>,
    m: &OfMatch,
    route: &SwitchRoute,
    out: &OvxPort,
) -> Result<(), VirtError> {
    let Some(last) = route.path.last() else {
        return Ok(());
    };

    let mut fm_match = *m;
    fm_match.wildcards = Wildcards::all()
        .match_on(Flag::DlSrc)
        .match_on(Flag::DlDst)
        .match_on(Flag::DlVlan)
        .match_on(Flag::InPort);
    fm_match.in_port = last.dst.port;
    fm_match.dl_vlan = vlan_tag(route.route_id)?;
    // the wire carries physical addresses by the time the tag matches
    if !m.wildcards.is_wildcarded(Flag::NwSrc) {
        fm_match.nw_src = physical_ip(ctx, network, sw, m.nw_src);
    }
    if !m.wildcards.is_wildcarded(Flag::NwDst) {
        fm_match.nw_dst = physical_ip(ctx, network, sw, m.nw_dst);
    }

    let mut actions = Vec::new();
    if out.edge {
        push_unrewrite(&mut actions, m);
        actions.push(Action::StripVlan);
    } else {
        actions.push(Action::SetVlanId {
            vid: vlan_tag(out.link_id)?,
        });
    }
    actions.push(Action::Output {
        port: out.phys.port,
        max_len: 0,
    });

    let fm = FlowMod {
        command: FlowModCommand::Modify,
        of_match: fm_match,
        cookie: 0,
        idle_timeout: ROUTE_IDLE_TIMEOUT,
        hard_timeout: 0,
        priority: 0,
        buffer_id: NO_BUFFER,
        out_port: OfPort::NONE,
        flags: 0,
        actions,
    };
    debug!(
        dpid = format_args!("{:#x}", last.dst.dpid),
        route_id = route.route_id,
        "installing route delivery entry"
    );
    sw.send_to_datapath(&ctx.physical, last.dst.dpid, OfMessage::FlowMod(fm));
    Ok(())
}

/// Answer an ARP at the egress edge of a big switch by handing the frame
/// straight to the physical switch hosting that edge.
fn send_arp_packet_out(
    ctx: &VirtContext,
    sw: &Arc<OvxSwitch>,
    inport: &OvxPort,
    out: &OvxPort,
    m: &OfMatch,
) -> Result<(), VirtError> {
    let route = sw.get_route(&ctx.physical, inport, out)?;
    let in_phys = route.path.last().map_or(inport.phys.port, |l| l.dst.port);
    let po = PacketOut {
        buffer_id: NO_BUFFER,
        in_port: in_phys,
        actions: vec![Action::Output {
            port: out.phys.port,
            max_len: 0,
        }],
        data: arp_from_match(m),
    };
    sw.send_to_datapath(&ctx.physical, out.phys.dpid, OfMessage::PacketOut(po));
    Ok(())
}

/// Hand an ARP to the switch at the far end of a virtual link as a
/// packet-in on the peer port, so it never crosses the physical path.
fn inject_neighbor_arp(network: &Arc<OvxNetwork>, out: &OvxPort, m: &OfMatch) {
    let Some(peer) = network.neighbor_port(out.locator()) else {
        debug!(port = %out.locator(), "link port has no peer, dropping ARP");
        return;
    };
    let Ok(peer_sw) = network.get_switch(peer.dpid) else {
        return;
    };
    let data = arp_from_match(m);
    let pi = PacketIn {
        buffer_id: NO_BUFFER,
        total_len: data.len() as u16,
        in_port: peer.port,
        reason: PacketInReason::NoMatch,
        data,
    };
    peer_sw.send_to_controller(OfMessage::PacketIn(pi));
}

/// Restore the tenant-facing addresses before a frame reaches an edge
/// host. Only fields the match actually carries are rewritten.
fn push_unrewrite(approved: &mut Vec<Action>, m: &OfMatch) {
    if !m.wildcards.is_wildcarded(Flag::NwSrc) {
        approved.push(Action::SetNwSrc { ip: m.nw_src });
    }
    if !m.wildcards.is_wildcarded(Flag::NwDst) {
        approved.push(Action::SetNwDst { ip: m.nw_dst });
    }
}

/// The physical address standing in for a tenant address, allocated on
/// first use.
pub(crate) fn physical_ip(
    ctx: &VirtContext,
    network: &Arc<OvxNetwork>,
    sw: &OvxSwitch,
    virt: std::net::Ipv4Addr,
) -> std::net::Ipv4Addr {
    ctx.map.add_ip(
        OvxIpAddr {
            tenant: sw.tenant,
            ip: virt,
        },
        || network.next_physical_ip(),
    )
}

/// Rebuild the ARP frame a match was loaded from. The opcode rides in
/// `nw_proto` per OpenFlow 1.0.
fn arp_from_match(m: &OfMatch) -> Vec<u8> {
    build_arp(
        u16::from(m.nw_proto),
        m.dl_src,
        m.nw_src,
        m.dl_dst,
        m.nw_dst,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    use elements::{
        OvxMap, PhysicalLink, PhysicalNetwork, PhysicalPort, PhysicalSwitch, PortLocator,
        RecordingChannel,
    };
    use net::arp::ARP_OP_REQUEST;
    use net::eth::Mac;
    use net::openflow::{FlowModCommand, OfMessage, PacketOut};
    use pretty_assertions::assert_eq;

    use crate::packet_out::devirtualize_packet_out;

    struct Fixture {
        ctx: VirtContext,
        network: Arc<OvxNetwork>,
        ctl: Arc<RecordingChannel>,
        dp: Vec<Arc<RecordingChannel>>,
    }

    fn phys_switch(
        physical: &PhysicalNetwork,
        dpid: u64,
        ports: u16,
    ) -> Arc<RecordingChannel> {
        let chan = Arc::new(RecordingChannel::new("dp"));
        let sw = Arc::new(PhysicalSwitch::new(dpid, chan.clone()));
        for p in 1..=ports {
            sw.add_port(PhysicalPort {
                locator: PortLocator::new(dpid, p),
                hw_addr: Mac([0, 0, 0, 0, dpid as u8, p as u8]),
                name: format!("eth{p}"),
            });
        }
        physical.add_switch(sw);
        chan
    }

    /// Two datapaths wired port 2 to port 2.
    fn two_datapaths(members: &[&[u64]]) -> (Fixture, Vec<Arc<OvxSwitch>>) {
        let map = Arc::new(OvxMap::new());
        let physical = Arc::new(PhysicalNetwork::new());
        let dp1 = phys_switch(&physical, 0x1, 2);
        let dp2 = phys_switch(&physical, 0x2, 2);
        physical.create_link(PortLocator::new(0x1, 2), PortLocator::new(0x2, 2));
        physical.create_link(PortLocator::new(0x2, 2), PortLocator::new(0x1, 2));

        let ctl = Arc::new(RecordingChannel::new("ctl"));
        let network = Arc::new(OvxNetwork::new(
            1,
            "tcp",
            "127.0.0.1",
            6633,
            "10.0.0.0/8".parse().unwrap(),
            ctl.clone(),
        ));
        map.add_network(Arc::clone(&network));
        let switches: Vec<Arc<OvxSwitch>> = members
            .iter()
            .map(|dpids| network.create_switch(&map, &physical, dpids).unwrap())
            .collect();

        let f = Fixture {
            ctx: VirtContext::new(map, physical),
            network,
            ctl,
            dp: vec![dp1, dp2],
        };
        (f, switches)
    }

    fn arp_frame() -> Vec<u8> {
        build_arp(
            ARP_OP_REQUEST,
            Mac([0, 0, 0, 0, 0, 1]),
            "10.0.0.1".parse().unwrap(),
            Mac::ZERO,
            "10.0.0.2".parse().unwrap(),
        )
    }

    fn ipv4_frame(nw_src: Ipv4Addr, nw_dst: Ipv4Addr) -> Vec<u8> {
        let mut b = Vec::new();
        b.extend_from_slice(&[0, 0, 0, 0, 0, 2]);
        b.extend_from_slice(&[0, 0, 0, 0, 0, 1]);
        b.extend_from_slice(&0x0800u16.to_be_bytes());
        let mut ip = [0u8; 20];
        ip[0] = 0x45;
        ip[9] = 1;
        ip[12..16].copy_from_slice(&nw_src.octets());
        ip[16..20].copy_from_slice(&nw_dst.octets());
        b.extend_from_slice(&ip);
        b
    }

    #[test]
    fn arp_to_link_port_goes_to_peer_controller() {
        let (f, switches) = two_datapaths(&[&[0x1], &[0x2]]);
        let sw1 = &switches[0];
        for (sw, dpid) in switches.iter().zip([0x1u64, 0x2]) {
            for p in 1..=2u16 {
                f.network
                    .create_port(&f.ctx.physical, sw.dpid, PortLocator::new(dpid, p))
                    .unwrap();
            }
        }
        f.network
            .connect_link(
                &f.ctx.map,
                vec![PhysicalLink::new(
                    PortLocator::new(0x1, 2),
                    PortLocator::new(0x2, 2),
                )],
            )
            .unwrap();

        let po = PacketOut {
            buffer_id: NO_BUFFER,
            in_port: 1,
            actions: vec![Action::Output {
                port: 2,
                max_len: 0,
            }],
            data: arp_frame(),
        };
        devirtualize_packet_out(&f.ctx, sw1, po);

        // nothing hits the wire; the peer's controller sees the ARP as if
        // it arrived on the far end of the virtual link
        assert_eq!(f.dp[0].sent_count(), 0);
        assert_eq!(f.dp[1].sent_count(), 0);
        let sent = f.ctl.take();
        assert_eq!(sent.len(), 1);
        let OfMessage::PacketIn(pi) = &sent[0] else {
            panic!("expected a packet-in, got {:?}", sent[0]);
        };
        assert_eq!(pi.in_port, 2);
        assert_eq!(pi.buffer_id, NO_BUFFER);
        assert_eq!(pi.data, arp_frame());
    }

    #[test]
    fn flood_reaches_every_other_port() {
        let (f, switches) = two_datapaths(&[&[0x1]]);
        let sw = &switches[0];
        for p in 1..=2u16 {
            f.network
                .create_port(&f.ctx.physical, sw.dpid, PortLocator::new(0x1, p))
                .unwrap();
        }

        let po = PacketOut {
            buffer_id: NO_BUFFER,
            in_port: 1,
            actions: vec![Action::Output {
                port: OfPort::FLOOD,
                max_len: 0,
            }],
            data: ipv4_frame("10.0.0.1".parse().unwrap(), "10.0.0.2".parse().unwrap()),
        };
        devirtualize_packet_out(&f.ctx, sw, po);

        let sent = f.dp[0].take();
        assert_eq!(sent.len(), 1);
        let OfMessage::PacketOut(out) = &sent[0] else {
            panic!("expected a packet-out, got {:?}", sent[0]);
        };
        let outputs: Vec<u16> = out
            .actions
            .iter()
            .filter_map(|a| match a {
                Action::Output { port, .. } => Some(*port),
                _ => None,
            })
            .collect();
        assert_eq!(outputs, vec![2]);
    }

    #[test]
    fn big_switch_output_installs_delivery_flow() {
        let (f, switches) = two_datapaths(&[&[0x1, 0x2]]);
        let sw = &switches[0];
        f.network
            .create_port(&f.ctx.physical, sw.dpid, PortLocator::new(0x1, 1))
            .unwrap();
        f.network
            .create_port(&f.ctx.physical, sw.dpid, PortLocator::new(0x2, 1))
            .unwrap();

        let po = PacketOut {
            buffer_id: NO_BUFFER,
            in_port: 1,
            actions: vec![Action::Output {
                port: 2,
                max_len: 0,
            }],
            data: ipv4_frame("10.0.0.1".parse().unwrap(), "10.0.0.2".parse().unwrap()),
        };
        devirtualize_packet_out(&f.ctx, sw, po);

        // ingress datapath emits the tagged frame on the first hop
        let sent = f.dp[0].take();
        assert_eq!(sent.len(), 1);
        let OfMessage::PacketOut(out) = &sent[0] else {
            panic!("expected a packet-out, got {:?}", sent[0]);
        };
        assert!(out.actions.contains(&Action::SetVlanId { vid: 1 }));
        assert_eq!(
            out.actions.last(),
            Some(&Action::Output {
                port: 2,
                max_len: 0
            })
        );

        // egress datapath gets the delivery entry for the tagged traffic
        let sent = f.dp[1].take();
        assert_eq!(sent.len(), 1);
        let OfMessage::FlowMod(fm) = &sent[0] else {
            panic!("expected a flow-mod, got {:?}", sent[0]);
        };
        assert_eq!(fm.command, FlowModCommand::Modify);
        assert_eq!(fm.idle_timeout, ROUTE_IDLE_TIMEOUT);
        assert_eq!(fm.of_match.in_port, 2);
        assert_eq!(fm.of_match.dl_vlan, 1);
        assert_eq!(
            fm.actions.last(),
            Some(&Action::Output {
                port: 1,
                max_len: 0
            })
        );
        assert!(fm.actions.contains(&Action::StripVlan));
    }
}
