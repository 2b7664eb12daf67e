// SPDX-License-Identifier: Apache-2.0
// Copyright OpenVirteX Authors

//! Packet-out devirtualization.

use std::sync::Arc;

use elements::{OvxNetwork, OvxSwitch};
use net::arp::ETH_HEADER_LEN;
use net::openflow::{Action, Flag, OfError, OfMatch, OfMessage, PacketOut, NO_BUFFER};
use tracing::{debug, warn};

use crate::action;
use crate::dispatch::VirtContext;
use crate::errors::VirtError;

/// How much of the offending message an error reply echoes.
const ERROR_ECHO_LEN: usize = 64;

/// Translate a tenant packet-out into the physical message it stands for
/// and forward it to the datapath backing its ingress port.
///
/// Untranslatable messages are answered with an OpenFlow error when the
/// controller got something wrong, and silently dropped when the message
/// was consumed on the controller's behalf.
pub fn devirtualize_packet_out(ctx: &VirtContext, sw: &Arc<OvxSwitch>, mut po: PacketOut) {
    let Some(inport) = sw.get_port(po.in_port) else {
        debug!(
            dpid = format_args!("{:#x}", sw.dpid),
            port = po.in_port,
            "packet-out names an unknown ingress port, dropping"
        );
        return;
    };
    let network = match ctx.map.get_virtual_network(sw.tenant) {
        Ok(n) => n,
        Err(err) => {
            warn!(%err, "packet-out from a switch with no network, dropping");
            return;
        }
    };

    let mut m = if po.buffer_id == NO_BUFFER {
        if po.data.len() <= ETH_HEADER_LEN {
            warn!(
                dpid = format_args!("{:#x}", sw.dpid),
                len = po.data.len(),
                "unbuffered packet-out carries no payload"
            );
            sw.send_to_controller(OfMessage::Error(OfError::BadRequestBadLen {
                data: echo(&po.data),
            }));
            return;
        }
        OfMatch::from_packet(&po.data, po.in_port)
    } else {
        let Some(cause) = sw.from_buffer(po.buffer_id) else {
            warn!(
                dpid = format_args!("{:#x}", sw.dpid),
                buffer_id = po.buffer_id,
                "packet-out names an expired buffer"
            );
            sw.send_to_controller(OfMessage::Error(OfError::BadRequestBufferUnknown {
                data: echo(&po.data),
            }));
            return;
        };
        // the datapath only knows its own buffer id
        po.buffer_id = cause.buffer_id;
        OfMatch::from_packet(&cause.data, po.in_port)
    };

    // traffic arriving over a virtual link still wears the link tag
    if !inport.edge && !m.is_arp() {
        match action::vlan_tag(inport.link_id) {
            Ok(vid) => {
                m.dl_vlan = vid;
                m.wildcards = m.wildcards.match_on(Flag::DlVlan);
            }
            Err(err) => {
                warn!(%err, link_id = inport.link_id, "cannot translate packet-out, dropping");
                return;
            }
        }
    }

    let mut approved = Vec::with_capacity(po.actions.len());
    for act in &po.actions {
        let res = match *act {
            Action::Output { port, max_len } => {
                action::virtualize_output(ctx, sw, &inport, &m, port, max_len, &mut approved)
            }
            other => {
                approved.push(other);
                Ok(())
            }
        };
        match res {
            Ok(()) => {}
            Err(VirtError::Dropped) => return,
            Err(VirtError::Denied { dpid, port }) => {
                warn!(
                    dpid = format_args!("{dpid:#x}"),
                    port, "packet-out names a port the tenant does not own"
                );
                sw.send_to_controller(OfMessage::Error(OfError::BadActionBadOutPort {
                    data: act.serialize(),
                }));
                return;
            }
            Err(err @ (VirtError::Map(_) | VirtError::Tag(_))) => {
                warn!(%err, "cannot translate packet-out, dropping");
                return;
            }
        }
    }

    prepend_rewrite(ctx, &network, sw, &m, &mut approved);

    po.in_port = inport.phys.port;
    po.actions = approved;
    debug!(
        dpid = format_args!("{:#x}", inport.phys.dpid),
        len = po.length(),
        "packet-out sent south"
    );
    sw.send_to_datapath(&ctx.physical, inport.phys.dpid, OfMessage::PacketOut(po));
}

/// Put the physical address rewrites in front of everything else, so the
/// frame wears wire addresses before any approved action sees it.
fn prepend_rewrite(
    ctx: &VirtContext,
    network: &Arc<OvxNetwork>,
    sw: &OvxSwitch,
    m: &OfMatch,
    approved: &mut Vec<Action>,
) {
    if !m.wildcards.is_wildcarded(Flag::NwSrc) {
        approved.insert(
            0,
            Action::SetNwSrc {
                ip: action::physical_ip(ctx, network, sw, m.nw_src),
            },
        );
    }
    if !m.wildcards.is_wildcarded(Flag::NwDst) {
        approved.insert(
            0,
            Action::SetNwDst {
                ip: action::physical_ip(ctx, network, sw, m.nw_dst),
            },
        );
    }
}

fn echo(data: &[u8]) -> Vec<u8> {
    data.iter().copied().take(ERROR_ECHO_LEN).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    use elements::{
        OvxMap, PhysicalNetwork, PhysicalPort, PhysicalSwitch, PortLocator, RecordingChannel,
    };
    use net::eth::Mac;
    use net::openflow::{PacketIn, PacketInReason};
    use pretty_assertions::assert_eq;

    struct Fixture {
        ctx: VirtContext,
        sw: Arc<OvxSwitch>,
        dp: Arc<RecordingChannel>,
        ctl: Arc<RecordingChannel>,
    }

    fn single_switch() -> Fixture {
        let map = Arc::new(OvxMap::new());
        let physical = Arc::new(PhysicalNetwork::new());
        let dp = Arc::new(RecordingChannel::new("dp"));
        let psw = Arc::new(PhysicalSwitch::new(0x1, dp.clone()));
        for p in 1..=3u16 {
            psw.add_port(PhysicalPort {
                locator: PortLocator::new(0x1, p),
                hw_addr: Mac([0, 0, 0, 0, 1, p as u8]),
                name: format!("eth{p}"),
            });
        }
        physical.add_switch(psw);
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
        let sw = network.create_switch(&map, &physical, &[0x1]).unwrap();
        for p in 1..=3u16 {
            network
                .create_port(&physical, sw.dpid, PortLocator::new(0x1, p))
                .unwrap();
        }
        Fixture {
            ctx: VirtContext::new(map, physical),
            sw,
            dp,
            ctl,
        }
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
    fn edge_output_rewrites_addresses() {
        let f = single_switch();
        let data = ipv4_frame("10.0.0.1".parse().unwrap(), "10.0.0.2".parse().unwrap());
        let po = PacketOut {
            buffer_id: NO_BUFFER,
            in_port: 1,
            actions: vec![Action::Output {
                port: 2,
                max_len: 0,
            }],
            data: data.clone(),
        };
        devirtualize_packet_out(&f.ctx, &f.sw, po);

        let sent = f.dp.take();
        assert_eq!(sent.len(), 1);
        let OfMessage::PacketOut(out) = &sent[0] else {
            panic!("expected a packet-out, got {:?}", sent[0]);
        };
        assert_eq!(out.in_port, 1);
        // wire addresses go on first, tenant addresses come back before
        // the frame reaches the destination host
        assert_eq!(
            out.actions,
            vec![
                Action::SetNwDst {
                    ip: "1.0.0.2".parse().unwrap()
                },
                Action::SetNwSrc {
                    ip: "1.0.0.1".parse().unwrap()
                },
                Action::SetNwSrc {
                    ip: "10.0.0.1".parse().unwrap()
                },
                Action::SetNwDst {
                    ip: "10.0.0.2".parse().unwrap()
                },
                Action::Output {
                    port: 2,
                    max_len: 0
                },
            ]
        );
        assert_eq!(out.length(), 16 + 5 * 8 + data.len() as u16);
    }

    #[test]
    fn unbuffered_packet_out_needs_a_payload() {
        let f = single_switch();
        let po = PacketOut {
            buffer_id: NO_BUFFER,
            in_port: 1,
            actions: Vec::new(),
            data: vec![0; 10],
        };
        devirtualize_packet_out(&f.ctx, &f.sw, po);

        assert_eq!(f.dp.sent_count(), 0);
        let sent = f.ctl.take();
        assert_eq!(sent.len(), 1);
        assert!(matches!(
            &sent[0],
            OfMessage::Error(OfError::BadRequestBadLen { .. })
        ));
    }

    #[test]
    fn expired_buffer_is_rejected() {
        let f = single_switch();
        let po = PacketOut {
            buffer_id: 7,
            in_port: 1,
            actions: Vec::new(),
            data: Vec::new(),
        };
        devirtualize_packet_out(&f.ctx, &f.sw, po);

        assert_eq!(f.dp.sent_count(), 0);
        let sent = f.ctl.take();
        assert_eq!(sent.len(), 1);
        assert!(matches!(
            &sent[0],
            OfMessage::Error(OfError::BadRequestBufferUnknown { .. })
        ));
    }

    #[test]
    fn unknown_out_port_is_denied() {
        let f = single_switch();
        let bad = Action::Output {
            port: 99,
            max_len: 0,
        };
        let po = PacketOut {
            buffer_id: NO_BUFFER,
            in_port: 1,
            actions: vec![bad],
            data: ipv4_frame("10.0.0.1".parse().unwrap(), "10.0.0.2".parse().unwrap()),
        };
        devirtualize_packet_out(&f.ctx, &f.sw, po);

        assert_eq!(f.dp.sent_count(), 0);
        let sent = f.ctl.take();
        assert_eq!(sent.len(), 1);
        let OfMessage::Error(OfError::BadActionBadOutPort { data }) = &sent[0] else {
            panic!("expected a bad-out-port error, got {:?}", sent[0]);
        };
        assert_eq!(*data, bad.serialize());
    }

    #[test]
    fn link_id_past_the_tag_space_is_not_truncated() {
        let f = single_switch();
        // a link id one past the tag space would alias vlan 0 if cast
        f.sw.update_port(2, |p| {
            p.edge = false;
            p.link_id = 4096;
        });
        let po = PacketOut {
            buffer_id: NO_BUFFER,
            in_port: 1,
            actions: vec![Action::Output {
                port: 2,
                max_len: 0,
            }],
            data: ipv4_frame("10.0.0.1".parse().unwrap(), "10.0.0.2".parse().unwrap()),
        };
        devirtualize_packet_out(&f.ctx, &f.sw, po);

        assert_eq!(f.dp.sent_count(), 0);
        assert_eq!(f.ctl.sent_count(), 0);
    }

    #[test]
    fn buffered_packet_out_uses_datapath_buffer_id() {
        let f = single_switch();
        let frame = ipv4_frame("10.0.0.1".parse().unwrap(), "10.0.0.2".parse().unwrap());
        let id = f.sw.add_to_buffer(PacketIn {
            buffer_id: 42,
            total_len: frame.len() as u16,
            in_port: 1,
            reason: PacketInReason::NoMatch,
            data: frame,
        });
        let po = PacketOut {
            buffer_id: id,
            in_port: 1,
            actions: vec![Action::Output {
                port: 2,
                max_len: 0,
            }],
            data: Vec::new(),
        };
        devirtualize_packet_out(&f.ctx, &f.sw, po);

        let sent = f.dp.take();
        assert_eq!(sent.len(), 1);
        let OfMessage::PacketOut(out) = &sent[0] else {
            panic!("expected a packet-out, got {:?}", sent[0]);
        };
        assert_eq!(out.buffer_id, 42);
    }
}
