// SPDX-License-Identifier: Apache-2.0
// Copyright OpenVirteX Authors

//! Path selection between the member switches of a big switch.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crate::link::PhysicalLink;
use crate::physical::PhysicalNetwork;

/// The internal path connecting two ports of a big switch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchRoute {
    pub route_id: u32,
    /// Virtual port number the route enters at.
    pub ingress: u16,
    /// Virtual port number the route leaves at.
    pub egress: u16,
    /// Ordered physical hops; empty when ingress and egress share a dpid.
    pub path: Vec<PhysicalLink>,
}

/// A path-selection strategy. Implementations only see physical links whose
/// both endpoints are member switches of the big switch being routed.
pub trait Routable: Send + Sync {
    /// An ordered, contiguous link path from `src` to `dst`, or `None` when
    /// the members are not connected.
    fn compute(
        &self,
        net: &PhysicalNetwork,
        members: &[u64],
        src: u64,
        dst: u64,
    ) -> Option<Vec<PhysicalLink>>;

    fn name(&self) -> &'static str;
}

impl std::fmt::Debug for dyn Routable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Routable({})", self.name())
    }
}

/// Breadth-first search, so the hop count is minimal.
#[derive(Debug, Default, Clone, Copy)]
pub struct ShortestPath;

impl Routable for ShortestPath {
    fn compute(
        &self,
        net: &PhysicalNetwork,
        members: &[u64],
        src: u64,
        dst: u64,
    ) -> Option<Vec<PhysicalLink>> {
        if src == dst {
            return Some(Vec::new());
        }
        let mut adjacency: HashMap<u64, Vec<PhysicalLink>> = HashMap::new();
        for link in net.links() {
            if members.contains(&link.src.dpid) && members.contains(&link.dst.dpid) {
                adjacency.entry(link.src.dpid).or_default().push(link);
            }
        }
        let mut visited: HashMap<u64, PhysicalLink> = HashMap::new();
        let mut queue = VecDeque::from([src]);
        while let Some(dpid) = queue.pop_front() {
            for link in adjacency.get(&dpid).map_or(&[][..], Vec::as_slice) {
                let next = link.dst.dpid;
                if next == src || visited.contains_key(&next) {
                    continue;
                }
                visited.insert(next, *link);
                if next == dst {
                    let mut path = Vec::new();
                    let mut at = dst;
                    while at != src {
                        let hop = visited[&at];
                        path.push(hop);
                        at = hop.src.dpid;
                    }
                    path.reverse();
                    return Some(path);
                }
                queue.push_back(next);
            }
        }
        None
    }

    fn name(&self) -> &'static str {
        "shortest-path"
    }
}

/// The strategy big switches use unless configured otherwise.
#[must_use]
pub fn default_routable() -> Arc<dyn Routable> {
    Arc::new(ShortestPath)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::RecordingChannel;
    use crate::physical::PhysicalSwitch;
    use crate::port::PortLocator;
    use pretty_assertions::assert_eq;

    fn line_topology(n: u64) -> PhysicalNetwork {
        let net = PhysicalNetwork::new();
        for dpid in 1..=n {
            net.add_switch(Arc::new(PhysicalSwitch::new(
                dpid,
                Arc::new(RecordingChannel::new("dp")),
            )));
        }
        for dpid in 1..n {
            let here = PortLocator::new(dpid, 2);
            let there = PortLocator::new(dpid + 1, 1);
            net.create_link(here, there);
            net.create_link(there, here);
        }
        net
    }

    #[test]
    fn path_is_contiguous() {
        let net = line_topology(4);
        let members = [1, 2, 3, 4];
        let path = ShortestPath.compute(&net, &members, 1, 4).unwrap();
        assert_eq!(path.len(), 3);
        for pair in path.windows(2) {
            assert_eq!(pair[0].dst.dpid, pair[1].src.dpid);
        }
        assert_eq!(path[0].src.dpid, 1);
        assert_eq!(path[2].dst.dpid, 4);
    }

    #[test]
    fn route_stays_inside_members() {
        let net = line_topology(3);
        // dpid 2 connects 1 and 3 but is not a member, so no route exists
        assert!(ShortestPath.compute(&net, &[1, 3], 1, 3).is_none());
    }

    #[test]
    fn same_switch_is_empty_path() {
        let net = line_topology(2);
        assert_eq!(ShortestPath.compute(&net, &[1, 2], 1, 1), Some(Vec::new()));
    }
}
