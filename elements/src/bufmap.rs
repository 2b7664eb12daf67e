// SPDX-License-Identifier: Apache-2.0
// Copyright OpenVirteX Authors

//! The per-virtual-switch buffer of pending packet-ins.
//!
//! A tenant controller answers a packet-in with a packet-out naming the
//! buffer id; the map correlates the two. It is bounded: once full, the
//! least recently touched entry is evicted, and a packet-out naming an
//! evicted id is treated as referencing an unknown buffer.

use net::openflow::PacketIn;
use ordermap::OrderMap;

/// Number of pending packet-ins a virtual switch keeps.
pub const BUFFER_CAPACITY: usize = 4096;

#[derive(Debug, Default)]
pub struct BufferMap {
    entries: OrderMap<u32, PacketIn>,
    next_id: u32,
}

impl BufferMap {
    #[must_use]
    pub fn new() -> Self {
        BufferMap {
            entries: OrderMap::with_capacity(BUFFER_CAPACITY),
            next_id: 0,
        }
    }

    /// Store a packet-in and return the buffer id assigned to it. Ids are
    /// handed out monotonically modulo the capacity, wrapping.
    pub fn add(&mut self, pkt: PacketIn) -> u32 {
        let id = self.next_id;
        self.next_id = (self.next_id + 1) % BUFFER_CAPACITY as u32;
        if self.entries.len() >= BUFFER_CAPACITY {
            self.entries.remove_index(0);
        }
        // a wrapped id replaces the stale entry rather than duplicating it
        self.entries.remove(&id);
        self.entries.insert(id, pkt);
        id
    }

    /// Fetch a buffered packet-in, refreshing its recency.
    pub fn get(&mut self, id: u32) -> Option<PacketIn> {
        let pkt = self.entries.remove(&id)?;
        self.entries.insert(id, pkt.clone());
        Some(pkt)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
