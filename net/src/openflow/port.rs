// SPDX-License-Identifier: Apache-2.0
// Copyright OpenVirteX Authors

//! OpenFlow 1.0 reserved port numbers.

/// The reserved port values of OpenFlow 1.0. Anything at or below
/// [`OfPort::MAX`] is a real switch port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OfPort {
    /// Highest addressable physical port.
    Max,
    /// Send back out the packet's input port.
    InPort,
    Table,
    Normal,
    /// All physical ports except input and those with flooding disabled.
    Flood,
    /// All physical ports except input.
    All,
    Controller,
    Local,
    None,
}

impl OfPort {
    pub const MAX: u16 = 0xff00;
    pub const IN_PORT: u16 = 0xfff8;
    pub const TABLE: u16 = 0xfff9;
    pub const NORMAL: u16 = 0xfffa;
    pub const FLOOD: u16 = 0xfffb;
    pub const ALL: u16 = 0xfffc;
    pub const CONTROLLER: u16 = 0xfffd;
    pub const LOCAL: u16 = 0xfffe;
    pub const NONE: u16 = 0xffff;

    /// Classify a reserved port value; `None` for real port numbers.
    #[must_use]
    pub fn reserved(port: u16) -> Option<OfPort> {
        match port {
            Self::IN_PORT => Some(OfPort::InPort),
            Self::TABLE => Some(OfPort::Table),
            Self::NORMAL => Some(OfPort::Normal),
            Self::FLOOD => Some(OfPort::Flood),
            Self::ALL => Some(OfPort::All),
            Self::CONTROLLER => Some(OfPort::Controller),
            Self::LOCAL => Some(OfPort::Local),
            Self::NONE => Some(OfPort::None),
            _ => None,
        }
    }

    /// True if `port` addresses a real switch port.
    #[must_use]
    pub fn is_physical(port: u16) -> bool {
        port < Self::MAX
    }
}
