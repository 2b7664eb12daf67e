// SPDX-License-Identifier: Apache-2.0
// Copyright OpenVirteX Authors

//! OpenFlow 1.0 match wildcard bits.

/// One maskable match field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flag {
    InPort,
    DlVlan,
    DlSrc,
    DlDst,
    DlType,
    NwProto,
    TpSrc,
    TpDst,
    NwSrc,
    NwDst,
    DlVlanPcp,
    NwTos,
}

/// The 22-bit wildcard word of an OpenFlow 1.0 match.
///
/// `NwSrc`/`NwDst` are 6-bit prefix-length counters rather than single
/// bits; a count of 32 or more means the field is fully wildcarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Wildcards(pub u32);

const IN_PORT: u32 = 1 << 0;
const DL_VLAN: u32 = 1 << 1;
const DL_SRC: u32 = 1 << 2;
const DL_DST: u32 = 1 << 3;
const DL_TYPE: u32 = 1 << 4;
const NW_PROTO: u32 = 1 << 5;
const TP_SRC: u32 = 1 << 6;
const TP_DST: u32 = 1 << 7;
const NW_SRC_SHIFT: u32 = 8;
const NW_SRC_MASK: u32 = 0x3f << NW_SRC_SHIFT;
const NW_DST_SHIFT: u32 = 14;
const NW_DST_MASK: u32 = 0x3f << NW_DST_SHIFT;
const DL_VLAN_PCP: u32 = 1 << 20;
const NW_TOS: u32 = 1 << 21;

pub const ALL: u32 =
    IN_PORT | DL_VLAN | DL_SRC | DL_DST | DL_TYPE | NW_PROTO | TP_SRC | TP_DST | DL_VLAN_PCP
        | NW_TOS
        | (32 << NW_SRC_SHIFT)
        | (32 << NW_DST_SHIFT);

impl Wildcards {
    /// Everything wildcarded.
    #[must_use]
    pub const fn all() -> Self {
        Wildcards(ALL)
    }

    /// Nothing wildcarded.
    #[must_use]
    pub const fn none() -> Self {
        Wildcards(0)
    }

    fn flag_bit(flag: Flag) -> u32 {
        match flag {
            Flag::InPort => IN_PORT,
            Flag::DlVlan => DL_VLAN,
            Flag::DlSrc => DL_SRC,
            Flag::DlDst => DL_DST,
            Flag::DlType => DL_TYPE,
            Flag::NwProto => NW_PROTO,
            Flag::TpSrc => TP_SRC,
            Flag::TpDst => TP_DST,
            Flag::DlVlanPcp => DL_VLAN_PCP,
            Flag::NwTos => NW_TOS,
            // handled separately as counters
            Flag::NwSrc | Flag::NwDst => 0,
        }
    }

    #[must_use]
    pub fn is_wildcarded(&self, flag: Flag) -> bool {
        match flag {
            Flag::NwSrc => (self.0 & NW_SRC_MASK) >> NW_SRC_SHIFT >= 32,
            Flag::NwDst => (self.0 & NW_DST_MASK) >> NW_DST_SHIFT >= 32,
            _ => self.0 & Self::flag_bit(flag) != 0,
        }
    }

    /// Return a wildcard word that matches exactly on `flag`.
    #[must_use]
    pub fn match_on(self, flag: Flag) -> Self {
        match flag {
            Flag::NwSrc => Wildcards(self.0 & !NW_SRC_MASK),
            Flag::NwDst => Wildcards(self.0 & !NW_DST_MASK),
            _ => Wildcards(self.0 & !Self::flag_bit(flag)),
        }
    }

    /// Return a wildcard word that ignores `flag`.
    #[must_use]
    pub fn wildcard(self, flag: Flag) -> Self {
        match flag {
            Flag::NwSrc => Wildcards((self.0 & !NW_SRC_MASK) | (32 << NW_SRC_SHIFT)),
            Flag::NwDst => Wildcards((self.0 & !NW_DST_MASK) | (32 << NW_DST_SHIFT)),
            _ => Wildcards(self.0 | Self::flag_bit(flag)),
        }
    }
}

impl Default for Wildcards {
    fn default() -> Self {
        Wildcards::all()
    }
}
