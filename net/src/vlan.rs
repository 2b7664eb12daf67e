// SPDX-License-Identifier: Apache-2.0
// Copyright OpenVirteX Authors

//! VLAN id validation.
//!
//! Virtual link and route ids ride the wire as 802.1q VLAN tags. Those ids
//! come from 32-bit counters, so every id must pass through [`Vid`] before
//! it lands in a set-vlan action or a match field; an id that does not fit
//! the 12-bit tag space is an error, never a truncation.

use core::num::NonZero;
use std::fmt::Display;

/// A validated 802.1q VLAN identifier.
///
/// Backed by a [`NonZero<u16>`] so `Option<Vid>` costs no more than a bare
/// `u16`.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Vid(NonZero<u16>);

/// Errors which can occur when converting an id to a validated [`Vid`]
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[must_use]
pub enum InvalidVid {
    /// 0 is the "native vlan" and never a legal virtual-link id.
    #[error("Zero is a reserved Vid")]
    Zero,
    /// 4095 is reserved per the 802.1q spec.
    #[error("4095 is a reserved Vid")]
    Reserved,
    /// The value does not fit in 12 bits.
    #[error("{0} is too large to be a legal Vid ({MAX} is max legal value)", MAX = Vid::MAX)]
    TooLarge(u32),
}

impl InvalidVid {
    pub const RESERVED: u16 = 4095;
}

impl Vid {
    /// The minimum legal [`Vid`] value (1).
    #[allow(clippy::unwrap_used)] // safe due to const eval
    pub const MIN: Vid = Vid(NonZero::new(1).unwrap());

    /// The maximum legal [`Vid`] value (2^12 - 2).
    #[allow(clippy::unwrap_used)] // safe due to const eval
    pub const MAX: Vid = Vid(NonZero::new(4094).unwrap());

    /// Create a new [`Vid`] from a `u16`.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is 0, 4095 (reserved), or greater than
    /// [`Vid::MAX`].
    pub fn new(vid: u16) -> Result<Self, InvalidVid> {
        match NonZero::new(vid) {
            None => Err(InvalidVid::Zero),
            Some(val) if val.get() == InvalidVid::RESERVED => Err(InvalidVid::Reserved),
            Some(val) if val.get() > InvalidVid::RESERVED => {
                Err(InvalidVid::TooLarge(u32::from(val.get())))
            }
            Some(val) => Ok(Vid(val)),
        }
    }

    /// Get the value of the [`Vid`] as a `u16`.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0.get()
    }
}

impl Display for Vid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.get())
    }
}

impl TryFrom<u16> for Vid {
    type Error = InvalidVid;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Vid::new(value)
    }
}

/// Link and route id counters are 32-bit; the conversion is where an id
/// outgrowing the tag space surfaces.
impl TryFrom<u32> for Vid {
    type Error = InvalidVid;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match u16::try_from(value) {
            Ok(narrow) => Vid::new(narrow),
            Err(_) => Err(InvalidVid::TooLarge(value)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vid_bounds() {
        assert_eq!(Vid::new(0), Err(InvalidVid::Zero));
        assert_eq!(Vid::new(4095), Err(InvalidVid::Reserved));
        assert_eq!(Vid::new(4096), Err(InvalidVid::TooLarge(4096)));
        assert_eq!(Vid::new(1).unwrap(), Vid::MIN);
        assert_eq!(Vid::new(4094).unwrap(), Vid::MAX);
        assert_eq!(Vid::new(100).unwrap().as_u16(), 100);
    }

    #[test]
    fn wide_ids_do_not_truncate() {
        assert_eq!(Vid::try_from(100u32).unwrap().as_u16(), 100);
        assert_eq!(Vid::try_from(4096u32), Err(InvalidVid::TooLarge(4096)));
        // 0x1_0001 would alias vlan 1 if the id were cast instead of checked
        assert_eq!(Vid::try_from(0x1_0001u32), Err(InvalidVid::TooLarge(0x1_0001)));
    }
}
