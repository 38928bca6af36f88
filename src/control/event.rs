use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

use super::id::ElemId;

/// Bitmask describing what changed on a control.
///
/// `REMOVE` is the all-ones mask and is only ever delivered alone; any other
/// mask is a combination of the change bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventMask(pub u32);

impl EventMask {
    pub const VALUE: EventMask = EventMask(1 << 0);
    pub const INFO: EventMask = EventMask(1 << 1);
    pub const ADD: EventMask = EventMask(1 << 2);
    pub const TLV: EventMask = EventMask(1 << 3);
    pub const REMOVE: EventMask = EventMask(!0);

    pub const fn empty() -> Self {
        EventMask(0)
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn is_remove(self) -> bool {
        self == Self::REMOVE
    }

    /// True when every bit of `other` is set. Never true for a removal.
    pub fn contains(self, other: EventMask) -> bool {
        !self.is_remove() && other.0 != 0 && self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Change bits other than `ADD`, as delivered to element handlers.
    pub fn changes(self) -> EventMask {
        if self.is_remove() {
            return Self::empty();
        }
        self & (Self::VALUE | Self::INFO | Self::TLV)
    }

    pub fn is_add(self) -> bool {
        self.contains(Self::ADD)
    }

    pub fn is_value(self) -> bool {
        self.contains(Self::VALUE)
    }

    pub fn is_info(self) -> bool {
        self.contains(Self::INFO)
    }

    pub fn is_tlv(self) -> bool {
        self.contains(Self::TLV)
    }
}

impl BitOr for EventMask {
    type Output = EventMask;

    fn bitor(self, rhs: EventMask) -> EventMask {
        EventMask(self.0 | rhs.0)
    }
}

impl BitAnd for EventMask {
    type Output = EventMask;

    fn bitand(self, rhs: EventMask) -> EventMask {
        EventMask(self.0 & rhs.0)
    }
}

impl BitOrAssign for EventMask {
    fn bitor_assign(&mut self, rhs: EventMask) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for EventMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_remove() {
            return f.write_str("REMOVE");
        }
        let names = [
            (Self::VALUE, "VALUE"),
            (Self::INFO, "INFO"),
            (Self::ADD, "ADD"),
            (Self::TLV, "TLV"),
        ];
        let set: Vec<&str> = names
            .iter()
            .filter(|(bit, _)| self.contains(*bit))
            .map(|(_, name)| *name)
            .collect();
        if set.is_empty() {
            f.write_str("NONE")
        } else {
            f.write_str(&set.join("|"))
        }
    }
}

/// One change notification read from a control device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlEvent {
    pub id: ElemId,
    pub mask: EventMask,
}

impl ControlEvent {
    pub fn new(id: ElemId, mask: EventMask) -> Self {
        Self { id, mask }
    }
}
